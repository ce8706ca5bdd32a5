use log::{Level, LevelFilter, Log, Metadata, Record};
use northwind_data::{
    ConnectionRegistry, ConnectionTarget, DataContext, Employee, RepoError, Repository,
    NORTHWIND_CONNECTION,
};
use once_cell::sync::OnceCell;
use std::sync::Mutex;

static RECORDS: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());
static LOGGER: CaptureLogger = CaptureLogger;
static INSTALLED: OnceCell<()> = OnceCell::new();

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        let mut records = RECORDS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

fn install_logger() {
    INSTALLED.get_or_init(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
}

fn repo_events(table: &str) -> Vec<(Level, String)> {
    let needle = format!("table={table} ");
    RECORDS
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, message)| message.contains("event=repo_op") && message.contains(&needle))
        .cloned()
        .collect()
}

#[test]
fn failed_operations_are_logged_at_debug_and_still_returned() {
    install_logger();
    let dir = tempfile::tempdir().unwrap();
    let registry = ConnectionRegistry::new().with_connection(
        NORTHWIND_CONNECTION,
        ConnectionTarget::File(dir.path().join("northwind.db")),
    );
    let context = DataContext::northwind(&registry).unwrap();
    let repo = context.repository::<Employee>().unwrap();

    repo.create(&Employee::new(1, "Davolio", "Nancy")).unwrap();
    let missing = repo.update(&Employee::new(9, "Nobody", "Here")).unwrap_err();
    assert!(matches!(missing, RepoError::NotFound { .. }), "{missing}");
    let duplicate = repo.create(&Employee::new(1, "Fuller", "Andrew")).unwrap_err();
    assert!(duplicate.is_constraint_violation(), "{duplicate}");

    let events = repo_events("Employees");
    assert!(events
        .iter()
        .any(|(_, message)| message.contains("status=ok") && message.contains("op=create")));
    assert!(events
        .iter()
        .any(|(_, message)| message.contains("status=error") && message.contains("op=update")));
    assert_eq!(
        events
            .iter()
            .filter(|(_, message)| message.contains("status=error") && message.contains("op=create"))
            .count(),
        1
    );
    for (level, message) in &events {
        assert_eq!(*level, Level::Debug, "{message}");
    }

    let records = RECORDS.lock().unwrap();
    assert!(
        records.iter().all(|(level, _)| *level > Level::Warn),
        "{records:?}"
    );
}
