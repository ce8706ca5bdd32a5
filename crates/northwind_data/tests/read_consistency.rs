use northwind_data::entity::{integer_value, read};
use northwind_data::{
    Column, ColumnMap, ColumnType, ConnectionTarget, DataContext, Entity, ForeignKey, Model,
    Relation, RepoResult, Repository, Session, TableMap,
};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const RENAME_MAIN: &str = "UPDATE Accounts SET Name = 'Renamed' WHERE AccountID = 1";

thread_local! {
    static STORE: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
    static WRITE_DURING_LOAD: RefCell<Option<rusqlite::Result<usize>>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Account {
    account_id: i64,
    name: String,
    owner_id: Option<i64>,
    owner: Option<Box<Account>>,
}

impl Account {
    fn new(account_id: i64, name: &str, owner_id: Option<i64>) -> Self {
        Self {
            account_id,
            name: name.to_string(),
            owner_id,
            owner: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountField {
    AccountId,
    Name,
    OwnerId,
}

impl Column for AccountField {
    const ALL: &'static [Self] = &[Self::AccountId, Self::Name, Self::OwnerId];

    fn column_name(self) -> &'static str {
        match self {
            Self::AccountId => "AccountID",
            Self::Name => "Name",
            Self::OwnerId => "OwnerID",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountRelation {
    Owner,
}

impl Relation for AccountRelation {
    const ALL: &'static [Self] = &[Self::Owner];

    fn name(self) -> &'static str {
        "Owner"
    }
}

impl Entity for Account {
    type Field = AccountField;
    type Relation = AccountRelation;

    const KEY: AccountField = AccountField::AccountId;

    fn value(&self, field: AccountField) -> Value {
        match field {
            AccountField::AccountId => Value::Integer(self.account_id),
            AccountField::Name => Value::Text(self.name.clone()),
            AccountField::OwnerId => integer_value(self.owner_id),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            account_id: read(row, AccountField::AccountId)?,
            name: read(row, AccountField::Name)?,
            owner_id: read(row, AccountField::OwnerId)?,
            owner: None,
        })
    }

    // Another connection writes between the base select and the owner select.
    fn load_relation(
        session: &Session<'_>,
        rows: &mut [Self],
        relation: AccountRelation,
    ) -> RepoResult<()> {
        if let Some(path) = STORE.with(|store| store.borrow().clone()) {
            let outcome = Connection::open(&path).and_then(|writer| {
                writer.busy_timeout(Duration::ZERO)?;
                writer.execute(RENAME_MAIN, [])
            });
            WRITE_DURING_LOAD.with(|slot| *slot.borrow_mut() = Some(outcome));
        }

        let owners = session.load_reference::<Self, Account>(rows, relation)?;
        for (row, owner) in rows.iter_mut().zip(owners) {
            row.owner = owner.map(Box::new);
        }
        Ok(())
    }
}

fn account_map() -> TableMap {
    TableMap::new("Accounts")
        .key("AccountID", ColumnType::Integer)
        .property(ColumnMap::new("Name", ColumnType::Text).max_length(40).required())
        .property(
            ColumnMap::new("OwnerID", ColumnType::Integer)
                .references(ForeignKey::new("Accounts", "AccountID")),
        )
        .reference("Owner", "OwnerID", "Accounts")
}

#[test]
fn includes_read_the_same_snapshot_as_the_base_query() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("accounts.db");
    let model = Model::builder()
        .entity::<Account>(account_map())
        .build()
        .unwrap();
    let context = DataContext::with_model(
        "Accounts",
        ConnectionTarget::File(db_path.clone()),
        Arc::new(model),
    )
    .unwrap();
    let repo = context.repository::<Account>().unwrap();
    repo.create(&Account::new(1, "Main", None)).unwrap();
    repo.create(&Account::new(2, "Savings", Some(1))).unwrap();

    STORE.with(|store| *store.borrow_mut() = Some(db_path.clone()));
    let accounts = repo.get_all_with(&[AccountRelation::Owner]).unwrap();
    STORE.with(|store| *store.borrow_mut() = None);

    let write = WRITE_DURING_LOAD
        .with(|slot| slot.borrow_mut().take())
        .expect("loader ran");
    assert!(write.is_err(), "write committed while relations were loading");

    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].name, "Main");
    let owner = accounts[1].owner.as_deref().expect("owner should be loaded");
    assert_eq!(owner.name, accounts[0].name);

    let writer = Connection::open(&db_path).unwrap();
    assert_eq!(writer.execute(RENAME_MAIN, []).unwrap(), 1);
    drop(writer);
    let reloaded = repo.get_all().unwrap();
    assert_eq!(reloaded[0].name, "Renamed");
}

#[test]
fn queries_without_includes_never_call_the_loader() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("accounts.db");
    let model = Model::builder()
        .entity::<Account>(account_map())
        .build()
        .unwrap();
    let context = DataContext::with_model(
        "Accounts",
        ConnectionTarget::File(db_path.clone()),
        Arc::new(model),
    )
    .unwrap();
    let repo = context.repository::<Account>().unwrap();
    repo.create(&Account::new(1, "Main", None)).unwrap();

    STORE.with(|store| *store.borrow_mut() = Some(db_path));
    let accounts = repo.get_all_with(&[]).unwrap();
    STORE.with(|store| *store.borrow_mut() = None);

    assert!(WRITE_DURING_LOAD.with(|slot| slot.borrow().is_none()));
    assert_eq!(accounts, vec![Account::new(1, "Main", None)]);
}
