//! Data context: a named store connection bound to a mapping model.
//!
//! # Responsibility
//! - Resolve the named connection and create the mapped schema once.
//! - Hand out one fresh `Session` per repository call.
//!
//! # Invariants
//! - The model is read-only for the context's lifetime.
//! - Sessions are never shared; every `with_session` call opens its own and
//!   drops it on every exit path.
//! - Shared in-memory stores stay alive while any clone of the context lives.

mod northwind;
mod session;

pub use northwind::{
    employee_external_map, employee_internal_map, employee_map, northwind_model,
};
pub use session::{ChangeSet, EntryState, Session};

use crate::config::{ConnectionRegistry, ConnectionTarget, NORTHWIND_CONNECTION};
use crate::db::{ensure_schema, open_connection, DbResult};
use crate::entity::Entity;
use crate::mapping::Model;
use crate::repo::{RepoResult, SqliteRepository};
use log::info;
use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Session factory for one named connection and one model.
///
/// Cheap to clone; clones share the model, the session counter and the
/// in-memory keep-alive connection.
#[derive(Debug, Clone)]
pub struct DataContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    name: String,
    target: ConnectionTarget,
    model: Arc<Model>,
    sessions_opened: AtomicU64,
    _keep_alive: Option<Mutex<Connection>>,
}

impl DataContext {
    /// Opens the Northwind context on the `NorthwindDb` connection.
    pub fn northwind(registry: &ConnectionRegistry) -> DbResult<Self> {
        Self::connect(NORTHWIND_CONNECTION, registry)
    }

    /// Opens the Northwind model on the connection registered as `name`.
    pub fn connect(name: &str, registry: &ConnectionRegistry) -> DbResult<Self> {
        let target = registry.resolve(name)?;
        Self::with_model(name, target, northwind_model()?)
    }

    /// Opens `model` on `target` and creates any missing tables.
    ///
    /// # Side effects
    /// - Opens one bootstrap connection; for shared in-memory targets it is
    ///   kept open for the context's lifetime.
    /// - Emits `context_open` logging events.
    pub fn with_model(
        name: impl Into<String>,
        target: ConnectionTarget,
        model: Arc<Model>,
    ) -> DbResult<Self> {
        let name = name.into();
        let started_at = Instant::now();

        let mut conn = open_connection(&target)?;
        ensure_schema(&mut conn, &model)?;
        let keep_alive = match target {
            ConnectionTarget::SharedMemory(_) => Some(Mutex::new(conn)),
            ConnectionTarget::File(_) => None,
        };

        info!(
            "event=context_open module=context status=ok context={name} mode={} tables={} duration_ms={}",
            target.mode(),
            model.tables().count(),
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            inner: Arc::new(ContextInner {
                name,
                target,
                model,
                sessions_opened: AtomicU64::new(0),
                _keep_alive: keep_alive,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.inner.target
    }

    pub fn model(&self) -> &Model {
        &self.inner.model
    }

    /// Number of sessions opened through this context and its clones.
    pub fn sessions_opened(&self) -> u64 {
        self.inner.sessions_opened.load(Ordering::Relaxed)
    }

    /// Opens a new session. The caller owns it and must drop it.
    pub fn open_session(&self) -> DbResult<Session<'_>> {
        Session::open(self)
    }

    /// Runs `work` inside a fresh session that is dropped before returning.
    pub fn with_session<R>(
        &self,
        work: impl FnOnce(&mut Session<'_>) -> RepoResult<R>,
    ) -> RepoResult<R> {
        let mut session = self.open_session()?;
        work(&mut session)
    }

    /// Generic repository for `T` over this context.
    pub fn repository<T: Entity>(&self) -> RepoResult<SqliteRepository<T>> {
        SqliteRepository::try_new(self.clone())
    }
}
