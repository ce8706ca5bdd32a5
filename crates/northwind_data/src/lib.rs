//! Generic data access for the Northwind store.
//! Entities are mapped to SQLite tables and accessed through one repository
//! abstraction; every call is its own unit of work.

pub mod config;
pub mod context;
pub mod db;
pub mod entity;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod query;
pub mod repo;

pub use config::{ConfigError, ConnectionRegistry, ConnectionTarget, NORTHWIND_CONNECTION};
pub use context::{northwind_model, ChangeSet, DataContext, EntryState, Session};
pub use db::{DbError, DbResult};
pub use entity::{parse_includes, Column, Entity, NoRelation, Relation};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LogTarget};
pub use mapping::{
    ColumnMap, ColumnType, ForeignKey, Model, ModelError, OnDelete, RelationKind, RelationMap,
    TableMap,
};
pub use model::{
    Employee, EmployeeExternal, EmployeeExternalField, EmployeeField, EmployeeId,
    EmployeeInternal, EmployeeInternalField, EmployeeRelation, SpecializationRelation,
};
pub use query::{CompareOp, Predicate};
pub use repo::{RepoError, RepoResult, Repository, SqliteRepository};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
