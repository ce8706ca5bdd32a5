//! Capability traits implemented by persisted entity types.
//!
//! # Responsibility
//! - Describe an entity's persisted fields as typed column tokens.
//! - Describe navigation relations as typed tokens usable in include lists.
//! - Convert between entity values and SQLite rows.
//!
//! # Invariants
//! - `Column::ALL` lists every persisted field exactly once.
//! - `Entity::KEY` is one of `Column::ALL`.
//! - `Entity::from_row` never populates navigation fields.

use crate::context::Session;
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::{FromSql, Value};
use rusqlite::Row;
use std::fmt::Debug;

/// Typed reference to one persisted field of an entity.
pub trait Column: Copy + Eq + Debug + Send + Sync + 'static {
    /// Every persisted field, in declaration order.
    const ALL: &'static [Self];

    /// Column name the field is stored under.
    fn column_name(self) -> &'static str;
}

/// Typed reference to one navigation member of an entity.
pub trait Relation: Copy + Eq + Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    /// Member name, matched against `RelationMap::name` in the model.
    fn name(self) -> &'static str;
}

/// Relation token for entities without navigation members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoRelation {}

impl Relation for NoRelation {
    const ALL: &'static [Self] = &[];

    fn name(self) -> &'static str {
        match self {}
    }
}

/// A persisted record type with a key and mapped scalar fields.
pub trait Entity: Sized + Debug + 'static {
    type Field: Column;
    type Relation: Relation;

    /// Primary-key field.
    const KEY: Self::Field;

    /// Current value of `field`, ready to bind as a statement parameter.
    fn value(&self, field: Self::Field) -> Value;

    /// Materializes one entity from a row selected with all `Field::ALL` columns.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Eagerly loads `relation` for every entity in `rows` using `session`.
    fn load_relation(
        session: &Session<'_>,
        rows: &mut [Self],
        relation: Self::Relation,
    ) -> RepoResult<()>;

    /// Key value of this instance.
    fn key(&self) -> Value {
        self.value(Self::KEY)
    }
}

/// Resolves untyped include names to relation tokens of `T`.
///
/// # Errors
/// - Returns `RepoError::InvalidArgument` for any name that is not a direct
///   navigation member of `T`. Nothing touches the store.
pub fn parse_includes<T: Entity>(names: &[&str]) -> RepoResult<Vec<T::Relation>> {
    names
        .iter()
        .map(|name| {
            let trimmed = name.trim();
            T::Relation::ALL
                .iter()
                .copied()
                .find(|relation| relation.name() == trimmed)
                .ok_or_else(|| {
                    RepoError::InvalidArgument(format!(
                        "include `{trimmed}` is not a navigation member of `{}`",
                        short_type_name::<T>()
                    ))
                })
        })
        .collect()
}

/// Reads `field` from a row selected by a session query.
pub fn read<F: Column, V: FromSql>(row: &Row<'_>, field: F) -> rusqlite::Result<V> {
    row.get(field.column_name())
}

/// Converts an optional string field into a bind value.
pub fn text_value(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_owned()))
}

/// Converts an optional integer field into a bind value.
pub fn integer_value(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

pub(crate) fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
