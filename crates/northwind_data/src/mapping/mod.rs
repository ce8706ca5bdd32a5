//! Object-relational mapping registry.
//!
//! # Responsibility
//! - Bind each entity type to exactly one table mapping.
//! - Validate that mappings and entity field tokens agree before any
//!   session reads or writes through them.
//!
//! # Invariants
//! - A `Model` is immutable once built.
//! - Every `Column::ALL` token of a registered entity has a column rule, and
//!   every column rule has a token.
//! - Relation and foreign-key targets resolve to registered tables/columns.

mod table;

pub use table::{ColumnMap, ColumnType, ForeignKey, OnDelete, RelationKind, RelationMap, TableMap};

use crate::entity::{short_type_name, Column, Entity, Relation};
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::TypeId;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

pub type ModelResult<T> = Result<T, ModelError>;

/// Mapping declaration error detected while building a `Model`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidIdentifier(String),
    DuplicateEntity(&'static str),
    DuplicateTable(&'static str),
    DuplicateColumn {
        table: &'static str,
        column: &'static str,
    },
    MissingKey(&'static str),
    KeyMismatch {
        table: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    UnmappedField {
        entity: &'static str,
        column: &'static str,
    },
    UnknownColumn {
        table: &'static str,
        column: &'static str,
    },
    UnknownRelation {
        table: &'static str,
        relation: &'static str,
    },
    InvalidRelation {
        table: &'static str,
        relation: &'static str,
        reason: String,
    },
    InvalidForeignKey {
        table: &'static str,
        column: &'static str,
        reason: String,
    },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(name) => write!(f, "invalid identifier `{name}`"),
            Self::DuplicateEntity(entity) => write!(f, "entity `{entity}` is mapped twice"),
            Self::DuplicateTable(table) => write!(f, "table `{table}` is mapped twice"),
            Self::DuplicateColumn { table, column } => {
                write!(f, "column `{table}.{column}` is mapped twice")
            }
            Self::MissingKey(table) => write!(f, "table `{table}` declares no key column"),
            Self::KeyMismatch {
                table,
                expected,
                found,
            } => write!(
                f,
                "table `{table}` key is `{found}` but the entity key field is `{expected}`"
            ),
            Self::UnmappedField { entity, column } => {
                write!(f, "field `{column}` of `{entity}` has no column mapping")
            }
            Self::UnknownColumn { table, column } => write!(
                f,
                "column `{table}.{column}` does not correspond to an entity field"
            ),
            Self::UnknownRelation { table, relation } => write!(
                f,
                "relation `{relation}` on `{table}` is not a navigation member of the entity"
            ),
            Self::InvalidRelation {
                table,
                relation,
                reason,
            } => write!(f, "relation `{table}.{relation}` is invalid: {reason}"),
            Self::InvalidForeignKey {
                table,
                column,
                reason,
            } => write!(f, "foreign key on `{table}.{column}` is invalid: {reason}"),
        }
    }
}

impl Error for ModelError {}

#[derive(Debug, Clone)]
struct ModelEntry {
    type_id: TypeId,
    entity: &'static str,
    table: TableMap,
}

/// Immutable registry of entity-to-table mappings.
#[derive(Debug, Clone)]
pub struct Model {
    entries: Vec<ModelEntry>,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// Mapping registered for entity type `T`.
    pub fn table<T: Entity>(&self) -> Option<&TableMap> {
        let type_id = TypeId::of::<T>();
        self.entries
            .iter()
            .find(|entry| entry.type_id == type_id)
            .map(|entry| &entry.table)
    }

    pub fn table_named(&self, name: &str) -> Option<&TableMap> {
        self.entries
            .iter()
            .find(|entry| entry.table.name() == name)
            .map(|entry| &entry.table)
    }

    /// Table mappings in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableMap> {
        self.entries.iter().map(|entry| &entry.table)
    }

    /// Entity type name mapped to `table`, for diagnostics.
    pub fn entity_for_table(&self, table: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|entry| entry.table.name() == table)
            .map(|entry| entry.entity)
    }
}

/// Collects entity mappings and validates them into a `Model`.
///
/// The first declaration error is kept and returned by `build`.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    entries: Vec<ModelEntry>,
    error: Option<ModelError>,
}

impl ModelBuilder {
    /// Registers `table` as the mapping for entity type `T`.
    pub fn entity<T: Entity>(mut self, table: TableMap) -> Self {
        if self.error.is_some() {
            return self;
        }

        let entity = short_type_name::<T>();
        let type_id = TypeId::of::<T>();
        let result = if self.entries.iter().any(|entry| entry.type_id == type_id) {
            Err(ModelError::DuplicateEntity(entity))
        } else if self
            .entries
            .iter()
            .any(|entry| entry.table.name() == table.name())
        {
            Err(ModelError::DuplicateTable(table.name()))
        } else {
            validate_entity_table::<T>(entity, &table)
        };

        match result {
            Ok(()) => self.entries.push(ModelEntry {
                type_id,
                entity,
                table,
            }),
            Err(err) => self.error = Some(err),
        }
        self
    }

    /// Finishes the model after cross-table checks.
    pub fn build(self) -> ModelResult<Model> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let model = Model {
            entries: self.entries,
        };
        for table in model.tables() {
            validate_cross_references(&model, table)?;
        }
        Ok(model)
    }
}

fn validate_entity_table<T: Entity>(entity: &'static str, table: &TableMap) -> ModelResult<()> {
    check_identifier(table.name())?;

    for (index, column) in table.columns().iter().enumerate() {
        check_identifier(column.name)?;
        if table.columns()[..index]
            .iter()
            .any(|earlier| earlier.name == column.name)
        {
            return Err(ModelError::DuplicateColumn {
                table: table.name(),
                column: column.name,
            });
        }
    }

    let keys: Vec<&ColumnMap> = table
        .columns()
        .iter()
        .filter(|column| column.primary_key)
        .collect();
    let key = match keys.as_slice() {
        [key] => *key,
        _ => return Err(ModelError::MissingKey(table.name())),
    };
    if key.name != T::KEY.column_name() {
        return Err(ModelError::KeyMismatch {
            table: table.name(),
            expected: T::KEY.column_name(),
            found: key.name,
        });
    }

    for field in T::Field::ALL {
        if table.column(field.column_name()).is_none() {
            return Err(ModelError::UnmappedField {
                entity,
                column: field.column_name(),
            });
        }
    }

    for column in table.columns() {
        if !T::Field::ALL
            .iter()
            .any(|field| field.column_name() == column.name)
        {
            return Err(ModelError::UnknownColumn {
                table: table.name(),
                column: column.name,
            });
        }
    }

    for relation in table.relations() {
        check_identifier(relation.name)?;
        if !T::Relation::ALL
            .iter()
            .any(|token| token.name() == relation.name)
        {
            return Err(ModelError::UnknownRelation {
                table: table.name(),
                relation: relation.name,
            });
        }
        if let RelationKind::Reference { foreign_key, .. } = relation.kind {
            if table.column(foreign_key).is_none() {
                return Err(ModelError::InvalidRelation {
                    table: table.name(),
                    relation: relation.name,
                    reason: format!("foreign key column `{foreign_key}` is not mapped"),
                });
            }
        }
    }

    Ok(())
}

fn validate_cross_references(model: &Model, table: &TableMap) -> ModelResult<()> {
    for relation in table.relations() {
        let target = model
            .table_named(relation.target())
            .ok_or_else(|| ModelError::InvalidRelation {
                table: table.name(),
                relation: relation.name,
                reason: format!("target table `{}` is not mapped", relation.target()),
            })?;
        if let RelationKind::Collection { foreign_key, .. } = relation.kind {
            if target.column(foreign_key).is_none() {
                return Err(ModelError::InvalidRelation {
                    table: table.name(),
                    relation: relation.name,
                    reason: format!(
                        "foreign key column `{}.{foreign_key}` is not mapped",
                        target.name()
                    ),
                });
            }
        }
    }

    for column in table.columns() {
        let Some(foreign_key) = &column.references else {
            continue;
        };
        let target =
            model
                .table_named(foreign_key.table)
                .ok_or_else(|| ModelError::InvalidForeignKey {
                    table: table.name(),
                    column: column.name,
                    reason: format!("table `{}` is not mapped", foreign_key.table),
                })?;
        if target.column(foreign_key.column).is_none() {
            return Err(ModelError::InvalidForeignKey {
                table: table.name(),
                column: column.name,
                reason: format!(
                    "column `{}.{}` is not mapped",
                    foreign_key.table, foreign_key.column
                ),
            });
        }
    }

    Ok(())
}

fn check_identifier(name: &str) -> ModelResult<()> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(ModelError::InvalidIdentifier(name.to_string()))
    }
}
