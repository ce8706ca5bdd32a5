//! Per-table mapping rules: columns, constraints and navigation relations.

use serde::Serialize;

/// Storage type of a mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    /// Unicode text; rendered as `NVARCHAR(n)` when a max length is declared.
    Text,
    /// Single-byte text; always rendered as `VARCHAR(n)` / `VARCHAR`.
    Varchar,
    Blob,
}

/// Action taken on referencing rows when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    #[default]
    NoAction,
    Cascade,
    SetNull,
}

/// Foreign-key constraint declared on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: OnDelete,
}

impl ForeignKey {
    pub fn new(table: &'static str, column: &'static str) -> Self {
        Self {
            table,
            column,
            on_delete: OnDelete::NoAction,
        }
    }

    pub fn on_delete(mut self, action: OnDelete) -> Self {
        self.on_delete = action;
        self
    }
}

/// Mapping rule for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub required: bool,
    pub max_length: Option<u32>,
    pub primary_key: bool,
    pub references: Option<ForeignKey>,
}

impl ColumnMap {
    /// Optional column of `column_type` with no length limit.
    pub fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            required: false,
            max_length: None,
            primary_key: false,
            references: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Overrides the storage type, e.g. `varchar` for single-byte text.
    pub fn column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    pub fn references(mut self, foreign_key: ForeignKey) -> Self {
        self.references = Some(foreign_key);
        self
    }

    pub fn is_text(&self) -> bool {
        matches!(self.column_type, ColumnType::Text | ColumnType::Varchar)
    }
}

/// Shape of a navigation relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationKind {
    /// This table holds `foreign_key`, pointing at the key of `target`.
    Reference {
        foreign_key: &'static str,
        target: &'static str,
    },
    /// Rows of `target` hold `foreign_key`, pointing at this table's key.
    Collection {
        target: &'static str,
        foreign_key: &'static str,
    },
}

/// Named navigation member that may be eagerly loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationMap {
    pub name: &'static str,
    pub kind: RelationKind,
}

impl RelationMap {
    pub fn target(&self) -> &'static str {
        match &self.kind {
            RelationKind::Reference { target, .. } | RelationKind::Collection { target, .. } => {
                target
            }
        }
    }
}

/// Mapping rule binding one entity type to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMap {
    name: &'static str,
    columns: Vec<ColumnMap>,
    relations: Vec<RelationMap>,
}

impl TableMap {
    /// Starts a mapping for table `name` (the `ToTable` declaration).
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Declares the primary-key column. Keys are always required.
    pub fn key(mut self, name: &'static str, column_type: ColumnType) -> Self {
        let mut column = ColumnMap::new(name, column_type).required();
        column.primary_key = true;
        self.columns.push(column);
        self
    }

    /// Declares a primary key that also references the key of a base table,
    /// so a specialization row shares the identity of its base row.
    pub fn shared_key(
        mut self,
        name: &'static str,
        column_type: ColumnType,
        base: ForeignKey,
    ) -> Self {
        let mut column = ColumnMap::new(name, column_type)
            .required()
            .references(base);
        column.primary_key = true;
        self.columns.push(column);
        self
    }

    /// Declares one non-key column.
    pub fn property(mut self, column: ColumnMap) -> Self {
        self.columns.push(column);
        self
    }

    /// Declares a single-valued navigation through `foreign_key` on this table.
    pub fn reference(
        mut self,
        name: &'static str,
        foreign_key: &'static str,
        target: &'static str,
    ) -> Self {
        self.relations.push(RelationMap {
            name,
            kind: RelationKind::Reference {
                foreign_key,
                target,
            },
        });
        self
    }

    /// Declares a many-valued navigation through `foreign_key` on `target`.
    pub fn collection(
        mut self,
        name: &'static str,
        target: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        self.relations.push(RelationMap {
            name,
            kind: RelationKind::Collection {
                target,
                foreign_key,
            },
        });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn columns(&self) -> &[ColumnMap] {
        &self.columns
    }

    pub fn relations(&self) -> &[RelationMap] {
        &self.relations
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMap> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationMap> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    pub fn key_column(&self) -> Option<&ColumnMap> {
        self.columns.iter().find(|column| column.primary_key)
    }
}
