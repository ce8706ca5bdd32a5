//! Typed boolean filters over entity fields.
//!
//! # Responsibility
//! - Let callers express `T -> bool` filters over typed field tokens.
//! - Compile filters into parameterized SQL `WHERE` clauses.
//!
//! # Invariants
//! - Values are always bound as parameters, never spliced into SQL.
//! - Equality against NULL compiles to `IS NULL` / `IS NOT NULL`.

use crate::db::quote_ident;
use crate::entity::Column;
use rusqlite::types::Value;
use std::ops::Not;

/// Comparison operator used by `Predicate::Compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Filter over the fields `F` of one entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<F> {
    /// Matches every row.
    Always,
    Compare {
        field: F,
        op: CompareOp,
        value: Value,
    },
    IsNull(F),
    IsNotNull(F),
    /// SQL `LIKE` with `%`/`_` wildcards.
    Like {
        field: F,
        pattern: String,
    },
    In {
        field: F,
        values: Vec<Value>,
    },
    And(Vec<Predicate<F>>),
    Or(Vec<Predicate<F>>),
    Not(Box<Predicate<F>>),
}

impl<F: Column> Predicate<F> {
    pub fn eq(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn gt(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: F, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn compare(field: F, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn like(field: F, pattern: impl Into<String>) -> Self {
        Self::Like {
            field,
            pattern: pattern.into(),
        }
    }

    pub fn is_null(field: F) -> Self {
        Self::IsNull(field)
    }

    pub fn is_not_null(field: F) -> Self {
        Self::IsNotNull(field)
    }

    pub fn is_in<V: Into<Value>>(field: F, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Conjunction, flattening nested `And` nodes.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Always, other) | (other, Self::Always) => other,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (this, other) => Self::And(vec![this, other]),
        }
    }

    /// Disjunction, flattening nested `Or` nodes.
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), other) => {
                left.push(other);
                Self::Or(left)
            }
            (this, other) => Self::Or(vec![this, other]),
        }
    }

    /// Renders this filter as a SQL boolean expression, appending bind values
    /// in placeholder order.
    pub fn to_sql(&self, binds: &mut Vec<Value>) -> String {
        match self {
            Self::Always => "1 = 1".to_string(),
            Self::Compare { field, op, value } => {
                let column = quote_ident(field.column_name());
                match (op, value) {
                    (CompareOp::Eq, Value::Null) => format!("{column} IS NULL"),
                    (CompareOp::Ne, Value::Null) => format!("{column} IS NOT NULL"),
                    _ => {
                        binds.push(value.clone());
                        format!("{column} {} ?", op.as_sql())
                    }
                }
            }
            Self::IsNull(field) => format!("{} IS NULL", quote_ident(field.column_name())),
            Self::IsNotNull(field) => {
                format!("{} IS NOT NULL", quote_ident(field.column_name()))
            }
            Self::Like { field, pattern } => {
                binds.push(Value::Text(pattern.clone()));
                format!("{} LIKE ?", quote_ident(field.column_name()))
            }
            Self::In { field, values } => {
                if values.is_empty() {
                    return "0 = 1".to_string();
                }
                binds.extend(values.iter().cloned());
                let placeholders = vec!["?"; values.len()].join(", ");
                format!("{} IN ({placeholders})", quote_ident(field.column_name()))
            }
            Self::And(parts) => join_parts(parts, " AND ", "1 = 1", binds),
            Self::Or(parts) => join_parts(parts, " OR ", "0 = 1", binds),
            Self::Not(inner) => format!("NOT ({})", inner.to_sql(binds)),
        }
    }
}

impl<F: Column> Not for Predicate<F> {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}

fn join_parts<F: Column>(
    parts: &[Predicate<F>],
    separator: &str,
    empty: &str,
    binds: &mut Vec<Value>,
) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    parts
        .iter()
        .map(|part| format!("({})", part.to_sql(binds)))
        .collect::<Vec<_>>()
        .join(separator)
}
