//! Internal and external employee specializations.
//!
//! Each specialization lives in its own table keyed by the base employee's
//! `EmployeeID`. The base row is reachable through the `Employee` relation.

use super::employee::{Employee, EmployeeId};
use crate::context::Session;
use crate::entity::{read, text_value, Column, Entity, Relation};
use crate::repo::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Navigation from a specialization row to its base employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecializationRelation {
    Employee,
}

impl Relation for SpecializationRelation {
    const ALL: &'static [Self] = &[Self::Employee];

    fn name(self) -> &'static str {
        match self {
            Self::Employee => "Employee",
        }
    }
}

/// Employee on the company payroll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeInternal {
    pub employee_id: EmployeeId,
    /// Internal phone extension.
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee: Option<Box<Employee>>,
}

impl EmployeeInternal {
    pub fn new(employee_id: EmployeeId) -> Self {
        Self {
            employee_id,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmployeeInternalField {
    EmployeeId,
    Extension,
}

impl Column for EmployeeInternalField {
    const ALL: &'static [Self] = &[Self::EmployeeId, Self::Extension];

    fn column_name(self) -> &'static str {
        match self {
            Self::EmployeeId => "EmployeeID",
            Self::Extension => "Extension",
        }
    }
}

impl Entity for EmployeeInternal {
    type Field = EmployeeInternalField;
    type Relation = SpecializationRelation;

    const KEY: EmployeeInternalField = EmployeeInternalField::EmployeeId;

    fn value(&self, field: EmployeeInternalField) -> Value {
        match field {
            EmployeeInternalField::EmployeeId => Value::Integer(self.employee_id),
            EmployeeInternalField::Extension => text_value(self.extension.as_deref()),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            employee_id: read(row, EmployeeInternalField::EmployeeId)?,
            extension: read(row, EmployeeInternalField::Extension)?,
            employee: None,
        })
    }

    fn load_relation(
        session: &Session<'_>,
        rows: &mut [Self],
        relation: SpecializationRelation,
    ) -> RepoResult<()> {
        match relation {
            SpecializationRelation::Employee => {
                let employees = session.load_reference::<Self, Employee>(rows, relation)?;
                for (row, employee) in rows.iter_mut().zip(employees) {
                    row.employee = employee.map(Box::new);
                }
            }
        }
        Ok(())
    }
}

/// Contractor engaged through a consultancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeExternal {
    pub employee_id: EmployeeId,
    pub consultant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee: Option<Box<Employee>>,
}

impl EmployeeExternal {
    pub fn new(employee_id: EmployeeId, consultant_name: impl Into<String>) -> Self {
        Self {
            employee_id,
            consultant_name: consultant_name.into(),
            employee: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmployeeExternalField {
    EmployeeId,
    ConsultantName,
}

impl Column for EmployeeExternalField {
    const ALL: &'static [Self] = &[Self::EmployeeId, Self::ConsultantName];

    fn column_name(self) -> &'static str {
        match self {
            Self::EmployeeId => "EmployeeID",
            Self::ConsultantName => "ConsultantName",
        }
    }
}

impl Entity for EmployeeExternal {
    type Field = EmployeeExternalField;
    type Relation = SpecializationRelation;

    const KEY: EmployeeExternalField = EmployeeExternalField::EmployeeId;

    fn value(&self, field: EmployeeExternalField) -> Value {
        match field {
            EmployeeExternalField::EmployeeId => Value::Integer(self.employee_id),
            EmployeeExternalField::ConsultantName => Value::Text(self.consultant_name.clone()),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            employee_id: read(row, EmployeeExternalField::EmployeeId)?,
            consultant_name: read(row, EmployeeExternalField::ConsultantName)?,
            employee: None,
        })
    }

    fn load_relation(
        session: &Session<'_>,
        rows: &mut [Self],
        relation: SpecializationRelation,
    ) -> RepoResult<()> {
        match relation {
            SpecializationRelation::Employee => {
                let employees = session.load_reference::<Self, Employee>(rows, relation)?;
                for (row, employee) in rows.iter_mut().zip(employees) {
                    row.employee = employee.map(Box::new);
                }
            }
        }
        Ok(())
    }
}
