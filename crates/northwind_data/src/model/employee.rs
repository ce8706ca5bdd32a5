//! Employee entity (`Employees` base table).
//!
//! # Invariants
//! - `employee_id` is caller-assigned and never reused for another employee.
//! - `manager` and `direct_reports` stay empty unless explicitly included.

use crate::context::Session;
use crate::entity::{integer_value, read, text_value, Column, Entity, Relation};
use crate::repo::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Stable identifier shared by an employee and its specialization rows.
pub type EmployeeId = i64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub employee_id: EmployeeId,
    pub last_name: String,
    pub first_name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    /// Key of this employee's manager, if any.
    pub reports_to: Option<EmployeeId>,
    /// Populated only when `EmployeeRelation::Manager` is included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<Box<Employee>>,
    /// Populated only when `EmployeeRelation::DirectReports` is included.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub direct_reports: Vec<Employee>,
}

impl Employee {
    pub fn new(
        employee_id: EmployeeId,
        last_name: impl Into<String>,
        first_name: impl Into<String>,
    ) -> Self {
        Self {
            employee_id,
            last_name: last_name.into(),
            first_name: first_name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmployeeField {
    EmployeeId,
    LastName,
    FirstName,
    Address,
    City,
    Region,
    PostalCode,
    Country,
    ReportsTo,
}

impl Column for EmployeeField {
    const ALL: &'static [Self] = &[
        Self::EmployeeId,
        Self::LastName,
        Self::FirstName,
        Self::Address,
        Self::City,
        Self::Region,
        Self::PostalCode,
        Self::Country,
        Self::ReportsTo,
    ];

    fn column_name(self) -> &'static str {
        match self {
            Self::EmployeeId => "EmployeeID",
            Self::LastName => "LastName",
            Self::FirstName => "FirstName",
            Self::Address => "Address",
            Self::City => "City",
            Self::Region => "Region",
            Self::PostalCode => "PostalCode",
            Self::Country => "Country",
            Self::ReportsTo => "ReportsTo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmployeeRelation {
    /// The employee referenced by `reports_to`.
    Manager,
    /// Employees whose `reports_to` is this employee.
    DirectReports,
}

impl Relation for EmployeeRelation {
    const ALL: &'static [Self] = &[Self::Manager, Self::DirectReports];

    fn name(self) -> &'static str {
        match self {
            Self::Manager => "Manager",
            Self::DirectReports => "DirectReports",
        }
    }
}

impl Entity for Employee {
    type Field = EmployeeField;
    type Relation = EmployeeRelation;

    const KEY: EmployeeField = EmployeeField::EmployeeId;

    fn value(&self, field: EmployeeField) -> Value {
        match field {
            EmployeeField::EmployeeId => Value::Integer(self.employee_id),
            EmployeeField::LastName => Value::Text(self.last_name.clone()),
            EmployeeField::FirstName => Value::Text(self.first_name.clone()),
            EmployeeField::Address => text_value(self.address.as_deref()),
            EmployeeField::City => text_value(self.city.as_deref()),
            EmployeeField::Region => text_value(self.region.as_deref()),
            EmployeeField::PostalCode => text_value(self.postal_code.as_deref()),
            EmployeeField::Country => text_value(self.country.as_deref()),
            EmployeeField::ReportsTo => integer_value(self.reports_to),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            employee_id: read(row, EmployeeField::EmployeeId)?,
            last_name: read(row, EmployeeField::LastName)?,
            first_name: read(row, EmployeeField::FirstName)?,
            address: read(row, EmployeeField::Address)?,
            city: read(row, EmployeeField::City)?,
            region: read(row, EmployeeField::Region)?,
            postal_code: read(row, EmployeeField::PostalCode)?,
            country: read(row, EmployeeField::Country)?,
            reports_to: read(row, EmployeeField::ReportsTo)?,
            manager: None,
            direct_reports: Vec::new(),
        })
    }

    fn load_relation(
        session: &Session<'_>,
        rows: &mut [Self],
        relation: EmployeeRelation,
    ) -> RepoResult<()> {
        match relation {
            EmployeeRelation::Manager => {
                let managers = session.load_reference::<Self, Employee>(rows, relation)?;
                for (employee, manager) in rows.iter_mut().zip(managers) {
                    employee.manager = manager.map(Box::new);
                }
            }
            EmployeeRelation::DirectReports => {
                let reports = session.load_collection::<Self, Employee>(rows, relation)?;
                for (employee, direct_reports) in rows.iter_mut().zip(reports) {
                    employee.direct_reports = direct_reports;
                }
            }
        }
        Ok(())
    }
}
