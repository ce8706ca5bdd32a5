//! Northwind mapping declarations.
//!
//! # Invariants
//! - `Employees` is the base table; `EmployeeInternal` and `EmployeeExternal`
//!   share its key and are removed together with the base row.
//! - The model is built once per process and never mutated.

use crate::mapping::{ColumnMap, ColumnType, ForeignKey, Model, ModelResult, OnDelete, TableMap};
use crate::model::{Employee, EmployeeExternal, EmployeeInternal};
use once_cell::sync::OnceCell;
use std::sync::Arc;

static NORTHWIND_MODEL: OnceCell<Arc<Model>> = OnceCell::new();

/// Returns the process-wide Northwind model, building it on first use.
pub fn northwind_model() -> ModelResult<Arc<Model>> {
    NORTHWIND_MODEL
        .get_or_try_init(|| {
            Model::builder()
                .entity::<Employee>(employee_map())
                .entity::<EmployeeInternal>(employee_internal_map())
                .entity::<EmployeeExternal>(employee_external_map())
                .build()
                .map(Arc::new)
        })
        .cloned()
}

pub fn employee_map() -> TableMap {
    TableMap::new("Employees")
        .key("EmployeeID", ColumnType::Integer)
        .property(
            ColumnMap::new("LastName", ColumnType::Text)
                .max_length(20)
                .required(),
        )
        .property(
            ColumnMap::new("FirstName", ColumnType::Text)
                .max_length(10)
                .required(),
        )
        .property(ColumnMap::new("Address", ColumnType::Text).max_length(60))
        .property(ColumnMap::new("City", ColumnType::Text).max_length(15))
        .property(ColumnMap::new("Region", ColumnType::Text).max_length(15))
        .property(ColumnMap::new("PostalCode", ColumnType::Text).max_length(10))
        .property(ColumnMap::new("Country", ColumnType::Text).max_length(15))
        .property(
            ColumnMap::new("ReportsTo", ColumnType::Integer)
                .references(ForeignKey::new("Employees", "EmployeeID")),
        )
        .reference("Manager", "ReportsTo", "Employees")
        .collection("DirectReports", "Employees", "ReportsTo")
}

pub fn employee_internal_map() -> TableMap {
    TableMap::new("EmployeeInternal")
        .shared_key("EmployeeID", ColumnType::Integer, base_employee_key())
        .property(ColumnMap::new("Extension", ColumnType::Text).max_length(4))
        .reference("Employee", "EmployeeID", "Employees")
}

pub fn employee_external_map() -> TableMap {
    TableMap::new("EmployeeExternal")
        .shared_key("EmployeeID", ColumnType::Integer, base_employee_key())
        .property(
            ColumnMap::new("ConsultantName", ColumnType::Text)
                .required()
                .column_type(ColumnType::Varchar)
                .max_length(100),
        )
        .reference("Employee", "EmployeeID", "Employees")
}

fn base_employee_key() -> ForeignKey {
    ForeignKey::new("Employees", "EmployeeID").on_delete(OnDelete::Cascade)
}
