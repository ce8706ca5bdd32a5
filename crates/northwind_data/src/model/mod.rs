//! Northwind entity types.
//!
//! # Responsibility
//! - Define the plain data records persisted by the Northwind context.
//! - Declare their field and navigation tokens.
//!
//! # Invariants
//! - Entities are detached owned values; nothing is tracked after a query.
//! - Specializations share the identity (`EmployeeID`) of a base employee.

pub mod employee;
pub mod specialization;

pub use employee::{Employee, EmployeeField, EmployeeId, EmployeeRelation};
pub use specialization::{
    EmployeeExternal, EmployeeExternalField, EmployeeInternal, EmployeeInternalField,
    SpecializationRelation,
};
