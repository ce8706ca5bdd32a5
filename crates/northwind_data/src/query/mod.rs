//! Query building blocks shared by repositories and sessions.

pub mod predicate;

pub use predicate::{CompareOp, Predicate};
