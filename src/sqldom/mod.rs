//! Typed SQL AST ("sqldom").
//!
//! Dialect-agnostic tree of SQL nodes; every node renders itself into a
//! caller-supplied buffer under a [`render::SqlContext`] that carries the
//! sink's quoting rule and case-conversion policy.

pub mod conditions;
pub mod render;
pub mod statements;
pub mod values;

pub use self::conditions::{Condition, InSource};
pub use self::render::{CaseConversion, SqlContext};
pub use self::statements::{Select, SelectSource, SqlStatement, TableRef};
pub use self::values::{FunctionName, Value, INFINITE_BATCH_ID, INFINITE_BATCH_TIME};
