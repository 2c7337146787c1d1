//! Database access layer.
//!
//! - Named-placeholder compilation
//! - Connection pools and per-backend statement execution
//! - The [`Database`] handle and [`TransactionHandle`]
//! - Column type mappings
//! - Constraint-error translation
//! - Dispatch macros for reducing code duplication

#[macro_use]
pub mod macros;
pub mod compiler;
pub mod database;
pub mod error_map;
pub(crate) mod executor;
pub mod handle;
pub mod pool;
pub mod transaction;
pub mod types;

pub use compiler::{compile, missing_arguments, placeholder_names};
pub use database::Database;
pub use error_map::{ConstraintMapper, ConstraintViolation, ErrorMapper, constraint_violation};
pub use handle::DbHandle;
pub use pool::{DbConnection, DbPool};
pub use transaction::{TransactionHandle, TransactionState};
