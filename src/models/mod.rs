//! Data models for named-sql.
//!
//! This module contains all the data structures used throughout the crate:
//! - Connection configuration
//! - Named arguments, positional parameters, compiled queries and row sets

pub mod connection;
pub mod query;

pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{ArgValue, CompiledQuery, NamedArgs, ParamValue, RowSet};
