//! named-sql
//!
//! A thin SQL layer for PostgreSQL and SQLite that lets queries use named
//! `$name` placeholders instead of positional ones, with pooled connections
//! and a scoped transaction helper.
//!
//! ```no_run
//! use named_sql::{Database, NamedArgs};
//!
//! # async fn example() -> Result<(), named_sql::DbError> {
//! let db = Database::connect("sqlite:app.db?mode=rwc").await?;
//! let args = NamedArgs::new().with("id", 300).with("name", "admin");
//! db.named_query("insert into record (id, name) values ($id, $name)", &args)
//!     .await?;
//! db.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, PoolOptions};
pub use db::{Database, DbHandle, TransactionHandle, compile};
pub use error::{DbError, DbResult};
pub use models::{ArgValue, CompiledQuery, ConnectionConfig, NamedArgs, ParamValue, RowSet};
