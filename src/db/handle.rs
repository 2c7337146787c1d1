//! The query-executor contract shared by [`Database`](crate::db::Database)
//! and [`TransactionHandle`](crate::db::TransactionHandle).
//!
//! Code written against [`DbHandle`] runs unchanged on a pooled handle or
//! inside a transaction:
//!
//! ```no_run
//! use named_sql::db::DbHandle;
//! use named_sql::error::DbResult;
//! use named_sql::models::NamedArgs;
//!
//! async fn rename_user<H: DbHandle>(db: &mut H, id: i64, name: &str) -> DbResult<u64> {
//!     let args = NamedArgs::new().with("id", id).with("name", name);
//!     let result = db
//!         .named_query("update users set name = $name where id = $id", &args)
//!         .await?;
//!     Ok(result.rows_affected)
//! }
//! ```

use crate::db::compiler::compile;
use crate::error::DbResult;
use crate::models::{NamedArgs, ParamValue, RowSet};
use std::future::Future;

pub trait DbHandle: Send {
    /// Execute positional SQL (`$1`, `$2`, ...) with its parameters.
    fn query(
        &mut self,
        text: &str,
        params: &[ParamValue],
    ) -> impl Future<Output = DbResult<RowSet>> + Send;

    /// Compile a `$name` template against `args` and execute it.
    ///
    /// Fails with [`DbError::MissingArgument`](crate::error::DbError::MissingArgument)
    /// before anything is sent to the database.
    fn named_query(
        &mut self,
        template: &str,
        args: &NamedArgs,
    ) -> impl Future<Output = DbResult<RowSet>> + Send {
        async move {
            let compiled = compile(template, args)?;
            self.query(compiled.text(), compiled.params()).await
        }
    }
}
