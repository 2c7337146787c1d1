//! Transaction handle.
//!
//! A [`TransactionHandle`] owns one connection checked out of the pool for
//! the lifetime of a unit of work. `BEGIN`, `COMMIT` and `ROLLBACK` are
//! issued as plain statements on that connection, and statements run in the
//! order they are issued.
//!
//! Most callers should use [`Database::transaction`](crate::db::Database::transaction),
//! which guarantees commit-or-rollback and release. The handle is public so
//! that code generic over [`DbHandle`](crate::db::DbHandle) can accept it.

use crate::db::compiler::compile;
use crate::db::handle::DbHandle;
use crate::db::pool::DbConnection;
use crate::error::{DbError, DbResult};
use crate::models::{NamedArgs, ParamValue, RowSet};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of a transaction handle.
///
/// Releasing the handle consumes it, so there is no `Released` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Connection checked out, `BEGIN` not yet issued
    Acquired,
    /// `BEGIN` succeeded; statements may run
    Began,
    Committed,
    RolledBack,
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acquired => write!(f, "acquired"),
            Self::Began => write!(f, "began"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled back"),
        }
    }
}

pub struct TransactionHandle {
    id: String,
    conn: Option<DbConnection>,
    state: TransactionState,
    query_timeout: Option<Duration>,
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("released", &self.conn.is_none())
            .finish_non_exhaustive()
    }
}

impl TransactionHandle {
    pub(crate) fn new(conn: DbConnection, query_timeout: Option<Duration>) -> Self {
        Self {
            id: generate_transaction_id(),
            conn: Some(conn),
            state: TransactionState::Acquired,
            query_timeout,
        }
    }

    /// Identifier used in log fields and error messages.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    fn require_state(&self, expected: TransactionState, action: &str) -> DbResult<()> {
        if self.state != expected {
            return Err(DbError::transaction(
                format!("Cannot {} a transaction that is {}", action, self.state),
                &self.id,
            ));
        }
        Ok(())
    }

    async fn run(&mut self, sql: &str, params: &[ParamValue]) -> DbResult<RowSet> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DbError::transaction("Connection already released", &self.id))?;
        conn.run(sql, params, self.query_timeout).await
    }

    /// Issue `BEGIN`.
    pub async fn begin(&mut self) -> DbResult<()> {
        self.require_state(TransactionState::Acquired, "begin")?;
        self.run("BEGIN", &[]).await?;
        self.state = TransactionState::Began;
        debug!(transaction_id = %self.id, "Transaction started");
        Ok(())
    }

    /// Execute positional SQL inside the transaction.
    pub async fn query(&mut self, text: &str, params: &[ParamValue]) -> DbResult<RowSet> {
        self.require_state(TransactionState::Began, "query")?;
        self.run(text, params).await
    }

    /// Compile a `$name` template and execute it inside the transaction.
    pub async fn named_query(&mut self, template: &str, args: &NamedArgs) -> DbResult<RowSet> {
        let compiled = compile(template, args)?;
        self.query(compiled.text(), compiled.params()).await
    }

    /// Issue `COMMIT`.
    ///
    /// On failure the state stays `Began`, and [`release`](Self::release)
    /// will close the connection rather than pool it.
    pub async fn commit(&mut self) -> DbResult<()> {
        self.require_state(TransactionState::Began, "commit")?;
        self.run("COMMIT", &[]).await?;
        self.state = TransactionState::Committed;
        info!(transaction_id = %self.id, "Transaction committed");
        Ok(())
    }

    /// Issue `ROLLBACK`.
    pub async fn rollback(&mut self) -> DbResult<()> {
        self.require_state(TransactionState::Began, "roll back")?;
        self.run("ROLLBACK", &[]).await?;
        self.state = TransactionState::RolledBack;
        info!(transaction_id = %self.id, "Transaction rolled back");
        Ok(())
    }

    /// Give the connection back.
    ///
    /// Consumes the handle, so it runs at most once. A connection whose
    /// transaction is still open is closed instead of returned to the pool.
    pub async fn release(mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        if self.state == TransactionState::Began {
            warn!(
                transaction_id = %self.id,
                "Closing connection with an unfinished transaction"
            );
            if let Err(e) = conn.close().await {
                warn!(transaction_id = %self.id, error = %e, "Failed to close connection");
            }
            return;
        }

        drop(conn);
        debug!(transaction_id = %self.id, state = %self.state, "Connection released");
    }
}

impl Drop for TransactionHandle {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        warn!(
            transaction_id = %self.id,
            state = %self.state,
            "Transaction handle dropped without release - consider using explicit release()"
        );
        if self.state == TransactionState::Began {
            conn.discard();
        }
    }
}

impl DbHandle for TransactionHandle {
    async fn query(&mut self, text: &str, params: &[ParamValue]) -> DbResult<RowSet> {
        TransactionHandle::query(self, text, params).await
    }

    async fn named_query(&mut self, template: &str, args: &NamedArgs) -> DbResult<RowSet> {
        TransactionHandle::named_query(self, template, args).await
    }
}

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}
