//! Statement execution.
//!
//! Runs positional SQL against any sqlx executor (a pool or a checked-out
//! connection) and collects rows plus the affected-row count into a
//! [`RowSet`].
//!
//! # Architecture
//!
//! Each backend has its own submodule with the same interface:
//! - `postgres`: arrays are bound as native PostgreSQL arrays, timestamps as
//!   `timestamptz`, and NULL without a declared type
//! - `sqlite`: arrays are bound as JSON text (SQLite has no array type),
//!   timestamps as ISO-8601 text
//!
//! The code structure is intentionally parallel to make differences obvious.

use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::query::iso_8601;
use crate::models::{ParamValue, RowSet};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Build a [`RowSet`] from decoded rows.
fn row_set<R: RowToJson>(rows: Vec<R>, rows_affected: u64) -> RowSet {
    let columns = rows
        .first()
        .map(RowToJson::column_names)
        .unwrap_or_default();
    let rows = rows.iter().map(RowToJson::to_json_map).collect();
    RowSet {
        columns,
        rows,
        rows_affected,
    }
}

fn timeout_error(operation: &str, limit: Duration) -> DbError {
    DbError::timeout(operation, limit.as_secs() as u32)
}

/// Apply an optional deadline to a database round-trip.
pub(crate) async fn with_deadline<T, F>(
    deadline: Option<Duration>,
    operation: &str,
    fut: F,
) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match deadline {
        None => fut.await,
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error(operation, limit)),
        },
    }
}

fn log_statement(sql: &str, params: &[ParamValue], result: &RowSet) {
    debug!(
        sql = %sql,
        params = params.len(),
        rows = result.row_count(),
        rows_affected = result.rows_affected,
        "Executed statement"
    );
}

pub(crate) mod postgres {
    use super::*;
    use futures_util::TryStreamExt;
    use futures_util::stream::BoxStream;
    use sqlx::encode::{Encode, IsNull};
    use sqlx::error::BoxDynError;
    use sqlx::postgres::types::Oid;
    use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgQueryResult, PgRow, PgTypeInfo};
    use sqlx::{Either, Executor, Postgres, Type};

    /// A NULL parameter with no declared type (OID 0), so the server infers
    /// the type from where the placeholder is used.
    pub(crate) struct UntypedNull;

    impl Type<Postgres> for UntypedNull {
        fn type_info() -> PgTypeInfo {
            PgTypeInfo::with_oid(Oid(0))
        }
    }

    impl Encode<'_, Postgres> for UntypedNull {
        fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
            Ok(IsNull::Yes)
        }
    }

    pub async fn run<'a, E>(
        executor: E,
        sql: &'a str,
        params: &'a [ParamValue],
        deadline: Option<Duration>,
    ) -> DbResult<RowSet>
    where
        E: Executor<'a, Database = Postgres>,
    {
        let work = async {
            // Without parameters, use the simple query protocol (no prepare)
            let stream = if params.is_empty() {
                executor.fetch_many(sql)
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_param(query, param);
                }
                executor.fetch_many(query)
            };
            collect(stream).await
        };
        let result = with_deadline(deadline, "query execution", work).await?;
        log_statement(sql, params, &result);
        Ok(result)
    }

    async fn collect(
        mut stream: BoxStream<'_, Result<Either<PgQueryResult, PgRow>, sqlx::Error>>,
    ) -> DbResult<RowSet> {
        let mut rows = Vec::new();
        let mut rows_affected = 0;
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => rows_affected += done.rows_affected(),
                Either::Right(row) => rows.push(row),
            }
        }
        Ok(row_set(rows, rows_affected))
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, Postgres, PgArguments>,
        param: &'q ParamValue,
    ) -> sqlx::query::Query<'q, Postgres, PgArguments> {
        match param {
            ParamValue::Null => query.bind(UntypedNull),
            ParamValue::Text(v) => query.bind(v.as_str()),
            ParamValue::Int(v) => query.bind(*v),
            ParamValue::Float(v) => query.bind(*v),
            ParamValue::Timestamp(v) => query.bind(*v),
            ParamValue::TextArray(v) => query.bind(v.as_slice()),
            ParamValue::IntArray(v) => query.bind(v.as_slice()),
            ParamValue::FloatArray(v) => query.bind(v.as_slice()),
        }
    }
}

pub(crate) mod sqlite {
    use super::*;
    use futures_util::TryStreamExt;
    use futures_util::stream::BoxStream;
    use sqlx::sqlite::{SqliteArguments, SqliteQueryResult, SqliteRow};
    use sqlx::{Either, Executor, Sqlite};

    pub async fn run<'a, E>(
        executor: E,
        sql: &'a str,
        params: &'a [ParamValue],
        deadline: Option<Duration>,
    ) -> DbResult<RowSet>
    where
        E: Executor<'a, Database = Sqlite>,
    {
        let work = async {
            let stream = if params.is_empty() {
                executor.fetch_many(sql)
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_param(query, param);
                }
                executor.fetch_many(query)
            };
            collect(stream).await
        };
        let result = with_deadline(deadline, "query execution", work).await?;
        log_statement(sql, params, &result);
        Ok(result)
    }

    async fn collect(
        mut stream: BoxStream<'_, Result<Either<SqliteQueryResult, SqliteRow>, sqlx::Error>>,
    ) -> DbResult<RowSet> {
        let mut rows = Vec::new();
        let mut rows_affected = 0;
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => rows_affected += done.rows_affected(),
                Either::Right(row) => rows.push(row),
            }
        }
        Ok(row_set(rows, rows_affected))
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
        param: &'q ParamValue,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        match param {
            ParamValue::Null => query.bind(None::<String>),
            ParamValue::Text(v) => query.bind(v.as_str()),
            ParamValue::Int(v) => query.bind(*v),
            ParamValue::Float(v) => query.bind(*v),
            ParamValue::Timestamp(v) => query.bind(iso_8601(v)),
            // SQLite doesn't have an array type, store as JSON text
            ParamValue::TextArray(v) => query.bind(json_text(v)),
            ParamValue::IntArray(v) => query.bind(json_text(v)),
            ParamValue::FloatArray(v) => query.bind(json_text(v)),
        }
    }

    fn json_text<T: serde::Serialize>(values: &[T]) -> String {
        serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
    }
}
