//! Translation of raw database errors into application errors.
//!
//! The query layer never rewrites errors: a unique violation surfaces as a
//! [`DbError::Database`] carrying the driver's code and constraint name.
//! Callers that want domain errors apply an [`ErrorMapper`] to the errors
//! they receive.
//!
//! ```
//! use named_sql::DbError;
//! use named_sql::db::{ConstraintMapper, ConstraintViolation, ErrorMapper};
//!
//! #[derive(Debug, PartialEq)]
//! enum AppError {
//!     DuplicateEmail,
//!     Db(String),
//! }
//!
//! let mapper = ConstraintMapper::new(|e: DbError| AppError::Db(e.to_string()))
//!     .on_constraint("users_email_key", |_| AppError::DuplicateEmail);
//!
//! let err = DbError::database("duplicate key", Some("23505".into()), "")
//!     .with_constraint("users_email_key");
//! assert_eq!(mapper.map(err), AppError::DuplicateEmail);
//! ```

use crate::error::DbError;

/// Class of integrity-constraint failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintViolation {
    Unique,
    ForeignKey,
    NotNull,
    Check,
}

impl ConstraintViolation {
    /// Classify a driver error code.
    ///
    /// Accepts PostgreSQL SQLSTATE codes and SQLite extended result codes.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            // PostgreSQL class 23
            "23505" => Some(Self::Unique),
            "23503" => Some(Self::ForeignKey),
            "23502" => Some(Self::NotNull),
            "23514" => Some(Self::Check),
            // SQLITE_CONSTRAINT_UNIQUE, SQLITE_CONSTRAINT_PRIMARYKEY
            "2067" | "1555" => Some(Self::Unique),
            // SQLITE_CONSTRAINT_FOREIGNKEY
            "787" => Some(Self::ForeignKey),
            // SQLITE_CONSTRAINT_NOTNULL
            "1299" => Some(Self::NotNull),
            // SQLITE_CONSTRAINT_CHECK
            "275" => Some(Self::Check),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unique => write!(f, "unique"),
            Self::ForeignKey => write!(f, "foreign key"),
            Self::NotNull => write!(f, "not null"),
            Self::Check => write!(f, "check"),
        }
    }
}

/// The constraint violation an error represents, if any.
pub fn constraint_violation(err: &DbError) -> Option<ConstraintViolation> {
    err.sql_state().and_then(ConstraintViolation::from_code)
}

/// Converts a [`DbError`] into a caller-defined error type.
pub trait ErrorMapper<E> {
    fn map(&self, err: DbError) -> E;
}

impl<E, F> ErrorMapper<E> for F
where
    F: Fn(DbError) -> E,
{
    fn map(&self, err: DbError) -> E {
        self(err)
    }
}

type MapFn<E> = Box<dyn Fn(DbError) -> E + Send + Sync>;

/// Rule-based [`ErrorMapper`].
///
/// Rules are checked most specific first: a matching constraint name, then a
/// matching violation kind, then the fallback.
pub struct ConstraintMapper<E> {
    by_name: Vec<(String, MapFn<E>)>,
    by_kind: Vec<(ConstraintViolation, MapFn<E>)>,
    fallback: MapFn<E>,
}

impl<E> ConstraintMapper<E> {
    pub fn new(fallback: impl Fn(DbError) -> E + Send + Sync + 'static) -> Self {
        Self {
            by_name: Vec::new(),
            by_kind: Vec::new(),
            fallback: Box::new(fallback),
        }
    }

    /// Map every violation of `kind`.
    pub fn on(
        mut self,
        kind: ConstraintViolation,
        f: impl Fn(DbError) -> E + Send + Sync + 'static,
    ) -> Self {
        self.by_kind.push((kind, Box::new(f)));
        self
    }

    /// Map violations of the constraint called `name`.
    pub fn on_constraint(
        mut self,
        name: impl Into<String>,
        f: impl Fn(DbError) -> E + Send + Sync + 'static,
    ) -> Self {
        self.by_name.push((name.into(), Box::new(f)));
        self
    }

    /// Replace the fallback.
    pub fn otherwise(mut self, f: impl Fn(DbError) -> E + Send + Sync + 'static) -> Self {
        self.fallback = Box::new(f);
        self
    }
}

impl<E> ErrorMapper<E> for ConstraintMapper<E> {
    fn map(&self, err: DbError) -> E {
        if let Some(name) = err.constraint() {
            if let Some((_, f)) = self.by_name.iter().find(|(n, _)| n == name) {
                return f(err);
            }
        }
        if let Some(kind) = constraint_violation(&err) {
            if let Some((_, f)) = self.by_kind.iter().find(|(k, _)| *k == kind) {
                return f(err);
            }
        }
        (self.fallback)(err)
    }
}

impl<E> std::fmt::Debug for ConstraintMapper<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintMapper")
            .field("constraints", &self.by_name.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("kinds", &self.by_kind.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum AppError {
        Duplicate,
        DuplicateEmail,
        MissingParent,
        Other,
    }

    fn mapper() -> ConstraintMapper<AppError> {
        ConstraintMapper::new(|_| AppError::Other)
            .on(ConstraintViolation::Unique, |_| AppError::Duplicate)
            .on(ConstraintViolation::ForeignKey, |_| AppError::MissingParent)
            .on_constraint("users_email_key", |_| AppError::DuplicateEmail)
    }

    #[test]
    fn test_from_code() {
        assert_eq!(
            ConstraintViolation::from_code("23505"),
            Some(ConstraintViolation::Unique)
        );
        assert_eq!(
            ConstraintViolation::from_code("1555"),
            Some(ConstraintViolation::Unique)
        );
        assert_eq!(
            ConstraintViolation::from_code("1299"),
            Some(ConstraintViolation::NotNull)
        );
        assert_eq!(ConstraintViolation::from_code("42P01"), None);
    }

    #[test]
    fn test_constraint_name_wins_over_kind() {
        let err = DbError::database("dup", Some("23505".into()), "").with_constraint("users_email_key");
        assert_eq!(mapper().map(err), AppError::DuplicateEmail);

        let err = DbError::database("dup", Some("23505".into()), "").with_constraint("other_key");
        assert_eq!(mapper().map(err), AppError::Duplicate);
    }

    #[test]
    fn test_sqlite_codes_classified() {
        let err = DbError::database("FOREIGN KEY constraint failed", Some("787".into()), "");
        assert_eq!(mapper().map(err), AppError::MissingParent);
    }

    #[test]
    fn test_fallback() {
        assert_eq!(mapper().map(DbError::missing_argument("id")), AppError::Other);
        assert_eq!(
            mapper().map(DbError::database("check", Some("23514".into()), "")),
            AppError::Other
        );

        let mapper = mapper().otherwise(|_| AppError::Duplicate);
        assert_eq!(mapper.map(DbError::closed("pool")), AppError::Duplicate);
    }

    #[test]
    fn test_closure_is_a_mapper() {
        let mapper = |e: DbError| e.to_string();
        assert_eq!(mapper.map(DbError::missing_argument("x")), "Missing argument for placeholder $x");
    }
}
