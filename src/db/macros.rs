//! Declarative macros.
//!
//! - `impl_db_dispatch!` expands a match over [`DbPool`](crate::db::DbPool)
//!   variants so backend-specific calls read linearly.
//! - `named_args!` builds a [`NamedArgs`](crate::models::NamedArgs) map inline.

/// Macro for generating database dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     Postgres(p) => do_postgres(p),
///     SQLite(p) => do_sqlite(p),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

/// Build named arguments inline.
///
/// ```
/// use named_sql::named_args;
/// use named_sql::models::ArgValue;
///
/// let args = named_args! { "id" => 300, "name" => "admin", "deleted_at" => ArgValue::Null };
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! named_args {
    () => {
        $crate::models::NamedArgs::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut args = $crate::models::NamedArgs::new();
        $(
            args.insert($name, $value);
        )+
        args
    }};
}

#[cfg(test)]
mod tests {
    use crate::models::{ArgValue, NamedArgs};

    #[test]
    fn test_named_args_macro() {
        let args = named_args! {
            "id" => 1,
            "tags" => vec!["a", "b"],
        };
        assert_eq!(args.get("id"), Some(&ArgValue::Int(1)));
        assert_eq!(
            args.get("tags"),
            Some(&ArgValue::TextArray(vec!["a".into(), "b".into()]))
        );
        assert_eq!(named_args! {}, NamedArgs::new());
    }
}
