//! Named-placeholder compiler.
//!
//! Rewrites `$name` placeholders into the positional `$1`, `$2`, ... form
//! accepted by PostgreSQL and SQLite, and marshals the named arguments into a
//! parameter list in the same order.
//!
//! ```
//! use named_sql::db::compile;
//! use named_sql::models::{NamedArgs, ParamValue};
//!
//! let args = NamedArgs::new().with("id", 300).with("name", "admin");
//! let query = compile("update record set name = $name where id = $id", &args).unwrap();
//! assert_eq!(query.text(), "update record set name = $1 where id = $2");
//! assert_eq!(
//!     query.params(),
//!     &[ParamValue::Text("admin".into()), ParamValue::Int(300)]
//! );
//! ```
//!
//! The scanner has no knowledge of SQL lexical structure: a `$name` inside a
//! string literal, a comment or a dollar-quote tag is treated as a
//! placeholder like any other.
//!
//! Positional `$1`-style tokens are left alone, but they share the index
//! space the compiler assigns, so a template that uses both is rejected
//! rather than letting `$1` silently alias the first named argument. The
//! same applies to a `$1` inside a literal of a template with named
//! placeholders.

use crate::error::{DbError, DbResult};
use crate::models::{ArgValue, CompiledQuery, NamedArgs};
use std::collections::HashMap;

/// A piece of a scanned template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    /// Placeholder name without the leading `$`
    Placeholder(&'a str),
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Split a template into literal text and placeholders.
///
/// Identifiers are consumed greedily, so `$country_code` never matches as
/// `$country` followed by `_code`. A `$` not followed by an identifier start
/// (`$1`, `$$`, a trailing `$`) stays literal text.
fn scan(template: &str) -> Vec<Segment<'_>> {
    let bytes = template.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let starts_placeholder =
            bytes[i] == b'$' && bytes.get(i + 1).is_some_and(|b| is_ident_start(*b));
        if !starts_placeholder {
            i += 1;
            continue;
        }

        let name_start = i + 1;
        let mut end = name_start + 1;
        while end < bytes.len() && is_ident_continue(bytes[end]) {
            end += 1;
        }

        if literal_start < i {
            segments.push(Segment::Text(&template[literal_start..i]));
        }
        // ASCII-only boundaries, so these slices are always on char boundaries
        segments.push(Segment::Placeholder(&template[name_start..end]));
        i = end;
        literal_start = end;
    }

    if literal_start < bytes.len() {
        segments.push(Segment::Text(&template[literal_start..]));
    }
    segments
}

fn distinct_names<'a>(segments: &[Segment<'a>]) -> Vec<&'a str> {
    let mut names: Vec<&str> = Vec::new();
    for segment in segments {
        if let Segment::Placeholder(name) = segment {
            if !names.contains(name) {
                names.push(*name);
            }
        }
    }
    names
}

/// True if any literal text contains a positional `$<digit>` token.
fn has_positional(segments: &[Segment<'_>]) -> bool {
    segments.iter().any(|segment| match segment {
        Segment::Text(t) => t
            .as_bytes()
            .windows(2)
            .any(|w| w[0] == b'$' && w[1].is_ascii_digit()),
        Segment::Placeholder(_) => false,
    })
}

/// Distinct placeholder names in order of first appearance.
pub fn placeholder_names(template: &str) -> Vec<String> {
    distinct_names(&scan(template))
        .into_iter()
        .map(String::from)
        .collect()
}

/// Placeholder names that `args` cannot resolve, in order of first
/// appearance. [`compile`] only reports the first of these.
pub fn missing_arguments(template: &str, args: &NamedArgs) -> Vec<String> {
    placeholder_names(template)
        .into_iter()
        .filter(|name| args.resolve(name).is_none())
        .collect()
}

/// Compile a template with `$name` placeholders into positional form.
///
/// Each distinct name gets one index, assigned by first appearance; repeated
/// occurrences reuse it. Names are resolved in index order and the first one
/// that is absent (or [`ArgValue::Undefined`]) fails with
/// [`DbError::MissingArgument`]. An explicit [`ArgValue::Null`] is a value.
///
/// A template mixing named and positional (`$1`) placeholders fails with
/// [`DbError::InvalidInput`]. A template with only positional placeholders
/// passes through unchanged.
///
/// The result text is trimmed of surrounding whitespace.
pub fn compile(template: &str, args: &NamedArgs) -> DbResult<CompiledQuery> {
    let segments = scan(template);
    let names = distinct_names(&segments);

    if !names.is_empty() && has_positional(&segments) {
        return Err(DbError::invalid_input(
            "Template mixes positional ($1) and named ($name) placeholders",
        ));
    }

    let mut params = Vec::with_capacity(names.len());
    for name in &names {
        let param = args
            .resolve(name)
            .and_then(ArgValue::to_param)
            .ok_or_else(|| DbError::missing_argument(*name))?;
        params.push(param);
    }

    let indices: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i + 1))
        .collect();

    // Single pass: emitted `$<index>` tokens are never rescanned
    let mut text = String::with_capacity(template.len());
    for segment in &segments {
        match segment {
            Segment::Text(t) => text.push_str(t),
            Segment::Placeholder(name) => {
                text.push('$');
                text.push_str(&indices[name].to_string());
            }
        }
    }

    Ok(CompiledQuery::new(text.trim().to_string(), params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParamValue;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_scan_splits_text_and_placeholders() {
        assert_eq!(
            scan("a = $a and b = $b_1;"),
            vec![
                Segment::Text("a = "),
                Segment::Placeholder("a"),
                Segment::Text(" and b = "),
                Segment::Placeholder("b_1"),
                Segment::Text(";"),
            ]
        );
    }

    #[test]
    fn test_scan_leaves_non_identifiers() {
        assert_eq!(
            scan("$1 $$ $ $9x"),
            vec![Segment::Text("$1 $$ $ $9x")]
        );
        assert_eq!(scan("$"), vec![Segment::Text("$")]);
        assert!(scan("").is_empty());
    }

    #[test]
    fn test_insert_example_reuses_index() {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let args = NamedArgs::new()
            .with("id", 300)
            .with("name", "admin")
            .with("created_at", created_at);
        let query = compile(
            "insert into record (id, name, created_at, updated_at) \
             values ($id, $name, $created_at, $created_at)",
            &args,
        )
        .unwrap();

        assert_eq!(
            query.text(),
            "insert into record (id, name, created_at, updated_at) values ($1, $2, $3, $3)"
        );
        assert_eq!(
            query.params(),
            &[
                ParamValue::Int(300),
                ParamValue::Text("admin".into()),
                ParamValue::Timestamp(created_at),
            ]
        );
        assert_eq!(
            serde_json::to_value(query.params()).unwrap(),
            json!([300, "admin", "2024-05-06T07:08:09.000Z"])
        );
    }

    #[test]
    fn test_prefix_names_do_not_collide() {
        let args = NamedArgs::new()
            .with("country", "US")
            .with("country_code", "US1");
        let query = compile(
            "select * from t where country = $country and code = $country_code",
            &args,
        )
        .unwrap();
        assert_eq!(
            query.text(),
            "select * from t where country = $1 and code = $2"
        );
        assert_eq!(
            query.params(),
            &[ParamValue::Text("US".into()), ParamValue::Text("US1".into())]
        );

        let query = compile(
            "select * from t where code = $country_code and country = $country",
            &args,
        )
        .unwrap();
        assert_eq!(
            query.text(),
            "select * from t where code = $1 and country = $2"
        );
        assert_eq!(
            query.params(),
            &[ParamValue::Text("US1".into()), ParamValue::Text("US".into())]
        );
    }

    #[test]
    fn test_emitted_indices_are_not_rescanned() {
        // With ten or more names, `$1` is a prefix of `$10`; rewriting must not
        // touch what it has already emitted.
        let names: Vec<String> = (0..12).map(|i| format!("p{}", i)).collect();
        let template = names
            .iter()
            .map(|n| format!("${}", n))
            .collect::<Vec<_>>()
            .join(", ");
        let args: NamedArgs = names.iter().enumerate().map(|(i, n)| (n.clone(), i as i64)).collect();

        let query = compile(&template, &args).unwrap();
        let expected = (1..=12)
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        assert_eq!(query.text(), expected);
        assert_eq!(query.params()[11], ParamValue::Int(11));
    }

    #[test]
    fn test_cast_suffix_untouched() {
        let args = NamedArgs::new().with("ts", "2024-01-01T00:00:00.000Z");
        let query = compile("select $ts::timestamptz", &args).unwrap();
        assert_eq!(query.text(), "select $1::timestamptz");
    }

    #[test]
    fn test_mixed_positional_and_named_rejected() {
        let args = NamedArgs::new().with("name", "x");
        let err = compile("select $1, $name", &args).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));

        let err = compile("select $name where note = 'costs $5'", &args).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_positional_only_passes_through() {
        let query = compile(" select $1, $2, $$ ", &NamedArgs::new()).unwrap();
        assert_eq!(query.text(), "select $1, $2, $$");
        assert!(query.params().is_empty());
    }

    #[test]
    fn test_no_placeholders_only_trims() {
        let query = compile("\n  select 1  \n", &NamedArgs::new()).unwrap();
        assert_eq!(query.text(), "select 1");
        assert!(query.params().is_empty());
    }

    #[test]
    fn test_missing_argument_reports_first_in_order() {
        let args = NamedArgs::new().with("a", 1);
        let err = compile("select $a, $b, $c", &args).unwrap_err();
        assert!(matches!(err, DbError::MissingArgument { ref name } if name == "b"));

        let err = compile("select $c, $b, $a", &args).unwrap_err();
        assert!(matches!(err, DbError::MissingArgument { ref name } if name == "c"));
    }

    #[test]
    fn test_undefined_is_missing_null_is_not() {
        let args = NamedArgs::new()
            .with("deleted_at", ArgValue::Null)
            .with("owner", ArgValue::Undefined);

        let query = compile("update t set deleted_at = $deleted_at", &args).unwrap();
        assert_eq!(query.params(), &[ParamValue::Null]);

        let err = compile("update t set owner = $owner", &args).unwrap_err();
        assert!(matches!(err, DbError::MissingArgument { ref name } if name == "owner"));
    }

    #[test]
    fn test_array_argument_is_not_stringified() {
        let args = NamedArgs::new().with("ids", vec![1, 2, 3]);
        let query = compile("select * from t where id = any($ids)", &args).unwrap();
        assert_eq!(query.text(), "select * from t where id = any($1)");
        assert_eq!(query.params(), &[ParamValue::IntArray(vec![1, 2, 3])]);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let args = NamedArgs::new()
            .with("z", 1)
            .with("a", "two")
            .with("m", ArgValue::Null);
        let template = "select $z, $a, $m, $a, $z";
        let first = compile(template, &args).unwrap();
        let second = compile(template, &args).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.text(), "select $1, $2, $3, $2, $1");
    }

    #[test]
    fn test_non_ascii_text_survives() {
        let args = NamedArgs::new().with("name", "José");
        let query = compile("select 'héllo' || $name -- 名前", &args).unwrap();
        assert_eq!(query.text(), "select 'héllo' || $1 -- 名前");
    }

    #[test]
    fn test_placeholder_names() {
        assert_eq!(
            placeholder_names("select $b, $a, $b, $a_1, $1"),
            vec!["b", "a", "a_1"]
        );
        assert!(placeholder_names("select 1").is_empty());
    }

    #[test]
    fn test_missing_arguments_lists_every_name() {
        let args = NamedArgs::new()
            .with("b", 1)
            .with("d", ArgValue::Undefined);
        assert_eq!(
            missing_arguments("select $a, $b, $c, $a, $d", &args),
            vec!["a", "c", "d"]
        );
        assert!(missing_arguments("select $b", &args).is_empty());
    }

    #[test]
    fn test_placeholder_in_literal_is_still_a_placeholder() {
        let args = NamedArgs::new().with("x", 1);
        let query = compile("select '$x'", &args).unwrap();
        assert_eq!(query.text(), "select '$1'");
    }
}
