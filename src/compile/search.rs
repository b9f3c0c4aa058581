//! Wildcard patterns for `like`/`ilike`
//!
//! `*` matches any run of characters, `\*` is a literal star and `\\` a
//! literal backslash. Patterns are classified by where their wildcards sit so
//! that simple shapes compile to exact/prefix/suffix/infix lookups and only
//! the rest fall back to a regular expression.

use uuid::Uuid;

use super::predicate::Lookup;
use crate::query::{remove_quotes, RQL_ANY_SYMBOL};

const ANY_SYMBOL_REGEX: &str = "(.*?)";

/// Replace escaped stars with `placeholder` and collapse escaped backslashes
fn reflect(raw: &str, placeholder: &str) -> String {
    remove_quotes(raw)
        .split(r"\\")
        .map(|part| part.replace(r"\*", placeholder))
        .collect::<Vec<_>>()
        .join(r"\")
}

fn placeholder() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Backing lookup for a wildcard pattern
pub(crate) fn pattern_lookup(raw: &str, case_insensitive: bool) -> Lookup {
    let value = reflect(raw, &placeholder());
    let stars = value.matches(RQL_ANY_SYMBOL).count();
    let starts = value.starts_with(RQL_ANY_SYMBOL);
    let ends = value.ends_with(RQL_ANY_SYMBOL);

    let (sensitive, insensitive) = match stars {
        0 => (Lookup::Exact, Lookup::IExact),
        1 if value.len() > 1 && starts => (Lookup::EndsWith, Lookup::IEndsWith),
        1 if value.len() > 1 && ends => (Lookup::StartsWith, Lookup::IStartsWith),
        2 if value.len() > 2 && starts && ends => (Lookup::Contains, Lookup::IContains),
        _ => (Lookup::Regex, Lookup::IRegex),
    };

    if case_insensitive {
        insensitive
    } else {
        sensitive
    }
}

/// Operand for `lookup` built from a wildcard pattern
///
/// Returns `None` for patterns with consecutive wildcards.
pub(crate) fn pattern_value(raw: &str, lookup: Lookup) -> Option<String> {
    let placeholder = placeholder();
    let value = reflect(raw, &placeholder);
    let any = RQL_ANY_SYMBOL.to_string();

    if value.contains(&any.repeat(2)) {
        return None;
    }

    if !lookup.is_regex() {
        return Some(value.replace(RQL_ANY_SYMBOL, "").replace(&placeholder, &any));
    }

    if value == any {
        return Some(ANY_SYMBOL_REGEX.to_string());
    }

    let mut body = value.as_str();
    let anchored_start = !body.starts_with(RQL_ANY_SYMBOL);
    let anchored_end = !body.ends_with(RQL_ANY_SYMBOL);
    body = body.strip_prefix(RQL_ANY_SYMBOL).unwrap_or(body);
    body = body.strip_suffix(RQL_ANY_SYMBOL).unwrap_or(body);

    let pattern = body
        .split(RQL_ANY_SYMBOL)
        .map(|segment| regex::escape(segment).replace(&placeholder, r"\*"))
        .collect::<Vec<_>>()
        .join(ANY_SYMBOL_REGEX);

    Some(format!(
        "{}{}{}",
        if anchored_start { "^" } else { "" },
        pattern,
        if anchored_end { "$" } else { "" }
    ))
}
