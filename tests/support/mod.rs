//! In-memory plan evaluation over JSON rows
//!
//! Relation paths fan out over arrays: a condition on `tags.name` holds when
//! any tag matches, while a scoped predicate must hold on one tag.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::RegexBuilder;
use rql::compile::{Lookup, Predicate, Value};
use rql::QueryPlan;
use serde_json::Value as Json;
use std::cmp::Ordering;

static NULL: Json = Json::Null;

/// Ids of the rows matching the plan, in plan order
pub fn run(rows: &[Json], plan: &QueryPlan) -> Vec<i64> {
    let mut selected: Vec<&Json> = rows.iter().filter(|row| matches(row, &plan.predicate)).collect();
    sort(&mut selected, &plan.ordering);

    selected
        .into_iter()
        .skip(plan.offset.unwrap_or(0) as usize)
        .take(plan.limit.map_or(usize::MAX, |l| l as usize))
        .filter_map(|row| row["id"].as_i64())
        .collect()
}

pub fn matches(row: &Json, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::All => true,
        Predicate::And { children } => children.iter().all(|c| matches(row, c)),
        Predicate::Or { children } => children.iter().any(|c| matches(row, c)),
        Predicate::Not { child } => !matches(row, child),
        Predicate::Condition {
            path,
            lookup,
            value,
        } => resolve(row, path)
            .into_iter()
            .any(|found| test(found, *lookup, value)),
        Predicate::Scoped {
            relation,
            predicate,
        } => resolve(row, relation)
            .into_iter()
            .filter(|related| related.is_object())
            .any(|related| matches(related, predicate)),
    }
}

fn resolve<'a>(row: &'a Json, path: &str) -> Vec<&'a Json> {
    let mut current = vec![row];
    for part in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value.get(part) {
                Some(Json::Array(items)) => next.extend(items.iter()),
                Some(found) => next.push(found),
                None => next.push(&NULL),
            }
        }
        current = next;
    }
    current
}

fn test(found: &Json, lookup: Lookup, value: &Value) -> bool {
    if lookup == Lookup::IsNull {
        return found.is_null() == matches!(value, Value::Bool(true));
    }
    if found.is_null() {
        return false;
    }

    match lookup {
        Lookup::Exact => compare(found, value) == Some(Ordering::Equal),
        Lookup::Gt => compare(found, value) == Some(Ordering::Greater),
        Lookup::Gte => matches!(compare(found, value), Some(Ordering::Greater | Ordering::Equal)),
        Lookup::Lt => compare(found, value) == Some(Ordering::Less),
        Lookup::Lte => matches!(compare(found, value), Some(Ordering::Less | Ordering::Equal)),
        _ => text_test(found, lookup, value),
    }
}

fn text_test(found: &Json, lookup: Lookup, value: &Value) -> bool {
    let (Some(text), Value::String(pattern)) = (found.as_str(), value) else {
        return false;
    };

    if lookup.is_regex() {
        return RegexBuilder::new(pattern)
            .case_insensitive(lookup.is_case_insensitive())
            .build()
            .map(|re| re.is_match(text))
            .unwrap_or(false);
    }

    let (text, pattern) = if lookup.is_case_insensitive() {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.clone())
    };

    match lookup {
        Lookup::IExact => text == pattern,
        Lookup::Contains | Lookup::IContains => text.contains(&pattern),
        Lookup::StartsWith | Lookup::IStartsWith => text.starts_with(&pattern),
        Lookup::EndsWith | Lookup::IEndsWith => text.ends_with(&pattern),
        _ => false,
    }
}

fn compare(found: &Json, value: &Value) -> Option<Ordering> {
    match value {
        Value::Bool(b) => found.as_bool().map(|f| f.cmp(b)),
        Value::Int(i) => found.as_f64()?.partial_cmp(&(*i as f64)),
        Value::Float(f) | Value::Decimal(f) => found.as_f64()?.partial_cmp(f),
        Value::String(s) => found.as_str().map(|f| f.cmp(s.as_str())),
        Value::Date(d) => NaiveDate::parse_from_str(found.as_str()?, "%Y-%m-%d")
            .ok()
            .map(|f| f.cmp(d)),
        Value::DateTime(dt) => NaiveDateTime::parse_from_str(found.as_str()?, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(|f| f.cmp(dt)),
        Value::DateTimeTz(dt) => DateTime::parse_from_rfc3339(found.as_str()?)
            .ok()
            .map(|f| f.cmp(dt)),
    }
}

fn sort(rows: &mut [&Json], keys: &[String]) {
    rows.sort_by(|a, b| {
        for key in keys {
            let (path, descending) = match key.strip_prefix('-') {
                Some(path) => (path, true),
                None => (key.as_str(), false),
            };
            let left = resolve(a, path).first().copied().unwrap_or(&NULL);
            let right = resolve(b, path).first().copied().unwrap_or(&NULL);
            let ordering = json_cmp(left, right);
            if ordering != Ordering::Equal {
                return if descending { ordering.reverse() } else { ordering };
            }
        }
        Ordering::Equal
    });
}

fn json_cmp(a: &Json, b: &Json) -> Ordering {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Json::String(x), Json::String(y)) => x.cmp(y),
        (Json::Null, Json::Null) => Ordering::Equal,
        (Json::Null, _) => Ordering::Less,
        (_, Json::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
