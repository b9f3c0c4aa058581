//! Predicate tree
//!
//! Abstract, storage-independent filter expression produced by the
//! compiler. `All` is the always-true predicate; combinators drop it so an
//! unconstrained query compiles to a bare `All`.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Concrete comparison semantics of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lookup {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Regex,
    IRegex,
    Gt,
    Gte,
    Lt,
    Lte,
    IsNull,
}

impl Lookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::IExact => "iexact",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::StartsWith => "startswith",
            Self::IStartsWith => "istartswith",
            Self::EndsWith => "endswith",
            Self::IEndsWith => "iendswith",
            Self::Regex => "regex",
            Self::IRegex => "iregex",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::IsNull => "isnull",
        }
    }

    /// Pattern-match lookups (`regex` / `iregex`)
    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Regex | Self::IRegex)
    }

    /// Case-insensitive variants
    pub fn is_case_insensitive(&self) -> bool {
        matches!(
            self,
            Self::IExact | Self::IContains | Self::IStartsWith | Self::IEndsWith | Self::IRegex
        )
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed operand of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Decimal rounded to the field's declared places
    Decimal(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    DateTimeTz(DateTime<FixedOffset>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) | Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::DateTimeTz(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

/// Filter expression over backing paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Always true
    All,
    And { children: Vec<Predicate> },
    Or { children: Vec<Predicate> },
    Not { child: Box<Predicate> },
    /// `path <lookup> value`
    Condition {
        path: String,
        lookup: Lookup,
        value: Value,
    },
    /// Inner paths are relative to `relation` and must hold on one related record
    Scoped {
        relation: String,
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    pub fn condition(path: impl Into<String>, lookup: Lookup, value: Value) -> Self {
        Predicate::Condition {
            path: path.into(),
            lookup,
            value,
        }
    }

    /// Conjunction; `All` children are dropped and a single child is unwrapped
    pub fn and(children: impl IntoIterator<Item = Predicate>) -> Self {
        Self::combine(children, |children| Predicate::And { children })
    }

    /// Disjunction; `All` children are dropped and a single child is unwrapped
    pub fn or(children: impl IntoIterator<Item = Predicate>) -> Self {
        Self::combine(children, |children| Predicate::Or { children })
    }

    fn combine(
        children: impl IntoIterator<Item = Predicate>,
        build: impl FnOnce(Vec<Predicate>) -> Predicate,
    ) -> Self {
        let mut children: Vec<_> = children.into_iter().filter(|p| !p.is_all()).collect();
        match children.len() {
            0 => Predicate::All,
            1 => children.remove(0),
            _ => build(children),
        }
    }

    /// Negation; the negation of `All` stays `All`
    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Predicate) -> Self {
        if child.is_all() {
            return Predicate::All;
        }
        Predicate::Not {
            child: Box::new(child),
        }
    }

    /// Scope to one record of `relation`, rewriting paths under it as relative
    pub fn scoped(relation: impl Into<String>, predicate: Predicate) -> Self {
        if predicate.is_all() {
            return Predicate::All;
        }
        let relation = relation.into();
        let prefix = format!("{}.", relation);
        Predicate::Scoped {
            predicate: Box::new(predicate.strip_prefix(&prefix)),
            relation,
        }
    }

    fn strip_prefix(self, prefix: &str) -> Predicate {
        match self {
            Predicate::Condition {
                path,
                lookup,
                value,
            } => Predicate::Condition {
                path: path
                    .strip_prefix(prefix)
                    .map(str::to_string)
                    .unwrap_or(path),
                lookup,
                value,
            },
            Predicate::And { children } => Predicate::And {
                children: children.into_iter().map(|c| c.strip_prefix(prefix)).collect(),
            },
            Predicate::Or { children } => Predicate::Or {
                children: children.into_iter().map(|c| c.strip_prefix(prefix)).collect(),
            },
            Predicate::Not { child } => Predicate::Not {
                child: Box::new(child.strip_prefix(prefix)),
            },
            other => other,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Predicate::All)
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(path: &str, v: i64) -> Predicate {
        Predicate::condition(path, Lookup::Exact, Value::Int(v))
    }

    #[test]
    fn test_combinators_drop_all() {
        assert_eq!(Predicate::and([Predicate::All, Predicate::All]), Predicate::All);
        assert_eq!(Predicate::or(Vec::new()), Predicate::All);
        assert_eq!(Predicate::and([Predicate::All, eq("a", 1)]), eq("a", 1));
        assert_eq!(Predicate::not(Predicate::All), Predicate::All);

        match Predicate::or([eq("a", 1), Predicate::All, eq("b", 2)]) {
            Predicate::Or { children } => assert_eq!(children.len(), 2),
            other => panic!("unexpected predicate: {:?}", other),
        }
    }

    #[test]
    fn test_scoped_rewrites_paths() {
        let inner = Predicate::and([eq("author.name", 1), Predicate::not(eq("author.age", 2))]);
        let scoped = Predicate::scoped("author", inner);
        assert_eq!(
            scoped,
            Predicate::Scoped {
                relation: "author".into(),
                predicate: Box::new(Predicate::And {
                    children: vec![eq("name", 1), Predicate::not(eq("age", 2))]
                }),
            }
        );
    }

    #[test]
    fn test_serialize_condition() {
        let json = serde_json::to_value(eq("id", 3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "condition", "path": "id", "lookup": "exact", "value": 3})
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::String("a".into()).to_string(), "\"a\"");
        assert_eq!(Value::Decimal(1.5).to_string(), "1.5");
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2020-01-02");
    }
}
