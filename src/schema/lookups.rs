//! Filter lookups
//!
//! The surface operations a filter may permit. Each value type has a default
//! set; declarations can override it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::model::ValueType;
use crate::query::{ComparisonOp, ListOp, SearchOp};

/// Operation a filter allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterLookup {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
    In,
    Out,
    Null,
    Like,
    #[serde(rename = "ilike")]
    ILike,
}

impl FilterLookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Ge => "ge",
            Self::Gt => "gt",
            Self::Le => "le",
            Self::Lt => "lt",
            Self::In => "in",
            Self::Out => "out",
            Self::Null => "null",
            Self::Like => "like",
            Self::ILike => "ilike",
        }
    }

    /// Default lookups for numeric-like fields
    pub fn numeric(with_null: bool) -> BTreeSet<FilterLookup> {
        with_null_lookup(
            [
                Self::Eq,
                Self::Ne,
                Self::Ge,
                Self::Gt,
                Self::Lt,
                Self::Le,
                Self::In,
                Self::Out,
            ],
            with_null,
        )
    }

    /// Default lookups for string fields
    pub fn string(with_null: bool) -> BTreeSet<FilterLookup> {
        with_null_lookup(
            [Self::Eq, Self::Ne, Self::In, Self::Out, Self::Like, Self::ILike],
            with_null,
        )
    }

    /// Default lookups for boolean fields
    pub fn boolean(with_null: bool) -> BTreeSet<FilterLookup> {
        with_null_lookup([Self::Eq, Self::Ne], with_null)
    }

    /// Default lookups by value type, `null` included
    pub fn defaults_for(value_type: ValueType) -> BTreeSet<FilterLookup> {
        match value_type {
            ValueType::String => Self::string(true),
            ValueType::Boolean => Self::boolean(true),
            _ => Self::numeric(true),
        }
    }

    /// Searching lookups take wildcard patterns
    pub fn is_searching(&self) -> bool {
        matches!(self, Self::Like | Self::ILike)
    }
}

fn with_null_lookup<const N: usize>(
    lookups: [FilterLookup; N],
    with_null: bool,
) -> BTreeSet<FilterLookup> {
    let mut set: BTreeSet<_> = lookups.into_iter().collect();
    if with_null {
        set.insert(FilterLookup::Null);
    }
    set
}

impl From<ComparisonOp> for FilterLookup {
    fn from(op: ComparisonOp) -> Self {
        match op {
            ComparisonOp::Eq => Self::Eq,
            ComparisonOp::Ne => Self::Ne,
            ComparisonOp::Gt => Self::Gt,
            ComparisonOp::Ge => Self::Ge,
            ComparisonOp::Lt => Self::Lt,
            ComparisonOp::Le => Self::Le,
        }
    }
}

impl From<SearchOp> for FilterLookup {
    fn from(op: SearchOp) -> Self {
        match op {
            SearchOp::Like => Self::Like,
            SearchOp::ILike => Self::ILike,
        }
    }
}

impl From<ListOp> for FilterLookup {
    fn from(op: ListOp) -> Self {
        match op {
            ListOp::In => Self::In,
            ListOp::Out => Self::Out,
        }
    }
}

impl fmt::Display for FilterLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
