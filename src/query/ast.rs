//! RQL Abstract Syntax Tree
//!
//! Defines the AST produced by the RQL parser. Nodes keep the raw text of
//! properties and values exactly as written in the query (quotes included);
//! binding them to a schema happens later in the compiler.
//!
//! # Example Queries
//!
//! ```text
//! eq(title,book)
//! title=ge=2020-01-01&(status=active|status=draft)
//! in(id,(1,2,3))&ordering(-created)&select(author,-pages)
//! author=tuple(name=Ann,like(country,*land))
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Plus sign accepted in front of signed properties
pub const RQL_PLUS: char = '+';
/// Minus sign marking descending order / exclusion
pub const RQL_MINUS: char = '-';
/// `null()` sentinel value
pub const RQL_NULL: &str = "null()";
/// `empty()` sentinel value
pub const RQL_EMPTY: &str = "empty()";
/// Wildcard symbol used by searching operators
pub const RQL_ANY_SYMBOL: char = '*';
/// Boolean literal `true`
pub const RQL_TRUE: &str = "true";
/// Boolean literal `false`
pub const RQL_FALSE: &str = "false";
/// Reserved pagination limit parameter
pub const RQL_LIMIT_PARAM: &str = "limit";
/// Reserved pagination offset parameter
pub const RQL_OFFSET_PARAM: &str = "offset";
/// Reserved full-text search parameter
pub const RQL_SEARCH_PARAM: &str = "search";

/// Names that cannot be declared as filters
pub const RESERVED_FILTER_NAMES: [&str; 3] = [RQL_LIMIT_PARAM, RQL_OFFSET_PARAM, RQL_SEARCH_PARAM];

/// A parsed RQL expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    /// `op(prop,value)`, `prop=op=value` or `prop=value`
    Comparison {
        prop: String,
        op: ComparisonOp,
        value: String,
    },
    /// `in(prop,(v1,v2))` / `out(prop,(v1,v2))`
    Listing {
        op: ListOp,
        prop: String,
        values: Vec<String>,
    },
    /// `like(prop,pattern)` / `ilike(prop,pattern)`
    Searching {
        op: SearchOp,
        prop: String,
        value: String,
    },
    /// `and(..)`, `or(..)`, `not(..)` and their infix aliases
    Logical { op: LogicalOp, children: Vec<Node> },
    /// `ordering(+a,-b)`
    Ordering { props: Vec<SignedProp> },
    /// `select(a,-b)`
    Select { props: Vec<SignedProp> },
    /// `ns=tuple(a=1,b=2)`: children must match the same related record
    NamespaceTuple { prop: String, children: Vec<Node> },
}

impl Node {
    /// Create a comparison node
    pub fn comparison(prop: impl Into<String>, op: ComparisonOp, value: impl Into<String>) -> Self {
        Node::Comparison {
            prop: prop.into(),
            op,
            value: value.into(),
        }
    }

    /// Conjunction of `first` and `rest`, collapsing to `first` when `rest` is empty
    pub fn and_of(first: Node, rest: Vec<Node>) -> Self {
        Self::logical_of(LogicalOp::And, first, rest)
    }

    /// Disjunction of `first` and `rest`, collapsing to `first` when `rest` is empty
    pub fn or_of(first: Node, rest: Vec<Node>) -> Self {
        Self::logical_of(LogicalOp::Or, first, rest)
    }

    fn logical_of(op: LogicalOp, first: Node, rest: Vec<Node>) -> Self {
        if rest.is_empty() {
            return first;
        }
        let mut children = Vec::with_capacity(rest.len() + 1);
        children.push(first);
        children.extend(rest);
        Node::Logical { op, children }
    }

    /// Negation of a single node
    pub fn not(child: Node) -> Self {
        Node::Logical {
            op: LogicalOp::Not,
            children: vec![child],
        }
    }

    /// Visit this node and every descendant in prefix order
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        match self {
            Node::Logical { children, .. } | Node::NamespaceTuple { children, .. } => {
                for child in children {
                    child.walk(visit);
                }
            }
            _ => {}
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ComparisonOp {
    /// All comparison operators
    pub const ALL: [ComparisonOp; 6] = [Self::Eq, Self::Ne, Self::Gt, Self::Ge, Self::Lt, Self::Le];

    /// Keyword used in the query grammar
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }

    /// Parse from a grammar keyword
    pub fn from_keyword(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

/// Listing operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOp {
    In,
    Out,
}

impl ListOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// Searching operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOp {
    /// Case-sensitive pattern match
    Like,
    /// Case-insensitive pattern match
    #[serde(rename = "ilike")]
    ILike,
}

impl SearchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::ILike => "ilike",
        }
    }
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
        }
    }
}

macro_rules! impl_display_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

impl_display_as_str!(ComparisonOp, ListOp, SearchOp, LogicalOp);

/// Direction sign of an ordering/select property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    /// `+prop` or bare `prop`: ascending / include
    Plus,
    /// `-prop`: descending / exclude
    Minus,
}

/// A property with an optional `+`/`-` sign
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignedProp {
    pub prop: String,
    pub sign: Sign,
}

impl SignedProp {
    /// Ascending / included property
    pub fn plus(prop: impl Into<String>) -> Self {
        Self {
            prop: prop.into(),
            sign: Sign::Plus,
        }
    }

    /// Descending / excluded property
    pub fn minus(prop: impl Into<String>) -> Self {
        Self {
            prop: prop.into(),
            sign: Sign::Minus,
        }
    }

    pub fn is_minus(&self) -> bool {
        self.sign == Sign::Minus
    }
}

impl fmt::Display for SignedProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sign {
            Sign::Plus => write!(f, "{}", self.prop),
            Sign::Minus => write!(f, "{}{}", RQL_MINUS, self.prop),
        }
    }
}

/// Strip one level of surrounding single or double quotes
pub fn remove_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    match bytes.first() {
        Some(b'"') | Some(b'\'') if value.len() >= 2 => &value[1..value.len() - 1],
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_of_collapses_single() {
        let node = Node::comparison("a", ComparisonOp::Eq, "1");
        assert_eq!(Node::and_of(node.clone(), vec![]), node);
    }

    #[test]
    fn test_or_of_builds_logical() {
        let a = Node::comparison("a", ComparisonOp::Eq, "1");
        let b = Node::comparison("b", ComparisonOp::Eq, "2");
        match Node::or_of(a, vec![b]) {
            Node::Logical { op, children } => {
                assert_eq!(op, LogicalOp::Or);
                assert_eq!(children.len(), 2);
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_operator_keywords() {
        for op in ComparisonOp::ALL {
            assert_eq!(ComparisonOp::from_keyword(op.as_str()), Some(op));
        }
        assert_eq!(ComparisonOp::from_keyword("like"), None);
        assert_eq!(SearchOp::ILike.to_string(), "ilike");
    }

    #[test]
    fn test_signed_prop_display() {
        assert_eq!(SignedProp::plus("a.b").to_string(), "a.b");
        assert_eq!(SignedProp::minus("a").to_string(), "-a");
    }

    #[test]
    fn test_remove_quotes() {
        assert_eq!(remove_quotes("\"text\""), "text");
        assert_eq!(remove_quotes("'text'"), "text");
        assert_eq!(remove_quotes("\"\""), "");
        assert_eq!(remove_quotes("text"), "text");
        assert_eq!(remove_quotes(""), "");
    }

    #[test]
    fn test_walk_visits_nested_nodes() {
        let tree = Node::and_of(
            Node::comparison("a", ComparisonOp::Eq, "1"),
            vec![Node::not(Node::comparison("b", ComparisonOp::Ne, "2"))],
        );
        let mut count = 0;
        tree.walk(&mut |_| count += 1);
        assert_eq!(count, 4);
    }
}
