//! RQL Query Language
//!
//! Front end of the compiler pipeline:
//!
//! - **AST**: Parsed query node types
//! - **Parser**: Parse query strings into the AST
//! - **Error**: Per-request error types shared by every later stage
//!
//! # Query Language
//!
//! ```text
//! and(eq(status,active),ge(created,2020-01-01))
//! status=active&created=ge=2020-01-01
//! (status=active|status=draft),in(id,(1,2,3))
//! like(title,*rust*)&ordering(-created)&select(author)
//! ```
//!
//! # Examples
//!
//! ```rust
//! use rql::query::{parse_query, Node, ComparisonOp};
//!
//! let ast = parse_query("title=eq=book").unwrap().unwrap();
//! assert_eq!(ast, Node::comparison("title", ComparisonOp::Eq, "book"));
//! ```

mod ast;
mod error;
mod parser;

pub use ast::{
    remove_quotes, ComparisonOp, ListOp, LogicalOp, Node, SearchOp, Sign, SignedProp,
    RESERVED_FILTER_NAMES, RQL_ANY_SYMBOL, RQL_EMPTY, RQL_FALSE, RQL_LIMIT_PARAM, RQL_MINUS,
    RQL_NULL, RQL_OFFSET_PARAM, RQL_PLUS, RQL_SEARCH_PARAM, RQL_TRUE,
};
pub use error::{ErrorDetails, RqlError, RqlResult};
pub use parser::{parse_query, CachedParser};
