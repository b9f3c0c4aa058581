//! Query compilation
//!
//! - **Compiler**: AST to predicate tree against a filter schema
//! - **Predicate**: Storage-independent filter expression
//! - **Value**: Typed coercion of raw values
//! - **Search**: Wildcard pattern classification
//!
//! # Example
//!
//! ```rust
//! use rql::compile::{compile, Lookup, Predicate, Value};
//! use rql::query::parse_query;
//! use rql::schema::{Catalog, FieldMeta, FilterSchema, Model};
//!
//! let catalog = Catalog::new().with_model(Model::new("book").field("pages", FieldMeta::int()));
//! let schema = FilterSchema::builder("books", &catalog, "book")
//!     .declare("pages")
//!     .build()
//!     .unwrap();
//!
//! let ast = parse_query("pages=ge=100").unwrap();
//! let compiled = compile(ast.as_ref(), &schema).unwrap();
//! assert_eq!(
//!     compiled.predicate,
//!     Predicate::condition("pages", Lookup::Gte, Value::Int(100))
//! );
//! ```

mod compiler;
mod predicate;
mod search;
mod value;

pub use compiler::{compile, CompiledQuery};
pub use predicate::{Lookup, Predicate, Value};
