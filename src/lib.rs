//! # RQL
//!
//! Resource Query Language compiler - parses compact query strings and
//! compiles them against declarative filter schemas into storage-independent
//! query plans.
//!
//! ## Features
//!
//! - **Grammar**: Function, infix and shorthand forms of comparisons, `in`/`out`
//!   lists, wildcard search, `ordering()`, `select()` and namespace tuples
//! - **Filter schemas**: Declared once, validated at build time, shared across threads
//! - **Typed coercion**: Values checked against field types, lookups and null sentinels
//! - **Projection**: `select()` resolution with hidden-by-default branches and
//!   deduplicated optimization directives
//! - **Caching**: Bounded LRU/LFU plan cache for read-only requests
//!
//! ## Modules
//!
//! - [`query`]: Query language AST, parser and per-request errors
//! - [`schema`]: Filter schema declarations and builder
//! - [`compile`]: AST to predicate compilation
//! - [`projection`]: Projection tree and optimization pass
//! - [`cache`]: Query plan cache
//! - [`service`]: End-to-end pipeline for one schema
//!
//! ## Quick Start
//!
//! ```rust
//! use rql::cache::RequestMethod;
//! use rql::plan::BaseQuery;
//! use rql::schema::{Catalog, Declaration, FieldMeta, FilterSchema, Model};
//! use rql::service::QueryService;
//!
//! let catalog = Catalog::new().with_model(
//!     Model::new("book")
//!         .field("id", FieldMeta::int().primary_key())
//!         .field("title", FieldMeta::string())
//!         .field("pages", FieldMeta::int()),
//! );
//!
//! let schema = FilterSchema::builder("books", &catalog, "book")
//!     .declare("id")
//!     .declare(Declaration::filter("title").ordering().search())
//!     .declare("pages")
//!     .build()?;
//!
//! let service = QueryService::new(schema);
//! let plan = service.apply(
//!     RequestMethod::Get,
//!     "pages=ge=100&like(title,*rust*)&ordering(-title)&limit=10",
//!     &BaseQuery::default(),
//! )?;
//!
//! assert_eq!(plan.ordering, vec!["-title"]);
//! assert_eq!(plan.limit, Some(10));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod compile;
pub mod config;
pub mod plan;
pub mod projection;
pub mod query;
pub mod schema;
pub mod service;

pub use cache::{QueryCache, RequestMethod};
pub use compile::{compile, CompiledQuery, Predicate};
pub use config::Config;
pub use plan::{BaseQuery, QueryPlan};
pub use query::{parse_query, Node, RqlError, RqlResult};
pub use schema::{FilterSchema, SchemaError};
pub use service::QueryService;
