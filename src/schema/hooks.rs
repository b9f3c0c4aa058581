//! Schema extension points
//!
//! Custom filters, custom ordering keys and per-node optimization overrides
//! are delegated to a [`FilterHooks`] implementation attached to the schema.

use crate::compile::{Lookup, Predicate};
use crate::projection::{AppliedDirective, Optimization, SelectionMap};
use crate::query::{ListOp, RqlError, RqlResult};

use super::descriptor::FilterDescriptor;
use super::lookups::FilterLookup;

/// Resolved request for a custom filter
#[derive(Debug, Clone)]
pub struct FilterArgs<'a> {
    /// Full dotted filter name
    pub filter_name: &'a str,
    /// Requested operator, already checked against the descriptor
    pub lookup: FilterLookup,
    /// Backing lookup the value would use, `IsNull` for a null sentinel
    pub backing: Lookup,
    /// Raw value as written in the query
    pub raw_value: &'a str,
    /// Set when the request comes from `in()`/`out()`
    pub list_op: Option<ListOp>,
    pub descriptor: &'a FilterDescriptor,
}

/// Projection node handed to [`FilterHooks::optimize_field`]
#[derive(Debug, Clone, Copy)]
pub struct OptimizationArgs<'a> {
    /// Full dotted projection path
    pub path: &'a str,
    /// Directive declared on the node, already rebuilt
    pub optimization: Option<&'a Optimization>,
    pub selection: &'a SelectionMap,
}

/// Strategy object for schema behavior that cannot be declared
pub trait FilterHooks: Send + Sync {
    /// Build the predicate of a custom filter
    fn build_custom_predicate(&self, args: &FilterArgs<'_>) -> RqlResult<Predicate> {
        Err(RqlError::parsing(format!(
            "Filter logic is not implemented: {}.",
            args.filter_name
        )))
    }

    /// Ordering key of a custom filter
    fn custom_ordering(&self, filter_name: &str) -> RqlResult<String> {
        Err(RqlError::parsing(format!(
            "Ordering logic is not implemented: {}.",
            filter_name
        )))
    }

    /// Replace the directives applied for a projection node
    ///
    /// Returning `None` applies the declared directive.
    fn optimize_field(&self, _args: &OptimizationArgs<'_>) -> Option<Vec<AppliedDirective>> {
        None
    }
}

/// Hooks with no custom behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl FilterHooks for DefaultHooks {}
