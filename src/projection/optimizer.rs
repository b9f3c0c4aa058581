//! Optimization pass
//!
//! Turns the resolved selection and the touched filter names into the
//! ordered list of directives a query plan applies. Every directive instance
//! is applied at most once per pass, keyed by its [`DirectiveId`].

use std::collections::{BTreeSet, HashSet};

use super::directive::{AppliedDirective, DirectiveId};
use super::tree::{ProjectionLevel, ProjectionNode, SelectionMap};
use crate::schema::{FilterSchema, OptimizationArgs};

/// Run the optimization pass for one compiled query
///
/// Returns nothing when the schema has projection disabled.
pub fn optimize(
    schema: &FilterSchema,
    selection: &SelectionMap,
    touched: &BTreeSet<String>,
) -> Vec<AppliedDirective> {
    if !schema.options().select {
        return Vec::new();
    }

    let mut pass = OptimizationPass::new(schema, selection);
    pass.apply_annotations(touched.iter().map(String::as_str));
    pass.walk(schema.projection().roots());

    tracing::debug!(
        schema = %schema.name(),
        directives = pass.directives.len(),
        "Applied optimizations"
    );
    pass.directives
}

struct OptimizationPass<'s> {
    schema: &'s FilterSchema,
    selection: &'s SelectionMap,
    applied: HashSet<DirectiveId>,
    directives: Vec<AppliedDirective>,
}

impl<'s> OptimizationPass<'s> {
    fn new(schema: &'s FilterSchema, selection: &'s SelectionMap) -> Self {
        Self {
            schema,
            selection,
            applied: HashSet::new(),
            directives: Vec::new(),
        }
    }

    /// Register annotations associated with the given filter names
    fn apply_annotations<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        let schema = self.schema;
        for name in names {
            for annotation in schema.annotations_for(name) {
                if self.applied.insert(annotation.id) {
                    tracing::trace!(filter = %name, id = %annotation.id, "Annotation applied");
                    self.directives.extend(annotation.optimization.expand());
                }
            }
        }
    }

    /// Depth-first walk over the nodes that are not excluded
    fn walk(&mut self, level: &'s ProjectionLevel) {
        for node in level.values() {
            if !self.selection.get(&node.path).copied().unwrap_or(true) {
                continue;
            }
            self.visit(node);
            self.walk(&node.children);
        }
    }

    fn visit(&mut self, node: &'s ProjectionNode) {
        let args = OptimizationArgs {
            path: &node.path,
            optimization: node.directive.as_ref().map(|d| &d.optimization),
            selection: self.selection,
        };
        if let Some(directives) = self.schema.hooks().optimize_field(&args) {
            self.directives.extend(directives);
            return;
        }

        let Some(bound) = &node.directive else {
            return;
        };
        if bound.optimization.is_annotation() {
            self.apply_annotations([node.path.as_str()]);
        } else if self.applied.insert(bound.id) {
            self.directives.extend(bound.optimization.expand());
        }
    }
}
