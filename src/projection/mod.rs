//! Projection and optimization
//!
//! - **Directive**: Optimization directives and their rebuild rules
//! - **Tree**: Projection tree and `select()` resolution
//! - **Optimizer**: Directive application driven by selection and touched filters

mod directive;
mod optimizer;
mod tree;

pub use directive::{AppliedDirective, BoundDirective, DirectiveId, Optimization, Prefetch};
pub use optimizer::optimize;
pub use tree::{ProjectionLevel, ProjectionNode, ProjectionTree, SelectionMap};

pub(crate) use tree::{insert_node, NodeSpec};
