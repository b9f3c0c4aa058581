//! Projection tree
//!
//! Mirrors the namespace/filter layout of a schema. Each node knows its full
//! dotted path, whether it is hidden unless selected, and the directive to
//! apply when it is part of the output.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::directive::BoundDirective;
use crate::query::{RqlError, RqlResult, SignedProp};

/// Resolved visibility per projection path (`true` = included)
pub type SelectionMap = BTreeMap<String, bool>;

/// Child nodes keyed by their local name, in declaration order
pub type ProjectionLevel = IndexMap<String, ProjectionNode>;

/// One projection node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionNode {
    /// Full dotted path
    pub path: String,
    pub hidden: bool,
    pub namespace: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directive: Option<BoundDirective>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub children: ProjectionLevel,
}

/// Attributes of a node inserted by the schema builder
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeSpec {
    pub hidden: bool,
    pub namespace: bool,
    pub directive: Option<BoundDirective>,
}

/// Insert a (possibly dotted) local name below `level`
///
/// Intermediate segments become plain namespace nodes; only the last segment
/// carries `spec`. Existing nodes are kept. Returns the children of the last
/// segment.
pub(crate) fn insert_node<'t>(
    mut level: &'t mut ProjectionLevel,
    prefix: &str,
    local_name: &str,
    spec: NodeSpec,
) -> &'t mut ProjectionLevel {
    let parts: Vec<&str> = local_name.split('.').collect();
    let last = parts.len() - 1;
    let mut path = prefix.to_string();
    let mut spec = Some(spec);

    for (index, part) in parts.into_iter().enumerate() {
        path.push_str(part);
        let node_spec = if index == last {
            spec.take().unwrap_or_default()
        } else {
            NodeSpec {
                namespace: true,
                ..Default::default()
            }
        };

        let node = level
            .entry(part.to_string())
            .or_insert_with(|| ProjectionNode {
                path: path.clone(),
                hidden: node_spec.hidden,
                namespace: node_spec.namespace,
                directive: node_spec.directive,
                children: IndexMap::new(),
            });
        level = &mut node.children;
        path.push('.');
    }

    level
}

/// Root of the projection tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProjectionTree {
    roots: ProjectionLevel,
}

impl ProjectionTree {
    pub(crate) fn from_roots(roots: ProjectionLevel) -> Self {
        Self { roots }
    }

    /// Top-level nodes in declaration order
    pub fn roots(&self) -> &ProjectionLevel {
        &self.roots
    }

    /// Find a node by full dotted path
    pub fn get(&self, path: &str) -> Option<&ProjectionNode> {
        let mut level = &self.roots;
        let mut found = None;
        for part in path.split('.') {
            let node = level.get(part)?;
            level = &node.children;
            found = Some(node);
        }
        found
    }

    /// Resolve a `select()` list into per-path visibility
    ///
    /// Included paths mark every prefix visible. Selecting a leaf below a
    /// hidden-by-default parent implicitly excludes its siblings, and hidden
    /// paths that are not selected stay excluded.
    pub fn resolve_selection(
        &self,
        select: &[SignedProp],
        default_exclusions: &BTreeSet<String>,
    ) -> RqlResult<SelectionMap> {
        let mut selection = SelectionMap::new();
        let mut inclusions = BTreeSet::new();
        let mut implicit_exclusions = BTreeSet::new();
        let mut explicit_exclusions = BTreeSet::new();

        for prop in select {
            if prop.is_minus() {
                explicit_exclusions.insert(prop.prop.clone());
                continue;
            }

            let parts: Vec<&str> = prop.prop.split('.').collect();
            let last = parts.len() - 1;
            let mut level = &self.roots;
            let mut parent = String::new();

            for (index, part) in parts.iter().enumerate() {
                let node = level.get(*part).ok_or_else(|| {
                    RqlError::parsing(format!("Bad select filter: {}.", prop.prop))
                })?;

                let current = if parent.is_empty() {
                    part.to_string()
                } else {
                    format!("{}.{}", parent, part)
                };
                inclusions.insert(current.clone());
                selection.insert(current.clone(), true);

                if index != last {
                    parent = current;
                    level = &node.children;
                } else if default_exclusions.contains(&parent) {
                    for sibling in level.keys().filter(|k| k.as_str() != *part) {
                        implicit_exclusions.insert(format!("{}.{}", parent, sibling));
                    }
                }
            }
        }

        let excluded: BTreeSet<String> = explicit_exclusions
            .into_iter()
            .chain(default_exclusions.difference(&inclusions).cloned())
            .chain(implicit_exclusions.difference(&inclusions).cloned())
            .collect();

        for path in excluded {
            if inclusions.contains(&path) {
                return Err(RqlError::parsing(
                    "Bad select filter: incompatible properties.",
                ));
            }
            if self.get(&path).is_none() {
                return Err(RqlError::parsing(format!("Bad select filter: -{}.", path)));
            }
            selection.insert(path, false);
        }

        Ok(selection)
    }
}
