//! Optimization directives
//!
//! Deferred data-fetch/compute instructions attached to schema nodes.
//! Nested directives are written relative to the nearest ancestor directive
//! and rebuilt into absolute form when the schema is built.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{SchemaError, SchemaResult};

/// Identity of a directive instance within one schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DirectiveId(pub u32);

impl fmt::Display for DirectiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Collection relation to fetch, optionally stored under another attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PrefetchRepr")]
pub struct Prefetch {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_attr: Option<String>,
}

impl Prefetch {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            to_attr: None,
        }
    }

    pub fn to_attr(mut self, attr: impl Into<String>) -> Self {
        self.to_attr = Some(attr.into());
        self
    }
}

impl From<&str> for Prefetch {
    fn from(path: &str) -> Self {
        Prefetch::new(path)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PrefetchRepr {
    Path(String),
    Full {
        path: String,
        #[serde(default)]
        to_attr: Option<String>,
    },
}

impl From<PrefetchRepr> for Prefetch {
    fn from(repr: PrefetchRepr) -> Self {
        match repr {
            PrefetchRepr::Path(path) => Prefetch::new(path),
            PrefetchRepr::Full { path, to_attr } => Prefetch { path, to_attr },
        }
    }
}

/// Declared optimization of a schema node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Optimization {
    /// Named computed value
    Annotation { name: String, expression: String },
    /// Eager single-valued relations
    SelectRelated { relations: Vec<String> },
    /// Eager collection relations
    PrefetchRelated { relations: Vec<Prefetch> },
    /// Single-valued relations relative to the ancestor directive
    NestedSelectRelated { relations: Vec<String> },
    /// Collection relations relative to the ancestor directive
    NestedPrefetchRelated { relations: Vec<Prefetch> },
    /// Ordered composite; the first member is the main relation
    Chain { members: Vec<Optimization> },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ParentKind {
    Single,
    Collection,
}

impl Optimization {
    pub fn annotation(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Optimization::Annotation {
            name: name.into(),
            expression: expression.into(),
        }
    }

    pub fn select_related<I, S>(relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Optimization::SelectRelated {
            relations: relations.into_iter().map(Into::into).collect(),
        }
    }

    pub fn prefetch_related<I, P>(relations: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Prefetch>,
    {
        Optimization::PrefetchRelated {
            relations: relations.into_iter().map(Into::into).collect(),
        }
    }

    pub fn nested_select_related<I, S>(relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Optimization::NestedSelectRelated {
            relations: relations.into_iter().map(Into::into).collect(),
        }
    }

    pub fn nested_prefetch_related<I, P>(relations: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Prefetch>,
    {
        Optimization::NestedPrefetchRelated {
            relations: relations.into_iter().map(Into::into).collect(),
        }
    }

    pub fn chain(members: impl IntoIterator<Item = Optimization>) -> Self {
        Optimization::Chain {
            members: members.into_iter().collect(),
        }
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self, Optimization::Annotation { .. })
    }

    /// Check that the directive names at least one relation
    pub fn validate(&self, owner: &str) -> SchemaResult<()> {
        let empty = match self {
            Optimization::Annotation { name, .. } => name.is_empty(),
            Optimization::SelectRelated { relations }
            | Optimization::NestedSelectRelated { relations } => relations.is_empty(),
            Optimization::PrefetchRelated { relations }
            | Optimization::NestedPrefetchRelated { relations } => relations.is_empty(),
            Optimization::Chain { members } => {
                for member in members {
                    member.validate(owner)?;
                }
                members.is_empty()
            }
        };

        if empty {
            return Err(SchemaError::EmptyOptimization(owner.to_string()));
        }
        Ok(())
    }

    /// Main relation path, if the directive has one
    fn main_relation(&self) -> Option<&str> {
        match self {
            Optimization::Annotation { .. } => None,
            Optimization::SelectRelated { relations }
            | Optimization::NestedSelectRelated { relations } => {
                relations.first().map(String::as_str)
            }
            Optimization::PrefetchRelated { relations }
            | Optimization::NestedPrefetchRelated { relations } => {
                relations.first().map(|p| p.path.as_str())
            }
            Optimization::Chain { members } => members.first().and_then(Self::main_relation),
        }
    }

    /// Innermost non-chain main member
    fn real_parent(&self) -> &Optimization {
        let mut current = self;
        while let Optimization::Chain { members } = current {
            match members.first() {
                Some(first) => current = first,
                None => break,
            }
        }
        current
    }

    /// Rebuild against the nearest ancestor directive
    ///
    /// Only nested directives and chains change; an absent or annotation
    /// ancestor leaves every directive as declared.
    pub fn rebuild(&self, parent: Option<&Optimization>) -> Optimization {
        let nested = matches!(
            self,
            Optimization::NestedSelectRelated { .. }
                | Optimization::NestedPrefetchRelated { .. }
                | Optimization::Chain { .. }
        );
        if !nested {
            return self.clone();
        }

        let Some(parent) = parent.map(Optimization::real_parent) else {
            return self.clone();
        };
        let Some(parent_relation) = parent.main_relation() else {
            return self.clone();
        };
        let kind = match parent {
            Optimization::PrefetchRelated { .. } | Optimization::NestedPrefetchRelated { .. } => {
                ParentKind::Collection
            }
            _ => ParentKind::Single,
        };

        match self {
            Optimization::NestedSelectRelated { relations } => {
                let joined = relations.iter().map(|r| join_relation(parent_relation, r));
                match kind {
                    ParentKind::Single => Optimization::NestedSelectRelated {
                        relations: joined.collect(),
                    },
                    ParentKind::Collection => Optimization::NestedPrefetchRelated {
                        relations: joined.map(Prefetch::new).collect(),
                    },
                }
            }
            Optimization::NestedPrefetchRelated { relations } => {
                Optimization::NestedPrefetchRelated {
                    relations: relations
                        .iter()
                        .map(|p| Prefetch {
                            path: join_relation(parent_relation, &p.path),
                            to_attr: p.to_attr.clone(),
                        })
                        .collect(),
                }
            }
            Optimization::Chain { members } => Optimization::Chain {
                members: members.iter().map(|m| m.rebuild(Some(parent))).collect(),
            },
            _ => self.clone(),
        }
    }

    /// Expand into the directives it applies, in order
    pub fn expand(&self) -> Vec<AppliedDirective> {
        let mut out = Vec::new();
        self.expand_into(&mut out);
        out
    }

    fn expand_into(&self, out: &mut Vec<AppliedDirective>) {
        match self {
            Optimization::Annotation { name, expression } => out.push(AppliedDirective::Annotate {
                name: name.clone(),
                expression: expression.clone(),
            }),
            Optimization::SelectRelated { relations }
            | Optimization::NestedSelectRelated { relations } => {
                out.extend(relations.iter().map(|path| AppliedDirective::JoinSingle {
                    path: path.clone(),
                }));
            }
            Optimization::PrefetchRelated { relations }
            | Optimization::NestedPrefetchRelated { relations } => {
                out.extend(relations.iter().map(|p| AppliedDirective::JoinCollection {
                    path: p.path.clone(),
                    to_attr: p.to_attr.clone(),
                }));
            }
            Optimization::Chain { members } => {
                for member in members {
                    member.expand_into(out);
                }
            }
        }
    }
}

fn join_relation(parent: &str, relation: &str) -> String {
    format!("{}.{}", parent, relation)
}

/// A directive instance with its schema-wide identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundDirective {
    pub id: DirectiveId,
    pub optimization: Optimization,
}

/// Directive emitted into a query plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppliedDirective {
    /// Compute a named value
    Annotate { name: String, expression: String },
    /// Join a single-valued relation in the same fetch
    JoinSingle { path: String },
    /// Fetch a collection relation in a follow-up batch
    JoinCollection {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_attr: Option<String>,
    },
}
