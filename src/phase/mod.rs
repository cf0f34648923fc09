//! The seven build phases and the plumbing they share.
//!
//! A phase owns the tree for the duration of its run and hands it back.
//! Document problems are recorded as error nodes; an `Err` means the run
//! itself could not continue (a missing extension base, a broken grammar).

pub mod annotations;
pub mod examples;
pub mod extension;
pub mod grammar;
pub mod includes;
pub mod media_types;
pub mod merge;
pub mod pipeline;
pub mod resource_types;
pub mod types;

use std::sync::Arc;

use crate::error::RamlError;
use crate::grammar::Grammar;
use crate::loader::ResourceLoader;
use crate::nodes::{NodeId, Tree};
use crate::syntax::Fragment;
use crate::types::TypeRules;

pub use pipeline::Pipeline;

/// Everything a phase may consult besides the tree. Built once per build.
#[derive(Clone)]
pub struct PhaseContext {
    pub loader: Arc<dyn ResourceLoader>,
    /// Location of the document being built; includes resolve against it.
    pub location: String,
    pub grammar: Arc<Grammar>,
    /// Fragment kind whose root rule the grammar phases apply.
    pub fragment: Fragment,
    pub type_rules: TypeRules,
}

impl PhaseContext {
    /// The same context with another root fragment.
    pub fn for_fragment(&self, fragment: Fragment) -> PhaseContext {
        PhaseContext {
            fragment,
            ..self.clone()
        }
    }
}

pub trait Phase: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, tree: Tree, ctx: &PhaseContext) -> Result<Tree, RamlError>;
}

// ============================================================================
// TRANSFORMERS
// ============================================================================

/// A local rewrite applied to every node it matches.
pub trait Transformer: Send + Sync {
    fn matches(&self, tree: &Tree, node: NodeId) -> bool;

    /// Returns the node that should take the place of `node`.
    fn transform(&self, tree: &mut Tree, node: NodeId, ctx: &PhaseContext) -> NodeId;
}

/// Walks the tree top-down and offers every node to each transformer in
/// turn. Children are visited after their (possibly replaced) parent.
pub struct TransformationPhase {
    name: &'static str,
    transformers: Vec<Box<dyn Transformer>>,
}

impl TransformationPhase {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            transformers: Vec::new(),
        }
    }

    pub fn with(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformers.push(Box::new(transformer));
        self
    }
}

impl Phase for TransformationPhase {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, mut tree: Tree, ctx: &PhaseContext) -> Result<Tree, RamlError> {
        let Some(root) = tree.root() else {
            return Ok(tree);
        };
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            let mut current = node;
            for transformer in &self.transformers {
                if tree.is_error(current) || !transformer.matches(&tree, current) {
                    continue;
                }
                let replacement = transformer.transform(&mut tree, current, ctx);
                if replacement != current {
                    tree.replace(current, replacement);
                    current = replacement;
                }
            }
            pending.extend(tree.children(current).iter().rev().copied());
        }
        Ok(tree)
    }
}

/// Runs several phases back to back as one pipeline step.
pub struct CompositePhase {
    name: &'static str,
    phases: Vec<Box<dyn Phase>>,
}

impl CompositePhase {
    pub fn new(name: &'static str, phases: Vec<Box<dyn Phase>>) -> Self {
        Self { name, phases }
    }
}

impl Phase for CompositePhase {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, mut tree: Tree, ctx: &PhaseContext) -> Result<Tree, RamlError> {
        for phase in &self.phases {
            tree = phase.apply(tree, ctx)?;
        }
        Ok(tree)
    }
}

/// Label of the pair `node` is the value of, if any.
pub(crate) fn declared_name(tree: &Tree, node: NodeId) -> Option<String> {
    let parent = tree.parent(node)?;
    if tree.value(parent) == Some(node) {
        tree.key_literal(parent)
    } else {
        None
    }
}


#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::loader::MemoryResourceLoader;
    use crate::schema::{JsonSchemaValidator, LenientXmlValidator};

    pub fn context_with(loader: MemoryResourceLoader, location: &str) -> PhaseContext {
        PhaseContext {
            loader: Arc::new(loader),
            location: location.to_string(),
            grammar: Arc::new(Grammar::raml10().unwrap()),
            fragment: Fragment::Api,
            type_rules: TypeRules::new(
                Arc::new(JsonSchemaValidator),
                Arc::new(LenientXmlValidator),
            ),
        }
    }

    pub fn context(location: &str) -> PhaseContext {
        context_with(MemoryResourceLoader::new(), location)
    }
}
