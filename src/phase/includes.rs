//! Phase 1: inlines `!include` targets and the libraries named by `uses`,
//! then marks `<<parameter>>` strings as templates.

use tracing::debug;

use super::{Phase, PhaseContext};
use crate::error::RamlError;
use crate::loader::resolve_location;
use crate::nodes::{ErrorCategory, NodeId, NodeKind, Tree};
use crate::syntax::parse_yaml;
use crate::template;

pub struct IncludePhase;

impl Phase for IncludePhase {
    fn name(&self) -> &'static str {
        "includes"
    }

    fn apply(&self, mut tree: Tree, ctx: &PhaseContext) -> Result<Tree, RamlError> {
        let Some(root) = tree.root() else {
            return Ok(tree);
        };
        let mut resolver = IncludeResolver {
            ctx,
            stack: vec![ctx.location.clone()],
        };
        let root = resolver.expand(&mut tree, root, &ctx.location);
        tree.set_root(root);
        resolver.load_uses(&mut tree, root, &ctx.location);
        template::mark_templates(&mut tree, root);
        Ok(tree)
    }
}

/// Whether an included file is parsed as YAML or inlined as text.
fn is_structured(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    [".raml", ".yaml", ".yml", ".json"]
        .iter()
        .any(|extension| lower.ends_with(extension))
}

struct IncludeResolver<'c> {
    ctx: &'c PhaseContext,
    /// Locations currently being expanded, outermost first.
    stack: Vec<String>,
}

impl IncludeResolver<'_> {
    /// Replaces every include under `node`. Returns the node for its slot.
    fn expand(&mut self, tree: &mut Tree, node: NodeId, base: &str) -> NodeId {
        if let NodeKind::Include(path) = tree.kind(node) {
            let location = resolve_location(base, path);
            return self.include(tree, node, location);
        }
        let children = tree.children(node).to_vec();
        for (index, child) in children.into_iter().enumerate() {
            let replacement = self.expand(tree, child, base);
            if replacement != child {
                tree.set_child(node, index, replacement);
            }
        }
        node
    }

    fn include(&mut self, tree: &mut Tree, node: NodeId, location: String) -> NodeId {
        if self.stack.contains(&location) {
            let message = format!("Cyclic include of '{}'", location);
            return tree.error_for(node, ErrorCategory::External, message);
        }
        let text = match self.ctx.loader.fetch(&location) {
            Ok(text) => text,
            Err(error) => {
                let message = format!("Include cannot be resolved: {}", error);
                return tree.error_for(node, ErrorCategory::External, message);
            }
        };
        debug!(location = %location, "including resource");
        if !is_structured(&location) {
            return tree.add_like(NodeKind::String(text), node);
        }
        match self.load(tree, node, &location, &text) {
            Ok(loaded) => loaded,
            Err(message) => tree.error_for(node, ErrorCategory::External, message),
        }
    }

    /// Parses `text` and grafts it in place of `node` with its own includes
    /// and libraries resolved relative to `location`.
    fn load(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        location: &str,
        text: &str,
    ) -> Result<NodeId, String> {
        let other = parse_yaml(text)
            .map_err(|error| format!("Error parsing '{}': {}", location, error))?;
        let Some(other_root) = other.root() else {
            return Ok(tree.add_like(NodeKind::Null, node));
        };
        let grafted = tree.graft(&other, other_root);
        self.stack.push(location.to_string());
        let expanded = self.expand(tree, grafted, location);
        self.load_uses(tree, expanded, location);
        self.stack.pop();
        Ok(expanded)
    }

    /// Replaces each `uses` entry naming a file with the parsed library.
    fn load_uses(&mut self, tree: &mut Tree, root: NodeId, base: &str) {
        if !tree.is_object(root) {
            return;
        }
        let Some(uses) = tree.get(root, "uses") else {
            return;
        };
        if !tree.is_object(uses) {
            return;
        }
        for pair in tree.pairs(uses) {
            let Some(value) = tree.value(pair) else {
                continue;
            };
            let NodeKind::String(path) = tree.kind(value) else {
                continue;
            };
            let location = resolve_location(base, path);
            let library = self.include(tree, value, location);
            tree.set_child(pair, 1, library);
        }
    }
}
