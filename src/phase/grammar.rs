//! Phases 2 and 4: applies the root rule of the document's fragment.

use super::{Phase, PhaseContext};
use crate::error::RamlError;
use crate::nodes::Tree;

pub struct GrammarPhase {
    name: &'static str,
}

impl GrammarPhase {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Phase for GrammarPhase {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, mut tree: Tree, ctx: &PhaseContext) -> Result<Tree, RamlError> {
        let Some(root) = tree.root() else {
            return Ok(tree);
        };
        let rule = ctx.grammar.root(ctx.fragment)?;
        let result = rule.transform(&mut tree, root, &ctx.grammar);
        tree.set_root(result);
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{NodeKind, ReferenceKind, Role};
    use crate::phase::testing;
    use crate::syntax::{parse_yaml, Fragment};

    #[test]
    fn roles_and_references_are_assigned() {
        let ctx = testing::context("");
        let tree = parse_yaml("title: T\n/users:\n  is: [paged]\n  get:\n").unwrap();
        let tree = GrammarPhase::new("grammar").apply(tree, &ctx).unwrap();
        let root = tree.root().unwrap();
        assert!(tree.validation_results().is_empty());
        assert_eq!(tree.role(root), Some(Role::Document));
        let users = tree.get_pair(root, "/users").unwrap();
        assert_eq!(tree.role(users), Some(Role::Resource));
        let is = tree.get(tree.value(users).unwrap(), "is").unwrap();
        assert_eq!(
            tree.kind(tree.children(is)[0]),
            &NodeKind::Reference(ReferenceKind::Trait, "paged".into())
        );
    }

    #[test]
    fn fragments_use_their_own_root_rule() {
        let ctx = testing::context("").for_fragment(Fragment::Library);
        let tree = parse_yaml("title: T\n").unwrap();
        let tree = GrammarPhase::new("grammar").apply(tree, &ctx).unwrap();
        let messages: Vec<String> = tree
            .validation_results()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Unexpected key 'title'"), "{}", messages[0]);
    }
}
