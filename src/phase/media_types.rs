//! Phase 6: bodies declared without a media type get the document default.

use super::{PhaseContext, Transformer};
use crate::nodes::{NodeId, NodeKind, Role, Tree};

pub struct MediaTypePhase;

impl Transformer for MediaTypePhase {
    fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        if !tree.is_pair(node) || tree.key_literal(node).as_deref() != Some("body") {
            return false;
        }
        let declares_type = tree
            .value(node)
            .map_or(false, |value| tree.role(value) == Some(Role::TypeDeclaration));
        declares_type && tree.parent(node).map_or(false, |owner| owns_bodies(tree, owner))
    }

    fn transform(&self, tree: &mut Tree, node: NodeId, _ctx: &PhaseContext) -> NodeId {
        let media_types = default_media_types(tree);
        let Some(value) = tree.value(node) else {
            return node;
        };
        if media_types.is_empty() {
            return node;
        }
        let bodies = tree.add_like(NodeKind::Object, value);
        tree.set_child(node, 1, bodies);
        for (index, media_type) in media_types.into_iter().enumerate() {
            let declaration = if index == 0 { value } else { tree.deep_copy(value) };
            let key = tree.add_like(NodeKind::String(media_type), value);
            let pair = tree.add_pair(key, declaration);
            tree.set_role(pair, Role::Body);
            tree.push_child(bodies, pair);
        }
        node
    }
}

/// Methods, responses and traits carry `body`; a property named `body` does not.
fn owns_bodies(tree: &Tree, owner: NodeId) -> bool {
    if tree.role(owner) == Some(Role::Trait) {
        return true;
    }
    tree.parent(owner)
        .filter(|pair| tree.is_pair(*pair))
        .and_then(|pair| tree.role(pair))
        .map_or(false, |role| matches!(role, Role::Method | Role::Response))
}

/// The root `mediaType`, as a list.
fn default_media_types(tree: &Tree) -> Vec<String> {
    let Some(root) = tree.root() else {
        return Vec::new();
    };
    match tree.get(root, "mediaType") {
        Some(list) if tree.is_array(list) => tree
            .children(list)
            .iter()
            .filter_map(|item| tree.literal(*item))
            .collect(),
        Some(single) => tree.literal(single).into_iter().collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::grammar::GrammarPhase;
    use crate::phase::{testing, Phase, TransformationPhase};
    use crate::selector::NodeSelector;
    use crate::syntax::parse_yaml;

    fn run(text: &str) -> Tree {
        let ctx = testing::context("");
        let tree = parse_yaml(text).unwrap();
        let tree = GrammarPhase::new("grammar").apply(tree, &ctx).unwrap();
        TransformationPhase::new("media types")
            .with(MediaTypePhase)
            .apply(tree, &ctx)
            .unwrap()
    }

    fn select(tree: &Tree, path: &str) -> Option<NodeId> {
        NodeSelector::parse(path).select(tree, tree.root().unwrap())
    }

    #[test]
    fn default_media_types_wrap_bare_bodies() {
        let tree = run(
            "title: T\nmediaType: [application/json, application/xml]\n/a:\n  post:\n    body:\n      type: string\n    responses:\n      200:\n        body:\n          application/json:\n            type: integer\n",
        );
        let json = select(&tree, "/\\/a/post/body/application\\/json/type").unwrap();
        assert_eq!(tree.literal(json).as_deref(), Some("string"));
        assert!(select(&tree, "/\\/a/post/body/application\\/xml/type").is_some());
        let response = select(&tree, "/\\/a/post/responses/200/body").unwrap();
        assert_eq!(tree.pairs(response).len(), 1);
    }

    #[test]
    fn bodies_stay_bare_without_a_default() {
        let tree = run("title: T\n/a:\n  post:\n    body:\n      type: string\n");
        assert!(select(&tree, "/\\/a/post/body/type").is_some());
    }

    #[test]
    fn properties_named_body_are_left_alone() {
        let tree = run(
            "title: T\nmediaType: application/json\ntypes:\n  Mail:\n    properties:\n      body: string\n",
        );
        assert!(select(&tree, "/types/Mail/properties/body").map_or(false, |n| tree.literal(n).as_deref() == Some("string")));
    }
}
