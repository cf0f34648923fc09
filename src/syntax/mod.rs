//! Text to tree: document header detection and the positioned YAML reader.

pub mod header;
mod reader;

use thiserror::Error;

use crate::nodes::{Position, Tree};

pub use header::{Fragment, HeaderError, RamlHeader};
pub(crate) use reader::plain_kind;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {position}")]
pub struct SyntaxError {
    pub message: String,
    pub position: Position,
}

/// Parses YAML (or JSON) text into a positioned tree.
pub fn parse_yaml(text: &str) -> Result<Tree, SyntaxError> {
    reader::Reader::new(text).read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeKind;

    fn root_of(text: &str) -> (Tree, crate::nodes::NodeId) {
        let tree = parse_yaml(text).unwrap();
        let root = tree.root().unwrap();
        (tree, root)
    }

    #[test]
    fn block_mapping_with_nested_values() {
        let text = "#%RAML 1.0\ntitle: My API\n/users:\n  get:\n    description: List\n";
        let (tree, root) = root_of(text);
        assert_eq!(tree.get_literal(root, "title").as_deref(), Some("My API"));
        let users = tree.get(root, "/users").unwrap();
        let get = tree.get(users, "get").unwrap();
        assert_eq!(tree.get_literal(get, "description").as_deref(), Some("List"));
    }

    #[test]
    fn positions_are_tracked() {
        let (tree, root) = root_of("a: 1\nbb: hello\n");
        let pair = tree.get_pair(root, "bb").unwrap();
        let value = tree.value(pair).unwrap();
        assert_eq!(tree.start(pair), Position::new(1, 0, 5));
        assert_eq!(tree.start(value), Position::new(1, 4, 9));
        assert_eq!(tree.end(value), Position::new(1, 9, 14));
        assert_eq!(tree.end(root).index, 14);
    }

    #[test]
    fn block_collections_end_at_their_last_entry() {
        let (tree, root) = root_of("items:\n  - a\n  - bb\nm:\n  x: 1\n  y: 22\n");
        let items = tree.get(root, "items").unwrap();
        assert_eq!(tree.end(items), Position::new(2, 6, 19));
        let m = tree.get(root, "m").unwrap();
        assert_eq!(tree.end(m), Position::new(5, 7, 37));
    }

    #[test]
    fn scalars_are_typed() {
        let (tree, root) = root_of("a: 200\nb: 1.5\nc: true\nd: ~\ne: '200'\nf: v1\n");
        assert_eq!(tree.kind(tree.get(root, "a").unwrap()), &NodeKind::Integer(200));
        assert_eq!(tree.kind(tree.get(root, "b").unwrap()), &NodeKind::Float(1.5));
        assert_eq!(tree.kind(tree.get(root, "c").unwrap()), &NodeKind::Boolean(true));
        assert_eq!(tree.kind(tree.get(root, "d").unwrap()), &NodeKind::Null);
        assert_eq!(tree.kind(tree.get(root, "e").unwrap()), &NodeKind::String("200".into()));
        assert_eq!(tree.kind(tree.get(root, "f").unwrap()), &NodeKind::String("v1".into()));
    }

    #[test]
    fn sequences_and_flow_collections() {
        let text = "list:\n- a\n- key: 1\n  other: 2\nflow: [x, {y: 1}]\nempty:\n";
        let (tree, root) = root_of(text);
        let list = tree.get(root, "list").unwrap();
        assert_eq!(tree.children(list).len(), 2);
        let second = tree.children(list)[1];
        assert_eq!(tree.get_literal(second, "other").as_deref(), Some("2"));
        let flow = tree.get(root, "flow").unwrap();
        assert_eq!(tree.to_json(flow), serde_json::json!(["x", {"y": 1}]));
        assert_eq!(tree.kind(tree.get(root, "empty").unwrap()), &NodeKind::Null);
    }

    #[test]
    fn block_scalars_keep_lines() {
        let text = "literal: |\n  one\n  two\nfolded: >-\n  one\n  two\nnext: x\n";
        let (tree, root) = root_of(text);
        assert_eq!(tree.get_literal(root, "literal").as_deref(), Some("one\ntwo\n"));
        assert_eq!(tree.get_literal(root, "folded").as_deref(), Some("one two"));
        assert_eq!(tree.get_literal(root, "next").as_deref(), Some("x"));
    }

    #[test]
    fn include_tags_become_include_nodes() {
        let (tree, root) = root_of("types:\n  User: !include types/user.raml\n");
        let types = tree.get(root, "types").unwrap();
        let user = tree.get(types, "User").unwrap();
        assert_eq!(tree.kind(user), &NodeKind::Include("types/user.raml".into()));
    }

    #[test]
    fn json_documents_are_accepted() {
        let (tree, root) = root_of("{\n  \"name\": \"x\",\n  \"tags\": [1, 2]\n}\n");
        assert_eq!(tree.to_json(root), serde_json::json!({"name": "x", "tags": [1, 2]}));
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(parse_yaml("title: x\nd\n").is_err());
        assert!(parse_yaml("a: [1, 2\n").is_err());
        assert!(parse_yaml("a: \"open\n").is_err());
    }
}
