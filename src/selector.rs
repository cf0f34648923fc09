//! Slash separated paths into a tree.
//!
//! `/types/User/properties` starts at the document root, `..` climbs to the
//! enclosing mapping or sequence, `*` tries the rest of the path on each
//! element and an integer indexes into a sequence. A `/` that belongs to a
//! key is written `\/`, so the resource `/users` is reached with `/\/users`.

use std::fmt;

use crate::nodes::{NodeId, Tree};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Parent,
    Wildcard,
    Key(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSelector {
    absolute: bool,
    steps: Vec<Step>,
}

impl NodeSelector {
    pub fn parse(expression: &str) -> NodeSelector {
        let absolute = expression.starts_with('/');
        let mut steps = Vec::new();
        let mut token = String::new();
        let mut chars = expression.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'/') => {
                    token.push('/');
                    chars.next();
                }
                '/' => push_step(&mut steps, &mut token),
                _ => token.push(c),
            }
        }
        push_step(&mut steps, &mut token);
        NodeSelector { absolute, steps }
    }

    /// Builds a relative selector from raw key names, escaping any `/`.
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> NodeSelector {
        NodeSelector {
            absolute: false,
            steps: keys
                .into_iter()
                .map(|key| Step::Key(key.to_string()))
                .collect(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Evaluates the path from `from`, or from the top of its tree when the
    /// selector is absolute.
    pub fn select(&self, tree: &Tree, from: NodeId) -> Option<NodeId> {
        let start = if self.absolute { tree.top(from) } else { from };
        select_steps(tree, start, &self.steps)
    }
}

fn push_step(steps: &mut Vec<Step>, token: &mut String) {
    if token.is_empty() {
        return;
    }
    let step = match token.as_str() {
        ".." => Step::Parent,
        "*" => Step::Wildcard,
        _ => Step::Key(token.clone()),
    };
    steps.push(step);
    token.clear();
}

fn select_steps(tree: &Tree, node: NodeId, steps: &[Step]) -> Option<NodeId> {
    let Some((step, rest)) = steps.split_first() else {
        return Some(node);
    };
    // A pair stands for its value.
    let node = if tree.is_pair(node) {
        tree.value(node)?
    } else {
        node
    };
    match step {
        Step::Parent => {
            let mut parent = tree.parent(node)?;
            while tree.is_pair(parent) {
                parent = tree.parent(parent)?;
            }
            select_steps(tree, parent, rest)
        }
        Step::Wildcard => {
            let elements: Vec<NodeId> = if tree.is_array(node) {
                tree.children(node).to_vec()
            } else if tree.is_object(node) {
                tree.pairs(node)
                    .into_iter()
                    .filter_map(|pair| tree.value(pair))
                    .collect()
            } else {
                return None;
            };
            elements
                .into_iter()
                .find_map(|element| select_steps(tree, element, rest))
        }
        Step::Key(key) => {
            let next = if tree.is_array(node) {
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| tree.child(node, index))
            } else {
                tree.get(node, key)
            }?;
            select_steps(tree, next, rest)
        }
    }
}

impl fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .steps
            .iter()
            .map(|step| match step {
                Step::Parent => "..".to_string(),
                Step::Wildcard => "*".to_string(),
                Step::Key(key) => key.replace('/', "\\/"),
            })
            .collect();
        if self.absolute {
            f.write_str("/")?;
        }
        f.write_str(&parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_yaml;

    const DOC: &str = "\
title: Test
types:
  User:
    properties:
      name: string
/users:
  get:
    description: all users
list:
  - a
  - b
items:
  - id: 1
  - id: 2
    name: second
";

    fn literal_at(expression: &str) -> Option<String> {
        let tree = parse_yaml(DOC).unwrap();
        let root = tree.root().unwrap();
        NodeSelector::parse(expression)
            .select(&tree, root)
            .and_then(|n| tree.literal(n))
    }

    #[test]
    fn absolute_paths_walk_from_the_root() {
        assert_eq!(literal_at("/title").as_deref(), Some("Test"));
        assert_eq!(
            literal_at("/types/User/properties/name").as_deref(),
            Some("string")
        );
        assert_eq!(literal_at("/missing"), None);
    }

    #[test]
    fn escaped_slashes_stay_inside_keys() {
        assert_eq!(
            literal_at("/\\/users/get/description").as_deref(),
            Some("all users")
        );
    }

    #[test]
    fn indexes_and_wildcards_walk_sequences() {
        assert_eq!(literal_at("/list/1").as_deref(), Some("b"));
        assert_eq!(literal_at("/items/*/name").as_deref(), Some("second"));
        assert_eq!(literal_at("/items/*/missing"), None);
    }

    #[test]
    fn parent_steps_climb_to_the_enclosing_mapping() {
        let tree = parse_yaml(DOC).unwrap();
        let root = tree.root().unwrap();
        let user = NodeSelector::parse("/types/User").select(&tree, root).unwrap();
        let title = NodeSelector::parse("../../title").select(&tree, user);
        assert_eq!(title.and_then(|n| tree.literal(n)).as_deref(), Some("Test"));
    }

    #[test]
    fn display_escapes_keys() {
        let selector = NodeSelector::parse("/\\/users/get");
        assert!(selector.is_absolute());
        assert_eq!(selector.to_string(), "/\\/users/get");
        assert_eq!(NodeSelector::from_keys(["/a", "b"]).to_string(), "\\/a/b");
    }
}
