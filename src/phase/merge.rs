//! Deep merging of mappings, used to apply resource types and traits and to
//! lay extensions over their base document.

use crate::nodes::{NodeId, NodeKind, Tree};

/// Which side keeps a scalar when both define the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Values already in the target win; `key?` entries of the source only
    /// apply when the target has the key. Used for templates.
    TargetWins,
    /// Source values overwrite the target. Used for extensions.
    SourceWins,
}

/// Keys never copied from a template or extension.
const SKIPPED: [&str; 3] = ["usage", "uses", "extends"];

/// Merges the mapping `source` into the mapping `target`. `source` is left
/// untouched; copied entries are deep copies.
pub fn merge(tree: &mut Tree, target: NodeId, source: NodeId, policy: MergePolicy) {
    if !tree.is_object(target) || !tree.is_object(source) {
        return;
    }
    for pair in tree.pairs(source) {
        let (Some(key), Some(value)) = (tree.key_literal(pair), tree.value(pair)) else {
            continue;
        };
        if SKIPPED.contains(&key.as_str()) {
            continue;
        }
        let (name, optional) = match key.strip_suffix('?') {
            Some(name) if policy == MergePolicy::TargetWins => (name.to_string(), true),
            _ => (key.clone(), false),
        };
        match tree.get_pair(target, &name) {
            Some(existing) => merge_values(tree, existing, value, policy),
            None if optional => {}
            None => {
                let copy = tree.deep_copy(pair);
                if key != name {
                    if let Some(copied_key) = tree.key(copy) {
                        tree.set_kind(copied_key, NodeKind::String(name));
                    }
                }
                tree.push_child(target, copy);
            }
        }
    }
}

fn merge_values(tree: &mut Tree, existing: NodeId, incoming: NodeId, policy: MergePolicy) {
    let Some(current) = tree.value(existing) else {
        return;
    };
    let shapes = (tree.kind(current).clone(), tree.kind(incoming).clone());
    match shapes {
        (NodeKind::Object, NodeKind::Object) => merge(tree, current, incoming, policy),
        (NodeKind::Array, NodeKind::Array) => {
            let present: Vec<String> = tree
                .children(current)
                .iter()
                .map(|item| tree.render(*item))
                .collect();
            for item in tree.children(incoming).to_vec() {
                if !present.contains(&tree.render(item)) {
                    let copy = tree.deep_copy(item);
                    tree.push_child(current, copy);
                }
            }
        }
        (NodeKind::Null, _) => {
            let copy = tree.deep_copy(incoming);
            tree.set_child(existing, 1, copy);
        }
        (_, NodeKind::Null) => {}
        _ if policy == MergePolicy::SourceWins => {
            let copy = tree.deep_copy(incoming);
            tree.set_child(existing, 1, copy);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_yaml;

    fn merged(target: &str, source: &str, policy: MergePolicy) -> serde_json::Value {
        let mut tree = parse_yaml(target).unwrap();
        let target_root = tree.root().unwrap();
        let other = parse_yaml(source).unwrap();
        let source_root = tree.graft(&other, other.root().unwrap());
        merge(&mut tree, target_root, source_root, policy);
        tree.to_json(target_root)
    }

    #[test]
    fn templates_fill_gaps_without_overriding() {
        let result = merged(
            "description: mine\nget:\nis: [a]\n",
            "description: theirs\nusage: hidden\nget?:\n  description: list\npost?:\n  description: create\nis: [a, b]\nput:\n",
            MergePolicy::TargetWins,
        );
        assert_eq!(
            result,
            serde_json::json!({
                "description": "mine",
                "get": {"description": "list"},
                "is": ["a", "b"],
                "put": null
            })
        );
    }

    #[test]
    fn extensions_override_scalars() {
        let result = merged(
            "title: Base\nversion: v1\n/users:\n  get:\n    description: old\n",
            "title: Extended\nextends: base.raml\n/users:\n  get:\n    description: new\n  post:\n",
            MergePolicy::SourceWins,
        );
        assert_eq!(
            result,
            serde_json::json!({
                "title": "Extended",
                "version": "v1",
                "/users": {"get": {"description": "new"}, "post": null}
            })
        );
    }
}
