//! Resolution of declaration names (`secured`, `lib.Paged`) to the nodes that
//! declare them.

use crate::nodes::{NodeId, ReferenceKind, Role, Tree};
use crate::selector::NodeSelector;

/// The document or library whose declaration tables are visible from `node`.
pub fn scope_of(tree: &Tree, node: NodeId) -> NodeId {
    std::iter::once(node)
        .chain(tree.ancestors(node))
        .find(|n| matches!(tree.role(*n), Some(Role::Library) | Some(Role::Document)))
        .unwrap_or_else(|| tree.top(node))
}

/// Finds the declaration `name` of the given kind as seen from `from`.
///
/// `lib.Name` looks inside the library bound to `lib` under `uses`. Types
/// fall back to the legacy `schemas` table. A node whose role disagrees with
/// the kind is not a match.
pub fn resolve(tree: &Tree, from: NodeId, kind: ReferenceKind, name: &str) -> Option<NodeId> {
    let scope = scope_of(tree, from);
    let mut tables = vec![kind.table()];
    if kind == ReferenceKind::Type {
        tables.push("schemas");
    }
    let found = tables.iter().find_map(|table| {
        let local = NodeSelector::from_keys([*table, name]).select(tree, scope);
        local.or_else(|| {
            let (library, declared) = name.split_once('.')?;
            NodeSelector::from_keys(["uses", library, *table, declared]).select(tree, scope)
        })
    })?;
    match tree.role(found) {
        Some(role) if role != kind.role() => None,
        _ => Some(found),
    }
}

/// Like [`resolve`], then retried from the nodes `from` was copied from, so
/// bodies applied from a library keep seeing that library's declarations.
pub fn resolve_from_origin(
    tree: &Tree,
    from: NodeId,
    kind: ReferenceKind,
    name: &str,
) -> Option<NodeId> {
    let mut current = Some(from);
    while let Some(node) = current {
        if let Some(found) = resolve(tree, node, kind, name) {
            return Some(found);
        }
        current = tree.node(node).source;
    }
    None
}

/// Every name a reference of `kind` could use from the document root,
/// library declarations qualified with their `uses` alias.
pub fn declaration_names(tree: &Tree, kind: ReferenceKind) -> Vec<String> {
    let Some(root) = tree.root() else {
        return Vec::new();
    };
    let mut names = table_keys(tree, root, kind.table());
    if let Some(uses) = tree.get(root, "uses") {
        if tree.is_object(uses) {
            for pair in tree.pairs(uses) {
                let (Some(alias), Some(library)) = (tree.key_literal(pair), tree.value(pair))
                else {
                    continue;
                };
                for name in table_keys(tree, library, kind.table()) {
                    names.push(format!("{}.{}", alias, name));
                }
            }
        }
    }
    names
}

fn table_keys(tree: &Tree, scope: NodeId, table: &str) -> Vec<String> {
    tree.get(scope, table)
        .map(|declarations| {
            tree.pairs(declarations)
                .into_iter()
                .filter_map(|pair| tree.key_literal(pair))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_yaml;

    const DOC: &str = "\
traits:
  secured:
    description: needs a token
types:
  User:
    type: object
schemas:
  Legacy: string
uses:
  lib:
    traits:
      paged:
        queryParameters:
          page: integer
";

    #[test]
    fn local_and_library_names_resolve() {
        let tree = parse_yaml(DOC).unwrap();
        let root = tree.root().unwrap();
        let secured = resolve(&tree, root, ReferenceKind::Trait, "secured").unwrap();
        assert_eq!(
            tree.get_literal(secured, "description").as_deref(),
            Some("needs a token")
        );
        assert!(resolve(&tree, root, ReferenceKind::Trait, "lib.paged").is_some());
        assert!(resolve(&tree, root, ReferenceKind::Trait, "missing").is_none());
        assert!(resolve(&tree, root, ReferenceKind::Type, "Legacy").is_some());
        assert!(resolve(&tree, root, ReferenceKind::ResourceType, "secured").is_none());
    }

    #[test]
    fn role_mismatch_is_not_a_match() {
        let mut tree = parse_yaml(DOC).unwrap();
        let root = tree.root().unwrap();
        let secured = resolve(&tree, root, ReferenceKind::Trait, "secured").unwrap();
        tree.set_role(secured, Role::ResourceType);
        assert!(resolve(&tree, root, ReferenceKind::Trait, "secured").is_none());
    }

    #[test]
    fn copies_resolve_through_their_origin() {
        let mut tree = parse_yaml(DOC).unwrap();
        let root = tree.root().unwrap();
        let library = NodeSelector::parse("/uses/lib").select(&tree, root).unwrap();
        tree.set_role(library, Role::Library);
        let paged = resolve(&tree, root, ReferenceKind::Trait, "lib.paged").unwrap();
        let copy = tree.deep_copy(paged);
        tree.push_child(root, copy);
        assert!(resolve(&tree, copy, ReferenceKind::Trait, "paged").is_none());
        assert_eq!(
            resolve_from_origin(&tree, copy, ReferenceKind::Trait, "paged"),
            Some(paged)
        );
    }

    #[test]
    fn names_include_library_aliases() {
        let tree = parse_yaml(DOC).unwrap();
        assert_eq!(
            declaration_names(&tree, ReferenceKind::Trait),
            vec!["secured".to_string(), "lib.paged".to_string()]
        );
    }
}
