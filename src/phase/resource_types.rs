//! Phase 3, first half: reference checks, then resource type and trait
//! application.
//!
//! Applying a resource type or trait copies its declaration, expands the
//! `<<parameters>>` in the copy and merges it under the resource or method.
//! Values already present on the resource win; `key?` entries only apply
//! when the resource defines `key`.

use super::merge::{merge, MergePolicy};
use super::{PhaseContext, Transformer};
use crate::grammar::raml10::METHODS;
use crate::nodes::{ErrorCategory, NodeId, NodeKind, ReferenceKind, Role, Tree};
use crate::references;
use crate::template::{self, Parameters};

// ============================================================================
// REFERENCE CHECK
// ============================================================================

/// Turns every reference that names no declaration into an error node.
pub struct ReferenceCheck;

impl Transformer for ReferenceCheck {
    fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        matches!(tree.kind(node), NodeKind::Reference(..))
    }

    fn transform(&self, tree: &mut Tree, node: NodeId, _ctx: &PhaseContext) -> NodeId {
        let NodeKind::Reference(kind, name) = tree.kind(node) else {
            return node;
        };
        let (kind, name) = (*kind, name.clone());
        if template::contains_template(&name)
            || references::resolve_from_origin(tree, node, kind, &name).is_some()
        {
            return node;
        }
        let message = format!("Reference to undefined {} '{}'", kind.label(), name);
        tree.error_for(node, ErrorCategory::Reference, message)
    }
}

// ============================================================================
// APPLICATION
// ============================================================================

/// Applies the resource type and traits of every resource.
pub struct ResourceTypesAndTraits;

impl Transformer for ResourceTypesAndTraits {
    fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        tree.role(node) == Some(Role::Resource) && tree.is_pair(node)
    }

    fn transform(&self, tree: &mut Tree, node: NodeId, _ctx: &PhaseContext) -> NodeId {
        let Some(resource) = tree.value(node) else {
            return node;
        };
        if !tree.is_object(resource) {
            return node;
        }
        let path = resource_path(tree, node);
        let mut params = Parameters::new();
        params.insert("resourcePathName".to_string(), resource_path_name(&path));
        params.insert("resourcePath".to_string(), path);

        let mut chain = Vec::new();
        if let Some(message) = apply_resource_type(tree, resource, &params, &mut chain) {
            if let Some(type_node) = tree.get(resource, "type") {
                let error = tree.error_for(type_node, ErrorCategory::Composition, message);
                tree.replace(type_node, error);
            }
        }
        apply_traits(tree, resource, &params);
        node
    }
}

/// Keys of the enclosing resources joined outermost first.
fn resource_path(tree: &Tree, pair: NodeId) -> String {
    let mut segments: Vec<String> = std::iter::once(pair)
        .chain(tree.ancestors(pair))
        .filter(|n| tree.role(*n) == Some(Role::Resource) && tree.is_pair(*n))
        .filter_map(|n| tree.key_literal(n))
        .collect();
    segments.reverse();
    segments.concat()
}

/// The rightmost path segment that is not a URI parameter.
fn resource_path_name(path: &str) -> String {
    path.rsplit('/')
        .find(|segment| !segment.is_empty() && !segment.contains('{'))
        .unwrap_or("")
        .to_string()
}

/// Name and explicit arguments of a `type` or `is` entry. Entries produced
/// by template expansion may still be plain strings or mappings.
fn reference_call(tree: &Tree, node: NodeId) -> Option<(String, Parameters)> {
    let (name, arguments) = match tree.kind(node) {
        NodeKind::Reference(_, name) => (name.clone(), tree.child(node, 0)),
        NodeKind::String(name) => (name.trim().to_string(), None),
        NodeKind::Object => {
            let pairs = tree.pairs(node);
            let [pair] = pairs.as_slice() else {
                return None;
            };
            (tree.key_literal(*pair)?, tree.value(*pair))
        }
        _ => return None,
    };
    let mut params = Parameters::new();
    if let Some(arguments) = arguments.filter(|a| tree.is_object(*a)) {
        for pair in tree.pairs(arguments) {
            if let (Some(key), Some(value)) = (tree.key_literal(pair), tree.value(pair)) {
                params.insert(key, tree.literal(value).unwrap_or_else(|| tree.render(value)));
            }
        }
    }
    Some((name, params))
}

/// Copies the declaration `name` resolves to and expands its templates.
/// Calls inside detached copies resolve through the node they were copied
/// from.
fn instantiate(
    tree: &mut Tree,
    call: NodeId,
    kind: ReferenceKind,
    name: &str,
    params: &Parameters,
) -> Option<NodeId> {
    let declaration = references::resolve_from_origin(tree, call, kind, name)?;
    if !tree.is_object(declaration) {
        return None;
    }
    let copy = tree.deep_copy(declaration);
    template::apply(tree, copy, params);
    Some(copy)
}

/// Merges the resource type of `target`, and the types it extends, into
/// `target`. Returns the message for a cyclic chain of resource types.
fn apply_resource_type(
    tree: &mut Tree,
    target: NodeId,
    params: &Parameters,
    chain: &mut Vec<String>,
) -> Option<String> {
    let type_node = tree.get(target, "type")?;
    let (name, arguments) = reference_call(tree, type_node)?;
    if template::contains_template(&name) {
        return None;
    }
    if chain.contains(&name) {
        let mut cycle = chain.clone();
        cycle.push(name);
        return Some(format!("Cyclic resource type definition: {}", cycle.join(" -> ")));
    }
    let mut call_params = params.clone();
    call_params.extend(arguments);
    let copy = instantiate(tree, type_node, ReferenceKind::ResourceType, &name, &call_params)?;
    chain.push(name);
    let cycle = apply_resource_type(tree, copy, params, chain);
    chain.pop();
    if cycle.is_some() {
        return cycle;
    }
    merge(tree, target, copy, MergePolicy::TargetWins);
    None
}

fn is_entries(tree: &Tree, owner: NodeId) -> Vec<NodeId> {
    match tree.get(owner, "is") {
        Some(list) if tree.is_array(list) => tree.children(list).to_vec(),
        _ => Vec::new(),
    }
}

fn apply_traits(tree: &mut Tree, resource: NodeId, params: &Parameters) {
    let inherited = is_entries(tree, resource);
    for method in tree.pairs(resource) {
        let Some(method_name) = tree.key_literal(method) else {
            continue;
        };
        if !METHODS.contains(&method_name.as_str()) {
            continue;
        }
        let Some(mut body) = tree.value(method) else {
            continue;
        };
        let mut calls = is_entries(tree, body);
        calls.extend(inherited.iter().copied());
        if calls.is_empty() {
            continue;
        }
        if matches!(tree.kind(body), NodeKind::Null) {
            let empty = tree.add_like(NodeKind::Object, body);
            tree.set_child(method, 1, empty);
            body = empty;
        }
        if !tree.is_object(body) {
            continue;
        }

        let mut applied: Vec<String> = Vec::new();
        for call in calls {
            let Some((name, arguments)) = reference_call(tree, call) else {
                continue;
            };
            if template::contains_template(&name) || applied.contains(&name) {
                continue;
            }
            let mut call_params = params.clone();
            call_params.insert("methodName".to_string(), method_name.clone());
            call_params.extend(arguments);
            if let Some(copy) = instantiate(tree, call, ReferenceKind::Trait, &name, &call_params) {
                merge(tree, body, copy, MergePolicy::TargetWins);
            }
            applied.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::grammar::GrammarPhase;
    use crate::phase::includes::IncludePhase;
    use crate::phase::{Phase, TransformationPhase};
    use crate::phase::testing;
    use crate::selector::NodeSelector;
    use crate::syntax::parse_yaml;

    fn expand(text: &str) -> Tree {
        let ctx = testing::context("api.raml");
        let mut tree = parse_yaml(text).unwrap();
        for phase in [
            Box::new(IncludePhase) as Box<dyn Phase>,
            Box::new(GrammarPhase::new("grammar")),
            Box::new(TransformationPhase::new("references").with(ReferenceCheck)),
            Box::new(TransformationPhase::new("resource types").with(ResourceTypesAndTraits)),
        ] {
            tree = phase.apply(tree, &ctx).unwrap();
        }
        tree
    }

    fn literal(tree: &Tree, path: &str) -> Option<String> {
        NodeSelector::parse(path)
            .select(tree, tree.root().unwrap())
            .and_then(|n| tree.literal(n))
    }

    fn messages(tree: &Tree) -> Vec<String> {
        tree.validation_results().into_iter().map(|r| r.message).collect()
    }

    const API: &str = "\
title: Shop
resourceTypes:
  collection:
    description: All <<resourcePathName>>
    get?:
      description: List <<resourcePathName | !uppercase>>
    post?:
      description: Create one <<item>>
traits:
  paged:
    queryParameters:
      <<prefix>>page: integer
  secured:
    headers:
      token: string
    description: Secured <<methodName>>
/products:
  type: { collection: { item: product } }
  is: [ secured ]
  get:
    is: [ { paged: { prefix: x- } } ]
  /{id}/reviews:
    type: { collection: { item: review } }
    post:
      description: Write a review
";

    #[test]
    fn resource_types_fill_in_optional_methods() {
        let tree = expand(API);
        assert!(messages(&tree).is_empty(), "{:?}", messages(&tree));
        assert_eq!(literal(&tree, "/\\/products/description").as_deref(), Some("All products"));
        assert_eq!(
            literal(&tree, "/\\/products/get/description").as_deref(),
            Some("List PRODUCTS")
        );
        assert!(literal(&tree, "/\\/products/post").is_none());
        assert_eq!(
            literal(&tree, "/\\/products/\\/{id}\\/reviews/description").as_deref(),
            Some("All reviews")
        );
        assert_eq!(
            literal(&tree, "/\\/products/\\/{id}\\/reviews/post/description").as_deref(),
            Some("Write a review")
        );
    }

    #[test]
    fn traits_apply_method_level_first() {
        let tree = expand(API);
        assert_eq!(
            literal(&tree, "/\\/products/get/queryParameters/x-page").as_deref(),
            Some("integer")
        );
        assert_eq!(
            literal(&tree, "/\\/products/get/headers/token").as_deref(),
            Some("string")
        );
        assert_eq!(
            literal(&tree, "/\\/products/get/description").as_deref(),
            Some("List PRODUCTS")
        );
    }

    #[test]
    fn resource_paths_and_names() {
        assert_eq!(resource_path_name("/products/{id}/reviews"), "reviews");
        assert_eq!(resource_path_name("/products/{id}"), "products");
        assert_eq!(resource_path_name("/{id}"), "");
    }

    #[test]
    fn undefined_references_become_one_error() {
        let tree = expand("title: T\ntraits:\n/a:\n  get:\n    is: [notDefined]\n");
        assert_eq!(messages(&tree), vec!["Reference to undefined trait 'notDefined'"]);
    }

    #[test]
    fn cyclic_resource_types_are_reported() {
        let tree = expand(
            "title: T\nresourceTypes:\n  a:\n    type: b\n  b:\n    type: a\n/x:\n  type: a\n",
        );
        assert_eq!(
            messages(&tree),
            vec!["Cyclic resource type definition: a -> b -> a"]
        );
    }

    #[test]
    fn missing_parameters_are_template_errors() {
        let tree = expand(
            "title: T\nresourceTypes:\n  base:\n    description: <<thing>>\n/a:\n  type: base\n",
        );
        assert_eq!(messages(&tree), vec!["Cannot resolve parameter 'thing'"]);
    }
}
