//! Phase 3, second half: type resolution.
//!
//! Every declaration that extends user-defined types gets one inherited
//! property set per combination of its base types: `type: [A | B, C]`
//! yields the sets `A,C` and `B,C`. Each set holds the local properties
//! followed by the properties of the combination's bases, recursively.

use std::collections::{HashMap, HashSet};

use super::{declared_name, PhaseContext, Transformer};
use crate::nodes::{ErrorCategory, InheritedProperties, NodeId, NodeKind, ReferenceKind, Role, Tree};
use crate::references;
use crate::types::{base_names, base_of, is_builtin, is_schema_text, TypeExpression};

pub struct TypeResolution;

impl Transformer for TypeResolution {
    fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        matches!(
            tree.role(node),
            Some(Role::TypeDeclaration) | Some(Role::AnnotationType)
        ) && matches!(tree.kind(node), NodeKind::Object | NodeKind::String(_))
    }

    fn transform(&self, tree: &mut Tree, node: NodeId, _ctx: &PhaseContext) -> NodeId {
        if in_template_declaration(tree, node) {
            return node;
        }
        let slots = match base_slots(tree, node) {
            Ok(slots) => slots,
            Err(failure) => return failure.apply(tree, node),
        };
        if let Some(failure) = missing_type(tree, &slots).or_else(|| cycle(tree, node, &slots)) {
            return failure.apply(tree, node);
        }
        if tree.is_object(node) {
            let sets = inherited_sets(tree, node, &slots);
            tree.node_mut(node).inherited = sets;
            check_property_counts(tree, node);
        }
        node
    }
}

/// An error to put in place of `target`.
struct Failure {
    target: NodeId,
    category: ErrorCategory,
    message: String,
}

impl Failure {
    /// Replaces the target; returns what should occupy the declaration's slot.
    fn apply(self, tree: &mut Tree, declaration: NodeId) -> NodeId {
        let error = tree.error_for(self.target, self.category, self.message);
        if self.target == declaration {
            return error;
        }
        tree.replace(self.target, error);
        declaration
    }
}

/// Trait and resource type bodies are resolved once applied.
fn in_template_declaration(tree: &Tree, node: NodeId) -> bool {
    tree.ancestors(node)
        .into_iter()
        .any(|a| matches!(tree.role(a), Some(Role::Trait) | Some(Role::ResourceType)))
}

/// The type expressions a declaration extends, with the node holding each.
fn base_slots(tree: &Tree, declaration: NodeId) -> Result<Vec<(NodeId, TypeExpression)>, Failure> {
    let holder = match tree.kind(declaration) {
        NodeKind::Object => match base_of(tree, declaration) {
            Some(base) => base,
            None => return Ok(Vec::new()),
        },
        _ => declaration,
    };
    let nodes: Vec<NodeId> = match tree.kind(holder) {
        NodeKind::String(_) => vec![holder],
        NodeKind::Array => tree.children(holder).to_vec(),
        _ => return Ok(Vec::new()),
    };
    let mut slots = Vec::new();
    for node in nodes {
        let NodeKind::String(text) = tree.kind(node) else {
            continue;
        };
        if is_schema_text(text) {
            continue;
        }
        match TypeExpression::parse(text) {
            Ok(expression) => slots.push((node, expression)),
            Err(error) => {
                return Err(Failure {
                    target: node,
                    category: ErrorCategory::Structural,
                    message: error.to_string(),
                })
            }
        }
    }
    Ok(slots)
}

fn missing_type(tree: &Tree, slots: &[(NodeId, TypeExpression)]) -> Option<Failure> {
    slots.iter().find_map(|(node, expression)| {
        expression
            .names()
            .into_iter()
            .find(|name| {
                !is_builtin(name)
                    && references::resolve_from_origin(tree, *node, ReferenceKind::Type, name)
                        .is_none()
            })
            .map(|name| Failure {
                target: *node,
                category: ErrorCategory::Reference,
                message: format!("Inexistent type '{}'", name),
            })
    })
}

/// Names a declaration inherits from: plain names and union members.
/// Array item types are not bases.
fn inheritance_names(expression: &TypeExpression) -> Vec<&str> {
    match expression {
        TypeExpression::Named(name) => vec![name.as_str()],
        TypeExpression::Union(alternatives) => {
            alternatives.iter().flat_map(inheritance_names).collect()
        }
        TypeExpression::Array(_) => Vec::new(),
    }
}

fn parsed_bases(tree: &Tree, declaration: NodeId) -> Vec<TypeExpression> {
    base_names(tree, declaration)
        .iter()
        .filter_map(|text| TypeExpression::parse(text).ok())
        .collect()
}

fn cycle(tree: &Tree, declaration: NodeId, slots: &[(NodeId, TypeExpression)]) -> Option<Failure> {
    let own_name = declared_name(tree, declaration).unwrap_or_else(|| "(anonymous)".to_string());
    let mut visited = HashSet::new();
    for (node, expression) in slots {
        for name in inheritance_names(expression) {
            let mut path = vec![own_name.clone()];
            if walk(tree, declaration, *node, name, &mut path, &mut visited) {
                return Some(Failure {
                    target: *node,
                    category: ErrorCategory::Composition,
                    message: format!("Cyclic type definition: {}", path.join(" -> ")),
                });
            }
        }
    }
    None
}

/// Follows `name` through the hierarchy; true when it leads back to
/// `origin`, with `path` holding the names on the way.
fn walk(
    tree: &Tree,
    origin: NodeId,
    from: NodeId,
    name: &str,
    path: &mut Vec<String>,
    visited: &mut HashSet<NodeId>,
) -> bool {
    if is_builtin(name) {
        return false;
    }
    let Some(target) = references::resolve_from_origin(tree, from, ReferenceKind::Type, name) else {
        return false;
    };
    path.push(name.to_string());
    if target == origin {
        return true;
    }
    if visited.insert(target) {
        for expression in parsed_bases(tree, target) {
            for next in inheritance_names(&expression) {
                if walk(tree, origin, target, next, path, visited) {
                    return true;
                }
            }
        }
    }
    path.pop();
    false
}

// ============================================================================
// INHERITED PROPERTY SETS
// ============================================================================

/// The alternatives of one slot: union members, or the expression itself.
fn alternatives(expression: &TypeExpression) -> Vec<TypeExpression> {
    match expression {
        TypeExpression::Union(members) => members.clone(),
        other => vec![other.clone()],
    }
}

/// Every pick of one alternative per slot, duplicates within a slot removed.
fn combinations(slots: &[(NodeId, TypeExpression)]) -> Vec<Vec<(NodeId, TypeExpression)>> {
    let mut result: Vec<Vec<(NodeId, TypeExpression)>> = vec![Vec::new()];
    for (node, expression) in slots {
        let mut seen = HashSet::new();
        let choices: Vec<TypeExpression> = alternatives(expression)
            .into_iter()
            .filter(|alternative| seen.insert(alternative.to_string()))
            .collect();
        result = result
            .into_iter()
            .flat_map(|prefix| {
                choices.iter().map(move |choice| {
                    let mut combination = prefix.clone();
                    combination.push((*node, choice.clone()));
                    combination
                })
            })
            .collect();
    }
    result
}

fn inherited_sets(
    tree: &mut Tree,
    declaration: NodeId,
    slots: &[(NodeId, TypeExpression)],
) -> Vec<InheritedProperties> {
    let extends_user_type = slots
        .iter()
        .any(|(_, e)| e.names().iter().any(|name| !is_builtin(name)));
    if !extends_user_type {
        return Vec::new();
    }
    let own = tree
        .get(declaration, "properties")
        .filter(|p| tree.is_object(*p))
        .map(|p| tree.pairs(p))
        .unwrap_or_default();

    let mut sets = Vec::new();
    for combination in combinations(slots) {
        let set = tree.add_like(NodeKind::Object, declaration);
        let mut slots_by_name = HashMap::new();
        for pair in &own {
            let copy = tree.deep_copy(*pair);
            tree.push_child(set, copy);
            if let Some(name) = property_name(tree, *pair) {
                slots_by_name.insert(name, OWN_SLOT);
            }
        }
        let mut visited = HashSet::new();
        visited.insert(declaration);
        for (index, (node, expression)) in combination.iter().enumerate() {
            for property in base_properties(tree, *node, expression, &mut visited) {
                add_property(tree, set, property, index + 1, &mut slots_by_name);
            }
        }
        let label: Vec<String> = combination.iter().map(|(_, e)| e.to_string()).collect();
        sets.push(InheritedProperties {
            label: label.join(","),
            properties: set,
        });
    }
    sets
}

/// Properties declared by the named type and, recursively, by its named
/// bases. Union bases contribute nothing here.
fn base_properties(
    tree: &Tree,
    from: NodeId,
    expression: &TypeExpression,
    visited: &mut HashSet<NodeId>,
) -> Vec<NodeId> {
    let TypeExpression::Named(name) = expression else {
        return Vec::new();
    };
    if is_builtin(name) {
        return Vec::new();
    }
    let Some(target) = references::resolve_from_origin(tree, from, ReferenceKind::Type, name) else {
        return Vec::new();
    };
    if !visited.insert(target) {
        return Vec::new();
    }
    let mut properties = match tree.get(target, "properties") {
        Some(own) if tree.is_object(own) => tree.pairs(own),
        _ => Vec::new(),
    };
    for base in parsed_bases(tree, target) {
        properties.extend(base_properties(tree, target, &base, visited));
    }
    properties
}

fn property_name(tree: &Tree, pair: NodeId) -> Option<String> {
    tree.key_literal(pair)
        .map(|key| key.strip_suffix('?').map(str::to_string).unwrap_or(key))
}

/// Slot of the declaration's own properties; base slots count from 1.
const OWN_SLOT: usize = 0;

/// Adds a copy of `property`, inherited through base slot `slot`, to `set`,
/// or a collision error when a different definition of the same name is
/// already there. Definitions arriving through the same slot collide inside
/// that base and are reported when the base itself is resolved.
fn add_property(
    tree: &mut Tree,
    set: NodeId,
    property: NodeId,
    slot: usize,
    slots_by_name: &mut HashMap<String, usize>,
) {
    let Some(name) = property_name(tree, property) else {
        return;
    };
    let existing = tree
        .pairs(set)
        .into_iter()
        .find(|pair| property_name(tree, *pair).as_deref() == Some(name.as_str()));
    match existing {
        Some(existing) if tree.to_json(existing) == tree.to_json(property) => {}
        Some(_) if slots_by_name.get(&name) == Some(&slot) => {}
        Some(existing) => {
            let message = format!(
                "Property definition {} overrides existing property: {}",
                tree.render(property),
                tree.render(existing)
            );
            let error = tree.error_for(property, ErrorCategory::Composition, message);
            tree.push_child(set, error);
        }
        None => {
            let copy = tree.deep_copy(property);
            tree.push_child(set, copy);
            slots_by_name.insert(name, slot);
        }
    }
}

/// `minProperties` and `maxProperties` against every property set.
fn check_property_counts(tree: &mut Tree, declaration: NodeId) {
    let counts: Vec<usize> = if tree.node(declaration).inherited.is_empty() {
        let own = tree
            .get(declaration, "properties")
            .filter(|p| tree.is_object(*p))
            .map_or(0, |p| tree.pairs(p).len());
        vec![own]
    } else {
        tree.node(declaration)
            .inherited
            .iter()
            .map(|set| tree.pairs(set.properties).len())
            .collect()
    };
    for (facet, label) in [("minProperties", "minimum"), ("maxProperties", "maximum")] {
        let Some(value) = tree.get(declaration, facet) else {
            continue;
        };
        let NodeKind::Integer(bound) = *tree.kind(value) else {
            continue;
        };
        let violation = counts.iter().copied().find(|count| {
            let count = *count as i64;
            if facet == "minProperties" {
                count < bound
            } else {
                count > bound
            }
        });
        if let Some(count) = violation {
            let message = format!(
                "Expected {} number of properties to be: {} but was: {}",
                label, bound, count
            );
            let error = tree.error_for(value, ErrorCategory::Composition, message);
            tree.replace(value, error);
        }
    }
}
