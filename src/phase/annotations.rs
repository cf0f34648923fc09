//! Phase 5: annotation references, targets and values.

use super::{PhaseContext, Transformer};
use crate::nodes::{ErrorCategory, NodeId, ReferenceKind, Role, Tree};
use crate::references;

pub struct AnnotationPhase;

impl Transformer for AnnotationPhase {
    fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        tree.role(node) == Some(Role::Annotation) && tree.is_pair(node)
    }

    fn transform(&self, tree: &mut Tree, node: NodeId, ctx: &PhaseContext) -> NodeId {
        let Some(key) = tree.key_literal(node) else {
            return node;
        };
        let name = key.trim_start_matches('(').trim_end_matches(')').to_string();
        let Some(declaration) =
            references::resolve_from_origin(tree, node, ReferenceKind::AnnotationType, &name)
        else {
            let message = format!("Reference to undefined annotation type '{}'", name);
            return tree.error_for(node, ErrorCategory::Reference, message);
        };

        let allowed = allowed_targets(tree, declaration);
        if !allowed.is_empty() {
            let target = tree.parent(node).and_then(|owner| target_of(tree, owner));
            if !target.map_or(false, |t| allowed.iter().any(|a| a == t)) {
                let message = format!(
                    "Annotation '{}' is not allowed on {}. Allowed targets: {}",
                    name,
                    target.unwrap_or("this node"),
                    allowed.join(", ")
                );
                return tree.error_for(node, ErrorCategory::Structural, message);
            }
        }

        let Some(value) = tree.value(node) else {
            return node;
        };
        let rule = ctx.type_rules.to_rule(tree, declaration);
        let result = rule.transform(tree, value, &ctx.grammar);
        tree.set_child(node, 1, result);
        node
    }
}

fn allowed_targets(tree: &Tree, declaration: NodeId) -> Vec<String> {
    if !tree.is_object(declaration) {
        return Vec::new();
    }
    match tree.get(declaration, "allowedTargets") {
        Some(list) if tree.is_array(list) => tree
            .children(list)
            .iter()
            .filter_map(|item| tree.literal(*item))
            .collect(),
        Some(single) => tree.literal(single).into_iter().collect(),
        None => Vec::new(),
    }
}

/// The annotation target name of the mapping that holds an annotation.
pub(crate) fn target_of(tree: &Tree, owner: NodeId) -> Option<&'static str> {
    let by_role = |role: Role| match role {
        Role::Document => Some("API"),
        Role::Library => Some("Library"),
        Role::TypeDeclaration => Some("TypeDeclaration"),
        Role::AnnotationType => Some("AnnotationType"),
        Role::Trait => Some("Trait"),
        Role::ResourceType => Some("ResourceType"),
        Role::SecurityScheme => Some("SecurityScheme"),
        Role::DocumentationItem => Some("DocumentationItem"),
        Role::Example => Some("Example"),
        _ => None,
    };
    if let Some(target) = tree.role(owner).and_then(by_role) {
        return Some(target);
    }
    let pair = tree.parent(owner).filter(|p| tree.is_pair(*p))?;
    match tree.role(pair)? {
        Role::Resource => Some("Resource"),
        Role::Method => Some("Method"),
        Role::Response => Some("Response"),
        Role::Body => {
            let in_response = tree
                .ancestors(pair)
                .into_iter()
                .any(|a| tree.role(a) == Some(Role::Response));
            Some(if in_response { "ResponseBody" } else { "RequestBody" })
        }
        _ => None,
    }
}
