//! Phase 7: examples are checked against the type that declares them.

use super::{PhaseContext, Transformer};
use crate::error::ValidationResult;
use crate::grammar::Grammar;
use crate::nodes::{ErrorCategory, NodeId, NodeKind, Role, Tree};
use crate::syntax::parse_yaml;
use crate::types::TypeRules;

/// Keys allowed next to `value` in an example wrapper, besides annotations.
const WRAPPER_KEYS: [&str; 4] = ["value", "strict", "displayName", "description"];

pub struct ExamplePhase;

impl Transformer for ExamplePhase {
    fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        tree.role(node) == Some(Role::Example)
            && !tree
                .ancestors(node)
                .into_iter()
                .any(|a| matches!(tree.role(a), Some(Role::Trait | Role::ResourceType)))
    }

    fn transform(&self, tree: &mut Tree, node: NodeId, ctx: &PhaseContext) -> NodeId {
        let Some(owner) = tree.ancestors(node).into_iter().find(|a| {
            matches!(
                tree.role(*a),
                Some(Role::TypeDeclaration | Role::AnnotationType)
            )
        }) else {
            return node;
        };
        let (payload, strict) = unwrap_example(tree, node);
        if !strict {
            return node;
        }

        let rules = &ctx.type_rules;
        if let NodeKind::String(text) = tree.kind(payload) {
            if matches!(rules.builtin_kind(tree, owner).as_str(), "object" | "array") {
                let text = text.clone();
                let problems = validate_payload(rules, &ctx.grammar, tree, owner, &text);
                if problems.is_empty() {
                    return node;
                }
                let messages: Vec<String> = problems.into_iter().map(|p| p.message).collect();
                let message = format!("Invalid example: {}", messages.join("; "));
                let error = tree.error_for(payload, ErrorCategory::Structural, message);
                return replace_payload(tree, node, payload, error);
            }
        }

        let result = rules.to_rule(tree, owner).transform(tree, payload, &ctx.grammar);
        replace_payload(tree, node, payload, result)
    }
}

/// The payload of an example and whether it is checked. `{value: ..}`
/// wrappers may turn checking off with `strict: false`.
fn unwrap_example(tree: &Tree, example: NodeId) -> (NodeId, bool) {
    if !tree.is_object(example) {
        return (example, true);
    }
    let Some(value) = tree.get(example, "value") else {
        return (example, true);
    };
    let wrapper = tree.pairs(example).into_iter().all(|pair| {
        tree.key_literal(pair).map_or(false, |key| {
            WRAPPER_KEYS.contains(&key.as_str()) || key.starts_with('(')
        })
    });
    if !wrapper {
        return (example, true);
    }
    let strict = !matches!(
        tree.get(example, "strict").map(|s| tree.kind(s)),
        Some(NodeKind::Boolean(false))
    );
    (value, strict)
}

fn replace_payload(tree: &mut Tree, example: NodeId, payload: NodeId, result: NodeId) -> NodeId {
    if payload == example {
        return result;
    }
    tree.replace(payload, result);
    example
}

/// Parses `payload` as JSON or YAML and checks it against `declaration`.
/// Positions in the results point into the payload text.
pub fn validate_payload(
    rules: &TypeRules,
    grammar: &Grammar,
    tree: &Tree,
    declaration: NodeId,
    payload: &str,
) -> Vec<ValidationResult> {
    let mut payload_tree = match parse_yaml(payload) {
        Ok(parsed) => parsed,
        Err(error) => {
            return vec![ValidationResult::new(
                error.message,
                ErrorCategory::Structural,
                error.position,
                error.position,
            )]
        }
    };
    let Some(root) = payload_tree.root() else {
        return Vec::new();
    };
    let rule = rules.to_rule(tree, declaration);
    let result = rule.transform(&mut payload_tree, root, grammar);
    payload_tree.set_root(result);
    payload_tree.validation_results()
}
