//! Derives a payload validation rule from a type declaration.
//!
//! The derived rule is plain data: it can be evaluated against a node of any
//! tree, which is how examples (inside the document) and payloads (parsed
//! separately) share one code path.

use std::sync::Arc;

use super::{base_of, is_builtin, is_schema_text, TypeExpression};
use crate::grammar::{KeyValueRule, ObjectRule, Rule};
use crate::nodes::{NodeId, NodeKind, ReferenceKind, Tree};
use crate::references;
use crate::schema::SchemaValidator;

/// Past this nesting the derived rule accepts anything.
const MAX_DEPTH: usize = 32;

/// Rule factory bound to the validators used for inline schemas.
#[derive(Clone)]
pub struct TypeRules {
    json: Arc<dyn SchemaValidator>,
    xml: Arc<dyn SchemaValidator>,
}

impl TypeRules {
    pub fn new(json: Arc<dyn SchemaValidator>, xml: Arc<dyn SchemaValidator>) -> Self {
        Self { json, xml }
    }

    /// The rule a value must satisfy to be an instance of `declaration`.
    pub fn to_rule(&self, tree: &Tree, declaration: NodeId) -> Rule {
        self.declaration_rule(tree, declaration, 0)
    }

    /// The built-in kind a declaration eventually extends: `string`,
    /// `object`, `array`, `union`, ... or `any` when nothing says otherwise.
    pub fn builtin_kind(&self, tree: &Tree, declaration: NodeId) -> String {
        builtin_kind(tree, declaration, 0)
    }

    fn declaration_rule(&self, tree: &Tree, declaration: NodeId, depth: usize) -> Rule {
        if depth > MAX_DEPTH {
            return Rule::any();
        }
        match tree.kind(declaration) {
            NodeKind::Object => self.object_declaration_rule(tree, declaration, depth),
            _ => self.type_value_rule(tree, declaration, depth),
        }
    }

    /// Rule for the value of a `type` facet, or a shorthand declaration.
    fn type_value_rule(&self, tree: &Tree, value: NodeId, depth: usize) -> Rule {
        match tree.kind(value) {
            NodeKind::String(text) | NodeKind::StringTemplate(text) => {
                if is_schema_text(text) {
                    return self.schema_rule(text);
                }
                match TypeExpression::parse(text) {
                    Ok(expression) => self.expression_rule(tree, value, &expression, depth),
                    Err(_) => Rule::any(),
                }
            }
            NodeKind::Array => {
                let bases: Vec<Rule> = tree
                    .children(value)
                    .iter()
                    .map(|base| self.type_value_rule(tree, *base, depth + 1))
                    .collect();
                all_of(bases)
            }
            NodeKind::Object => self.declaration_rule(tree, value, depth + 1),
            _ => Rule::any(),
        }
    }

    fn expression_rule(
        &self,
        tree: &Tree,
        scope: NodeId,
        expression: &TypeExpression,
        depth: usize,
    ) -> Rule {
        match expression {
            TypeExpression::Named(name) if is_builtin(name) => builtin_rule(name),
            TypeExpression::Named(name) => {
                match references::resolve(tree, scope, ReferenceKind::Type, name) {
                    Some(target) => self.declaration_rule(tree, target, depth + 1),
                    None => Rule::any(),
                }
            }
            TypeExpression::Array(item) => {
                Rule::array(self.expression_rule(tree, scope, item, depth + 1))
            }
            TypeExpression::Union(alternatives) => Rule::union(
                alternatives
                    .iter()
                    .map(|a| self.expression_rule(tree, scope, a, depth + 1))
                    .collect(),
            ),
        }
    }

    fn object_declaration_rule(&self, tree: &Tree, declaration: NodeId, depth: usize) -> Rule {
        let base = base_of(tree, declaration);
        if let Some(text) = base.and_then(|b| tree.text(b)) {
            if is_schema_text(text) {
                return self.schema_rule(text);
            }
        }
        let kind = builtin_kind(tree, declaration, depth);
        let mut rules = Vec::new();
        if kind == "object" {
            rules.push(self.object_rule(tree, declaration, depth));
        } else if let Some(base) = base {
            rules.push(self.type_value_rule(tree, base, depth + 1));
        } else {
            rules.push(builtin_rule(&kind));
        }
        rules.extend(self.facet_rules(tree, declaration, depth));
        all_of(rules)
    }

    /// One alternative per inherited property set, each a mapping rule.
    fn object_rule(&self, tree: &Tree, declaration: NodeId, depth: usize) -> Rule {
        let closed = tree
            .get(declaration, "additionalProperties")
            .map_or(false, |v| matches!(tree.kind(v), NodeKind::Boolean(false)));
        let mut sets: Vec<NodeId> = tree
            .node(declaration)
            .inherited
            .iter()
            .map(|set| set.properties)
            .collect();
        if sets.is_empty() {
            if let Some(own) = tree.get(declaration, "properties") {
                sets.push(own);
            }
        }
        if sets.is_empty() {
            return self.properties_rule(tree, None, closed, depth);
        }
        let alternatives: Vec<Rule> = sets
            .into_iter()
            .map(|set| self.properties_rule(tree, Some(set), closed, depth))
            .collect();
        if alternatives.len() == 1 {
            alternatives.into_iter().next().unwrap_or_else(Rule::any)
        } else {
            Rule::union(alternatives)
        }
    }

    fn properties_rule(
        &self,
        tree: &Tree,
        properties: Option<NodeId>,
        closed: bool,
        depth: usize,
    ) -> Rule {
        let mut fields = Vec::new();
        for pair in properties.map(|p| tree.pairs(p)).unwrap_or_default() {
            let (Some(name), Some(value)) = (tree.key_literal(pair), tree.value(pair)) else {
                continue;
            };
            let value_rule = self.declaration_rule(tree, value, depth + 1);
            if let Some(pattern) = name.strip_prefix('/').and_then(|n| n.strip_suffix('/')) {
                if let Ok(key) = Rule::regex(pattern) {
                    fields.push(KeyValueRule::new(key, value_rule).repeated());
                }
                continue;
            }
            let (name, optional) = match name.strip_suffix('?') {
                Some(stripped) => (stripped.to_string(), true),
                None => (name, false),
            };
            let required = match tree.get(value, "required").map(|v| tree.kind(v)) {
                Some(NodeKind::Boolean(flag)) => *flag,
                _ => !optional,
            };
            let mut field = KeyValueRule::new(Rule::value(name), value_rule);
            if required {
                field = field.required();
            }
            fields.push(field);
        }
        if !closed {
            fields.push(KeyValueRule::new(Rule::any(), Rule::any()).repeated());
        }
        Rule::object_with(ObjectRule {
            fields,
            conditional: None,
            strict: false,
        })
    }

    fn facet_rules(&self, tree: &Tree, declaration: NodeId, depth: usize) -> Vec<Rule> {
        let number = |key: &str| {
            tree.get(declaration, key).and_then(|v| match tree.kind(v) {
                NodeKind::Integer(i) => Some(*i as f64),
                NodeKind::Float(f) => Some(*f),
                _ => None,
            })
        };
        let count = |key: &str| number(key).filter(|n| *n >= 0.0).map(|n| n as usize);
        let mut rules = Vec::new();

        if let Some(pattern) = tree.get_literal(declaration, "pattern") {
            if let Ok(rule) = Rule::regex(&pattern) {
                rules.push(rule);
            }
        }
        let (min_length, max_length) = (count("minLength"), count("maxLength"));
        if min_length.is_some() || max_length.is_some() {
            rules.push(Rule::length(min_length, max_length));
        }
        let (minimum, maximum) = (number("minimum"), number("maximum"));
        if minimum.is_some() || maximum.is_some() {
            rules.push(Rule::range(minimum, maximum));
        }
        if let Some(factor) = number("multipleOf") {
            rules.push(Rule::multiple_of(factor));
        }
        if let Some(values) = tree.get(declaration, "enum") {
            let literals: Vec<String> = tree
                .children(values)
                .iter()
                .filter_map(|v| tree.literal(*v))
                .collect();
            rules.push(Rule::one_of_values(literals));
        }
        let (min_items, max_items) = (count("minItems"), count("maxItems"));
        if min_items.is_some() || max_items.is_some() {
            rules.push(Rule::array_with(Rule::any(), min_items, max_items));
        }
        if let Some(items) = tree.get(declaration, "items") {
            rules.push(Rule::array(self.type_value_rule(tree, items, depth + 1)));
        }
        rules
    }

    fn schema_rule(&self, text: &str) -> Rule {
        let validator = if text.trim_start().starts_with('<') {
            Arc::clone(&self.xml)
        } else {
            Arc::clone(&self.json)
        };
        Rule::schema(text, validator)
    }
}

fn all_of(mut rules: Vec<Rule>) -> Rule {
    match rules.len() {
        0 => Rule::any(),
        1 => rules.remove(0),
        _ => Rule::all_of(rules),
    }
}

fn builtin_rule(name: &str) -> Rule {
    let pattern = match name {
        "string" => return Rule::string(),
        "number" => return Rule::number(),
        "integer" => return Rule::integer(),
        "boolean" => return Rule::boolean(),
        "nil" => return Rule::null(),
        "array" => return Rule::array(Rule::any()),
        "object" => {
            return Rule::object(vec![KeyValueRule::new(Rule::any(), Rule::any()).repeated()])
        }
        "date-only" => r"\d{4}-\d{2}-\d{2}",
        "time-only" => r"\d{2}:\d{2}:\d{2}(\.\d+)?",
        "datetime-only" => r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?",
        "datetime" => {
            r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2}))|([A-Z][a-z]{2}, \d{2} [A-Z][a-z]{2} \d{4} \d{2}:\d{2}:\d{2} GMT)"
        }
        _ => return Rule::any(),
    };
    Rule::regex(pattern)
        .map(|r| r.described(format!("a {} value", name)))
        .unwrap_or_else(|_| Rule::string())
}

fn builtin_kind(tree: &Tree, declaration: NodeId, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return "any".to_string();
    }
    let expression_node = match tree.kind(declaration) {
        NodeKind::Object => match base_of(tree, declaration) {
            Some(base) => base,
            None => {
                let kind = if tree.get(declaration, "properties").is_some() {
                    "object"
                } else if tree.get(declaration, "items").is_some() {
                    "array"
                } else {
                    "any"
                };
                return kind.to_string();
            }
        },
        _ => declaration,
    };
    match tree.kind(expression_node) {
        NodeKind::String(text) => match TypeExpression::parse(text) {
            Ok(expression) => expression_kind(tree, expression_node, &expression, depth),
            Err(_) => "any".to_string(),
        },
        NodeKind::Array => tree
            .child(expression_node, 0)
            .map_or_else(|| "any".to_string(), |first| builtin_kind(tree, first, depth + 1)),
        NodeKind::Object => builtin_kind(tree, expression_node, depth + 1),
        _ => "any".to_string(),
    }
}

fn expression_kind(tree: &Tree, scope: NodeId, expression: &TypeExpression, depth: usize) -> String {
    match expression {
        TypeExpression::Named(name) if is_builtin(name) => name.clone(),
        TypeExpression::Named(name) => references::resolve(tree, scope, ReferenceKind::Type, name)
            .map_or_else(|| "any".to_string(), |target| builtin_kind(tree, target, depth + 1)),
        TypeExpression::Array(_) => "array".to_string(),
        TypeExpression::Union(_) => "union".to_string(),
    }
}
