//! `<<parameter | !function>>` expressions used inside traits and resource
//! types.

pub mod functions;

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use pest::Parser;
use pest_derive::Parser;
use regex::Regex;
use thiserror::Error;

use crate::nodes::{ErrorCategory, NodeId, NodeKind, Tree};
use crate::syntax;

pub use functions::TemplateFunction;

#[derive(Parser)]
#[grammar = "template/template.pest"]
struct ExpressionParser;

static TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<<([^<>]+)>>").expect("template pattern is valid"));

/// Parameters always bound when a trait or resource type is applied.
pub const RESERVED_PARAMETERS: [&str; 3] = ["resourcePath", "resourcePathName", "methodName"];

pub type Parameters = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Invalid template expression '<<{0}>>'")]
    Syntax(String),
    #[error("Cannot resolve parameter '{0}'")]
    UnknownParameter(String),
    #[error("Unknown template function '{0}'")]
    UnknownFunction(String),
}

/// A parsed `<<...>>` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub parameter: String,
    pub functions: Vec<String>,
}

impl Expression {
    pub fn parse(body: &str) -> Result<Expression, TemplateError> {
        let mut pairs = ExpressionParser::parse(Rule::expression, body)
            .map_err(|_| TemplateError::Syntax(body.trim().to_string()))?;
        let expression = pairs
            .next()
            .ok_or_else(|| TemplateError::Syntax(body.trim().to_string()))?;
        let mut parameter = String::new();
        let mut functions = Vec::new();
        for pair in expression.into_inner() {
            match pair.as_rule() {
                Rule::identifier => parameter = pair.as_str().to_string(),
                Rule::function => {
                    let name = pair.into_inner().as_str().to_string();
                    functions.push(name);
                }
                _ => {}
            }
        }
        Ok(Expression {
            parameter,
            functions,
        })
    }

    pub fn evaluate(&self, params: &Parameters) -> Result<String, TemplateError> {
        let mut value = params
            .get(&self.parameter)
            .cloned()
            .ok_or_else(|| TemplateError::UnknownParameter(self.parameter.clone()))?;
        for name in &self.functions {
            let function = TemplateFunction::lookup(name)
                .ok_or_else(|| TemplateError::UnknownFunction(name.clone()))?;
            value = function.apply(&value);
        }
        Ok(value)
    }
}

pub fn contains_template(text: &str) -> bool {
    TEMPLATE.is_match(text)
}

/// Replaces every `<<...>>` occurrence in `text`.
pub fn expand(text: &str, params: &Parameters) -> Result<String, TemplateError> {
    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for captures in TEMPLATE.captures_iter(text) {
        let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        result.push_str(&text[last..whole.start()]);
        let value = Expression::parse(body.as_str())?.evaluate(params)?;
        result.push_str(&value);
        last = whole.end();
    }
    result.push_str(&text[last..]);
    Ok(result)
}

/// Turns every string containing an expression into a `StringTemplate`.
pub fn mark_templates(tree: &mut Tree, root: NodeId) {
    for node in tree.descendants(root) {
        if let NodeKind::String(text) = tree.kind(node) {
            if contains_template(text) {
                let text = text.clone();
                tree.set_kind(node, NodeKind::StringTemplate(text));
            }
        }
    }
}

/// Non-reserved parameter names used anywhere under `node`, in order of
/// first appearance.
pub fn parameter_names(tree: &Tree, node: NodeId) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for descendant in tree.descendants(node) {
        let text = match tree.kind(descendant) {
            NodeKind::String(s) | NodeKind::StringTemplate(s) | NodeKind::Reference(_, s) => s,
            _ => continue,
        };
        for captures in TEMPLATE.captures_iter(text) {
            let Some(body) = captures.get(1) else {
                continue;
            };
            if let Ok(expression) = Expression::parse(body.as_str()) {
                let reserved = RESERVED_PARAMETERS.contains(&expression.parameter.as_str());
                if !reserved && seen.insert(expression.parameter.clone()) {
                    names.push(expression.parameter);
                }
            }
        }
    }
    names
}

/// Expands every template under `node` in place. Keys and values are
/// re-typed after expansion; failures become template error nodes.
pub fn apply(tree: &mut Tree, node: NodeId, params: &Parameters) {
    for descendant in tree.descendants(node) {
        let NodeKind::StringTemplate(text) = tree.kind(descendant) else {
            continue;
        };
        match expand(text, params) {
            Ok(expanded) => {
                let kind = syntax::plain_kind(&expanded);
                tree.set_kind(descendant, kind);
            }
            Err(error) => {
                let replacement = tree.error_for(descendant, ErrorCategory::Template, error.to_string());
                tree.replace(descendant, replacement);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_yaml;

    fn params(entries: &[(&str, &str)]) -> Parameters {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn expressions_parse_with_functions() {
        let expression = Expression::parse(" resourcePathName | !singularize | !uppercase ").unwrap();
        assert_eq!(expression.parameter, "resourcePathName");
        assert_eq!(expression.functions, vec!["singularize", "uppercase"]);
        assert!(Expression::parse("a b").is_err());
    }

    #[test]
    fn expansion_substitutes_every_occurrence() {
        let p = params(&[("resourcePathName", "users"), ("max", "10")]);
        assert_eq!(
            expand("Get <<resourcePathName | !singularize>> (<<max>>)", &p).unwrap(),
            "Get user (10)"
        );
        assert_eq!(
            expand("<<missing>>", &p),
            Err(TemplateError::UnknownParameter("missing".into()))
        );
        assert_eq!(
            expand("<<max | !reverse>>", &p),
            Err(TemplateError::UnknownFunction("reverse".into()))
        );
    }

    #[test]
    fn applied_values_are_retyped() {
        let mut tree = parse_yaml("limit: <<max>>\nname: <<other>>\n").unwrap();
        let root = tree.root().unwrap();
        mark_templates(&mut tree, root);
        assert_eq!(parameter_names(&tree, root), vec!["max", "other"]);
        apply(&mut tree, root, &params(&[("max", "10")]));
        assert_eq!(tree.kind(tree.get(root, "limit").unwrap()), &NodeKind::Integer(10));
        let results = tree.validation_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].message, "Cannot resolve parameter 'other'");
        assert_eq!(results[0].category, ErrorCategory::Template);
    }

    #[test]
    fn reserved_names_are_not_parameters() {
        let mut tree = parse_yaml("description: <<resourcePath>> <<methodName>> <<x>>\n").unwrap();
        let root = tree.root().unwrap();
        mark_templates(&mut tree, root);
        assert_eq!(parameter_names(&tree, root), vec!["x"]);
    }
}
