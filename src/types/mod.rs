//! Type expressions and the built-in type names.

pub mod to_rule;

use std::fmt;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::nodes::{NodeId, NodeKind, Tree};

pub use to_rule::TypeRules;

#[derive(Parser)]
#[grammar = "types/type_expression.pest"]
struct TypeExpressionParser;

pub const BUILTIN_TYPES: [&str; 14] = [
    "any",
    "string",
    "number",
    "integer",
    "boolean",
    "nil",
    "date-only",
    "time-only",
    "datetime-only",
    "datetime",
    "file",
    "array",
    "object",
    "union",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid type expression '{0}'")]
pub struct TypeExpressionError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpression {
    Named(String),
    Array(Box<TypeExpression>),
    Union(Vec<TypeExpression>),
}

impl TypeExpression {
    pub fn parse(text: &str) -> Result<TypeExpression, TypeExpressionError> {
        let invalid = || TypeExpressionError(text.trim().to_string());
        let expression = TypeExpressionParser::parse(Rule::expression, text)
            .map_err(|_| invalid())?
            .next()
            .ok_or_else(invalid)?;
        let union = expression
            .into_inner()
            .find(|p| p.as_rule() == Rule::union)
            .ok_or_else(invalid)?;
        Ok(build_union(union))
    }

    /// Every type name mentioned by the expression.
    pub fn names(&self) -> Vec<&str> {
        match self {
            TypeExpression::Named(name) => vec![name.as_str()],
            TypeExpression::Array(inner) => inner.names(),
            TypeExpression::Union(alternatives) => {
                alternatives.iter().flat_map(|a| a.names()).collect()
            }
        }
    }
}

fn build_union(pair: Pair<Rule>) -> TypeExpression {
    let mut alternatives: Vec<TypeExpression> = pair.into_inner().map(build_postfix).collect();
    if alternatives.len() == 1 {
        alternatives.remove(0)
    } else {
        TypeExpression::Union(alternatives)
    }
}

fn build_postfix(pair: Pair<Rule>) -> TypeExpression {
    let mut result = TypeExpression::Named(String::new());
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::primary => result = build_primary(inner),
            Rule::array_suffix => result = TypeExpression::Array(Box::new(result)),
            _ => {}
        }
    }
    result
}

fn build_primary(pair: Pair<Rule>) -> TypeExpression {
    let text = pair.as_str().to_string();
    match pair.into_inner().next() {
        Some(inner) if inner.as_rule() == Rule::group => match inner.into_inner().next() {
            Some(union) => build_union(union),
            None => TypeExpression::Named(text),
        },
        Some(inner) => TypeExpression::Named(inner.as_str().to_string()),
        None => TypeExpression::Named(text),
    }
}

impl fmt::Display for TypeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpression::Named(name) => f.write_str(name),
            TypeExpression::Array(inner) => match inner.as_ref() {
                TypeExpression::Union(_) => write!(f, "({})[]", inner),
                _ => write!(f, "{}[]", inner),
            },
            TypeExpression::Union(alternatives) => {
                let parts: Vec<String> = alternatives.iter().map(|a| a.to_string()).collect();
                f.write_str(&parts.join(" | "))
            }
        }
    }
}

/// True for inline JSON or XML schema text.
pub fn is_schema_text(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('<')
}

/// The `type` (or legacy `schema`) value of a declaration object.
pub fn base_of(tree: &Tree, declaration: NodeId) -> Option<NodeId> {
    if !tree.is_object(declaration) {
        return None;
    }
    tree.get(declaration, "type")
        .or_else(|| tree.get(declaration, "schema"))
}

/// Names of the declared base types, in declaration order. A string
/// declaration is its own type expression; an array lists several bases.
pub fn base_names(tree: &Tree, declaration: NodeId) -> Vec<String> {
    let expression_node = match tree.kind(declaration) {
        NodeKind::Object => match base_of(tree, declaration) {
            Some(base) => base,
            None => return Vec::new(),
        },
        _ => declaration,
    };
    match tree.kind(expression_node) {
        NodeKind::String(text) if !is_schema_text(text) => vec![text.trim().to_string()],
        NodeKind::Array => tree
            .children(expression_node)
            .iter()
            .filter_map(|c| tree.text(*c).map(|t| t.trim().to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> TypeExpression {
        TypeExpression::Named(name.to_string())
    }

    #[test]
    fn parses_names_arrays_and_unions() {
        assert_eq!(TypeExpression::parse("User").unwrap(), named("User"));
        assert_eq!(
            TypeExpression::parse("string[]").unwrap(),
            TypeExpression::Array(Box::new(named("string")))
        );
        assert_eq!(
            TypeExpression::parse("Cat | lib.Dog").unwrap(),
            TypeExpression::Union(vec![named("Cat"), named("lib.Dog")])
        );
        let grouped = TypeExpression::parse("(Cat | Dog)[][]").unwrap();
        assert_eq!(grouped.to_string(), "(Cat | Dog)[][]");
        assert_eq!(grouped.names(), vec!["Cat", "Dog"]);
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(TypeExpression::parse("Cat |").is_err());
        assert!(TypeExpression::parse("[]").is_err());
        assert!(TypeExpression::parse("(Cat").is_err());
    }

    #[test]
    fn builtins_and_schema_text() {
        assert!(is_builtin("datetime-only"));
        assert!(!is_builtin("User"));
        assert!(is_schema_text("  {\"type\": \"object\"}"));
        assert!(is_schema_text("<xs:schema/>"));
        assert!(!is_schema_text("User"));
    }
}
