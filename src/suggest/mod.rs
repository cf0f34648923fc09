//! Completion suggestions for a possibly incomplete document.
//!
//! The text before the cursor decides the kind of completion. Template
//! parameters and template functions come from fixed lists; everything else
//! is asked of the grammar, by replaying the path from the document root to
//! the node at the cursor through the root rule.

pub mod context;

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::RamlError;
use crate::grammar::{Grammar, Rule};
use crate::loader::ResourceLoader;
use crate::nodes::{NodeId, Tree};
use crate::phase::includes::IncludePhase;
use crate::phase::{Phase, PhaseContext};
use crate::schema::{JsonSchemaValidator, LenientXmlValidator};
use crate::syntax::{parse_yaml, Fragment, RamlHeader};
use crate::template::functions::TemplateFunction;
use crate::types::TypeRules;

pub use context::{CompletionContext, ContextKind};

/// One completion candidate. `value` is the text to insert.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Suggestion {
    pub label: String,
    pub value: String,
    pub description: String,
}

impl Suggestion {
    pub fn new(label: &str, description: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
            description: description.to_string(),
        }
    }
}

// ============================================================================
// SUGGESTER
// ============================================================================

pub struct Suggester {
    grammar: Arc<Grammar>,
    root: Option<Rule>,
    includes: Option<(Arc<dyn ResourceLoader>, String)>,
}

impl Suggester {
    /// Completes against the grammar root named by each document's header.
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self {
            grammar,
            root: None,
            includes: None,
        }
    }

    pub fn raml10() -> Result<Self, RamlError> {
        Ok(Self::new(Arc::new(Grammar::raml10()?)))
    }

    /// Completes every document against `root`, whatever its header says.
    pub fn for_rule(grammar: Arc<Grammar>, root: Rule) -> Self {
        Self {
            root: Some(root),
            ..Self::new(grammar)
        }
    }

    /// Resolves includes and `uses` of the document, found at `location`,
    /// before completing, so library declarations are offered too.
    pub fn with_loader(mut self, loader: Arc<dyn ResourceLoader>, location: &str) -> Self {
        self.includes = Some((loader, location.to_string()));
        self
    }

    /// Sorted, deduplicated suggestions whose value starts with the text
    /// typed before `cursor`.
    pub fn suggestions(&self, document: &str, cursor: usize) -> Vec<Suggestion> {
        let context = context::scan(document, cursor);
        debug!(kind = ?context.kind, prefix = %context.prefix, "completing");
        let candidates = match context.kind {
            ContextKind::FunctionCall => function_suggestions(),
            ContextKind::StringTemplate => self.template_suggestions(document, &context, cursor),
            _ => self.grammar_suggestions(document, &context, cursor),
        };
        let mut result: Vec<Suggestion> = candidates
            .into_iter()
            .filter(|s| s.value.starts_with(&context.prefix))
            .collect();
        result.sort();
        result.dedup();
        result
    }

    fn root_rule(&self, document: &str) -> Option<&Rule> {
        if let Some(root) = &self.root {
            return Some(root);
        }
        let header = RamlHeader::parse(document).ok()?;
        self.grammar.root(header.fragment).ok()
    }

    fn grammar_suggestions(
        &self,
        document: &str,
        context: &CompletionContext,
        cursor: usize,
    ) -> Vec<Suggestion> {
        let Some(rule) = self.root_rule(document) else {
            return Vec::new();
        };
        let Some(tree) = self.best_effort_tree(document, context, cursor) else {
            return Vec::new();
        };
        let Some(root) = tree.root() else {
            return Vec::new();
        };
        let found = search_node_at(&tree, root, context.location).unwrap_or(root);
        let node = match context.kind {
            ContextKind::Any => {
                value_node_at_column(&tree, found, context::indentation(document, cursor))
            }
            _ => match tree.parent(found) {
                Some(pair) if tree.key(pair) == Some(found) => tree.parent(pair).unwrap_or(root),
                _ => found,
            },
        };
        rule.suggestions_along(&tree, &tree.path_to_root(node), &self.grammar)
    }

    /// `resourcePath` and `resourcePathName`, plus `methodName` inside traits.
    fn template_suggestions(
        &self,
        document: &str,
        context: &CompletionContext,
        cursor: usize,
    ) -> Vec<Suggestion> {
        let mut suggestions = vec![
            Suggestion::new(
                "resourcePath",
                "The resource's full URI relative to the baseUri (if any)",
                "resourcePath",
            ),
            Suggestion::new(
                "resourcePathName",
                "The rightmost path fragment of the resource's relative URI, omitting any parametrize brackets",
                "resourcePathName",
            ),
        ];
        if self.inside_traits(document, context, cursor) {
            suggestions.push(Suggestion::new(
                "methodName",
                "The name of the method",
                "methodName",
            ));
        }
        suggestions
    }

    fn inside_traits(&self, document: &str, context: &CompletionContext, cursor: usize) -> bool {
        let Some(tree) = self.best_effort_tree(document, context, cursor) else {
            return false;
        };
        let Some(root) = tree.root() else {
            return false;
        };
        let Some(node) = search_node_at(&tree, root, context.location) else {
            return false;
        };
        let table = tree
            .ancestors(node)
            .into_iter()
            .filter(|n| tree.is_pair(*n))
            .filter_map(|pair| tree.key_literal(pair))
            .find(|key| key == "traits" || key == "resourceTypes");
        table.as_deref() == Some("traits")
    }

    /// The document as is, or else cut at the cursor line.
    fn best_effort_tree(
        &self,
        document: &str,
        context: &CompletionContext,
        cursor: usize,
    ) -> Option<Tree> {
        let tree = match parse_yaml(document) {
            Ok(tree) => tree,
            Err(error) => {
                debug!(%error, "retrying without the text at the cursor");
                parse_yaml(&context::truncated(document, context, cursor)).ok()?
            }
        };
        let Some((loader, location)) = &self.includes else {
            return Some(tree);
        };
        let ctx = PhaseContext {
            loader: loader.clone(),
            location: location.clone(),
            grammar: self.grammar.clone(),
            fragment: RamlHeader::parse(document).map_or(Fragment::Api, |h| h.fragment),
            type_rules: TypeRules::new(
                Arc::new(JsonSchemaValidator),
                Arc::new(LenientXmlValidator),
            ),
        };
        IncludePhase.apply(tree, &ctx).ok()
    }
}

/// `!name` for every template function.
fn function_suggestions() -> Vec<Suggestion> {
    TemplateFunction::names()
        .into_iter()
        .map(|name| {
            let call = format!("!{}", name);
            Suggestion::new(&call, "Template function", &call)
        })
        .collect()
}

/// The node whose end is at `location`, else the first child ending past it
/// (or the last child), searched depth first.
fn search_node_at(tree: &Tree, node: NodeId, location: usize) -> Option<NodeId> {
    let children = tree.children(node);
    if tree.end(node).index == location && children.is_empty() {
        return Some(node);
    }
    for (index, child) in children.iter().copied().enumerate() {
        let end = tree.end(child).index;
        let last = index + 1 == children.len();
        if end == location || end > location || last {
            if tree.children(child).is_empty() {
                return Some(child);
            }
            return search_node_at(tree, child, location);
        }
    }
    None
}

/// On a line of its own the indentation decides which mapping is being
/// completed: the deepest value on the path whose key sits left of it.
fn value_node_at_column(tree: &Tree, node: NodeId, column: usize) -> NodeId {
    let path = tree.path_to_root(node);
    if column == 0 {
        return path[0];
    }
    let mut selected = node;
    for element in path {
        if tree.is_pair(element) {
            if tree.start(element).column < column {
                if let Some(value) = tree.value(element) {
                    selected = value;
                }
            }
        } else if tree.is_object(element) && tree.start(element).column <= column {
            selected = element;
        }
    }
    selected
}

/// Suggestions for `document` at `cursor` with the RAML 1.0 grammar.
pub fn suggestions(document: &str, cursor: usize) -> Vec<Suggestion> {
    match Suggester::raml10() {
        Ok(suggester) => suggester.suggestions(document, cursor),
        Err(error) => {
            debug!(%error, "grammar unavailable");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::field;
    use crate::loader::MemoryResourceLoader;

    fn labels(suggestions: Vec<Suggestion>) -> Vec<String> {
        suggestions.into_iter().map(|s| s.label).collect()
    }

    fn at_end(text: &str) -> Vec<String> {
        labels(suggestions(text, text.len()))
    }

    #[test]
    fn prefix_filters_the_next_valid_keys() {
        let root = Rule::object(vec![
            field("displayName", Rule::string()),
            field("description", Rule::string()),
            field("headers", Rule::any()),
        ]);
        let suggester = Suggester::for_rule(Arc::new(Grammar::new()), root);
        let text = "d";
        assert_eq!(
            labels(suggester.suggestions(text, text.len())),
            vec!["description", "displayName"]
        );
        let text = "headers: x\n";
        assert_eq!(
            labels(suggester.suggestions(text, text.len())),
            vec!["description", "displayName"]
        );
    }

    #[test]
    fn method_keys_follow_indentation() {
        let text = "#%RAML 1.0\ntitle: T\n/a:\n  get:\n    d";
        assert_eq!(at_end(text), vec!["description", "displayName"]);
        let text = "#%RAML 1.0\ntitle: T\n/a:\n  get:\n    description: x\n    d";
        assert_eq!(at_end(text), vec!["displayName"]);
    }

    #[test]
    fn values_list_declarations_and_enumerations() {
        let text = "#%RAML 1.0\ntitle: T\nresourceTypes:\n  collection:\n  item:\n/a:\n  type: c";
        assert_eq!(at_end(text), vec!["collection"]);
        let text = "#%RAML 1.0\ntitle: T\nprotocols: [H";
        assert_eq!(at_end(text), vec!["HTTP", "HTTPS"]);
    }

    #[test]
    fn template_parameters_depend_on_the_table() {
        let text = "#%RAML 1.0\nresourceTypes:\n  c:\n    description: <<res";
        assert_eq!(at_end(text), vec!["resourcePath", "resourcePathName"]);
        let text = "#%RAML 1.0\ntraits:\n  t:\n    description: <<m";
        assert_eq!(at_end(text), vec!["methodName"]);
    }

    #[test]
    fn template_functions_are_offered_after_a_pipe() {
        let text = "#%RAML 1.0\ntraits:\n  t:\n    description: <<methodName | !upper";
        assert_eq!(
            at_end(text),
            vec!["!uppercamelcase", "!uppercase", "!upperhyphencase", "!upperunderscorecase"]
        );
    }

    #[test]
    fn library_declarations_are_qualified() {
        let loader = MemoryResourceLoader::new()
            .with("lib.raml", "#%RAML 1.0 Library\nresourceTypes:\n  collection:\n  item:\n");
        let suggester = Suggester::raml10()
            .unwrap()
            .with_loader(Arc::new(loader), "api.raml");
        let text = "#%RAML 1.0\ntitle: T\nuses:\n  lib: lib.raml\n/a:\n  type: lib.c";
        assert_eq!(
            labels(suggester.suggestions(text, text.len())),
            vec!["lib.collection"]
        );
    }

    const PAGED: &str = "#%RAML 1.0\ntitle: T\ntraits:\n  paged:\n    description: <<prefix>> items of <<kind>>\n/a:\n  get:\n";

    #[test]
    fn trait_calls_offer_their_parameters() {
        let empty = format!("{}    is:\n      - paged:\n          ", PAGED);
        assert_eq!(at_end(&empty), vec!["kind", "prefix"]);
        let started = format!("{}    is:\n      - paged:\n          prefix: x\n          ", PAGED);
        assert_eq!(at_end(&started), vec!["kind"]);
    }

    #[test]
    fn documents_without_a_header_get_nothing() {
        assert!(at_end("title: T\nd").is_empty());
    }
}
