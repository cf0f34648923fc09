//! Grammar rules and the RAML 1.0 grammar built from them.
//!
//! Rules are plain data; the [`Grammar`] is the registry that resolves
//! [`RuleKind::Named`] links so recursive structures (resources inside
//! resources, types inside properties) can be expressed without cycles in
//! ownership.

pub mod raml10;
pub mod rule;

use std::collections::HashMap;

use crate::error::RamlError;
use crate::syntax::Fragment;

pub use rule::{
    field, ArrayRule, ConditionalCase, ConditionalRules, KeyValueRule, ObjectRule, Rule, RuleKind,
};

#[derive(Debug, Clone, Default)]
pub struct Grammar {
    rules: HashMap<&'static str, Rule>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &'static str, rule: Rule) {
        self.rules.insert(name, rule);
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Name of the rule a document of the given fragment kind starts with.
    pub fn root_name(fragment: Fragment) -> &'static str {
        match fragment {
            Fragment::Api => "api",
            Fragment::Library => "library",
            Fragment::Overlay | Fragment::Extension => "extension",
            Fragment::DataType => "dataTypeFragment",
            Fragment::Trait => "traitValue",
            Fragment::ResourceType => "resourceTypeValue",
            Fragment::AnnotationTypeDeclaration => "annotationTypeValue",
            Fragment::DocumentationItem => "documentationItem",
            Fragment::NamedExample => "namedExample",
            Fragment::SecurityScheme => "securitySchemeValue",
        }
    }

    pub fn root(&self, fragment: Fragment) -> Result<&Rule, RamlError> {
        let name = Self::root_name(fragment);
        self.rule(name)
            .ok_or_else(|| RamlError::grammar(format!("no rule for fragment '{}'", fragment)))
    }

    /// Checks that every named link points at a registered rule.
    pub fn verify(&self) -> Result<(), RamlError> {
        let mut links = Vec::new();
        for rule in self.rules.values() {
            rule.collect_links(&mut links);
        }
        match links.into_iter().find(|name| !self.rules.contains_key(name)) {
            Some(missing) => Err(RamlError::grammar(format!(
                "rule '{}' is referenced but never defined",
                missing
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{NodeKind, Role, Tree};
    use crate::syntax::parse_yaml;

    fn parse(text: &str) -> (Tree, crate::nodes::NodeId) {
        let tree = parse_yaml(text).unwrap();
        let root = tree.root().unwrap();
        (tree, root)
    }

    fn messages(tree: &Tree) -> Vec<String> {
        tree.validation_results().into_iter().map(|r| r.message).collect()
    }

    #[test]
    fn raml10_grammar_links_are_complete() {
        let grammar = Grammar::raml10().unwrap();
        assert!(grammar.verify().is_ok());
        for fragment in Fragment::ALL {
            assert!(grammar.root(fragment).is_ok(), "{}", fragment);
        }
    }

    #[test]
    fn missing_links_are_reported() {
        let mut grammar = Grammar::new();
        grammar.define("a", Rule::array(Rule::named("b")));
        assert!(grammar.verify().is_err());
    }

    #[test]
    fn unexpected_keys_list_every_option() {
        let grammar = Grammar::new();
        let rule = Rule::object(vec![field("a", Rule::any()), field("b", Rule::any())]);
        let (mut tree, root) = parse("a: 1\nc: 2\n");
        let result = rule.transform(&mut tree, root, &grammar);
        assert_eq!(result, root);
        assert_eq!(messages(&tree), vec!["Unexpected key 'c'. Options are : a or b"]);
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let grammar = Grammar::new();
        let (mut tree, root) = parse("description: x\n");
        let rule = Rule::object_with(ObjectRule {
            fields: vec![
                field("title", Rule::string()).required(),
                field("description", Rule::string()),
            ],
            ..ObjectRule::default()
        })
        .then(Role::Document);
        rule.transform(&mut tree, root, &grammar);
        assert_eq!(messages(&tree), vec!["Missing required field \"title\""]);
        assert_eq!(tree.role(root), Some(Role::Document));
    }

    #[test]
    fn first_matching_alternative_wins() {
        let grammar = Grammar::new();
        let rule = Rule::any_of(vec![
            Rule::value("get").then(Role::Method),
            Rule::regex(".*").unwrap().then(Role::Resource),
        ]);
        let (mut tree, root) = parse("get: 1\n");
        let key = tree.key(tree.pairs(root)[0]).unwrap();
        let result = rule.transform(&mut tree, key, &grammar);
        assert_eq!(tree.role(result), Some(Role::Method));
    }

    #[test]
    fn failed_alternatives_are_aggregated() {
        let grammar = Grammar::new();
        let rule = Rule::any_of(vec![Rule::integer(), Rule::boolean()]);
        let (mut tree, root) = parse("a: text\n");
        let value = tree.get(root, "a").unwrap();
        let result = rule.transform(&mut tree, value, &grammar);
        let info = tree.error_info(result).unwrap();
        assert_eq!(info.message, "Invalid element 'text'. Expected any of: Integer, Boolean");
    }

    #[test]
    fn references_become_reference_nodes() {
        let grammar = Grammar::new();
        let rule = Rule::any_of(vec![
            Rule::reference(crate::nodes::ReferenceKind::Trait),
            Rule::parametrized(crate::nodes::ReferenceKind::Trait),
        ]);
        let (mut tree, root) = parse("is: [secured, paged: {size: 10}]\n");
        let list = tree.get(root, "is").unwrap();
        let items = tree.children(list).to_vec();
        let first = rule.transform(&mut tree, items[0], &grammar);
        let second = rule.transform(&mut tree, items[1], &grammar);
        assert!(matches!(tree.kind(first), NodeKind::Reference(_, name) if name == "secured"));
        assert!(matches!(tree.kind(second), NodeKind::Reference(_, name) if name == "paged"));
        let params = tree.child(second, 0).unwrap();
        assert_eq!(tree.get_literal(params, "size").as_deref(), Some("10"));
    }

    #[test]
    fn matching_rules_do_not_report_shape_errors() {
        let grammar = Grammar::raml10().unwrap();
        let samples = [
            ("api", "title: A\nversion: v1\n/users:\n  get:\n"),
            ("typeDeclarationValue", "type: string\nmaxLength: 3\n"),
            ("responses", "200:\n  body:\n    application/json:\n"),
        ];
        for (name, text) in samples {
            let rule = grammar.rule(name).unwrap();
            let (mut tree, root) = parse(text);
            assert!(rule.matches(&tree, root, &grammar));
            let result = rule.transform(&mut tree, root, &grammar);
            assert!(!tree.is_error(result), "{}", name);
        }
    }

    #[test]
    fn suggestions_skip_present_fields() {
        let grammar = Grammar::new();
        let rule = Rule::object(vec![
            field("title", Rule::string()),
            field("version", Rule::string()),
        ]);
        let (tree, root) = parse("title: x\n");
        let labels: Vec<String> = rule
            .suggestions(&tree, Some(root), &grammar)
            .into_iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(labels, vec!["version"]);
    }

    fn labels(rule: &Rule, tree: &Tree, node: crate::nodes::NodeId) -> Vec<String> {
        rule.suggestions(tree, Some(node), &Grammar::new())
            .into_iter()
            .map(|s| s.label)
            .collect()
    }

    #[test]
    fn negative_rules_invert_their_inner_rule() {
        let grammar = Grammar::new();
        let rule = Rule::not(Rule::integer());
        let (tree, root) = parse("a: text\nb: 3\n");
        assert!(rule.matches(&tree, tree.get(root, "a").unwrap(), &grammar));
        assert!(!rule.matches(&tree, tree.get(root, "b").unwrap(), &grammar));
        assert!(rule.suggestions(&tree, None, &grammar).is_empty());
    }

    #[test]
    fn first_of_suggests_from_the_first_match_only() {
        let alternatives = || {
            vec![
                Rule::value("plain"),
                Rule::object(vec![field("a", Rule::string())]),
                Rule::object(vec![field("b", Rule::string())]),
            ]
        };
        let (tree, root) = parse("{}\n");
        assert_eq!(labels(&Rule::first_of(alternatives()), &tree, root), vec!["a"]);
        assert_eq!(
            labels(&Rule::any_of(alternatives()), &tree, root),
            vec!["plain", "a", "b"]
        );
    }

    #[test]
    fn union_trials_leave_the_document_alone() {
        let grammar = Grammar::new();
        let item = Rule::object(vec![field(
            "v",
            Rule::union(vec![Rule::integer(), Rule::boolean(), Rule::string()]),
        )]);
        let text: String = (0..300)
            .map(|i| match i % 3 {
                0 => "- v: 1\n",
                1 => "- v: true\n",
                _ => "- v: text\n",
            })
            .collect();
        let (mut tree, root) = parse(&text);
        let before = tree.len();
        let result = Rule::array(item).transform(&mut tree, root, &grammar);
        tree.set_root(result);
        assert!(messages(&tree).is_empty(), "{:?}", messages(&tree));
        assert_eq!(tree.children(result).len(), 300);
        assert!(tree.len() < before * 4, "{} nodes from {}", tree.len(), before);
    }
}
