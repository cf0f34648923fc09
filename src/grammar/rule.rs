//! Grammar combinators.
//!
//! A [`Rule`] is a closed sum of combinator kinds plus a little metadata. Every
//! kind answers the same four questions about a node: does it match, what does
//! it become, what could be typed here, and how is it described. Rules never
//! fail on bad input; a node that does not fit is replaced by an error node and
//! the caller writes the returned id back into the parent slot.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use super::Grammar;
use crate::error::RamlError;
use crate::nodes::{ErrorCategory, NodeId, NodeKind, ReferenceKind, Role, Tree};
use crate::references;
use crate::schema::SchemaValidator;
use crate::suggest::Suggestion;
use crate::template;

// ============================================================================
// RULE TYPES
// ============================================================================

#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: RuleKind,
    /// Human text shown next to suggestions.
    doc: Option<String>,
    /// Insert value offered for rules that cannot enumerate their values.
    suggestion: Option<String>,
    /// Role stamped on the node produced by a successful transform.
    role: Option<Role>,
}

#[derive(Debug, Clone)]
pub enum RuleKind {
    Any,
    StringType,
    IntegerType,
    NumberType,
    BooleanType,
    NullValue,
    /// Scalar whose literal form equals the given text.
    StringValue(String),
    /// Scalar whose literal form fully matches the pattern.
    Regex(PatternRule),
    /// Number within inclusive bounds.
    Range { min: Option<f64>, max: Option<f64> },
    /// String whose character count is within inclusive bounds.
    Length { min: Option<usize>, max: Option<usize> },
    MultipleOf(f64),
    Enum(Vec<String>),
    Negative(Box<Rule>),
    KeyValue(Box<KeyValueRule>),
    Object(Box<ObjectRule>),
    Array(Box<ArrayRule>),
    AnyOf(Vec<Rule>),
    /// Like `AnyOf`, but picks the first alternative whose transform leaves
    /// no errors behind. Used for payload unions.
    Union(Vec<Rule>),
    FirstOf(Vec<Rule>),
    AllOf(Vec<Rule>),
    Reference(ReferenceKind),
    ParametrizedReference(ReferenceKind),
    /// Late-bound link to a rule registered in the [`Grammar`].
    Named(&'static str),
    Schema(SchemaRule),
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    source: String,
    regex: Regex,
}

/// One entry of a mapping: a key rule and a value rule.
#[derive(Debug, Clone)]
pub struct KeyValueRule {
    pub key: Rule,
    pub value: Rule,
    pub required: bool,
    pub repeated: bool,
    role: Option<Role>,
}

/// Field rules that only apply when a sibling discriminator matches.
#[derive(Debug, Clone)]
pub struct ConditionalRules {
    /// Keys checked in order for the discriminator value.
    pub keys: Vec<&'static str>,
    pub cases: Vec<ConditionalCase>,
    /// Used when the discriminator is absent or no case matches.
    pub default: Vec<KeyValueRule>,
}

#[derive(Debug, Clone)]
pub struct ConditionalCase {
    pub when: Rule,
    pub fields: Vec<KeyValueRule>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectRule {
    pub fields: Vec<KeyValueRule>,
    pub conditional: Option<ConditionalRules>,
    /// Match only mappings whose every entry fits a field.
    pub strict: bool,
}

#[derive(Debug, Clone)]
pub struct ArrayRule {
    pub item: Rule,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

/// Delegates validation to an external schema validator.
#[derive(Clone)]
pub struct SchemaRule {
    pub schema: String,
    pub validator: Arc<dyn SchemaValidator>,
}

impl fmt::Debug for SchemaRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRule")
            .field("schema", &self.schema)
            .field("validator", &self.validator.name())
            .finish()
    }
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

impl Rule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            doc: None,
            suggestion: None,
            role: None,
        }
    }

    pub fn any() -> Self {
        Self::new(RuleKind::Any)
    }

    pub fn string() -> Self {
        Self::new(RuleKind::StringType)
    }

    pub fn integer() -> Self {
        Self::new(RuleKind::IntegerType)
    }

    pub fn number() -> Self {
        Self::new(RuleKind::NumberType)
    }

    pub fn boolean() -> Self {
        Self::new(RuleKind::BooleanType)
    }

    pub fn null() -> Self {
        Self::new(RuleKind::NullValue)
    }

    pub fn value(text: impl Into<String>) -> Self {
        Self::new(RuleKind::StringValue(text.into()))
    }

    /// Full-match pattern rule. Fails only for a malformed pattern.
    pub fn regex(pattern: &str) -> Result<Self, RamlError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| RamlError::grammar(format!("bad pattern '{}': {}", pattern, e)))?;
        Ok(Self::new(RuleKind::Regex(PatternRule {
            source: pattern.to_string(),
            regex,
        })))
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(RuleKind::Range { min, max })
    }

    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Self::new(RuleKind::Length { min, max })
    }

    pub fn multiple_of(factor: f64) -> Self {
        Self::new(RuleKind::MultipleOf(factor))
    }

    pub fn one_of_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(RuleKind::Enum(values.into_iter().map(Into::into).collect()))
    }

    pub fn not(rule: Rule) -> Self {
        Self::new(RuleKind::Negative(Box::new(rule)))
    }

    pub fn any_of(rules: Vec<Rule>) -> Self {
        Self::new(RuleKind::AnyOf(rules))
    }

    pub fn union(rules: Vec<Rule>) -> Self {
        Self::new(RuleKind::Union(rules))
    }

    pub fn first_of(rules: Vec<Rule>) -> Self {
        Self::new(RuleKind::FirstOf(rules))
    }

    pub fn all_of(rules: Vec<Rule>) -> Self {
        Self::new(RuleKind::AllOf(rules))
    }

    pub fn named(name: &'static str) -> Self {
        Self::new(RuleKind::Named(name))
    }

    pub fn reference(kind: ReferenceKind) -> Self {
        Self::new(RuleKind::Reference(kind))
    }

    pub fn parametrized(kind: ReferenceKind) -> Self {
        Self::new(RuleKind::ParametrizedReference(kind))
    }

    pub fn object(fields: Vec<KeyValueRule>) -> Self {
        Self::new(RuleKind::Object(Box::new(ObjectRule {
            fields,
            ..ObjectRule::default()
        })))
    }

    pub fn object_with(rule: ObjectRule) -> Self {
        Self::new(RuleKind::Object(Box::new(rule)))
    }

    pub fn array(item: Rule) -> Self {
        Self::array_with(item, None, None)
    }

    pub fn array_with(item: Rule, min_items: Option<usize>, max_items: Option<usize>) -> Self {
        Self::new(RuleKind::Array(Box::new(ArrayRule {
            item,
            min_items,
            max_items,
        })))
    }

    pub fn schema(schema: impl Into<String>, validator: Arc<dyn SchemaValidator>) -> Self {
        Self::new(RuleKind::Schema(SchemaRule {
            schema: schema.into(),
            validator,
        }))
    }

    pub fn described(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn suggest(mut self, value: impl Into<String>) -> Self {
        self.suggestion = Some(value.into());
        self
    }

    pub fn then(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }
}

impl KeyValueRule {
    pub fn new(key: Rule, value: Rule) -> Self {
        Self {
            key,
            value,
            required: false,
            repeated: false,
            role: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn then(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn described(mut self, doc: impl Into<String>) -> Self {
        self.key = self.key.described(doc);
        self
    }
}

/// A field keyed by an exact name.
pub fn field(name: &str, value: Rule) -> KeyValueRule {
    KeyValueRule::new(Rule::value(name), value)
}

// ============================================================================
// MATCHING
// ============================================================================

impl Rule {
    pub fn matches(&self, tree: &Tree, node: NodeId, grammar: &Grammar) -> bool {
        let kind = tree.kind(node);
        match &self.kind {
            RuleKind::Any => true,
            RuleKind::StringType => {
                matches!(kind, NodeKind::String(_) | NodeKind::StringTemplate(_))
            }
            RuleKind::IntegerType => match kind {
                NodeKind::Integer(_) => true,
                NodeKind::Float(f) => f.fract() == 0.0,
                _ => false,
            },
            RuleKind::NumberType => matches!(kind, NodeKind::Integer(_) | NodeKind::Float(_)),
            RuleKind::BooleanType => matches!(kind, NodeKind::Boolean(_)),
            RuleKind::NullValue => matches!(kind, NodeKind::Null),
            RuleKind::StringValue(expected) => {
                kind.is_scalar()
                    && !matches!(kind, NodeKind::Null)
                    && tree.literal(node).as_deref() == Some(expected.as_str())
            }
            RuleKind::Regex(pattern) => {
                kind.is_scalar()
                    && !matches!(kind, NodeKind::Null)
                    && tree
                        .literal(node)
                        .map_or(false, |text| pattern.regex.is_match(&text))
            }
            RuleKind::Range { min, max } => number_of(kind).map_or(false, |n| {
                min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m)
            }),
            RuleKind::Length { min, max } => match kind {
                NodeKind::String(s) => {
                    let count = s.chars().count();
                    min.map_or(true, |m| count >= m) && max.map_or(true, |m| count <= m)
                }
                _ => false,
            },
            RuleKind::MultipleOf(factor) => number_of(kind).map_or(false, |n| {
                *factor != 0.0 && ((n / factor) - (n / factor).round()).abs() < 1e-9
            }),
            RuleKind::Enum(values) => {
                kind.is_scalar()
                    && tree
                        .literal(node)
                        .map_or(false, |text| values.iter().any(|v| *v == text))
            }
            RuleKind::Negative(inner) => !inner.matches(tree, node, grammar),
            RuleKind::KeyValue(kv) => kv.matches(tree, node, grammar),
            RuleKind::Object(object) => object.matches(tree, node, grammar),
            RuleKind::Array(_) => matches!(kind, NodeKind::Array),
            RuleKind::AnyOf(rules) | RuleKind::Union(rules) | RuleKind::FirstOf(rules) => {
                rules.iter().any(|r| r.matches(tree, node, grammar))
            }
            RuleKind::AllOf(rules) => rules.iter().all(|r| r.matches(tree, node, grammar)),
            RuleKind::Reference(expected) => match kind {
                NodeKind::String(_) | NodeKind::StringTemplate(_) => true,
                NodeKind::Reference(found, _) => {
                    found == expected && tree.children(node).is_empty()
                }
                _ => false,
            },
            RuleKind::ParametrizedReference(expected) => match kind {
                NodeKind::Object => {
                    let pairs = tree.pairs(node);
                    pairs.len() == 1
                        && tree.children(node).len() == 1
                        && tree
                            .value(pairs[0])
                            .map_or(false, |value| tree.is_object(value))
                }
                NodeKind::Reference(found, _) => {
                    found == expected && !tree.children(node).is_empty()
                }
                _ => false,
            },
            RuleKind::Named(name) => grammar
                .rule(name)
                .map_or(false, |rule| rule.matches(tree, node, grammar)),
            RuleKind::Schema(_) => true,
        }
    }

    /// `matches`, except that a parametrized call whose argument mapping is
    /// still empty (`paged:` with nothing after it) is accepted too.
    fn matches_while_editing(&self, tree: &Tree, node: NodeId, grammar: &Grammar) -> bool {
        match &self.kind {
            RuleKind::ParametrizedReference(_) => {
                self.matches(tree, node, grammar) || is_pending_call(tree, node)
            }
            RuleKind::Named(name) => grammar
                .rule(name)
                .map_or(false, |rule| rule.matches_while_editing(tree, node, grammar)),
            _ => self.matches(tree, node, grammar),
        }
    }
}

fn is_pending_call(tree: &Tree, node: NodeId) -> bool {
    let pairs = tree.pairs(node);
    tree.is_object(node)
        && pairs.len() == 1
        && tree.children(node).len() == 1
        && tree
            .value(pairs[0])
            .map_or(false, |value| matches!(tree.kind(value), NodeKind::Null))
}

/// A copy of `node` for trial transforms. It keeps the original's parent
/// link but is in no child list, so nothing reachable from the root changes.
fn trial_copy(tree: &mut Tree, node: NodeId) -> NodeId {
    let copy = tree.deep_copy(node);
    tree.node_mut(copy).parent = tree.parent(node);
    copy
}

fn number_of(kind: &NodeKind) -> Option<f64> {
    match kind {
        NodeKind::Integer(i) => Some(*i as f64),
        NodeKind::Float(f) => Some(*f),
        _ => None,
    }
}

impl KeyValueRule {
    pub fn matches(&self, tree: &Tree, node: NodeId, grammar: &Grammar) -> bool {
        tree.key(node)
            .map_or(false, |key| self.key.matches(tree, key, grammar))
    }

    pub fn transform(&self, tree: &mut Tree, node: NodeId, grammar: &Grammar) -> NodeId {
        let (Some(key), Some(value)) = (tree.key(node), tree.value(node)) else {
            return node;
        };
        let new_key = self.key.transform(tree, key, grammar);
        tree.set_child(node, 0, new_key);
        let new_value = self.value.transform(tree, value, grammar);
        tree.set_child(node, 1, new_value);
        if let Some(role) = self.role {
            tree.set_role(node, role);
        }
        node
    }
}

impl ObjectRule {
    pub fn matches(&self, tree: &Tree, node: NodeId, grammar: &Grammar) -> bool {
        if !tree.is_object(node) {
            return false;
        }
        if !self.strict {
            return true;
        }
        let fields = self.all_fields(tree, node, grammar);
        tree.children(node)
            .iter()
            .all(|child| fields.iter().any(|f| f.matches(tree, *child, grammar)))
    }

    /// Static fields followed by the conditional fields selected for `node`.
    pub fn all_fields<'r>(
        &'r self,
        tree: &Tree,
        node: NodeId,
        grammar: &Grammar,
    ) -> Vec<&'r KeyValueRule> {
        let mut fields: Vec<&KeyValueRule> = self.fields.iter().collect();
        if let Some(conditional) = &self.conditional {
            fields.extend(conditional.select(tree, node, grammar));
        }
        fields
    }
}

impl ConditionalRules {
    fn select<'r>(&'r self, tree: &Tree, node: NodeId, grammar: &Grammar) -> &'r [KeyValueRule] {
        let discriminator = if tree.is_object(node) {
            self.keys.iter().find_map(|key| tree.get(node, key))
        } else {
            None
        };
        let Some(value) = discriminator else {
            return &self.default;
        };
        self.cases
            .iter()
            .find(|case| case.when.matches(tree, value, grammar))
            .map(|case| case.fields.as_slice())
            .unwrap_or(&self.default)
    }
}

// ============================================================================
// TRANSFORMATION
// ============================================================================

impl Rule {
    /// Transforms `node` and returns the node that should occupy its slot.
    pub fn transform(&self, tree: &mut Tree, node: NodeId, grammar: &Grammar) -> NodeId {
        // Template values are checked once they are expanded in place.
        if tree.is_error(node) || matches!(tree.kind(node), NodeKind::StringTemplate(_)) {
            return node;
        }
        let result = match &self.kind {
            RuleKind::Any => node,
            RuleKind::Named(name) => match grammar.rule(name) {
                Some(rule) => rule.transform(tree, node, grammar),
                None => self.invalid(tree, node, grammar),
            },
            RuleKind::KeyValue(kv) => {
                if kv.matches(tree, node, grammar) {
                    kv.transform(tree, node, grammar)
                } else {
                    self.invalid(tree, node, grammar)
                }
            }
            RuleKind::Object(object) => {
                if object.matches(tree, node, grammar) {
                    object.transform(tree, node, grammar)
                } else {
                    self.invalid(tree, node, grammar)
                }
            }
            RuleKind::Array(array) => {
                if tree.is_array(node) {
                    array.transform(tree, node, grammar)
                } else {
                    self.invalid(tree, node, grammar)
                }
            }
            RuleKind::AnyOf(rules) | RuleKind::FirstOf(rules) => {
                match rules.iter().find(|r| r.matches(tree, node, grammar)) {
                    Some(rule) => rule.transform(tree, node, grammar),
                    None => {
                        let options: Vec<String> =
                            rules.iter().map(|r| r.describe(grammar)).collect();
                        let message = format!(
                            "Invalid element {}. Expected any of: {}",
                            describe_node(tree, node),
                            options.join(", ")
                        );
                        tree.error_for(node, ErrorCategory::Structural, message)
                    }
                }
            }
            RuleKind::Union(rules) => {
                let candidates: Vec<&Rule> =
                    rules.iter().filter(|r| r.matches(tree, node, grammar)).collect();
                let clean = candidates.iter().position(|rule| {
                    let trial = trial_copy(tree, node);
                    let result = rule.transform(tree, trial, grammar);
                    !tree.has_errors(result)
                });
                match clean.or_else(|| (!candidates.is_empty()).then_some(0)) {
                    Some(index) => candidates[index].transform(tree, node, grammar),
                    None => self.invalid(tree, node, grammar),
                }
            }
            RuleKind::AllOf(rules) => {
                let mut current = node;
                for rule in rules {
                    current = rule.transform(tree, current, grammar);
                    if tree.has_errors(current) {
                        break;
                    }
                }
                current
            }
            RuleKind::Reference(kind) => {
                if !self.matches(tree, node, grammar) {
                    self.invalid(tree, node, grammar)
                } else if matches!(tree.kind(node), NodeKind::Reference(..)) {
                    node
                } else {
                    let name = tree.literal(node).unwrap_or_default();
                    tree.add_like(NodeKind::Reference(*kind, name), node)
                }
            }
            RuleKind::ParametrizedReference(kind) => {
                if !self.matches(tree, node, grammar) {
                    self.invalid(tree, node, grammar)
                } else if matches!(tree.kind(node), NodeKind::Reference(..)) {
                    node
                } else {
                    let pair = tree.pairs(node)[0];
                    let name = tree.key_literal(pair).unwrap_or_default();
                    let reference = tree.add_like(NodeKind::Reference(*kind, name), node);
                    if let Some(params) = tree.value(pair) {
                        let params = tree.deep_copy(params);
                        tree.push_child(reference, params);
                    }
                    reference
                }
            }
            RuleKind::Schema(schema) => schema.transform(tree, node),
            _ => {
                if self.matches(tree, node, grammar) {
                    node
                } else {
                    self.invalid(tree, node, grammar)
                }
            }
        };
        if let Some(role) = self.role {
            if !tree.is_error(result) {
                tree.set_role(result, role);
            }
        }
        result
    }

    fn invalid(&self, tree: &mut Tree, node: NodeId, grammar: &Grammar) -> NodeId {
        let message = format!(
            "Invalid value {}. Expected {}",
            describe_node(tree, node),
            self.describe(grammar)
        );
        tree.error_for(node, ErrorCategory::Structural, message)
    }
}

fn describe_node(tree: &Tree, node: NodeId) -> String {
    match tree.kind(node) {
        NodeKind::Object | NodeKind::Array | NodeKind::KeyValue => {
            tree.kind(node).type_name().to_string()
        }
        _ => format!("'{}'", tree.literal(node).unwrap_or_default()),
    }
}

impl ObjectRule {
    fn transform(&self, tree: &mut Tree, node: NodeId, grammar: &Grammar) -> NodeId {
        let fields = self.all_fields(tree, node, grammar);
        let mut matched = vec![false; fields.len()];
        let children = tree.children(node).to_vec();
        for (index, child) in children.into_iter().enumerate() {
            if tree.is_error(child) {
                continue;
            }
            match fields.iter().position(|f| f.matches(tree, child, grammar)) {
                Some(found) => {
                    matched[found] = true;
                    let new_child = fields[found].transform(tree, child, grammar);
                    tree.set_child(node, index, new_child);
                }
                None => {
                    let key = tree
                        .key(child)
                        .map(|k| tree.render(k))
                        .unwrap_or_else(|| tree.render(child));
                    let options: Vec<String> =
                        fields.iter().map(|f| f.key.describe(grammar)).collect();
                    let message = format!(
                        "Unexpected key '{}'. Options are : {}",
                        key,
                        options.join(" or ")
                    );
                    let error = tree.error_for(child, ErrorCategory::Structural, message);
                    tree.set_child(node, index, error);
                }
            }
        }
        for (found, field) in fields.iter().enumerate() {
            if field.required && !matched[found] {
                let message = format!("Missing required field \"{}\"", field.key.describe(grammar));
                let error = tree.error_for(node, ErrorCategory::Structural, message);
                tree.push_child(node, error);
            }
        }
        node
    }
}

impl ArrayRule {
    fn transform(&self, tree: &mut Tree, node: NodeId, grammar: &Grammar) -> NodeId {
        let children = tree.children(node).to_vec();
        let count = children.len();
        for (index, child) in children.into_iter().enumerate() {
            let new_child = self.item.transform(tree, child, grammar);
            tree.set_child(node, index, new_child);
        }
        let too_few = self.min_items.map_or(false, |min| count < min);
        let too_many = self.max_items.map_or(false, |max| count > max);
        if too_few || too_many {
            let message = format!(
                "Expected {} items but found {}",
                describe_bounds(self.min_items.map(|m| m as f64), self.max_items.map(|m| m as f64)),
                count
            );
            return tree.error_for(node, ErrorCategory::Structural, message);
        }
        node
    }
}

impl SchemaRule {
    fn transform(&self, tree: &mut Tree, node: NodeId) -> NodeId {
        let payload = match tree.kind(node) {
            NodeKind::String(text) => text.clone(),
            _ => tree.to_json(node).to_string(),
        };
        match self.validator.validate(&self.schema, &payload) {
            Ok(violations) if violations.is_empty() => node,
            Ok(violations) => {
                let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
                tree.error_for(node, ErrorCategory::Structural, messages.join("; "))
            }
            Err(error) => tree.error_for(
                node,
                ErrorCategory::External,
                format!("Schema validation failed: {}", error),
            ),
        }
    }
}

// ============================================================================
// SUGGESTIONS
// ============================================================================

impl Rule {
    /// Completions this rule offers for `node` (or for an empty slot).
    pub fn suggestions(
        &self,
        tree: &Tree,
        node: Option<NodeId>,
        grammar: &Grammar,
    ) -> Vec<Suggestion> {
        let doc = self.doc.clone().unwrap_or_default();
        let mut result = match &self.kind {
            RuleKind::StringValue(value) => vec![Suggestion::new(value, &doc, value)],
            RuleKind::BooleanType => vec![
                Suggestion::new("true", &doc, "true"),
                Suggestion::new("false", &doc, "false"),
            ],
            RuleKind::Enum(values) => values
                .iter()
                .map(|v| Suggestion::new(v, &doc, v))
                .collect(),
            RuleKind::KeyValue(kv) => kv.suggestions(tree, grammar),
            RuleKind::Object(object) => object.suggestions(tree, node, grammar),
            RuleKind::Array(array) => array.item.suggestions(tree, None, grammar),
            RuleKind::AnyOf(rules) | RuleKind::Union(rules) | RuleKind::AllOf(rules) => rules
                .iter()
                .flat_map(|r| r.suggestions(tree, node, grammar))
                .collect(),
            RuleKind::FirstOf(rules) => node
                .and_then(|n| rules.iter().find(|r| r.matches(tree, n, grammar)))
                .map(|r| r.suggestions(tree, node, grammar))
                .unwrap_or_default(),
            RuleKind::Reference(kind) | RuleKind::ParametrizedReference(kind) => {
                references::declaration_names(tree, *kind)
                    .into_iter()
                    .map(|name| Suggestion::new(&name, kind.label(), &name))
                    .collect()
            }
            RuleKind::Named(name) => grammar
                .rule(name)
                .map(|r| r.suggestions(tree, node, grammar))
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        if let Some(value) = &self.suggestion {
            result.push(Suggestion::new(value, &doc, value));
        }
        result
    }

    /// Replays `path` (from the node this rule applies to down to the cursor
    /// node) and returns the completions of the last rule reached.
    pub fn suggestions_along(
        &self,
        tree: &Tree,
        path: &[NodeId],
        grammar: &Grammar,
    ) -> Vec<Suggestion> {
        let Some((&first, rest)) = path.split_first() else {
            return self.suggestions(tree, None, grammar);
        };
        if rest.is_empty() {
            return self.suggestions(tree, Some(first), grammar);
        }
        match &self.kind {
            RuleKind::Object(object) => object
                .all_fields(tree, first, grammar)
                .into_iter()
                .find(|f| f.matches(tree, rest[0], grammar))
                .map(|f| f.suggestions_along(tree, rest, grammar))
                .unwrap_or_default(),
            RuleKind::KeyValue(kv) => kv.suggestions_along(tree, path, grammar),
            RuleKind::Array(array) => array.item.suggestions_along(tree, rest, grammar),
            RuleKind::AnyOf(rules) | RuleKind::Union(rules) | RuleKind::AllOf(rules) => rules
                .iter()
                .filter(|r| r.matches_while_editing(tree, first, grammar))
                .flat_map(|r| r.suggestions_along(tree, path, grammar))
                .collect(),
            RuleKind::FirstOf(rules) => rules
                .iter()
                .find(|r| r.matches_while_editing(tree, first, grammar))
                .map(|r| r.suggestions_along(tree, path, grammar))
                .unwrap_or_default(),
            RuleKind::Named(name) => grammar
                .rule(name)
                .map(|r| r.suggestions_along(tree, path, grammar))
                .unwrap_or_default(),
            RuleKind::ParametrizedReference(kind) => {
                parameter_suggestions(tree, first, rest, *kind)
            }
            _ => Vec::new(),
        }
    }

    /// Text appended to a key when a field of this value is inserted.
    fn insert_suffix(&self, grammar: &Grammar) -> &'static str {
        match &self.kind {
            RuleKind::Object(_) => ":\n",
            RuleKind::Named(name) => grammar
                .rule(name)
                .map_or(": ", |r| r.insert_suffix(grammar)),
            _ => ": ",
        }
    }
}

/// Parameter names of the declaration targeted by a parametrized call, when
/// the cursor sits inside its argument mapping.
fn parameter_suggestions(
    tree: &Tree,
    call: NodeId,
    rest: &[NodeId],
    kind: ReferenceKind,
) -> Vec<Suggestion> {
    let pair = rest[0];
    let inside_arguments = rest.len() >= 2 && tree.value(pair) == Some(rest[1]);
    let Some(name) = tree.key_literal(pair) else {
        return Vec::new();
    };
    if !inside_arguments {
        return Vec::new();
    }
    let Some(target) = references::resolve(tree, call, kind, &name) else {
        return Vec::new();
    };
    let present: Vec<String> = tree
        .pairs(rest[1])
        .into_iter()
        .filter_map(|p| tree.key_literal(p))
        .collect();
    template::parameter_names(tree, target)
        .into_iter()
        .filter(|p| !present.contains(p))
        .map(|p| {
            let value = format!("{}: ", p);
            Suggestion::new(&p, "template parameter", &value)
        })
        .collect()
}

impl KeyValueRule {
    pub fn suggestions(&self, tree: &Tree, grammar: &Grammar) -> Vec<Suggestion> {
        let suffix = self.value.insert_suffix(grammar);
        self.key
            .suggestions(tree, None, grammar)
            .into_iter()
            .map(|s| {
                let value = format!("{}{}", s.value, suffix);
                Suggestion::new(&s.label, &s.description, &value)
            })
            .collect()
    }

    fn suggestions_along(&self, tree: &Tree, path: &[NodeId], grammar: &Grammar) -> Vec<Suggestion> {
        match path {
            [] | [_] => self.suggestions(tree, grammar),
            [pair, next, ..] => {
                if tree.value(*pair) == Some(*next) {
                    self.value.suggestions_along(tree, &path[1..], grammar)
                } else {
                    Vec::new()
                }
            }
        }
    }
}

impl ObjectRule {
    fn suggestions(&self, tree: &Tree, node: Option<NodeId>, grammar: &Grammar) -> Vec<Suggestion> {
        let (fields, existing) = match node {
            Some(n) if tree.is_object(n) => (self.all_fields(tree, n, grammar), tree.pairs(n)),
            Some(n) => (self.all_fields(tree, n, grammar), Vec::new()),
            None => {
                let mut fields: Vec<&KeyValueRule> = self.fields.iter().collect();
                if let Some(conditional) = &self.conditional {
                    fields.extend(conditional.default.iter());
                }
                (fields, Vec::new())
            }
        };
        fields
            .into_iter()
            .filter(|f| f.repeated || !existing.iter().any(|p| f.matches(tree, *p, grammar)))
            .flat_map(|f| f.suggestions(tree, grammar))
            .collect()
    }
}

// ============================================================================
// DESCRIPTION
// ============================================================================

impl Rule {
    pub fn describe(&self, grammar: &Grammar) -> String {
        match &self.kind {
            RuleKind::Any => "any".to_string(),
            RuleKind::StringType => "String".to_string(),
            RuleKind::IntegerType => "Integer".to_string(),
            RuleKind::NumberType => "Number".to_string(),
            RuleKind::BooleanType => "Boolean".to_string(),
            RuleKind::NullValue => "null".to_string(),
            RuleKind::StringValue(value) => value.clone(),
            RuleKind::Regex(pattern) => format!("/{}/", pattern.source),
            RuleKind::Range { min, max } => format!("a number {}", describe_bounds(*min, *max)),
            RuleKind::Length { min, max } => format!(
                "a string with length {}",
                describe_bounds(min.map(|m| m as f64), max.map(|m| m as f64))
            ),
            RuleKind::MultipleOf(factor) => format!("a multiple of {}", factor),
            RuleKind::Enum(values) => format!("one of [{}]", values.join(", ")),
            RuleKind::Negative(inner) => format!("Not :{}", inner.describe(grammar)),
            RuleKind::KeyValue(kv) => kv.key.describe(grammar),
            RuleKind::Object(_) => "Mapping".to_string(),
            RuleKind::Array(array) => format!("Array[{}]", array.item.describe(grammar)),
            RuleKind::AnyOf(rules) | RuleKind::Union(rules) | RuleKind::FirstOf(rules) => rules
                .iter()
                .map(|r| r.describe(grammar))
                .collect::<Vec<_>>()
                .join(" | "),
            RuleKind::AllOf(rules) => rules
                .iter()
                .map(|r| r.describe(grammar))
                .collect::<Vec<_>>()
                .join(" and "),
            RuleKind::Reference(kind) => format!("Reference to {}", kind.label()),
            RuleKind::ParametrizedReference(_) => "Parametrized reference call.".to_string(),
            RuleKind::Named(name) => match grammar.rule(name) {
                Some(rule) if !matches!(rule.kind, RuleKind::Named(_)) => rule.describe(grammar),
                _ => name.to_string(),
            },
            RuleKind::Schema(_) => "a payload valid against the schema".to_string(),
        }
    }

    /// Names of every grammar rule this rule links to.
    pub(crate) fn collect_links(&self, out: &mut Vec<&'static str>) {
        match &self.kind {
            RuleKind::Named(name) => out.push(name),
            RuleKind::Negative(inner) => inner.collect_links(out),
            RuleKind::KeyValue(kv) => {
                kv.key.collect_links(out);
                kv.value.collect_links(out);
            }
            RuleKind::Object(object) => {
                for f in &object.fields {
                    f.key.collect_links(out);
                    f.value.collect_links(out);
                }
                if let Some(conditional) = &object.conditional {
                    let case_fields = conditional.cases.iter().flat_map(|c| c.fields.iter());
                    for f in case_fields.chain(conditional.default.iter()) {
                        f.key.collect_links(out);
                        f.value.collect_links(out);
                    }
                }
            }
            RuleKind::Array(array) => array.item.collect_links(out),
            RuleKind::AnyOf(rules)
            | RuleKind::Union(rules)
            | RuleKind::FirstOf(rules)
            | RuleKind::AllOf(rules) => {
                for rule in rules {
                    rule.collect_links(out);
                }
            }
            _ => {}
        }
    }
}

fn describe_bounds(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("between {} and {}", min, max),
        (Some(min), None) => format!("of at least {}", min),
        (None, Some(max)) => format!("of at most {}", max),
        (None, None) => "without bounds".to_string(),
    }
}
