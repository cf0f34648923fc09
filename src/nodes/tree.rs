//! Arena storage for document trees.
//!
//! All nodes of a document live in one `Vec`; children are owned through
//! their parent's child list and the parent link is a plain index. Rules and
//! phases never rewrite a slot through the parent link: a transformation
//! returns the replacement id and the caller writes it with
//! [`Tree::set_child`] or [`Tree::replace`].

use serde_json::{Map, Value};

use super::kind::{ErrorCategory, ErrorInfo, NodeId, NodeKind, Position, Role};
use crate::error::ValidationResult;

/// Property set produced for one combination of base types.
#[derive(Debug, Clone, PartialEq)]
pub struct InheritedProperties {
    /// Base type names of the combination joined with `,`.
    pub label: String,
    /// Detached `Object` node holding one key-value pair per property.
    pub properties: NodeId,
}

#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    pub role: Option<Role>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub start: Position,
    pub end: Position,
    /// The node this one was derived from, when synthesized.
    pub source: Option<NodeId>,
    pub inherited: Vec<InheritedProperties>,
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<NodeData>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    pub fn add(&mut self, kind: NodeKind, start: Position, end: Position) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            role: None,
            children: Vec::new(),
            parent: None,
            start,
            end,
            source: None,
            inherited: Vec::new(),
        });
        id
    }

    /// Adds a node positioned like `template` and derived from it.
    pub fn add_like(&mut self, kind: NodeKind, template: NodeId) -> NodeId {
        let (start, end) = (self.node(template).start, self.node(template).end);
        let id = self.add(kind, start, end);
        self.node_mut(id).source = Some(template);
        id
    }

    /// Builds a key-value pair from two existing nodes.
    pub fn add_pair(&mut self, key: NodeId, value: NodeId) -> NodeId {
        let (start, end) = (self.node(key).start, self.node(value).end);
        let pair = self.add(NodeKind::KeyValue, start, end);
        self.push_child(pair, key);
        self.push_child(pair, value);
        pair
    }

    /// Creates an error node that takes the place of `replaced`.
    pub fn error_for(
        &mut self,
        replaced: NodeId,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> NodeId {
        let info = ErrorInfo {
            category,
            message: message.into(),
        };
        self.add_like(NodeKind::Error(info), replaced)
    }

    // ========================================================================
    // ACCESS
    // ========================================================================

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.node_mut(id).parent = None;
        self.root = Some(id);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.node_mut(id).kind = kind;
    }

    pub fn role(&self, id: NodeId) -> Option<Role> {
        self.node(id).role
    }

    pub fn set_role(&mut self, id: NodeId, role: Role) {
        self.node_mut(id).role = Some(role);
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.node(id).children.get(index).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn start(&self, id: NodeId) -> Position {
        self.node(id).start
    }

    pub fn end(&self, id: NodeId) -> Position {
        self.node(id).end
    }

    pub fn error_info(&self, id: NodeId) -> Option<&ErrorInfo> {
        match self.kind(id) {
            NodeKind::Error(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_error(&self, id: NodeId) -> bool {
        self.kind(id).is_error()
    }

    pub fn is_object(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Object)
    }

    pub fn is_array(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Array)
    }

    pub fn is_pair(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::KeyValue)
    }

    /// Key of a key-value pair.
    pub fn key(&self, pair: NodeId) -> Option<NodeId> {
        match self.kind(pair) {
            NodeKind::KeyValue => self.child(pair, 0),
            _ => None,
        }
    }

    /// Value of a key-value pair.
    pub fn value(&self, pair: NodeId) -> Option<NodeId> {
        match self.kind(pair) {
            NodeKind::KeyValue => self.child(pair, 1),
            _ => None,
        }
    }

    /// True when `id` is the key slot of its parent pair.
    pub fn is_key(&self, id: NodeId) -> bool {
        self.parent(id)
            .and_then(|p| self.key(p))
            .map_or(false, |key| key == id)
    }

    /// Literal text of a scalar, reference or template node.
    pub fn literal(&self, id: NodeId) -> Option<String> {
        match self.kind(id) {
            NodeKind::String(s) | NodeKind::StringTemplate(s) => Some(s.clone()),
            NodeKind::Integer(i) => Some(i.to_string()),
            NodeKind::Float(f) => Some(f.to_string()),
            NodeKind::Boolean(b) => Some(b.to_string()),
            NodeKind::Null => Some(String::new()),
            NodeKind::Reference(_, name) => Some(name.clone()),
            _ => None,
        }
    }

    /// Text of a plain string node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Literal of the key of a pair.
    pub fn key_literal(&self, pair: NodeId) -> Option<String> {
        self.key(pair).and_then(|k| self.literal(k))
    }

    /// Key-value children of an object.
    pub fn pairs(&self, object: NodeId) -> Vec<NodeId> {
        self.children(object)
            .iter()
            .copied()
            .filter(|c| self.is_pair(*c))
            .collect()
    }

    /// The pair of `object` whose key literal equals `key`.
    pub fn get_pair(&self, object: NodeId, key: &str) -> Option<NodeId> {
        if !self.is_object(object) {
            return None;
        }
        self.pairs(object)
            .into_iter()
            .find(|pair| self.key_literal(*pair).as_deref() == Some(key))
    }

    /// The value stored under `key` in `object`.
    pub fn get(&self, object: NodeId, key: &str) -> Option<NodeId> {
        self.get_pair(object, key).and_then(|pair| self.value(pair))
    }

    /// String literal stored under `key` in `object`.
    pub fn get_literal(&self, object: NodeId, key: &str) -> Option<String> {
        self.get(object, key).and_then(|v| self.literal(v))
    }

    /// Walks parent links up to the topmost node.
    pub fn top(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            result.push(node);
            current = self.parent(node);
        }
        result
    }

    /// Path from the topmost ancestor down to `id`, inclusive.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = self.ancestors(id);
        path.reverse();
        path.push(id);
        path
    }

    /// Pre-order listing of the subtree rooted at `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            result.push(node);
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        result
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    pub fn push_child(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        let children = &mut self.node_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    /// Writes `child` into slot `index` of `parent`, detaching the previous occupant.
    pub fn set_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        let previous = self.node(parent).children[index];
        if previous == child {
            return;
        }
        self.node_mut(previous).parent = None;
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children[index] = child;
    }

    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> NodeId {
        let removed = self.node_mut(parent).children.remove(index);
        self.node_mut(removed).parent = None;
        removed
    }

    /// Removes every child of `parent`.
    pub fn clear_children(&mut self, parent: NodeId) {
        let children = std::mem::take(&mut self.node_mut(parent).children);
        for child in children {
            self.node_mut(child).parent = None;
        }
    }

    /// Puts `new` where `old` currently sits: its parent's slot or the root.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        match self.parent(old) {
            Some(parent) => {
                if let Some(index) = self.children(parent).iter().position(|c| *c == old) {
                    self.set_child(parent, index, new);
                }
            }
            None => {
                if self.root == Some(old) {
                    self.set_root(new);
                }
            }
        }
    }

    /// Copies the subtree rooted at `id`. Each copy keeps the positions of
    /// its original and records it as its source.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let original = self.node(id).clone();
        let copy = self.add(original.kind.clone(), original.start, original.end);
        self.node_mut(copy).role = original.role;
        self.node_mut(copy).source = Some(id);
        self.node_mut(copy).inherited = original.inherited.clone();
        for child in original.children {
            let child_copy = self.deep_copy(child);
            self.push_child(copy, child_copy);
        }
        copy
    }

    /// Copies the subtree rooted at `id` of another tree into this one.
    pub fn graft(&mut self, other: &Tree, id: NodeId) -> NodeId {
        let original = other.node(id);
        let copy = self.add(original.kind.clone(), original.start, original.end);
        self.node_mut(copy).role = original.role;
        for inherited in &original.inherited {
            let properties = self.graft(other, inherited.properties);
            self.node_mut(copy).inherited.push(InheritedProperties {
                label: inherited.label.clone(),
                properties,
            });
        }
        for child in &original.children {
            let child_copy = self.graft(other, *child);
            self.push_child(copy, child_copy);
        }
        copy
    }

    // ========================================================================
    // ERROR SCANNING
    // ========================================================================

    /// Every error node reachable from `id`, including the property sets
    /// attached by type resolution.
    pub fn find_errors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            let data = self.node(node);
            if data.kind.is_error() {
                result.push(node);
            }
            for inherited in data.inherited.iter().rev() {
                stack.push(inherited.properties);
            }
            for child in data.children.iter().rev() {
                stack.push(*child);
            }
        }
        result
    }

    pub fn has_errors(&self, id: NodeId) -> bool {
        !self.find_errors(id).is_empty()
    }

    /// Error nodes of the whole document as validation results.
    pub fn validation_results(&self) -> Vec<ValidationResult> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        self.find_errors(root)
            .into_iter()
            .filter_map(|id| {
                let data = self.node(id);
                self.error_info(id).map(|info| {
                    ValidationResult::new(info.message.clone(), info.category, data.start, data.end)
                })
            })
            .collect()
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    /// JSON view of a subtree, used for payload checks and CLI output.
    pub fn to_json(&self, id: NodeId) -> Value {
        match self.kind(id) {
            NodeKind::String(s) | NodeKind::StringTemplate(s) => Value::String(s.clone()),
            NodeKind::Integer(i) => Value::from(*i),
            NodeKind::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            NodeKind::Boolean(b) => Value::Bool(*b),
            NodeKind::Null => Value::Null,
            NodeKind::Object => {
                let mut map = Map::new();
                for child in self.children(id) {
                    match (self.key(*child), self.value(*child)) {
                        (Some(key), Some(value)) => {
                            let key = self.literal(key).unwrap_or_default();
                            map.insert(key, self.to_json(value));
                        }
                        _ => {
                            if let Some(info) = self.error_info(*child) {
                                map.insert(format!("!error@{}", child.0), error_json(info));
                            }
                        }
                    }
                }
                Value::Object(map)
            }
            NodeKind::Array => {
                Value::Array(self.children(id).iter().map(|c| self.to_json(*c)).collect())
            }
            NodeKind::KeyValue => {
                let mut map = Map::new();
                if let (Some(key), Some(value)) = (self.key(id), self.value(id)) {
                    map.insert(self.literal(key).unwrap_or_default(), self.to_json(value));
                }
                Value::Object(map)
            }
            NodeKind::Error(info) => error_json(info),
            NodeKind::Include(location) => Value::String(format!("!include {}", location)),
            NodeKind::Reference(_, name) => match self.child(id, 0) {
                Some(params) => {
                    let mut map = Map::new();
                    map.insert(name.clone(), self.to_json(params));
                    Value::Object(map)
                }
                None => Value::String(name.clone()),
            },
        }
    }

    /// Compact single-line rendering used inside messages.
    pub fn render(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::String(s) | NodeKind::StringTemplate(s) => s.clone(),
            _ => self.to_json(id).to_string(),
        }
    }
}

fn error_json(info: &ErrorInfo) -> Value {
    let mut map = Map::new();
    map.insert("error".to_string(), Value::String(info.message.clone()));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(index: usize) -> Position {
        Position::new(0, index, index)
    }

    fn pair(tree: &mut Tree, key: &str, value: NodeKind) -> NodeId {
        let k = tree.add(NodeKind::String(key.into()), pos(0), pos(1));
        let v = tree.add(value, pos(2), pos(3));
        tree.add_pair(k, v)
    }

    #[test]
    fn replace_rewrites_parent_slot() {
        let mut tree = Tree::new();
        let object = tree.add(NodeKind::Object, pos(0), pos(10));
        let title = pair(&mut tree, "title", NodeKind::String("x".into()));
        tree.push_child(object, title);
        tree.set_root(object);

        let value = tree.value(title).unwrap();
        let error = tree.error_for(value, ErrorCategory::Structural, "bad");
        tree.replace(value, error);

        assert_eq!(tree.value(title), Some(error));
        assert_eq!(tree.parent(error), Some(title));
        assert_eq!(tree.parent(value), None);
        assert_eq!(tree.node(error).source, Some(value));
        assert_eq!(tree.start(error), tree.start(value));
    }

    #[test]
    fn find_errors_visits_inherited_sets() {
        let mut tree = Tree::new();
        let object = tree.add(NodeKind::Object, pos(0), pos(10));
        tree.set_root(object);
        let detached = tree.add(NodeKind::Object, pos(0), pos(10));
        let error = tree.error_for(detached, ErrorCategory::Composition, "collision");
        tree.push_child(detached, error);
        tree.node_mut(object).inherited.push(InheritedProperties {
            label: "A".into(),
            properties: detached,
        });

        assert_eq!(tree.find_errors(object), vec![error]);
        assert_eq!(tree.validation_results().len(), 1);
    }

    #[test]
    fn graft_copies_between_trees() {
        let mut other = Tree::new();
        let object = other.add(NodeKind::Object, pos(0), pos(10));
        let p = pair(&mut other, "a", NodeKind::Integer(1));
        other.push_child(object, p);

        let mut tree = Tree::new();
        let copy = tree.graft(&other, object);
        assert_eq!(tree.get_literal(copy, "a").as_deref(), Some("1"));
        assert_eq!(tree.to_json(copy), serde_json::json!({"a": 1}));
    }
}
