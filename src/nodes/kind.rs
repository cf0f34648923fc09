//! Node discriminants, domain roles and source positions.

use std::fmt;

use serde::Serialize;

/// A location inside a document. Lines and columns are zero based, `index`
/// is a byte offset into the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub index: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize, index: usize) -> Self {
        Self {
            line,
            column,
            index,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.line + 1, self.column + 1)
    }
}

/// Index of a node inside its [`crate::nodes::Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub usize);

/// Classification of a problem recorded as an error node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCategory {
    /// Wrong shape for the active rule: unexpected key, wrong scalar kind.
    Structural,
    /// A name that does not resolve to a declaration.
    Reference,
    /// Property collisions and inconsistent facets found while merging types.
    Composition,
    /// Unknown template parameter or function.
    Template,
    /// Loader or schema validator failures.
    External,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCategory::Structural => "structural",
            ErrorCategory::Reference => "reference",
            ErrorCategory::Composition => "composition",
            ErrorCategory::Template => "template",
            ErrorCategory::External => "external",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub message: String,
}

/// Declaration tables a reference node can point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceKind {
    Trait,
    ResourceType,
    Type,
    AnnotationType,
    SecurityScheme,
}

impl ReferenceKind {
    /// Top level key of the declarations table.
    pub fn table(&self) -> &'static str {
        match self {
            ReferenceKind::Trait => "traits",
            ReferenceKind::ResourceType => "resourceTypes",
            ReferenceKind::Type => "types",
            ReferenceKind::AnnotationType => "annotationTypes",
            ReferenceKind::SecurityScheme => "securitySchemes",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReferenceKind::Trait => "trait",
            ReferenceKind::ResourceType => "resource type",
            ReferenceKind::Type => "type",
            ReferenceKind::AnnotationType => "annotation type",
            ReferenceKind::SecurityScheme => "security scheme",
        }
    }

    /// Role carried by the declaration a reference of this kind resolves to.
    pub fn role(&self) -> Role {
        match self {
            ReferenceKind::Trait => Role::Trait,
            ReferenceKind::ResourceType => Role::ResourceType,
            ReferenceKind::Type => Role::TypeDeclaration,
            ReferenceKind::AnnotationType => Role::AnnotationType,
            ReferenceKind::SecurityScheme => Role::SecurityScheme,
        }
    }
}

/// The structural discriminant of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    /// Mapping; every child is a `KeyValue`, except error nodes that replaced one.
    Object,
    Array,
    /// Exactly two children: key then value.
    KeyValue,
    Error(ErrorInfo),
    /// An `!include` tag that has not been resolved yet.
    Include(String),
    /// A string holding at least one `<<...>>` expression.
    StringTemplate(String),
    /// Named reference; an optional single child holds the parameter mapping.
    Reference(ReferenceKind, String),
}

impl NodeKind {
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            NodeKind::String(_)
                | NodeKind::Integer(_)
                | NodeKind::Float(_)
                | NodeKind::Boolean(_)
                | NodeKind::Null
                | NodeKind::StringTemplate(_)
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, NodeKind::Error(_))
    }

    /// Short name of the discriminant used in messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::String(_) => "String",
            NodeKind::Integer(_) => "Integer",
            NodeKind::Float(_) => "Float",
            NodeKind::Boolean(_) => "Boolean",
            NodeKind::Null => "Null",
            NodeKind::Object => "Mapping",
            NodeKind::Array => "Sequence",
            NodeKind::KeyValue => "KeyValue",
            NodeKind::Error(_) => "Error",
            NodeKind::Include(_) => "Include",
            NodeKind::StringTemplate(_) => "StringTemplate",
            NodeKind::Reference(..) => "Reference",
        }
    }
}

/// Domain meaning attached to a node by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Document,
    Library,
    Resource,
    Method,
    Response,
    Body,
    TypeDeclaration,
    Property,
    Example,
    Trait,
    ResourceType,
    AnnotationType,
    Annotation,
    SecurityScheme,
    DocumentationItem,
}
