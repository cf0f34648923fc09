//! The generic positioned document tree shared by every stage.

pub mod kind;
pub mod tree;

pub use kind::{ErrorCategory, ErrorInfo, NodeId, NodeKind, Position, ReferenceKind, Role};
pub use tree::{InheritedProperties, NodeData, Tree};
