//! ramlkit: grammar-driven building, validation and autocompletion of
//! RAML 1.0 API descriptions.
//!
//! Text is read into a positioned node tree, then rewritten by seven phases
//! (includes, grammar, templates and types, grammar again, annotations,
//! media types, examples). Problems never abort a build; they become error
//! nodes, reported through [`ApiDocument::errors`].

pub use crate::builder::{validate, ApiDocument, RamlBuilder};
pub use crate::error::{RamlError, SourceContext, ValidationResult};
pub use crate::suggest::{suggestions, Suggester, Suggestion};
pub use crate::syntax::Fragment;

pub mod builder;
pub mod cli;
pub mod config;
pub mod error;
pub mod grammar;
pub mod loader;
pub mod nodes;
pub mod phase;
pub mod references;
pub mod schema;
pub mod selector;
pub mod suggest;
pub mod syntax;
pub mod template;
pub mod types;
