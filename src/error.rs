//! Error types for ramlkit.
//!
//! Two families live here. Fatal failures (`RamlError` and the collaborator
//! errors it wraps) abort a build and are returned through `Result`. Document
//! problems never abort anything: they are error nodes inside the tree and are
//! surfaced to callers as [`ValidationResult`] values, which convert into
//! `miette` diagnostics for rendering.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Serialize;
use thiserror::Error;

use crate::nodes::{ErrorCategory, Position};

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// A named piece of document text used to render diagnostics.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Convert to NamedSource for use with miette error reporting
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

/// Converts a start/end byte range into a miette span. Empty ranges are
/// widened to one byte so labels stay visible.
pub fn to_source_span(start: usize, end: usize) -> SourceSpan {
    let len = if end > start { end - start } else { 1 };
    SourceSpan::new(start.into(), len)
}

// ============================================================================
// FATAL ERRORS
// ============================================================================

/// Failures that stop a build instead of being recorded in the tree.
#[derive(Debug, Error, Diagnostic)]
pub enum RamlError {
    #[error("failed to load '{location}'")]
    #[diagnostic(code(ramlkit::load))]
    Load {
        location: String,
        #[source]
        source: LoadError,
    },

    #[error("invalid grammar: {message}")]
    #[diagnostic(code(ramlkit::grammar), help("this is a bug in the grammar definition"))]
    Grammar { message: String },

    #[error("invalid configuration: {0}")]
    #[diagnostic(code(ramlkit::config))]
    Config(#[from] ConfigError),

    #[error("{message}")]
    #[diagnostic(code(ramlkit::document))]
    Document { message: String },

    #[error("i/o error on '{path}'")]
    #[diagnostic(code(ramlkit::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RamlError {
    pub fn grammar(message: impl Into<String>) -> Self {
        RamlError::Grammar {
            message: message.into(),
        }
    }
}

/// Errors raised by a [`crate::loader::ResourceLoader`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("resource not found: {location}")]
    NotFound { location: String },

    #[error("could not read '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{location}' is not valid UTF-8")]
    Encoding { location: String },
}

/// Errors raised by a [`crate::schema::SchemaValidator`] when the schema
/// itself cannot be used.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("unsupported schema: {0}")]
    Unsupported(String),
}

/// Errors raised while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting '{key}': {message}")]
    Invalid { key: String, message: String },
}

// ============================================================================
// VALIDATION RESULTS
// ============================================================================

/// One problem found in a document or payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub message: String,
    pub category: ErrorCategory,
    pub start: Position,
    pub end: Position,
}

impl ValidationResult {
    pub fn new(
        message: impl Into<String>,
        category: ErrorCategory,
        start: Position,
        end: Position,
    ) -> Self {
        Self {
            message: message.into(),
            category,
            start,
            end,
        }
    }

    /// Builds a renderable diagnostic against the given source.
    pub fn to_report(&self, source: &SourceContext) -> ValidationReport {
        let end = self.end.index.min(source.content.len());
        let start = self.start.index.min(end);
        ValidationReport {
            message: self.message.clone(),
            category: self.category,
            src: NamedSource::new(source.name.clone(), source.content.clone()),
            span: to_source_span(start, end),
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.start.line + 1,
            self.start.column + 1,
            self.message
        )
    }
}

/// A [`ValidationResult`] bound to its document text.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(ramlkit::validation))]
pub struct ValidationReport {
    pub message: String,
    pub category: ErrorCategory,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("{category}")]
    pub span: SourceSpan,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ranges_are_widened() {
        let span = to_source_span(4, 4);
        assert_eq!(span.offset(), 4);
        assert_eq!(span.len(), 1);
    }

    #[test]
    fn result_display_is_one_based() {
        let start = Position::new(2, 4, 20);
        let result = ValidationResult::new("boom", ErrorCategory::Structural, start, start);
        assert_eq!(result.to_string(), "3:5: boom");
    }
}
