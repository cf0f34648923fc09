//! Building documents: header check, parsing and the phase pipeline.
//!
//! A [`RamlBuilder`] holds what stays fixed across builds (loader, schema
//! validators, last phase). Each build gets a fresh grammar and returns an
//! [`ApiDocument`] whose tree carries every problem found as error nodes.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{ConfigError, RamlError, SourceContext, ValidationResult};
use crate::grammar::Grammar;
use crate::loader::{FileResourceLoader, ResourceLoader};
use crate::nodes::{ErrorCategory, ErrorInfo, NodeId, NodeKind, Position, Tree};
use crate::phase::examples;
use crate::phase::extension;
use crate::phase::pipeline::{Pipeline, LAST_PHASE};
use crate::phase::PhaseContext;
use crate::schema::{JsonSchemaValidator, LenientXmlValidator, SchemaValidator};
use crate::selector::NodeSelector;
use crate::syntax::{parse_yaml, Fragment, RamlHeader};
use crate::types::TypeRules;

#[derive(Clone)]
pub struct RamlBuilder {
    loader: Arc<dyn ResourceLoader>,
    json: Arc<dyn SchemaValidator>,
    xml: Arc<dyn SchemaValidator>,
    max_phase: usize,
    location: String,
    fragment: Option<Fragment>,
}

impl Default for RamlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RamlBuilder {
    pub fn new() -> Self {
        Self {
            loader: Arc::new(FileResourceLoader::new()),
            json: Arc::new(JsonSchemaValidator),
            xml: Arc::new(LenientXmlValidator),
            max_phase: LAST_PHASE,
            location: String::new(),
            fragment: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let mut builder = Self::new()
            .with_loader(Arc::new(FileResourceLoader::with_roots(
                settings.include_roots.iter().cloned(),
            )))
            .with_max_phase(settings.max_phase);
        builder.fragment = settings.fragment()?;
        Ok(builder)
    }

    pub fn with_loader(mut self, loader: Arc<dyn ResourceLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Stops after phase `max_phase` (1 to 7).
    pub fn with_max_phase(mut self, max_phase: usize) -> Self {
        self.max_phase = max_phase.clamp(1, LAST_PHASE);
        self
    }

    /// Where the built text lives; includes and `uses` resolve against it.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_json_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.json = validator;
        self
    }

    pub fn with_xml_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.xml = validator;
        self
    }

    /// Builds `text` as the fragment its header names. A missing or
    /// unsupported header gives a document holding a single error.
    pub fn build(&self, text: &str) -> Result<ApiDocument, RamlError> {
        match RamlHeader::parse(text) {
            Ok(header) => self.build_as(text, self.fragment.unwrap_or(header.fragment)),
            Err(error) => {
                debug!(%error, location = %self.location, "rejecting header");
                let line_end = text.find('\n').unwrap_or(text.len());
                let tree = error_tree(
                    error.to_string(),
                    Position::default(),
                    Position::new(0, line_end, line_end),
                );
                let fragment = self.fragment.unwrap_or(Fragment::Api);
                Ok(self.document(tree, text, fragment, self.context(fragment)?))
            }
        }
    }

    /// Builds `text` as `fragment`, whatever its header says.
    pub fn build_as(&self, text: &str, fragment: Fragment) -> Result<ApiDocument, RamlError> {
        let ctx = self.context(fragment)?;
        let tree = match parse_yaml(text) {
            Ok(tree) => tree,
            Err(error) => {
                debug!(%error, location = %self.location, "unparseable document");
                let tree = error_tree(error.message, error.position, error.position);
                return Ok(self.document(tree, text, fragment, ctx));
            }
        };
        let pipeline = Pipeline::raml10();
        let tree = if fragment.extends_base() {
            extension::build(&pipeline, tree, &ctx, self.max_phase)?
        } else {
            pipeline.run(tree, &ctx, self.max_phase)?
        };
        let document = self.document(tree, text, fragment, ctx);
        info!(
            location = %document.location,
            %fragment,
            errors = document.errors().len(),
            "built document"
        );
        Ok(document)
    }

    /// Reads and builds a file; its path becomes the build location.
    pub fn build_file(&self, path: &Path) -> Result<ApiDocument, RamlError> {
        let text = std::fs::read_to_string(path).map_err(|source| RamlError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.clone()
            .with_location(path.to_string_lossy().replace('\\', "/"))
            .build(&text)
    }

    fn context(&self, fragment: Fragment) -> Result<PhaseContext, RamlError> {
        Ok(PhaseContext {
            loader: self.loader.clone(),
            location: self.location.clone(),
            grammar: Arc::new(Grammar::raml10()?),
            fragment,
            type_rules: TypeRules::new(self.json.clone(), self.xml.clone()),
        })
    }

    fn document(&self, tree: Tree, text: &str, fragment: Fragment, ctx: PhaseContext) -> ApiDocument {
        ApiDocument {
            tree,
            source: text.to_string(),
            location: self.location.clone(),
            fragment,
            grammar: ctx.grammar,
            type_rules: ctx.type_rules,
        }
    }
}

/// A tree whose root is a single document-level error.
fn error_tree(message: String, start: Position, end: Position) -> Tree {
    let mut tree = Tree::new();
    let info = ErrorInfo {
        category: ErrorCategory::Structural,
        message,
    };
    let root = tree.add(NodeKind::Error(info), start, end);
    tree.set_root(root);
    tree
}

// ============================================================================
// BUILT DOCUMENTS
// ============================================================================

/// The result of a build: the final tree and what is needed to check
/// payloads against its types.
pub struct ApiDocument {
    tree: Tree,
    source: String,
    location: String,
    fragment: Fragment,
    grammar: Arc<Grammar>,
    type_rules: TypeRules,
}

impl ApiDocument {
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> Option<NodeId> {
        self.tree.root()
    }

    pub fn fragment(&self) -> Fragment {
        self.fragment
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_context(&self) -> SourceContext {
        SourceContext::new(self.location.clone(), self.source.clone())
    }

    pub fn errors(&self) -> Vec<ValidationResult> {
        self.tree.validation_results()
    }

    pub fn is_valid(&self) -> bool {
        self.root().map_or(true, |root| !self.tree.has_errors(root))
    }

    pub fn select(&self, selector: &str) -> Option<NodeId> {
        NodeSelector::parse(selector).select(&self.tree, self.root()?)
    }

    /// Checks a JSON or YAML payload against the type declaration found by
    /// `selector`, e.g. `/types/User`.
    pub fn validate_payload(&self, selector: &str, payload: &str) -> Vec<ValidationResult> {
        match self.select(selector) {
            Some(declaration) => examples::validate_payload(
                &self.type_rules,
                &self.grammar,
                &self.tree,
                declaration,
                payload,
            ),
            None => vec![ValidationResult::new(
                format!("Type '{}' cannot be found", selector),
                ErrorCategory::Reference,
                Position::default(),
                Position::default(),
            )],
        }
    }

    pub fn to_json(&self) -> Value {
        self.root().map_or(Value::Null, |root| self.tree.to_json(root))
    }
}

/// Builds `text` with default settings and returns the problems found.
pub fn validate(text: &str) -> Result<Vec<ValidationResult>, RamlError> {
    Ok(RamlBuilder::new().build(text)?.errors())
}
