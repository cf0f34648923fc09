//! Overlays and extensions: the document is laid over the base it
//! `extends` and the merged tree goes through the remaining phases with the
//! base document's grammar.

use tracing::{debug, info};

use super::merge::{merge, MergePolicy};
use super::{Pipeline, PhaseContext};
use crate::error::RamlError;
use crate::loader::resolve_location;
use crate::nodes::{ErrorCategory, Tree};
use crate::syntax::{parse_yaml, RamlHeader};

/// Phases run on each document before merging: includes and grammar.
const BEFORE_MERGE: usize = 2;

/// Builds an overlay or extension up to phase `last`. A base document that
/// cannot be loaded or parsed stops the build.
pub fn build(
    pipeline: &Pipeline,
    tree: Tree,
    ctx: &PhaseContext,
    last: usize,
) -> Result<Tree, RamlError> {
    let tree = pipeline.run(tree, ctx, last.min(BEFORE_MERGE))?;
    let Some(root) = tree.root() else {
        return Ok(tree);
    };
    if last <= BEFORE_MERGE || tree.has_errors(root) {
        return Ok(tree);
    }
    let Some(extends) = tree.get_literal(root, "extends") else {
        return Ok(tree);
    };

    let location = resolve_location(&ctx.location, &extends);
    debug!(%location, "loading base document");
    let text = ctx.loader.fetch(&location).map_err(|source| RamlError::Load {
        location: location.clone(),
        source,
    })?;
    let header = RamlHeader::parse(&text).map_err(|e| RamlError::Document {
        message: format!("Invalid base document '{}': {}", location, e),
    })?;
    let base = parse_yaml(&text).map_err(|e| RamlError::Document {
        message: format!("Error parsing '{}': {}", location, e),
    })?;
    let base_ctx = PhaseContext {
        location: location.clone(),
        ..ctx.for_fragment(header.fragment)
    };
    let mut base = if header.fragment.extends_base() {
        build(pipeline, base, &base_ctx, BEFORE_MERGE)?
    } else {
        pipeline.run(base, &base_ctx, BEFORE_MERGE)?
    };

    let Some(base_root) = base.root() else {
        return Ok(tree);
    };
    if base.has_errors(base_root) {
        let mut tree = tree;
        if let Some(node) = tree.get(root, "extends") {
            let message = format!("Base document '{}' has errors", location);
            let error = tree.error_for(node, ErrorCategory::Reference, message);
            tree.replace(node, error);
        }
        return Ok(tree);
    }

    let layer = base.graft(&tree, root);
    merge(&mut base, base_root, layer, MergePolicy::SourceWins);
    info!(%location, "merged onto base document");
    pipeline.run_between(base, &base_ctx, BEFORE_MERGE + 1, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryResourceLoader;
    use crate::phase::testing;
    use crate::selector::NodeSelector;
    use crate::syntax::Fragment;

    const BASE: &str = "\
#%RAML 1.0
title: Books
version: v1
traits:
  paged:
    queryParameters:
      page: integer
/books:
  get:
    description: List books
";

    fn build_extension(text: &str, loader: MemoryResourceLoader) -> Result<Tree, RamlError> {
        let ctx = testing::context_with(loader, "api/ext.raml").for_fragment(Fragment::Extension);
        build(&Pipeline::raml10(), parse_yaml(text).unwrap(), &ctx, 7)
    }

    fn literal(tree: &Tree, path: &str) -> Option<String> {
        NodeSelector::parse(path)
            .select(tree, tree.root().unwrap())
            .and_then(|n| tree.literal(n))
    }

    #[test]
    fn extensions_override_and_add() {
        let loader = MemoryResourceLoader::new().with("api/base.raml", BASE);
        let tree = build_extension(
            "#%RAML 1.0 Extension\nextends: base.raml\ntitle: Books v2\n/books:\n  get:\n    is: [paged]\n  post:\n    description: Add a book\n",
            loader,
        )
        .unwrap();
        assert!(tree.validation_results().is_empty(), "{:?}", tree.validation_results());
        assert_eq!(literal(&tree, "/title").as_deref(), Some("Books v2"));
        assert_eq!(literal(&tree, "/version").as_deref(), Some("v1"));
        assert_eq!(
            literal(&tree, "/\\/books/get/queryParameters/page").as_deref(),
            Some("integer")
        );
        assert_eq!(
            literal(&tree, "/\\/books/post/description").as_deref(),
            Some("Add a book")
        );
        assert!(literal(&tree, "/extends").is_none());
    }

    #[test]
    fn missing_bases_stop_the_build() {
        let result = build_extension(
            "#%RAML 1.0 Extension\nextends: nowhere.raml\n",
            MemoryResourceLoader::new(),
        );
        assert!(matches!(result, Err(RamlError::Load { ref location, .. }) if location == "api/nowhere.raml"));
    }

    #[test]
    fn broken_bases_are_reported_on_extends() {
        let loader = MemoryResourceLoader::new().with("api/base.raml", "#%RAML 1.0\ntitle: B\nbogus: 1\n");
        let tree = build_extension("#%RAML 1.0 Extension\nextends: base.raml\n", loader).unwrap();
        let messages: Vec<String> = tree.validation_results().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["Base document 'api/base.raml' has errors"]);
    }
}
