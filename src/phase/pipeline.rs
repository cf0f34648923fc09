//! Ordered execution of the build phases.

use tracing::{debug, info};

use super::annotations::AnnotationPhase;
use super::examples::ExamplePhase;
use super::grammar::GrammarPhase;
use super::includes::IncludePhase;
use super::media_types::MediaTypePhase;
use super::resource_types::{ReferenceCheck, ResourceTypesAndTraits};
use super::types::TypeResolution;
use super::{CompositePhase, Phase, PhaseContext, TransformationPhase};
use crate::error::RamlError;
use crate::nodes::Tree;

/// Number of the final phase of [`Pipeline::raml10`].
pub const LAST_PHASE: usize = 7;

/// The phases of a build, numbered from 1. After a phase leaves any error
/// node in the tree, later phases are skipped.
pub struct Pipeline {
    phases: Vec<Box<dyn Phase>>,
}

impl Pipeline {
    pub fn new(phases: Vec<Box<dyn Phase>>) -> Self {
        Self { phases }
    }

    /// Includes, grammar, templates and types, grammar again, annotations,
    /// media types, examples.
    pub fn raml10() -> Self {
        let templates = CompositePhase::new(
            "resource types, traits and types",
            vec![
                Box::new(TransformationPhase::new("references").with(ReferenceCheck)),
                Box::new(TransformationPhase::new("resource types").with(ResourceTypesAndTraits)),
                Box::new(TransformationPhase::new("types").with(TypeResolution)),
            ],
        );
        Self::new(vec![
            Box::new(IncludePhase),
            Box::new(GrammarPhase::new("grammar")),
            Box::new(templates),
            Box::new(GrammarPhase::new("expanded grammar")),
            Box::new(TransformationPhase::new("annotations").with(AnnotationPhase)),
            Box::new(TransformationPhase::new("media types").with(MediaTypePhase)),
            Box::new(TransformationPhase::new("examples").with(ExamplePhase)),
        ])
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Runs phases `1..=last`.
    pub fn run(&self, tree: Tree, ctx: &PhaseContext, last: usize) -> Result<Tree, RamlError> {
        self.run_between(tree, ctx, 1, last)
    }

    /// Runs phases `first..=last`, stopping early once errors exist.
    pub fn run_between(
        &self,
        mut tree: Tree,
        ctx: &PhaseContext,
        first: usize,
        last: usize,
    ) -> Result<Tree, RamlError> {
        for (index, phase) in self.phases.iter().enumerate() {
            let number = index + 1;
            if number < first || number > last {
                continue;
            }
            debug!(phase = phase.name(), number, "running phase");
            tree = phase.apply(tree, ctx)?;
            let errors = tree.root().map_or(0, |root| tree.find_errors(root).len());
            if errors > 0 {
                info!(phase = phase.name(), number, errors, "stopping after phase with errors");
                break;
            }
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::testing;
    use crate::syntax::parse_yaml;

    struct Count(&'static str);

    impl Phase for Count {
        fn name(&self) -> &'static str {
            self.0
        }

        fn apply(&self, mut tree: Tree, _ctx: &PhaseContext) -> Result<Tree, RamlError> {
            let root = tree.root().unwrap();
            let marker = tree.add_like(crate::nodes::NodeKind::String(self.0.into()), root);
            let key = tree.add_like(crate::nodes::NodeKind::String(self.0.into()), root);
            let pair = tree.add_pair(key, marker);
            tree.push_child(root, pair);
            Ok(tree)
        }
    }

    struct Break;

    impl Phase for Break {
        fn name(&self) -> &'static str {
            "break"
        }

        fn apply(&self, mut tree: Tree, _ctx: &PhaseContext) -> Result<Tree, RamlError> {
            let root = tree.root().unwrap();
            let error = tree.error_for(root, crate::nodes::ErrorCategory::Structural, "broken");
            tree.push_child(root, error);
            Ok(tree)
        }
    }

    fn keys(tree: &Tree) -> Vec<String> {
        let root = tree.root().unwrap();
        tree.pairs(root)
            .into_iter()
            .filter_map(|p| tree.key_literal(p))
            .collect()
    }

    #[test]
    fn phases_past_the_cutoff_do_not_run() {
        let pipeline = Pipeline::new(vec![
            Box::new(Count("one")),
            Box::new(Count("two")),
            Box::new(Count("three")),
        ]);
        let ctx = testing::context("");
        let tree = pipeline.run(parse_yaml("{}").unwrap(), &ctx, 2).unwrap();
        assert_eq!(keys(&tree), vec!["one", "two"]);
    }

    #[test]
    fn errors_stop_the_pipeline() {
        let pipeline = Pipeline::new(vec![
            Box::new(Count("one")),
            Box::new(Break),
            Box::new(Count("three")),
        ]);
        let ctx = testing::context("");
        let tree = pipeline.run(parse_yaml("{}").unwrap(), &ctx, 3).unwrap();
        assert_eq!(keys(&tree), vec!["one"]);
        assert_eq!(tree.validation_results().len(), 1);
    }

    #[test]
    fn raml10_has_seven_phases() {
        assert_eq!(Pipeline::raml10().len(), LAST_PHASE);
    }
}
