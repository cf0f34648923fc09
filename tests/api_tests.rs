//! End-to-end checks through the public API.

mod common;

use std::sync::Arc;

use proptest::prelude::*;
use ramlkit::loader::MemoryResourceLoader;
use ramlkit::nodes::ErrorCategory;
use ramlkit::suggest::context;
use ramlkit::{suggestions, Fragment, RamlBuilder, RamlError};

const SHOP: &str = include_str!("fixtures/shop.raml");

fn labels(text: &str) -> Vec<String> {
    suggestions(text, text.len()).into_iter().map(|s| s.label).collect()
}

// ============================================================================
// BUILDS
// ============================================================================

#[test]
fn shop_builds_through_every_phase() {
    let document = RamlBuilder::new().build_file(&common::fixture("shop.raml")).unwrap();
    assert!(document.is_valid(), "{:?}", document.errors());

    let json = document.to_json();
    assert_eq!(json["/products"]["description"], "All products");
    assert_eq!(json["/products"]["get"]["description"], "List PRODUCTS");
    assert_eq!(
        json["/products"]["get"]["queryParameters"]["x-page"],
        "integer"
    );
    assert_eq!(
        json["/products"]["get"]["responses"]["200"]["body"]["application/json"],
        "Product"
    );
}

#[test]
fn union_slots_multiply_into_property_sets() {
    let text = "\
#%RAML 1.0
title: T
types:
  A:
    properties:
      a: string
  B:
    properties:
      b: string
  C:
    properties:
      c: string
  D:
    properties:
      d: string
  Product:
    type: [A | B, C | D]
  Single:
    type: [A | A]
";
    let document = RamlBuilder::new().with_max_phase(3).build(text).unwrap();
    assert!(document.is_valid(), "{:?}", document.errors());
    let labels = |name: &str| -> Vec<String> {
        let declaration = document.select(&format!("/types/{}", name)).unwrap();
        document
            .tree()
            .node(declaration)
            .inherited
            .iter()
            .map(|set| set.label.clone())
            .collect()
    };
    assert_eq!(labels("Product"), vec!["A,C", "A,D", "B,C", "B,D"]);
    assert_eq!(labels("Single"), vec!["A"]);
}

#[test]
fn problems_carry_their_category_and_position() {
    let document = RamlBuilder::new()
        .build_file(&common::fixture("unresolved_trait.raml"))
        .unwrap();
    let errors = document.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category, ErrorCategory::Reference);
    assert_eq!(errors[0].start.line, 6);
    assert_eq!(errors[0].to_string(), format!("7:{}: {}", errors[0].start.column + 1, errors[0].message));
}

#[test]
fn missing_extension_bases_are_fatal() {
    let result = RamlBuilder::new()
        .with_loader(Arc::new(MemoryResourceLoader::new()))
        .with_location("api/ext.raml")
        .build("#%RAML 1.0 Extension\nextends: base.raml\ntitle: X\n");
    assert!(matches!(result, Err(RamlError::Load { ref location, .. }) if location == "api/base.raml"));
}

#[test]
fn extensions_merge_onto_their_base() {
    let document = RamlBuilder::new()
        .build_file(&common::fixture("extension.raml"))
        .unwrap();
    assert!(document.is_valid(), "{:?}", document.errors());
    assert_eq!(document.fragment(), Fragment::Extension);
    let json = document.to_json();
    assert_eq!(json["title"], "Books v2");
    assert_eq!(json["version"], "v1");
    assert_eq!(json["/books"]["get"]["description"], "List books");
    assert_eq!(json["/books"]["post"]["description"], "Add a book");
}

// ============================================================================
// PAYLOADS
// ============================================================================

#[test]
fn payloads_are_checked_against_declared_types() {
    let document = RamlBuilder::new().build_file(&common::fixture("shop.raml")).unwrap();
    let good = std::fs::read_to_string(common::fixture("payloads/good_product.json")).unwrap();
    let bad = std::fs::read_to_string(common::fixture("payloads/bad_product.json")).unwrap();

    assert!(document.validate_payload("/types/Product", &good).is_empty());
    let problems: Vec<String> = document
        .validate_payload("/types/Product", &bad)
        .into_iter()
        .map(|r| r.message)
        .collect();
    assert_eq!(problems, vec!["Missing required field \"name\""]);

    let unparseable = document.validate_payload("/types/Product", "{\"name\": ");
    assert_eq!(unparseable.len(), 1);
    assert_eq!(unparseable[0].category, ErrorCategory::Structural);
}

// ============================================================================
// SUGGESTIONS
// ============================================================================

#[test]
fn suggestions_are_filtered_by_what_was_typed() {
    assert_eq!(labels("#%RAML 1.0\nti"), vec!["title"]);
    assert_eq!(
        labels("#%RAML 1.0\ntitle: T\n/a:\n  get:\n    d"),
        vec!["description", "displayName"]
    );
    assert_eq!(labels("#%RAML 1.0\ntitle: T\nprotocols: [HTTPS"), vec!["HTTPS"]);
}

#[test]
fn suggested_values_are_ready_to_insert() {
    let text = "#%RAML 1.0\ntitle: T\n/a:\n  get:\n    descr";
    let found = suggestions(text, text.len());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].value, "description: ");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn suggestions_always_extend_the_typed_prefix(cursor in 0usize..=SHOP.len()) {
        let typed = context::scan(SHOP, cursor).prefix;
        for suggestion in suggestions(SHOP, cursor) {
            prop_assert!(
                suggestion.value.starts_with(&typed),
                "{:?} does not start with {:?}",
                suggestion.value,
                typed
            );
        }
    }
}
