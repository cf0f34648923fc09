//! Builds every fixture and compares its problems with the ones it expects.

mod common;

use std::fs;

use ramlkit::RamlBuilder;

#[test]
fn fixtures_report_exactly_their_expected_problems() {
    let fixtures = common::fixtures();
    assert!(fixtures.len() >= 10, "fixtures missing: {:?}", fixtures);

    let builder = RamlBuilder::new();
    let mut failures = Vec::new();
    for path in fixtures {
        let source = fs::read_to_string(&path).unwrap();
        let expected = common::expectations(&source);
        let document = match builder.build_file(&path) {
            Ok(document) => document,
            Err(e) => {
                failures.push(format!("{}: build failed: {}", path.display(), e));
                continue;
            }
        };
        let actual: Vec<String> = document.errors().into_iter().map(|r| r.message).collect();
        if !common::matches(&expected, &actual) {
            failures.push(format!(
                "{}:\n  expected {:?}\n  actual   {:?}",
                path.display(),
                expected,
                actual
            ));
        }
    }
    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

#[test]
fn expectations_are_read_from_comments() {
    let source = "#%RAML 1.0\n# expect: first\n  # expect:   second  \ntitle: T\n";
    assert_eq!(common::expectations(source), vec!["first", "second"]);
    assert!(common::matches(
        &["Unexpected key 'x'".to_string()],
        &["Unexpected key 'x'. Options are : title".to_string()]
    ));
}
