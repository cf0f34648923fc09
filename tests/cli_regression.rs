// Regression tests for the ramlkit binary: exit codes, miette diagnostics
// and machine-readable output.

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn ramlkit() -> Command {
    let mut cmd = Command::cargo_bin("ramlkit").unwrap();
    cmd.env_remove("RAMLKIT_CONFIG").arg("--color").arg("never");
    cmd
}

#[test]
fn valid_documents_pass() {
    ramlkit()
        .arg("validate")
        .arg("tests/fixtures/shop.raml")
        .assert()
        .success()
        .stdout(contains("PASS tests/fixtures/shop.raml"));
}

#[test]
fn problems_are_rendered_as_diagnostics() {
    ramlkit()
        .arg("validate")
        .arg("tests/fixtures/unknown_key.raml")
        .assert()
        .code(1)
        .stdout(contains("FAIL"))
        .stderr(contains("ramlkit::validation").and(contains("Unexpected key 'bogus'")));
}

#[test]
fn directories_are_searched_for_raml_files() {
    ramlkit()
        .arg("validate")
        .arg("--format")
        .arg("json")
        .arg("tests/fixtures")
        .assert()
        .code(1)
        .stdout(
            contains("\"file\": \"tests/fixtures/libs/common.raml\"")
                .and(contains("Cyclic type definition: A -> B -> A")),
        );
}

#[test]
fn missing_files_are_fatal() {
    ramlkit()
        .arg("validate")
        .arg("tests/fixtures/nowhere.raml")
        .assert()
        .failure()
        .stderr(contains("ramlkit::io"));
}

#[test]
fn suggestions_are_listed() {
    ramlkit()
        .arg("suggest")
        .arg("tests/fixtures/library.raml")
        .arg("--offset")
        .arg("11")
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(
            contains("\"label\": \"types\"")
                .and(contains("\"label\": \"version\""))
                .and(contains("\"label\": \"title\"").not()),
        );
}

#[test]
fn trees_can_stop_at_any_phase() {
    ramlkit()
        .arg("tree")
        .arg("tests/fixtures/shop.raml")
        .arg("--phase")
        .arg("2")
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(contains("\"title\": \"Shop\"").and(contains("<<resourcePathName>>")));
}

#[test]
fn payloads_are_validated() {
    ramlkit()
        .args(["payload", "tests/fixtures/shop.raml", "--type", "/types/Product"])
        .args(["--payload", "tests/fixtures/payloads/good_product.json"])
        .assert()
        .success();
    ramlkit()
        .args(["payload", "tests/fixtures/shop.raml", "--type", "/types/Product"])
        .args(["--payload", "tests/fixtures/payloads/bad_product.json"])
        .assert()
        .code(1)
        .stderr(contains("Missing required field"));
}

#[test]
fn broken_config_files_are_reported() {
    ramlkit()
        .args(["--config", "tests/fixtures/payloads/good_product.json"])
        .args(["validate", "tests/fixtures/shop.raml"])
        .assert()
        .code(2)
        .stderr(contains("ramlkit::config"));
}
