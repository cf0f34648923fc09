//! Fixture discovery for the integration tests.
//!
//! Every `.raml` file directly inside `tests/fixtures` is a case. Lines of
//! the form `# expect: <message>` list, in order, the problems a full build
//! must report; each reported message must start with its expectation. A
//! fixture without such lines must build cleanly.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub const FIXTURES: &str = "tests/fixtures";

const EXPECT: &str = "# expect:";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(FIXTURES).join(name)
}

pub fn fixtures() -> Vec<PathBuf> {
    WalkDir::new(FIXTURES)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "raml"))
        .collect()
}

pub fn expectations(source: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| line.trim().strip_prefix(EXPECT))
        .map(|expected| expected.trim().to_string())
        .collect()
}

pub fn matches(expected: &[String], actual: &[String]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual)
            .all(|(expected, actual)| actual.starts_with(expected.as_str()))
}
