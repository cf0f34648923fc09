//! The `#%RAML <version> [<fragment>]` first line of every document.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Kind of document named by the header. `Api` is a full API definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fragment {
    Api,
    Library,
    Overlay,
    Extension,
    DataType,
    Trait,
    ResourceType,
    AnnotationTypeDeclaration,
    DocumentationItem,
    NamedExample,
    SecurityScheme,
}

impl Fragment {
    pub const ALL: [Fragment; 11] = [
        Fragment::Api,
        Fragment::Library,
        Fragment::Overlay,
        Fragment::Extension,
        Fragment::DataType,
        Fragment::Trait,
        Fragment::ResourceType,
        Fragment::AnnotationTypeDeclaration,
        Fragment::DocumentationItem,
        Fragment::NamedExample,
        Fragment::SecurityScheme,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Fragment::Api => "",
            Fragment::Library => "Library",
            Fragment::Overlay => "Overlay",
            Fragment::Extension => "Extension",
            Fragment::DataType => "DataType",
            Fragment::Trait => "Trait",
            Fragment::ResourceType => "ResourceType",
            Fragment::AnnotationTypeDeclaration => "AnnotationTypeDeclaration",
            Fragment::DocumentationItem => "DocumentationItem",
            Fragment::NamedExample => "NamedExample",
            Fragment::SecurityScheme => "SecurityScheme",
        }
    }

    /// Overlays and extensions are merged onto a base document.
    pub fn extends_base(&self) -> bool {
        matches!(self, Fragment::Overlay | Fragment::Extension)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Api => f.write_str("Api"),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for Fragment {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.eq_ignore_ascii_case("api") {
            return Ok(Fragment::Api);
        }
        Fragment::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| HeaderError::UnknownFragment(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("Invalid header: the document must start with '#%RAML 1.0'")]
    Missing,
    #[error("Unsupported RAML version '{0}'")]
    UnsupportedVersion(String),
    #[error("Unsupported fragment type '{0}'")]
    UnknownFragment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RamlHeader {
    pub fragment: Fragment,
}

impl RamlHeader {
    pub fn parse(text: &str) -> Result<RamlHeader, HeaderError> {
        let first_line = text.trim_start_matches('\u{feff}').lines().next().unwrap_or("");
        let mut tokens = first_line.split_whitespace();
        if tokens.next() != Some("#%RAML") {
            return Err(HeaderError::Missing);
        }
        match tokens.next() {
            Some("1.0") => {}
            Some(other) => return Err(HeaderError::UnsupportedVersion(other.to_string())),
            None => return Err(HeaderError::Missing),
        }
        let fragment = match tokens.next() {
            Some(name) => name.parse()?,
            None => Fragment::Api,
        };
        Ok(RamlHeader { fragment })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fragment_headers() {
        let header = RamlHeader::parse("#%RAML 1.0 Library\nusage: x").unwrap();
        assert_eq!(header.fragment, Fragment::Library);
        assert_eq!(RamlHeader::parse("#%RAML 1.0\n").unwrap().fragment, Fragment::Api);
    }

    #[test]
    fn rejects_other_versions() {
        assert_eq!(
            RamlHeader::parse("#%RAML 0.8\n"),
            Err(HeaderError::UnsupportedVersion("0.8".into()))
        );
        assert_eq!(RamlHeader::parse("title: x"), Err(HeaderError::Missing));
        assert_eq!(
            RamlHeader::parse("#%RAML 1.0 Poem"),
            Err(HeaderError::UnknownFragment("Poem".into()))
        );
    }
}
