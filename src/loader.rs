//! Resource loading for `!include` targets, `uses` libraries and extension
//! bases.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::LoadError;

/// Fetches the text of a resource by location.
pub trait ResourceLoader: Send + Sync {
    fn fetch(&self, location: &str) -> Result<String, LoadError>;
}

/// Resolves `relative` against the location of the document that names it.
pub fn resolve_location(base: &str, relative: &str) -> String {
    if relative.starts_with('/') || relative.contains("://") || base.is_empty() {
        return normalize(relative);
    }
    let directory = match base.rfind('/') {
        Some(index) => &base[..=index],
        None => "",
    };
    normalize(&format!("{}{}", directory, relative))
}

/// Collapses `.` and `..` segments of a `/` separated location.
pub fn normalize(location: &str) -> String {
    let (scheme, path) = match location.find("://") {
        Some(index) => location.split_at(index + 3),
        None => ("", location),
    };
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("{}/{}", scheme, joined)
    } else {
        format!("{}{}", scheme, joined)
    }
}

// ============================================================================
// FILE SYSTEM
// ============================================================================

/// Reads from the file system. Relative locations are tried against each
/// root in order, then against the working directory.
#[derive(Debug, Clone, Default)]
pub struct FileResourceLoader {
    roots: Vec<PathBuf>,
}

impl FileResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roots(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    fn candidates(&self, location: &str) -> Vec<PathBuf> {
        let path = Path::new(location);
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }
        let mut candidates: Vec<PathBuf> = self.roots.iter().map(|root| root.join(path)).collect();
        candidates.push(path.to_path_buf());
        candidates
    }
}

impl ResourceLoader for FileResourceLoader {
    fn fetch(&self, location: &str) -> Result<String, LoadError> {
        for candidate in self.candidates(location) {
            match fs::read(&candidate) {
                Ok(bytes) => {
                    debug!(location, path = %candidate.display(), "loaded resource");
                    return String::from_utf8(bytes).map_err(|_| LoadError::Encoding {
                        location: location.to_string(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(LoadError::Io {
                        location: location.to_string(),
                        source,
                    })
                }
            }
        }
        Err(LoadError::NotFound {
            location: location.to_string(),
        })
    }
}

// ============================================================================
// IN MEMORY
// ============================================================================

/// Serves resources registered up front. Locations are normalized on both
/// sides.
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceLoader {
    entries: HashMap<String, String>,
}

impl MemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, location: &str, content: &str) -> Self {
        self.insert(location, content);
        self
    }

    pub fn insert(&mut self, location: &str, content: &str) {
        self.entries.insert(normalize(location), content.to_string());
    }
}

impl ResourceLoader for MemoryResourceLoader {
    fn fetch(&self, location: &str) -> Result<String, LoadError> {
        self.entries
            .get(&normalize(location))
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                location: location.to_string(),
            })
    }
}

// ============================================================================
// COMPOSITE
// ============================================================================

/// Tries each loader in order. A miss moves on to the next loader; any
/// other failure is kept and reported if nothing succeeds.
#[derive(Clone, Default)]
pub struct CompositeResourceLoader {
    loaders: Vec<Arc<dyn ResourceLoader>>,
}

impl CompositeResourceLoader {
    pub fn new(loaders: Vec<Arc<dyn ResourceLoader>>) -> Self {
        Self { loaders }
    }

    pub fn push(&mut self, loader: Arc<dyn ResourceLoader>) {
        self.loaders.push(loader);
    }
}

impl ResourceLoader for CompositeResourceLoader {
    fn fetch(&self, location: &str) -> Result<String, LoadError> {
        let mut failure = None;
        for loader in &self.loaders {
            match loader.fetch(location) {
                Ok(content) => return Ok(content),
                Err(LoadError::NotFound { .. }) => {}
                Err(other) => {
                    failure.get_or_insert(other);
                }
            }
        }
        Err(failure.unwrap_or_else(|| LoadError::NotFound {
            location: location.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_resolve_against_the_including_document() {
        assert_eq!(resolve_location("api/main.raml", "types/user.raml"), "api/types/user.raml");
        assert_eq!(resolve_location("api/main.raml", "../common.raml"), "common.raml");
        assert_eq!(resolve_location("main.raml", "./lib.raml"), "lib.raml");
        assert_eq!(resolve_location("api/main.raml", "/abs/x.raml"), "/abs/x.raml");
        assert_eq!(
            resolve_location("http://host/a/main.raml", "b.raml"),
            "http://host/a/b.raml"
        );
    }

    #[test]
    fn memory_and_composite_loaders() {
        let first = MemoryResourceLoader::new().with("a.raml", "first");
        let second = MemoryResourceLoader::new()
            .with("a.raml", "shadowed")
            .with("./b.raml", "second");
        let composite = CompositeResourceLoader::new(vec![Arc::new(first), Arc::new(second)]);
        assert_eq!(composite.fetch("a.raml").unwrap(), "first");
        assert_eq!(composite.fetch("b.raml").unwrap(), "second");
        assert!(matches!(
            composite.fetch("c.raml"),
            Err(LoadError::NotFound { .. })
        ));
    }

    #[test]
    fn file_loader_reports_missing_files() {
        let loader = FileResourceLoader::with_roots([PathBuf::from("/nonexistent-root")]);
        assert!(matches!(
            loader.fetch("missing.raml"),
            Err(LoadError::NotFound { .. })
        ));
    }
}
