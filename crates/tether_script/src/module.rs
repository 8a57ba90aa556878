//! Module source resolution
//!
//! Dotted names map onto the search paths: `a.b` is `a/b.js` or
//! `a/b/index.js` under the first directory that has either. Sources
//! registered in memory take precedence over the file system.

use crate::error::{BridgeError, BridgeResult};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Origin reported for in-memory sources.
pub const MEMORY_ORIGIN: &str = "<memory>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub name: String,
    pub text: String,
    /// File path, or [`MEMORY_ORIGIN`]
    pub origin: String,
}

#[derive(Debug, Default)]
pub struct ModuleLoader {
    paths: Vec<PathBuf>,
    sources: HashMap<String, String>,
}

fn segments(name: &str) -> BridgeResult<Vec<&str>> {
    let invalid = || BridgeError::InvalidModuleName {
        name: name.to_string(),
    };
    if name.is_empty() {
        return Err(invalid());
    }
    name.split('.')
        .map(|segment| {
            let bad = segment.is_empty() || segment.contains(['/', '\\', ':']);
            if bad {
                Err(invalid())
            } else {
                Ok(segment)
            }
        })
        .collect()
}

fn read_candidate(path: &Path) -> BridgeResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(BridgeError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl ModuleLoader {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            sources: HashMap::new(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Append a search directory. Already-known directories are ignored.
    pub fn add_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Register (or replace) an in-memory module source.
    pub fn register(&mut self, name: &str, text: impl Into<String>) -> BridgeResult<()> {
        segments(name)?;
        self.sources.insert(name.to_string(), text.into());
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> BridgeResult<ModuleSource> {
        let segments = segments(name)?;

        if let Some(text) = self.sources.get(name) {
            return Ok(ModuleSource {
                name: name.to_string(),
                text: text.clone(),
                origin: MEMORY_ORIGIN.to_string(),
            });
        }

        let relative: PathBuf = segments.iter().collect();
        for dir in &self.paths {
            let base = dir.join(&relative);
            let candidates = [base.with_extension("js"), base.join("index.js")];
            for candidate in candidates {
                if let Some(text) = read_candidate(&candidate)? {
                    return Ok(ModuleSource {
                        name: name.to_string(),
                        text,
                        origin: candidate.display().to_string(),
                    });
                }
            }
        }

        Err(BridgeError::ModuleNotFound {
            name: name.to_string(),
        })
    }
}
