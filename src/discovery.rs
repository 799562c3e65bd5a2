//! Discovery and loading of compiled class files.
//!
//! Walks each output location recursively, parses every `.class` file into
//! an owned [`ClassFile`], and remembers which location it came from.
//! Classes found under different locations are never deduplicated: each is
//! an independent writable unit written back to its own origin.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;

use crate::classfile::{qualified_to_internal, ClassFile, ClassFileError};

/// Errors during discovery and write-back.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("found no class files in these locations: {0:?}")]
    NoClassFilesFound(Vec<PathBuf>),

    #[error("failed to walk output location: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ClassFileError,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One loaded class tied to the output location it was found under.
#[derive(Debug, Clone)]
pub struct LoadedClass {
    pub class_file: ClassFile,
    pub origin: PathBuf,
}

impl LoadedClass {
    pub fn name(&self) -> Result<String, ClassFileError> {
        self.class_file.class_name()
    }

    /// The path this class is written back to: its origin location plus
    /// the package-derived relative path. For classes loaded from disk
    /// this overwrites the original file.
    pub fn output_path(&self) -> Result<PathBuf, ClassFileError> {
        let name = self.name()?;
        Ok(self
            .origin
            .join(format!("{}.class", qualified_to_internal(&name))))
    }

    /// Serializes the class back to its origin location, creating parent
    /// directories as needed.
    pub fn write_back(&self) -> Result<(), DiscoveryError> {
        let path = self.output_path().map_err(|source| DiscoveryError::Parse {
            path: self.origin.clone(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| DiscoveryError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, self.class_file.to_bytes()).map_err(|source| DiscoveryError::Write {
            path,
            source,
        })
    }
}

/// Recursively loads every class file under the given output locations.
///
/// Fails with [`DiscoveryError::NoClassFilesFound`] if the combined result
/// is empty.
pub fn discover(output_locations: &[PathBuf]) -> Result<Vec<LoadedClass>, DiscoveryError> {
    info!(locations = ?output_locations, "scanning output locations for class files");
    let mut classes = Vec::new();
    for location in output_locations {
        let before = classes.len();
        for entry in WalkDir::new(location).follow_links(false) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_class_file(path) {
                continue;
            }
            let bytes = fs::read(path).map_err(|source| DiscoveryError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let class_file = ClassFile::parse(&bytes).map_err(|source| DiscoveryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            classes.push(LoadedClass {
                class_file,
                origin: location.clone(),
            });
        }
        info!(
            location = %location.display(),
            count = classes.len() - before,
            "loaded class files"
        );
    }
    if classes.is_empty() {
        return Err(DiscoveryError::NoClassFilesFound(output_locations.to_vec()));
    }
    Ok(classes)
}

fn is_class_file(path: &Path) -> bool {
    path.extension().map(|e| e == "class").unwrap_or(false)
}
