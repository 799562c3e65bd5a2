//! Configuration fingerprint guard.
//!
//! Annotations woven under one configuration may be incompatible with a
//! changed one, and the engine cannot un-apply them. So the canonical text
//! of the active configuration is persisted on the first run, embedded as
//! the sole UTF-8 constant of a synthetic marker class under the metadata
//! output location, and compared byte-for-byte on every later run. A
//! mismatch is fatal and requires a clean rebuild, which deletes the
//! marker along with the rest of the build output.
//!
//! The read-then-write sequence is not transactional; a concurrent second
//! invocation against the same output location is undefined behavior.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use classweave_api::WeaveConfig;

use crate::classfile::{qualified_to_internal, ClassFile, ClassFileBuilder, ClassFileError};

/// Qualified name of the synthetic marker class.
pub const META_CLASS_NAME: &str = "io.classweave.meta.Meta";

/// Constant pool slot holding the fingerprint text.
///
/// Fixed by the marker-class builder's deterministic pool layout: slots 1-4
/// hold the this-class and super-class entries, the fingerprint is the
/// first addition after that.
pub const FINGERPRINT_INDEX: u16 = 5;

/// Errors from the fingerprint guard.
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error(
        "the configuration has changed; rebuild (clean and build) the project.\n\
         Old: {old}\n\
         New: {new}"
    )]
    ConfigurationChanged { old: String, new: String },

    #[error("failed to serialize configuration: {0}")]
    Canonicalize(#[from] serde_json::Error),

    #[error("failed to read marker class {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write marker class {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    ClassFile(#[from] ClassFileError),

    /// A programming-contract violation, not a user-facing condition.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

/// Path of the marker class under the metadata output location.
pub fn marker_path(metadata_location: &Path) -> PathBuf {
    metadata_location.join(format!("{}.class", qualified_to_internal(META_CLASS_NAME)))
}

/// Checks the persisted fingerprint against the active configuration,
/// persisting it on the first run.
pub fn guard(metadata_location: &Path, config: &WeaveConfig) -> Result<(), FingerprintError> {
    let current = config.canonical_text()?;
    let path = marker_path(metadata_location);
    if path.exists() {
        let bytes = fs::read(&path).map_err(|source| FingerprintError::Read {
            path: path.clone(),
            source,
        })?;
        let marker = ClassFile::parse(&bytes)?;
        let persisted = marker.pool.utf8(FINGERPRINT_INDEX).map_err(|_| {
            FingerprintError::InternalInvariant(format!(
                "marker class {} has no Utf8 constant at slot {}",
                path.display(),
                FINGERPRINT_INDEX
            ))
        })?;
        if persisted != current {
            return Err(FingerprintError::ConfigurationChanged {
                old: persisted.to_string(),
                new: current,
            });
        }
        debug!("configuration fingerprint matches the persisted marker");
        Ok(())
    } else {
        let mut marker = ClassFileBuilder::new(META_CLASS_NAME).build()?;
        let index = marker.pool.add_utf8(&current)?;
        if index != FINGERPRINT_INDEX {
            return Err(FingerprintError::InternalInvariant(format!(
                "fingerprint landed at pool slot {index}, expected {FINGERPRINT_INDEX}"
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| FingerprintError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, marker.to_bytes()).map_err(|source| FingerprintError::Write {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "persisted configuration fingerprint");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed_config() -> WeaveConfig {
        let mut config = WeaveConfig::default();
        config.class_filter.package_prefix = "com.acme".to_string();
        config
    }

    #[test]
    fn first_run_persists_the_marker() {
        let dir = tempfile::tempdir().unwrap();
        let config = WeaveConfig::default();
        guard(dir.path(), &config).unwrap();

        let path = marker_path(dir.path());
        assert!(path.exists());
        let marker = ClassFile::parse(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(marker.class_name().unwrap(), META_CLASS_NAME);
        assert_eq!(
            marker.pool.utf8(FINGERPRINT_INDEX).unwrap(),
            config.canonical_text().unwrap()
        );
    }

    #[test]
    fn same_config_passes_on_later_runs() {
        let dir = tempfile::tempdir().unwrap();
        let config = WeaveConfig::default();
        guard(dir.path(), &config).unwrap();
        guard(dir.path(), &config).unwrap();
    }

    #[test]
    fn changed_config_fails_until_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        guard(dir.path(), &WeaveConfig::default()).unwrap();

        let result = guard(dir.path(), &changed_config());
        assert!(matches!(
            result,
            Err(FingerprintError::ConfigurationChanged { .. })
        ));

        // The original configuration still passes.
        guard(dir.path(), &WeaveConfig::default()).unwrap();

        // A clean build output accepts the new configuration.
        fs::remove_file(marker_path(dir.path())).unwrap();
        guard(dir.path(), &changed_config()).unwrap();
    }

    #[test]
    fn mismatch_reports_both_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let old = WeaveConfig::default();
        guard(dir.path(), &old).unwrap();

        match guard(dir.path(), &changed_config()) {
            Err(FingerprintError::ConfigurationChanged { old: o, new: n }) => {
                assert_eq!(o, old.canonical_text().unwrap());
                assert_eq!(n, changed_config().canonical_text().unwrap());
            }
            other => panic!("expected ConfigurationChanged, got {other:?}"),
        }
    }
}
