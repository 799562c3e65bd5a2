//! End-to-end weave orchestration.
//!
//! A run is a fixed sequence: discover class files, resolve the
//! configuration source, check the configuration fingerprint, select the
//! eligible classes, run the rule engine, and write every loaded class
//! back to its origin. Any failure aborts the run before write-back, so a
//! failed run leaves the build output untouched.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use classweave_api::WeaveConfig;

use crate::annotate::{annotate_all, AnnotateError, AnnotateStats};
use crate::classfile::ClassFileError;
use crate::discovery::{discover, DiscoveryError};
use crate::filter::select;
use crate::fingerprint::{guard, FingerprintError};
use crate::source::{find_config_source, ConfigFactory, FactoryError, SourceError};

/// Errors from a weave run.
#[derive(Debug, Error)]
pub enum WeaveError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error(transparent)]
    Annotate(#[from] AnnotateError),

    #[error(transparent)]
    ClassFile(#[from] ClassFileError),
}

impl WeaveError {
    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            WeaveError::Discovery(_) => 10,
            WeaveError::Source(_) => 20,
            WeaveError::Factory(_) => 21,
            WeaveError::Fingerprint(FingerprintError::ConfigurationChanged { .. }) => 30,
            WeaveError::Fingerprint(_) => 31,
            WeaveError::Annotate(AnnotateError::InconsistentNullability { .. }) => 40,
            WeaveError::Annotate(_) => 41,
            WeaveError::ClassFile(_) => 41,
        }
    }
}

/// Result type for weave operations.
pub type WeaveResult<T> = Result<T, WeaveError>;

/// Per-run accounting for the final summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub classes_loaded: usize,
    pub classes_selected: usize,
    pub classes_changed: usize,
    pub fields_changed: usize,
}

/// One weave invocation over a set of build output locations.
pub struct Weaver {
    /// Locations scanned for class files and written back to.
    pub output_locations: Vec<PathBuf>,
    /// Location holding the configuration fingerprint marker.
    pub metadata_location: PathBuf,
}

impl Weaver {
    pub fn new(output_locations: Vec<PathBuf>, metadata_location: PathBuf) -> Self {
        Weaver {
            output_locations,
            metadata_location,
        }
    }

    /// Runs the full weave sequence.
    ///
    /// The configuration value comes from the given factory, invoked for
    /// the single config-source method discovered in the loaded classes.
    pub fn run(&self, factory: &dyn ConfigFactory) -> WeaveResult<RunSummary> {
        let mut classes = discover(&self.output_locations)?;

        let source = find_config_source(&classes)?;
        let config: WeaveConfig = factory.produce(&source)?;

        guard(&self.metadata_location, &config)?;

        let selected = select(&classes, &config.class_filter)?;
        info!(
            loaded = classes.len(),
            selected = selected.len(),
            "selected classes for weaving"
        );

        let stats: AnnotateStats =
            annotate_all(&mut classes, &selected, &config.class_options)?;

        // Every loaded class is written back, changed or not, so the
        // output locations end up in a uniform post-weave state.
        for loaded in &classes {
            loaded.write_back()?;
        }

        let summary = RunSummary {
            classes_loaded: classes.len(),
            classes_selected: selected.len(),
            classes_changed: stats.classes_changed,
            fields_changed: stats.fields_changed,
        };
        info!(
            loaded = summary.classes_loaded,
            selected = summary.classes_selected,
            changed_classes = summary.classes_changed,
            changed_fields = summary.fields_changed,
            "weave run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_the_fatal_conditions() {
        let discovery = WeaveError::Discovery(DiscoveryError::NoClassFilesFound(vec![]));
        assert_eq!(discovery.exit_code(), 10);

        let source = WeaveError::Source(SourceError::Misconfiguration { count: 0 });
        assert_eq!(source.exit_code(), 20);

        let changed = WeaveError::Fingerprint(FingerprintError::ConfigurationChanged {
            old: "a".into(),
            new: "b".into(),
        });
        assert_eq!(changed.exit_code(), 30);

        let conflict = WeaveError::Annotate(AnnotateError::InconsistentNullability {
            class_name: "C".into(),
            field_name: "f".into(),
            offending: vec![],
        });
        assert_eq!(conflict.exit_code(), 40);
    }
}
