//! The top-level weaver configuration.

use serde::{Deserialize, Serialize};

use crate::filter::ClassFilter;
use crate::options::ClassOptions;

/// The full configuration for one weaving run.
///
/// A user project exposes exactly one static parameterless method marked
/// with [`crate::names::CONFIG_SOURCE`] that yields this value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaveConfig {
    pub class_filter: ClassFilter,
    pub class_options: ClassOptions,
}

impl WeaveConfig {
    /// A stable, total, human-readable serialization of the configuration.
    ///
    /// Map keys render in insertion order and name sets in lexicographic
    /// order, so two byte-identical fingerprints mean the same rule set.
    /// This text is what the fingerprint guard persists and compares
    /// across incremental builds.
    pub fn canonical_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
