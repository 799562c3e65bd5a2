//! Class selection filter.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::names;

/// Determines which classes get woven.
///
/// A class is selected when its qualified name starts with
/// [`package_prefix`](Self::package_prefix), it carries at least one of the
/// [`marker_annotations`](Self::marker_annotations), and it carries none of
/// the [`ignored_annotations`](Self::ignored_annotations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassFilter {
    /// Prefix of the packages containing the classes to weave.
    /// Empty selects all packages.
    pub package_prefix: String,

    /// Qualified names marking classes as weavable (any-of).
    pub marker_annotations: BTreeSet<String>,

    /// Classes carrying any of these qualified names are skipped entirely.
    pub ignored_annotations: BTreeSet<String>,
}

impl Default for ClassFilter {
    fn default() -> Self {
        let markers: BTreeSet<String> = [
            names::ENTITY,
            names::EMBEDDABLE,
            names::MAPPED_SUPERCLASS,
            names::ANNOTATED,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        ClassFilter {
            package_prefix: String::new(),
            marker_annotations: markers,
            ignored_annotations: [names::IGNORED.to_string()].into_iter().collect(),
        }
    }
}

impl ClassFilter {
    /// A filter selecting all marked classes under the given package prefix.
    pub fn for_package(prefix: impl Into<String>) -> Self {
        ClassFilter {
            package_prefix: prefix.into(),
            ..ClassFilter::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_markers_cover_jpa_and_own_marker() {
        let filter = ClassFilter::default();
        assert!(filter.marker_annotations.contains(names::ENTITY));
        assert!(filter.marker_annotations.contains(names::ANNOTATED));
        assert!(filter.ignored_annotations.contains(names::IGNORED));
        assert!(filter.package_prefix.is_empty());
    }
}
