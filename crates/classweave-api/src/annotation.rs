//! Declarative annotation descriptions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::MemberValue;

/// A declarative description of one annotation the weaver wants present.
///
/// Equality is by value, so duplicate descriptions configured for the same
/// field type deduplicate naturally. Members keep their insertion order,
/// which also makes the configuration fingerprint stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationInfo {
    /// Qualified name of the annotation type, e.g. `javax.persistence.Column`.
    pub type_name: String,

    /// The annotation's members (aka elements), by name.
    #[serde(default)]
    pub members: IndexMap<String, MemberValue>,
}

impl AnnotationInfo {
    /// A marker annotation with no members.
    pub fn marker(type_name: impl Into<String>) -> Self {
        AnnotationInfo {
            type_name: type_name.into(),
            members: IndexMap::new(),
        }
    }

    /// Builder-style member addition.
    pub fn with_member(mut self, name: impl Into<String>, value: impl Into<MemberValue>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }
}
