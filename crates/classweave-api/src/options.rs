//! Per-class weaving options.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationInfo;
use crate::names;

fn name_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Options for weaving an individual class.
///
/// Immutable for the duration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassOptions {
    /// Annotations added to fields depending on the field's declared type.
    ///
    /// A key is the qualified name of a JVM type, e.g. `java.lang.String`
    /// or `int`.
    pub annotations_by_field_type: IndexMap<String, Vec<AnnotationInfo>>,

    /// Options regarding `javax.validation.constraints.*` annotations.
    pub validation: ValidationOptions,

    /// Options regarding `javax.persistence.*` annotations.
    pub jpa: JpaOptions,

    /// Fields carrying any of these qualified names are left untouched.
    pub ignored_field_annotations: BTreeSet<String>,

    /// Qualified names that signal non-nullability.
    pub non_null_annotations: BTreeSet<String>,

    /// Qualified names that signal nullability.
    pub nullable_annotations: BTreeSet<String>,
}

impl Default for ClassOptions {
    fn default() -> Self {
        ClassOptions {
            annotations_by_field_type: IndexMap::new(),
            validation: ValidationOptions::default(),
            jpa: JpaOptions::default(),
            ignored_field_annotations: name_set(&[names::IGNORED]),
            non_null_annotations: default_non_null_annotations(),
            nullable_annotations: default_nullable_annotations(),
        }
    }
}

/// Options regarding `javax.validation.constraints.*` annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Infer a `NotNull` constraint from other nullability annotations.
    pub infer_not_null: bool,

    /// For strings, infer `NotBlank` or
    /// [`null_or_not_blank`](Self::null_or_not_blank), respectively.
    pub infer_strings_not_blank: bool,

    /// The annotation to use for nullable but not blank strings.
    pub null_or_not_blank: AnnotationInfo,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            infer_not_null: true,
            infer_strings_not_blank: true,
            null_or_not_blank: AnnotationInfo::marker(names::PATTERN)
                .with_member("regexp", r"(?s).*\S.*")
                .with_member("message", "must be null or not blank"),
        }
    }
}

/// Options regarding `javax.persistence.*` annotations.
///
/// If your JPA provider already derives database constraints from
/// validation annotations (Hibernate with `hibernate.validator.apply_to_ddl`
/// at its default `true`), leave the `infer_*` options off. Inferring column
/// nullability can conflict with table-per-hierarchy mappings; affected
/// fields can opt out with an explicit `Column(nullable = true)` or the
/// ignore marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JpaOptions {
    /// For JPA classes, infer `Column(nullable = false)` from nullability
    /// annotations.
    pub infer_column_nullable: bool,

    /// For JPA classes, infer `Column(length = n)` from `Size(max = n)`.
    pub infer_column_length: bool,

    /// Qualified names that determine which classes are treated as JPA
    /// classes.
    pub jpa_class_annotations: BTreeSet<String>,

    /// Fields carrying any of these qualified names never receive a
    /// `Column` annotation (relationship markers and the like).
    pub precludes_column_annotations: BTreeSet<String>,
}

impl Default for JpaOptions {
    fn default() -> Self {
        JpaOptions {
            infer_column_nullable: false,
            infer_column_length: false,
            jpa_class_annotations: name_set(&[
                names::ENTITY,
                names::EMBEDDABLE,
                names::MAPPED_SUPERCLASS,
            ]),
            precludes_column_annotations: name_set(&[names::MANY_TO_ONE]),
        }
    }
}

/// Qualified names that signal non-nullability, as recognized by the major
/// JVM nullability-annotation families.
pub fn default_non_null_annotations() -> BTreeSet<String> {
    name_set(&[
        "org.jetbrains.annotations.NotNull",
        "javax.annotation.Nonnull",
        "edu.umd.cs.findbugs.annotations.NonNull",
        "android.support.annotation.NonNull",
        "androidx.annotation.NonNull",
        "androidx.annotation.RecentlyNonNull",
        "org.checkerframework.checker.nullness.qual.NonNull",
        "org.checkerframework.checker.nullness.compatqual.NonNullDecl",
        "org.checkerframework.checker.nullness.compatqual.NonNullType",
        "com.android.annotations.NonNull",
        "javax.validation.constraints.NotNull",
        "javax.validation.constraints.NotNull.List",
    ])
}

/// Qualified names that signal nullability.
pub fn default_nullable_annotations() -> BTreeSet<String> {
    name_set(&[
        "org.jetbrains.annotations.Nullable",
        "javax.annotation.Nullable",
        "javax.annotation.CheckForNull",
        "edu.umd.cs.findbugs.annotations.Nullable",
        "android.support.annotation.Nullable",
        "androidx.annotation.Nullable",
        "androidx.annotation.RecentlyNullable",
        "org.checkerframework.checker.nullness.qual.Nullable",
        "org.checkerframework.checker.nullness.compatqual.NullableDecl",
        "org.checkerframework.checker.nullness.compatqual.NullableType",
        "com.android.annotations.Nullable",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::MemberValue;

    #[test]
    fn validation_defaults_enable_both_inferences() {
        let v = ValidationOptions::default();
        assert!(v.infer_not_null);
        assert!(v.infer_strings_not_blank);
        assert_eq!(v.null_or_not_blank.type_name, names::PATTERN);
        assert_eq!(
            v.null_or_not_blank.members.get("regexp"),
            Some(&MemberValue::Str(r"(?s).*\S.*".to_string()))
        );
    }

    #[test]
    fn jpa_defaults_disable_inference() {
        let j = JpaOptions::default();
        assert!(!j.infer_column_nullable);
        assert!(!j.infer_column_length);
        assert!(j.jpa_class_annotations.contains(names::ENTITY));
        assert!(j.precludes_column_annotations.contains(names::MANY_TO_ONE));
    }

    #[test]
    fn nullability_sets_are_disjoint() {
        let non_null = default_non_null_annotations();
        let nullable = default_nullable_annotations();
        assert!(non_null.is_disjoint(&nullable));
    }
}
