//! The field rule engine.
//!
//! For each selected class and each of its non-ignored fields, an ordered
//! set of inference rules runs: type-based injection, non-null inference,
//! not-blank inference for strings, and the two JPA column inferences.
//! Every rule is add-only and independently switchable, so a second run
//! over already-woven output changes nothing.

use tracing::{debug, info};

use classweave_api::{names, AnnotationInfo, ClassOptions, MemberValue};

use crate::classfile::{Annotation, ClassFile, ClassFileError};
use crate::discovery::LoadedClass;

/// Errors from the rule engine.
#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error(
        "field {class_name}.{field_name} carries an annotation that signals \
         non-nullability and one that signals nullability: {offending:?}"
    )]
    InconsistentNullability {
        class_name: String,
        field_name: String,
        offending: Vec<String>,
    },

    #[error(transparent)]
    ClassFile(#[from] ClassFileError),
}

/// Per-run change accounting, for the informational summary only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotateStats {
    pub classes_changed: usize,
    pub fields_changed: usize,
}

/// Runs the rule engine over the selected classes, mutating them in place.
pub fn annotate_all(
    classes: &mut [LoadedClass],
    selected: &[usize],
    options: &ClassOptions,
) -> Result<AnnotateStats, AnnotateError> {
    let annotator = ClassAnnotator { options };
    let mut stats = AnnotateStats::default();
    for &index in selected {
        let changed_fields = annotator.annotate_class(&mut classes[index].class_file)?;
        if changed_fields > 0 {
            stats.classes_changed += 1;
            stats.fields_changed += changed_fields;
        }
    }
    info!(
        classes = stats.classes_changed,
        fields = stats.fields_changed,
        "annotated classes"
    );
    Ok(stats)
}

/// Applies the rule chain to one class.
pub struct ClassAnnotator<'a> {
    pub options: &'a ClassOptions,
}

impl ClassAnnotator<'_> {
    /// Annotates every non-ignored field; returns the changed-field count.
    pub fn annotate_class(&self, class: &mut ClassFile) -> Result<usize, AnnotateError> {
        let class_name = class.class_name()?;
        debug!(class = %class_name, "annotate class");
        let is_jpa = self.is_jpa_class(class)?;
        let non_null_by_default = fields_non_null_by_default(class)?;
        let mut changed = 0;
        for field_index in 0..class.fields.len() {
            if self.annotate_field(class, field_index, &class_name, is_jpa, non_null_by_default)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn annotate_field(
        &self,
        class: &mut ClassFile,
        field_index: usize,
        class_name: &str,
        is_jpa: bool,
        non_null_by_default: bool,
    ) -> Result<bool, AnnotateError> {
        let options = self.options;
        let field = &class.fields[field_index];
        let field_name = class.field_name(field)?.to_string();
        let type_name = class.field_type_name(field)?;
        let initial = class.field_annotations(field)?;

        if initial
            .iter()
            .any(|a| options.ignored_field_annotations.contains(&a.type_name))
        {
            debug!(class = %class_name, field = %field_name, "ignore field");
            return Ok(false);
        }
        debug!(class = %class_name, field = %field_name, "annotate field");
        let before = render(&initial);

        // Type-based injection.
        if let Some(infos) = options.annotations_by_field_type.get(&type_name) {
            for info in infos {
                add_annotation(class, field_index, info)?;
            }
        }

        // Nullability is judged on the live annotation set so type-injected
        // markers participate, and judged unconditionally so a conflicting
        // field fails even when every inference rule is disabled.
        let current = class.field_annotations(&class.fields[field_index])?;
        let is_non_null =
            self.is_non_null(class_name, &field_name, &current, non_null_by_default)?;

        // Non-null inference.
        if options.validation.infer_not_null && is_non_null {
            class.add_field_annotation_if_missing(field_index, names::NOT_NULL)?;
        }

        // Not-blank inference, strings only.
        if options.validation.infer_strings_not_blank && type_name == names::JAVA_LANG_STRING {
            if is_non_null {
                class.add_field_annotation_if_missing(field_index, names::NOT_BLANK)?;
            } else {
                add_annotation(class, field_index, &options.validation.null_or_not_blank)?;
            }
        }

        // Column inferences, persistence classes only.
        if is_jpa
            && !self.is_transient(class, field_index)?
            && self.column_allowed(&current)
        {
            if options.jpa.infer_column_nullable && is_non_null {
                class.add_field_annotation_if_missing(field_index, names::COLUMN)?;
                class.add_field_annotation_member_if_missing(
                    field_index,
                    names::COLUMN,
                    "nullable",
                    &MemberValue::Bool(false),
                )?;
            }
            if options.jpa.infer_column_length {
                if let Some(max) = max_size(&current) {
                    class.add_field_annotation_if_missing(field_index, names::COLUMN)?;
                    class.add_field_annotation_member_if_missing(
                        field_index,
                        names::COLUMN,
                        "length",
                        &MemberValue::Int(max),
                    )?;
                }
            }
        }

        let after = render(&class.field_annotations(&class.fields[field_index])?);
        if before == after {
            debug!(class = %class_name, field = %field_name, "nothing changed");
            Ok(false)
        } else {
            info!(
                class = %class_name,
                field = %field_name,
                %before,
                %after,
                "changed field"
            );
            Ok(true)
        }
    }

    fn is_jpa_class(&self, class: &ClassFile) -> Result<bool, ClassFileError> {
        for name in &self.options.jpa.jpa_class_annotations {
            if class.has_class_annotation(name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_non_null(
        &self,
        class_name: &str,
        field_name: &str,
        annotations: &[Annotation],
        non_null_by_default: bool,
    ) -> Result<bool, AnnotateError> {
        let options = self.options;
        let explicitly_non_null = annotations
            .iter()
            .any(|a| options.non_null_annotations.contains(&a.type_name));
        let explicitly_nullable = annotations
            .iter()
            .any(|a| options.nullable_annotations.contains(&a.type_name));
        if explicitly_non_null && explicitly_nullable {
            let offending = annotations
                .iter()
                .map(|a| a.type_name.clone())
                .filter(|n| {
                    options.non_null_annotations.contains(n)
                        || options.nullable_annotations.contains(n)
                })
                .collect();
            return Err(AnnotateError::InconsistentNullability {
                class_name: class_name.to_string(),
                field_name: field_name.to_string(),
                offending,
            });
        }
        Ok(explicitly_non_null || (non_null_by_default && !explicitly_nullable))
    }

    fn is_transient(&self, class: &ClassFile, field_index: usize) -> Result<bool, ClassFileError> {
        let field = &class.fields[field_index];
        Ok(field.has_transient_flag() || class.has_field_annotation(field, names::TRANSIENT)?)
    }

    fn column_allowed(&self, annotations: &[Annotation]) -> bool {
        !annotations.iter().any(|a| {
            self.options
                .jpa
                .precludes_column_annotations
                .contains(&a.type_name)
        })
    }
}

/// Class-wide non-null defaulting, opted into through the `Annotated`
/// marker's boolean member.
fn fields_non_null_by_default(class: &ClassFile) -> Result<bool, ClassFileError> {
    Ok(class
        .class_annotation(names::ANNOTATED)?
        .and_then(|a| a.member(names::FIELDS_NON_NULL_MEMBER).cloned())
        .map(|v| v == MemberValue::Bool(true))
        .unwrap_or(false))
}

/// The `max` of the field's single size constraint, if any.
fn max_size(annotations: &[Annotation]) -> Option<i32> {
    let mut sizes = annotations.iter().filter(|a| a.type_name == names::SIZE);
    let first = sizes.next()?;
    if sizes.next().is_some() {
        return None;
    }
    match first.member("max") {
        Some(MemberValue::Int(max)) => Some(*max),
        _ => None,
    }
}

/// Adds a full declarative annotation: the item itself plus every declared
/// member, each only if missing.
fn add_annotation(
    class: &mut ClassFile,
    field_index: usize,
    info: &AnnotationInfo,
) -> Result<(), ClassFileError> {
    class.add_field_annotation_if_missing(field_index, &info.type_name)?;
    for (member, value) in &info.members {
        class.add_field_annotation_member_if_missing(field_index, &info.type_name, member, value)?;
    }
    Ok(())
}

/// Canonical rendering of a field's annotation set, used for changed-field
/// detection.
fn render(annotations: &[Annotation]) -> String {
    format!("{annotations:?}")
}
