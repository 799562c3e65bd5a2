//! Package and marker based class selection.

use tracing::debug;

use classweave_api::ClassFilter;

use crate::classfile::ClassFileError;
use crate::discovery::LoadedClass;

/// Selects the classes eligible for weaving.
///
/// A class is kept when its qualified name starts with the filter's package
/// prefix, it carries at least one marker annotation, and it carries none
/// of the ignored annotations. The checks are class-level; field-level
/// ignores are the rule engine's concern. Returns indices into `classes`
/// so the caller can mutate the selected entries in place.
pub fn select(classes: &[LoadedClass], filter: &ClassFilter) -> Result<Vec<usize>, ClassFileError> {
    let mut selected = Vec::new();
    for (index, loaded) in classes.iter().enumerate() {
        let class = &loaded.class_file;
        let name = class.class_name()?;
        if !name.starts_with(&filter.package_prefix) {
            continue;
        }
        let annotations = class.class_annotations()?;
        let marked = annotations
            .iter()
            .any(|a| filter.marker_annotations.contains(&a.type_name));
        if !marked {
            continue;
        }
        let ignored = annotations
            .iter()
            .any(|a| filter.ignored_annotations.contains(&a.type_name));
        if ignored {
            debug!(class = %name, "ignoring class");
            continue;
        }
        selected.push(index);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use classweave_api::{names, AnnotationInfo};

    use crate::classfile::{ClassFile, ClassFileBuilder};

    fn loaded(class: ClassFile) -> LoadedClass {
        LoadedClass {
            class_file: class,
            origin: PathBuf::from("out"),
        }
    }

    fn entity(name: &str) -> ClassFileBuilder {
        ClassFileBuilder::new(name)
            .class_annotation(&AnnotationInfo::marker(names::ENTITY), true)
    }

    #[test]
    fn keeps_marked_classes_under_the_prefix() {
        let classes = vec![
            loaded(entity("com.acme.model.Person").build().unwrap()),
            loaded(entity("org.other.Thing").build().unwrap()),
            loaded(ClassFileBuilder::new("com.acme.model.Util").build().unwrap()),
        ];
        let filter = ClassFilter::for_package("com.acme");
        assert_eq!(select(&classes, &filter).unwrap(), vec![0]);
    }

    #[test]
    fn ignore_marker_wins_over_selection_markers() {
        let classes = vec![loaded(
            entity("com.acme.Skipped")
                .class_annotation(&AnnotationInfo::marker(names::IGNORED), true)
                .build()
                .unwrap(),
        )];
        let filter = ClassFilter::for_package("com.acme");
        assert!(select(&classes, &filter).unwrap().is_empty());
    }

    #[test]
    fn empty_prefix_selects_all_marked_classes() {
        let classes = vec![
            loaded(entity("com.acme.A").build().unwrap()),
            loaded(entity("org.other.B").build().unwrap()),
        ];
        let filter = ClassFilter::default();
        assert_eq!(select(&classes, &filter).unwrap(), vec![0, 1]);
    }

    #[test]
    fn invisible_markers_count() {
        let classes = vec![loaded(
            ClassFileBuilder::new("com.acme.K")
                .class_annotation(&AnnotationInfo::marker(names::ANNOTATED), false)
                .build()
                .unwrap(),
        )];
        let filter = ClassFilter::for_package("com.acme");
        assert_eq!(select(&classes, &filter).unwrap(), vec![0]);
    }
}
