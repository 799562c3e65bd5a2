//! Synthetic class construction.
//!
//! Used by the fingerprint guard to fabricate its marker class and by
//! tests to fabricate fixture classes without a Java compiler. The pool
//! layout is deterministic: `new` lays down this-class and super-class
//! entries in fixed slots, and later additions only append.

use classweave_api::AnnotationInfo;

use super::annotation::{attach_annotation, Annotation, INVISIBLE_CHANNEL, VISIBLE_CHANNEL};
use super::{
    qualified_to_internal, AttributeInfo, ClassFile, ClassFileError, ConstantPool, MemberInfo,
    ACC_PUBLIC, ACC_SUPER,
};

/// Class-file version emitted for synthetic classes (Java 8).
const MAJOR_VERSION: u16 = 52;

/// Builds a [`ClassFile`] from scratch.
///
/// Errors (pool exhaustion, unknown member names) latch and surface from
/// [`build`](Self::build), so construction chains fluently.
pub struct ClassFileBuilder {
    result: Result<ClassFile, ClassFileError>,
}

impl ClassFileBuilder {
    /// Starts a public class with the given qualified name extending
    /// `java.lang.Object`.
    pub fn new(qualified_name: &str) -> Self {
        ClassFileBuilder {
            result: Self::initial(qualified_name),
        }
    }

    fn initial(qualified_name: &str) -> Result<ClassFile, ClassFileError> {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class(&qualified_to_internal(qualified_name))?;
        let super_class = pool.add_class("java/lang/Object")?;
        Ok(ClassFile {
            minor_version: 0,
            major_version: MAJOR_VERSION,
            pool,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        })
    }

    fn and_then(mut self, f: impl FnOnce(&mut ClassFile) -> Result<(), ClassFileError>) -> Self {
        if let Ok(ref mut class) = self.result {
            if let Err(e) = f(class) {
                self.result = Err(e);
            }
        }
        self
    }

    /// Adds a field with the given descriptor, e.g. `Ljava/lang/String;`.
    pub fn field(self, name: &str, descriptor: &str, access_flags: u16) -> Self {
        self.and_then(|class| {
            let name_index = class.pool.add_utf8(name)?;
            let descriptor_index = class.pool.add_utf8(descriptor)?;
            class.fields.push(MemberInfo {
                access_flags,
                name_index,
                descriptor_index,
                attributes: Vec::new(),
            });
            Ok(())
        })
    }

    /// Adds a bodyless method with the given descriptor, e.g. `()V`.
    ///
    /// Synthetic classes are carriers for metadata, never loaded, so no
    /// Code attribute is emitted.
    pub fn method(self, name: &str, descriptor: &str, access_flags: u16) -> Self {
        self.and_then(|class| {
            let name_index = class.pool.add_utf8(name)?;
            let descriptor_index = class.pool.add_utf8(descriptor)?;
            class.methods.push(MemberInfo {
                access_flags,
                name_index,
                descriptor_index,
                attributes: Vec::new(),
            });
            Ok(())
        })
    }

    /// Attaches a class-level annotation to the chosen channel.
    pub fn class_annotation(self, info: &AnnotationInfo, visible: bool) -> Self {
        let annotation = to_annotation(info);
        self.and_then(move |class| {
            attach_annotation(
                &mut class.pool,
                &mut class.attributes,
                channel(visible),
                &annotation,
            )
        })
    }

    /// Attaches an annotation to a previously added field.
    pub fn field_annotation(self, field_name: &str, info: &AnnotationInfo, visible: bool) -> Self {
        let annotation = to_annotation(info);
        let field_name = field_name.to_string();
        self.and_then(move |class| {
            let index = find_member(class, &class.fields, &field_name)?;
            let field = &mut class.fields[index];
            attach_annotation(
                &mut class.pool,
                &mut field.attributes,
                channel(visible),
                &annotation,
            )
        })
    }

    /// Attaches an annotation to a previously added method.
    pub fn method_annotation(
        self,
        method_name: &str,
        info: &AnnotationInfo,
        visible: bool,
    ) -> Self {
        let annotation = to_annotation(info);
        let method_name = method_name.to_string();
        self.and_then(move |class| {
            let index = find_member(class, &class.methods, &method_name)?;
            let method = &mut class.methods[index];
            attach_annotation(
                &mut class.pool,
                &mut method.attributes,
                channel(visible),
                &annotation,
            )
        })
    }

    /// Attaches an arbitrary opaque attribute to the class.
    pub fn raw_attribute(self, name: &str, info: Vec<u8>) -> Self {
        self.and_then(move |class| {
            let name_index = class.pool.add_utf8(name)?;
            class.attributes.push(AttributeInfo { name_index, info });
            Ok(())
        })
    }

    pub fn build(self) -> Result<ClassFile, ClassFileError> {
        self.result
    }
}

fn channel(visible: bool) -> &'static str {
    if visible {
        VISIBLE_CHANNEL
    } else {
        INVISIBLE_CHANNEL
    }
}

fn to_annotation(info: &AnnotationInfo) -> Annotation {
    Annotation {
        type_name: info.type_name.clone(),
        members: info.members.clone(),
    }
}

fn find_member(
    class: &ClassFile,
    members: &[MemberInfo],
    name: &str,
) -> Result<usize, ClassFileError> {
    members
        .iter()
        .position(|m| {
            class
                .pool
                .utf8(m.name_index)
                .map(|n| n == name)
                .unwrap_or(false)
        })
        .ok_or_else(|| ClassFileError::NoSuchMember(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use classweave_api::MemberValue;

    #[test]
    fn builds_an_annotated_fixture() {
        let class = ClassFileBuilder::new("com.acme.model.Person")
            .class_annotation(&AnnotationInfo::marker("javax.persistence.Entity"), true)
            .field("name", "Ljava/lang/String;", 0)
            .field_annotation(
                "name",
                &AnnotationInfo::marker("javax.validation.constraints.Size").with_member("max", 40),
                true,
            )
            .build()
            .unwrap();

        assert_eq!(class.class_name().unwrap(), "com.acme.model.Person");
        assert!(class
            .has_class_annotation("javax.persistence.Entity")
            .unwrap());
        let annotations = class.field_annotations(&class.fields[0]).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].member("max"), Some(&MemberValue::Int(40)));
    }

    #[test]
    fn unknown_field_name_latches_an_error() {
        let result = ClassFileBuilder::new("com.acme.Empty")
            .field_annotation("ghost", &AnnotationInfo::marker("com.acme.M"), true)
            .build();
        assert!(matches!(result, Err(ClassFileError::NoSuchMember(name)) if name == "ghost"));
    }

    #[test]
    fn invisible_annotations_land_in_the_invisible_channel() {
        let class = ClassFileBuilder::new("com.acme.K")
            .field("s", "Ljava/lang/String;", 0)
            .field_annotation(
                "s",
                &AnnotationInfo::marker("org.jetbrains.annotations.NotNull"),
                false,
            )
            .build()
            .unwrap();
        // Present via the both-channel query.
        assert!(class
            .has_field_annotation(&class.fields[0], "org.jetbrains.annotations.NotNull")
            .unwrap());
    }
}
