//! The two annotation channels and the `element_value` codec.
//!
//! Annotations live in `RuntimeVisibleAnnotations` (the "durably visible"
//! channel, readable by runtime reflection) and
//! `RuntimeInvisibleAnnotations` (class-retention annotations such as the
//! JetBrains nullability markers). Queries search both; additions always
//! target the visible channel. Mutation is add-only: nothing here removes
//! or overwrites an existing annotation or member.

use indexmap::IndexMap;

use classweave_api::MemberValue;

use super::io::{ReadCursor, WriteCursor};
use super::pool::ConstantPool;
use super::{descriptor_to_type_name, type_descriptor, AttributeInfo, ClassFileError};

/// Attribute name of the runtime-visible annotation channel.
pub const VISIBLE_CHANNEL: &str = "RuntimeVisibleAnnotations";

/// Attribute name of the runtime-invisible annotation channel.
pub const INVISIBLE_CHANNEL: &str = "RuntimeInvisibleAnnotations";

/// One decoded annotation: qualified type name plus ordered members.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_name: String,
    pub members: IndexMap<String, MemberValue>,
}

impl Annotation {
    pub fn marker(type_name: impl Into<String>) -> Self {
        Annotation {
            type_name: type_name.into(),
            members: IndexMap::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&MemberValue> {
        self.members.get(name)
    }
}

/// Finds the attribute holding the given channel, if present.
fn channel_index(
    pool: &ConstantPool,
    attributes: &[AttributeInfo],
    channel: &str,
) -> Result<Option<usize>, ClassFileError> {
    for (i, attribute) in attributes.iter().enumerate() {
        if pool.utf8(attribute.name_index)? == channel {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// Decodes one channel of an element's attribute table, empty if the
/// channel is absent.
pub(super) fn channel_annotations(
    pool: &ConstantPool,
    attributes: &[AttributeInfo],
    channel: &str,
) -> Result<Vec<Annotation>, ClassFileError> {
    match channel_index(pool, attributes, channel)? {
        Some(i) => decode_annotations(pool, &attributes[i].info),
        None => Ok(Vec::new()),
    }
}

/// All annotations of an element, visible channel first.
pub(super) fn all_annotations(
    pool: &ConstantPool,
    attributes: &[AttributeInfo],
) -> Result<Vec<Annotation>, ClassFileError> {
    let mut all = channel_annotations(pool, attributes, VISIBLE_CHANNEL)?;
    all.extend(channel_annotations(pool, attributes, INVISIBLE_CHANNEL)?);
    Ok(all)
}

pub(super) fn has_annotation(
    pool: &ConstantPool,
    attributes: &[AttributeInfo],
    type_name: &str,
) -> Result<bool, ClassFileError> {
    Ok(all_annotations(pool, attributes)?
        .iter()
        .any(|a| a.type_name == type_name))
}

/// Appends an annotation to the given channel, creating the channel
/// attribute if absent. Callers are responsible for the absent-in-both-
/// channels check.
pub(crate) fn attach_annotation(
    pool: &mut ConstantPool,
    attributes: &mut Vec<AttributeInfo>,
    channel: &str,
    annotation: &Annotation,
) -> Result<(), ClassFileError> {
    let index = match channel_index(pool, attributes, channel)? {
        Some(i) => i,
        None => {
            let name_index = pool.add_utf8(channel)?;
            attributes.push(AttributeInfo {
                name_index,
                info: encode_annotations(pool, &[])?,
            });
            attributes.len() - 1
        }
    };
    let mut annotations = decode_annotations(pool, &attributes[index].info)?;
    annotations.push(annotation.clone());
    attributes[index].info = encode_annotations(pool, &annotations)?;
    Ok(())
}

/// Sets a member on an existing annotation, only if currently absent.
///
/// The annotation must already exist in exactly one channel; that channel
/// is re-serialized. An existing member value is left untouched.
pub(super) fn add_member_if_missing(
    pool: &mut ConstantPool,
    attributes: &mut Vec<AttributeInfo>,
    type_name: &str,
    member: &str,
    value: &MemberValue,
) -> Result<(), ClassFileError> {
    let mut owning = None;
    for channel in [VISIBLE_CHANNEL, INVISIBLE_CHANNEL] {
        let present = channel_annotations(pool, attributes, channel)?
            .iter()
            .any(|a| a.type_name == type_name);
        if present {
            if owning.is_some() {
                return Err(ClassFileError::DuplicateAnnotation(type_name.to_string()));
            }
            owning = Some(channel);
        }
    }
    let channel = owning.ok_or_else(|| ClassFileError::MissingAnnotation(type_name.to_string()))?;

    let index = match channel_index(pool, attributes, channel)? {
        Some(i) => i,
        None => return Err(ClassFileError::MissingAnnotation(type_name.to_string())),
    };
    let mut annotations = decode_annotations(pool, &attributes[index].info)?;
    let mut changed = false;
    for annotation in annotations.iter_mut().filter(|a| a.type_name == type_name) {
        if !annotation.members.contains_key(member) {
            annotation.members.insert(member.to_string(), value.clone());
            changed = true;
        }
    }
    if changed {
        attributes[index].info = encode_annotations(pool, &annotations)?;
    }
    Ok(())
}

/// Decodes the payload of an annotations attribute.
pub(super) fn decode_annotations(
    pool: &ConstantPool,
    bytes: &[u8],
) -> Result<Vec<Annotation>, ClassFileError> {
    let mut cursor = ReadCursor::new(bytes);
    let count = cursor.u16()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(read_annotation(pool, &mut cursor)?);
    }
    Ok(annotations)
}

/// Encodes annotations into an attribute payload, interning all names and
/// constants into the pool.
pub(super) fn encode_annotations(
    pool: &mut ConstantPool,
    annotations: &[Annotation],
) -> Result<Vec<u8>, ClassFileError> {
    let mut out = WriteCursor::new();
    out.u16(annotations.len() as u16);
    for annotation in annotations {
        write_annotation(pool, &mut out, annotation)?;
    }
    Ok(out.into_bytes())
}

fn read_annotation(
    pool: &ConstantPool,
    cursor: &mut ReadCursor<'_>,
) -> Result<Annotation, ClassFileError> {
    let type_index = cursor.u16()?;
    let type_name = descriptor_to_type_name(pool.utf8(type_index)?);
    let pair_count = cursor.u16()?;
    let mut members = IndexMap::with_capacity(pair_count as usize);
    for _ in 0..pair_count {
        let name_index = cursor.u16()?;
        let name = pool.utf8(name_index)?.to_string();
        let value = read_element(pool, cursor)?;
        members.insert(name, value);
    }
    Ok(Annotation { type_name, members })
}

fn write_annotation(
    pool: &mut ConstantPool,
    out: &mut WriteCursor,
    annotation: &Annotation,
) -> Result<(), ClassFileError> {
    let type_index = pool.add_utf8(&type_descriptor(&annotation.type_name))?;
    out.u16(type_index);
    out.u16(annotation.members.len() as u16);
    for (name, value) in &annotation.members {
        let name_index = pool.add_utf8(name)?;
        out.u16(name_index);
        write_element(pool, out, value)?;
    }
    Ok(())
}

fn read_element(
    pool: &ConstantPool,
    cursor: &mut ReadCursor<'_>,
) -> Result<MemberValue, ClassFileError> {
    let tag = cursor.u8()?;
    let value = match tag {
        b'Z' => MemberValue::Bool(pool.integer(cursor.u16()?)? != 0),
        b'B' => MemberValue::Byte(pool.integer(cursor.u16()?)? as i8),
        b'S' => MemberValue::Short(pool.integer(cursor.u16()?)? as i16),
        b'I' => MemberValue::Int(pool.integer(cursor.u16()?)?),
        b'J' => MemberValue::Long(pool.long(cursor.u16()?)?),
        b'F' => MemberValue::Float(pool.float(cursor.u16()?)?),
        b'D' => MemberValue::Double(pool.double(cursor.u16()?)?),
        b'C' => MemberValue::Char(pool.integer(cursor.u16()?)? as u16),
        b's' => MemberValue::Str(pool.utf8(cursor.u16()?)?.to_string()),
        b'e' => {
            let type_name = descriptor_to_type_name(pool.utf8(cursor.u16()?)?);
            let const_name = pool.utf8(cursor.u16()?)?.to_string();
            MemberValue::Enum {
                type_name,
                const_name,
            }
        }
        b'c' => MemberValue::Class(descriptor_to_type_name(pool.utf8(cursor.u16()?)?)),
        b'[' => {
            let len = cursor.u16()?;
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(read_element(pool, cursor)?);
            }
            MemberValue::Array(items)
        }
        // Nested annotations ('@') are never injected by the weaver and
        // not modeled.
        other => return Err(ClassFileError::UnsupportedMemberType(other as char)),
    };
    Ok(value)
}

fn write_element(
    pool: &mut ConstantPool,
    out: &mut WriteCursor,
    value: &MemberValue,
) -> Result<(), ClassFileError> {
    match value {
        MemberValue::Bool(v) => {
            out.u8(b'Z');
            out.u16(pool.add_integer(*v as i32)?);
        }
        MemberValue::Byte(v) => {
            out.u8(b'B');
            out.u16(pool.add_integer(*v as i32)?);
        }
        MemberValue::Short(v) => {
            out.u8(b'S');
            out.u16(pool.add_integer(*v as i32)?);
        }
        MemberValue::Int(v) => {
            out.u8(b'I');
            out.u16(pool.add_integer(*v)?);
        }
        MemberValue::Long(v) => {
            out.u8(b'J');
            out.u16(pool.add_long(*v)?);
        }
        MemberValue::Float(v) => {
            out.u8(b'F');
            out.u16(pool.add_float(*v)?);
        }
        MemberValue::Double(v) => {
            out.u8(b'D');
            out.u16(pool.add_double(*v)?);
        }
        MemberValue::Char(c) => {
            out.u8(b'C');
            out.u16(pool.add_integer(i32::from(*c))?);
        }
        MemberValue::Str(s) => {
            out.u8(b's');
            out.u16(pool.add_utf8(s)?);
        }
        MemberValue::Enum {
            type_name,
            const_name,
        } => {
            out.u8(b'e');
            out.u16(pool.add_utf8(&type_descriptor(type_name))?);
            out.u16(pool.add_utf8(const_name)?);
        }
        MemberValue::Class(type_name) => {
            out.u8(b'c');
            out.u16(pool.add_utf8(&type_descriptor(type_name))?);
        }
        MemberValue::Array(items) => {
            out.u8(b'[');
            out.u16(items.len() as u16);
            for item in items {
                write_element(pool, out, item)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec_round_trip(value: MemberValue) {
        let mut pool = ConstantPool::new();
        let annotation = Annotation {
            type_name: "com.acme.Holder".to_string(),
            members: [("value".to_string(), value.clone())].into_iter().collect(),
        };
        let bytes = encode_annotations(&mut pool, &[annotation]).unwrap();
        let decoded = decode_annotations(&pool, &bytes).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].member("value"), Some(&value));
    }

    #[test]
    fn every_member_kind_round_trips_with_exact_width() {
        codec_round_trip(MemberValue::Bool(true));
        codec_round_trip(MemberValue::Byte(-5));
        codec_round_trip(MemberValue::Short(300));
        codec_round_trip(MemberValue::Int(i32::MIN));
        codec_round_trip(MemberValue::Long(i64::MAX));
        codec_round_trip(MemberValue::Float(1.5));
        codec_round_trip(MemberValue::Double(-0.25));
        codec_round_trip(MemberValue::Char('λ' as u16));
        // An unpaired surrogate is a legal Java char value.
        codec_round_trip(MemberValue::Char(0xD800));
        codec_round_trip(MemberValue::Str("regexp".to_string()));
        codec_round_trip(MemberValue::Enum {
            type_name: "java.time.DayOfWeek".to_string(),
            const_name: "MONDAY".to_string(),
        });
        codec_round_trip(MemberValue::Class("java.lang.String".to_string()));
    }

    #[test]
    fn arrays_encode_recursively() {
        codec_round_trip(MemberValue::Array(vec![
            MemberValue::Str("a".to_string()),
            MemberValue::Str("b".to_string()),
        ]));
        codec_round_trip(MemberValue::Array(vec![MemberValue::Array(vec![
            MemberValue::Int(1),
            MemberValue::Int(2),
        ])]));
    }

    #[test]
    fn class_members_reference_primitive_and_array_descriptors_verbatim() {
        let mut pool = ConstantPool::new();
        let annotation = Annotation {
            type_name: "com.acme.Typed".to_string(),
            members: [
                (
                    "primitive".to_string(),
                    MemberValue::Class("int".to_string()),
                ),
                (
                    "array".to_string(),
                    MemberValue::Class("java.lang.String[]".to_string()),
                ),
            ]
            .into_iter()
            .collect(),
        };
        let bytes = encode_annotations(&mut pool, &[annotation]).unwrap();

        // The exact return descriptors were interned; re-adding them
        // allocates nothing new.
        for descriptor in ["I", "[Ljava/lang/String;"] {
            let count = pool.count();
            pool.add_utf8(descriptor).unwrap();
            assert_eq!(pool.count(), count, "{descriptor} not in pool");
        }

        let decoded = decode_annotations(&pool, &bytes).unwrap();
        assert_eq!(
            decoded[0].member("primitive"),
            Some(&MemberValue::Class("int".to_string()))
        );
        assert_eq!(
            decoded[0].member("array"),
            Some(&MemberValue::Class("java.lang.String[]".to_string()))
        );
    }

    #[test]
    fn appending_keeps_a_class_member_naming_a_primitive_intact() {
        use super::super::{ClassFile, ClassFileBuilder};

        let mut class = ClassFileBuilder::new("com.acme.Holder")
            .field("f", "Ljava/lang/String;", 0)
            .build()
            .unwrap();

        // A compiler-emitted annotation with a `type = int.class` member.
        let type_index = class.pool.add_utf8("Lcom/acme/Typed;").unwrap();
        let name_index = class.pool.add_utf8("type").unwrap();
        let descriptor_index = class.pool.add_utf8("I").unwrap();
        let mut payload = WriteCursor::new();
        payload.u16(1);
        payload.u16(type_index);
        payload.u16(1);
        payload.u16(name_index);
        payload.u8(b'c');
        payload.u16(descriptor_index);
        let channel_name = class.pool.add_utf8(VISIBLE_CHANNEL).unwrap();
        class.fields[0].attributes.push(AttributeInfo {
            name_index: channel_name,
            info: payload.into_bytes(),
        });

        // Appending re-serializes the whole channel.
        class
            .add_field_annotation_if_missing(0, "javax.validation.constraints.NotNull")
            .unwrap();

        let mut reparsed = ClassFile::parse(&class.to_bytes()).unwrap();
        let annotations = reparsed
            .field_annotations(&reparsed.fields[0])
            .unwrap();
        let typed = annotations
            .iter()
            .find(|a| a.type_name == "com.acme.Typed")
            .unwrap();
        assert_eq!(
            typed.member("type"),
            Some(&MemberValue::Class("int".to_string()))
        );

        // Still the one-byte descriptor, not a mangled reference type.
        let count = reparsed.pool.count();
        reparsed.pool.add_utf8("I").unwrap();
        assert_eq!(reparsed.pool.count(), count);
        reparsed.pool.add_utf8("Lint;").unwrap();
        assert_eq!(reparsed.pool.count(), count + 1);
    }

    #[test]
    fn nested_annotation_tag_is_rejected() {
        let mut pool = ConstantPool::new();
        let type_index = pool.add_utf8("Lcom/acme/A;").unwrap();
        let name_index = pool.add_utf8("value").unwrap();
        let mut out = WriteCursor::new();
        out.u16(1); // one annotation
        out.u16(type_index);
        out.u16(1); // one pair
        out.u16(name_index);
        out.u8(b'@'); // nested annotation
        let result = decode_annotations(&pool, &out.into_bytes());
        assert!(matches!(
            result,
            Err(ClassFileError::UnsupportedMemberType('@'))
        ));
    }

    #[test]
    fn member_add_requires_existing_annotation() {
        let mut pool = ConstantPool::new();
        let mut attributes = Vec::new();
        let result = add_member_if_missing(
            &mut pool,
            &mut attributes,
            "com.acme.Missing",
            "value",
            &MemberValue::Int(1),
        );
        assert!(matches!(
            result,
            Err(ClassFileError::MissingAnnotation(name)) if name == "com.acme.Missing"
        ));
    }

    #[test]
    fn member_add_never_overwrites() {
        let mut pool = ConstantPool::new();
        let mut attributes = Vec::new();
        let mut annotation = Annotation::marker("com.acme.Sized");
        annotation
            .members
            .insert("max".to_string(), MemberValue::Int(10));
        attach_annotation(&mut pool, &mut attributes, VISIBLE_CHANNEL, &annotation).unwrap();

        add_member_if_missing(
            &mut pool,
            &mut attributes,
            "com.acme.Sized",
            "max",
            &MemberValue::Int(99),
        )
        .unwrap();
        add_member_if_missing(
            &mut pool,
            &mut attributes,
            "com.acme.Sized",
            "min",
            &MemberValue::Int(1),
        )
        .unwrap();

        let decoded = channel_annotations(&pool, &attributes, VISIBLE_CHANNEL).unwrap();
        assert_eq!(decoded[0].member("max"), Some(&MemberValue::Int(10)));
        assert_eq!(decoded[0].member("min"), Some(&MemberValue::Int(1)));
    }

    #[test]
    fn member_add_reaches_the_invisible_channel() {
        let mut pool = ConstantPool::new();
        let mut attributes = Vec::new();
        attach_annotation(
            &mut pool,
            &mut attributes,
            INVISIBLE_CHANNEL,
            &Annotation::marker("org.jetbrains.annotations.NotNull"),
        )
        .unwrap();

        add_member_if_missing(
            &mut pool,
            &mut attributes,
            "org.jetbrains.annotations.NotNull",
            "exception",
            &MemberValue::Class("java.lang.IllegalStateException".to_string()),
        )
        .unwrap();

        let decoded = channel_annotations(&pool, &attributes, INVISIBLE_CHANNEL).unwrap();
        assert!(decoded[0].member("exception").is_some());
        assert!(channel_annotations(&pool, &attributes, VISIBLE_CHANNEL)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn duplicate_across_channels_is_an_invariant_violation() {
        let mut pool = ConstantPool::new();
        let mut attributes = Vec::new();
        let annotation = Annotation::marker("com.acme.Twice");
        attach_annotation(&mut pool, &mut attributes, VISIBLE_CHANNEL, &annotation).unwrap();
        attach_annotation(&mut pool, &mut attributes, INVISIBLE_CHANNEL, &annotation).unwrap();

        let result = add_member_if_missing(
            &mut pool,
            &mut attributes,
            "com.acme.Twice",
            "value",
            &MemberValue::Int(1),
        );
        assert!(matches!(
            result,
            Err(ClassFileError::DuplicateAnnotation(_))
        ));
    }
}
