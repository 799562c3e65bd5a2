//! Owned in-memory model of one JVM class file.
//!
//! A class file is parsed once into this structure, mutated through typed
//! operations, and serialized once at write-back. Everything the weaver
//! does not touch — method bodies, stack maps, any attribute other than the
//! two annotation channels — is kept as opaque bytes and re-emitted
//! verbatim, so untouched structure round-trips byte-for-byte.

mod annotation;
mod builder;
mod io;
mod pool;

pub use annotation::{Annotation, INVISIBLE_CHANNEL, VISIBLE_CHANNEL};
pub use builder::ClassFileBuilder;
pub use pool::{ConstantPool, PoolEntry};

use classweave_api::MemberValue;

use self::io::{ReadCursor, WriteCursor};

const MAGIC: u32 = 0xCAFE_BABE;

/// `ACC_STATIC` on methods.
pub const ACC_STATIC: u16 = 0x0008;
/// `ACC_TRANSIENT` on fields.
pub const ACC_TRANSIENT: u16 = 0x0080;
/// `ACC_PUBLIC`.
pub const ACC_PUBLIC: u16 = 0x0001;
/// `ACC_SUPER`, set on every class emitted by modern compilers.
pub const ACC_SUPER: u16 = 0x0020;

/// Errors from the class-file codec and the annotation primitives.
#[derive(Debug, thiserror::Error)]
pub enum ClassFileError {
    #[error("class file is truncated")]
    Truncated,

    #[error("trailing bytes after class file end")]
    TrailingBytes,

    #[error("bad magic number {0:#010x}, not a class file")]
    BadMagic(u32),

    #[error("unknown constant pool tag {0}")]
    UnknownPoolTag(u8),

    #[error("constant pool index {0} is out of range or unusable")]
    BadPoolIndex(u16),

    #[error("constant pool entry {index} is not a {expected} entry")]
    WrongPoolTag { index: u16, expected: &'static str },

    #[error("malformed modified-UTF-8 string in constant pool")]
    MalformedUtf8,

    #[error("constant pool is full")]
    PoolOverflow,

    #[error("annotation member value tag '{0}' is not supported")]
    UnsupportedMemberType(char),

    #[error("annotation {0} does not exist on this element")]
    MissingAnnotation(String),

    #[error("annotation {0} appears in both annotation channels")]
    DuplicateAnnotation(String),

    #[error("no field or method named {0}")]
    NoSuchMember(String),
}

/// An attribute carried verbatim unless it is one of the two annotation
/// channels, which the weaver decodes and re-encodes on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

/// A field or method.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MemberInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn has_transient_flag(&self) -> bool {
        self.access_flags & ACC_TRANSIENT != 0
    }
}

/// One parsed class file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut cursor = ReadCursor::new(bytes);
        let magic = cursor.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let minor_version = cursor.u16()?;
        let major_version = cursor.u16()?;
        let pool = ConstantPool::read(&mut cursor)?;
        let access_flags = cursor.u16()?;
        let this_class = cursor.u16()?;
        let super_class = cursor.u16()?;
        let interface_count = cursor.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(cursor.u16()?);
        }
        let fields = read_members(&mut cursor)?;
        let methods = read_members(&mut cursor)?;
        let attributes = read_attributes(&mut cursor)?;
        if !cursor.is_at_end() {
            return Err(ClassFileError::TrailingBytes);
        }
        Ok(ClassFile {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = WriteCursor::new();
        out.u32(MAGIC);
        out.u16(self.minor_version);
        out.u16(self.major_version);
        self.pool.write(&mut out);
        out.u16(self.access_flags);
        out.u16(self.this_class);
        out.u16(self.super_class);
        out.u16(self.interfaces.len() as u16);
        for interface in &self.interfaces {
            out.u16(*interface);
        }
        write_members(&mut out, &self.fields);
        write_members(&mut out, &self.methods);
        write_attributes(&mut out, &self.attributes);
        out.into_bytes()
    }

    /// The fully-qualified (dotted) name of this class.
    pub fn class_name(&self) -> Result<String, ClassFileError> {
        Ok(internal_to_qualified(
            self.pool.class_name(self.this_class)?,
        ))
    }

    /// The package part of the class name, empty for the default package.
    pub fn package_name(&self) -> Result<String, ClassFileError> {
        let name = self.class_name()?;
        Ok(match name.rfind('.') {
            Some(i) => name[..i].to_string(),
            None => String::new(),
        })
    }

    // Class-level annotations.

    /// All class-level annotations from both channels.
    pub fn class_annotations(&self) -> Result<Vec<Annotation>, ClassFileError> {
        annotation::all_annotations(&self.pool, &self.attributes)
    }

    pub fn has_class_annotation(&self, type_name: &str) -> Result<bool, ClassFileError> {
        annotation::has_annotation(&self.pool, &self.attributes, type_name)
    }

    /// Looks up a class-level annotation by qualified name across both
    /// channels.
    pub fn class_annotation(&self, type_name: &str) -> Result<Option<Annotation>, ClassFileError> {
        Ok(self
            .class_annotations()?
            .into_iter()
            .find(|a| a.type_name == type_name))
    }

    // Field-level annotations.

    pub fn field_name(&self, field: &MemberInfo) -> Result<&str, ClassFileError> {
        self.pool.utf8(field.name_index)
    }

    /// The field's declared type as a Java type name, e.g.
    /// `java.lang.String`, `int`, or `byte[]`.
    pub fn field_type_name(&self, field: &MemberInfo) -> Result<String, ClassFileError> {
        Ok(descriptor_to_type_name(
            self.pool.utf8(field.descriptor_index)?,
        ))
    }

    /// All annotations of a field from both channels.
    pub fn field_annotations(&self, field: &MemberInfo) -> Result<Vec<Annotation>, ClassFileError> {
        annotation::all_annotations(&self.pool, &field.attributes)
    }

    pub fn has_field_annotation(
        &self,
        field: &MemberInfo,
        type_name: &str,
    ) -> Result<bool, ClassFileError> {
        annotation::has_annotation(&self.pool, &field.attributes, type_name)
    }

    /// Creates an empty annotation in the runtime-visible channel of the
    /// field at `field_index`, unless an annotation of that name already
    /// exists in either channel.
    pub fn add_field_annotation_if_missing(
        &mut self,
        field_index: usize,
        type_name: &str,
    ) -> Result<(), ClassFileError> {
        let field = &mut self.fields[field_index];
        if annotation::has_annotation(&self.pool, &field.attributes, type_name)? {
            return Ok(());
        }
        annotation::attach_annotation(
            &mut self.pool,
            &mut field.attributes,
            VISIBLE_CHANNEL,
            &Annotation::marker(type_name),
        )
    }

    /// Sets a member on an existing annotation of the field at
    /// `field_index`, only if the member is currently absent. The owning
    /// channel is re-serialized; an explicit value set by the user is
    /// never overwritten.
    ///
    /// Fails with [`ClassFileError::MissingAnnotation`] if no annotation of
    /// that name exists in either channel.
    pub fn add_field_annotation_member_if_missing(
        &mut self,
        field_index: usize,
        type_name: &str,
        member: &str,
        value: &MemberValue,
    ) -> Result<(), ClassFileError> {
        let field = &mut self.fields[field_index];
        annotation::add_member_if_missing(
            &mut self.pool,
            &mut field.attributes,
            type_name,
            member,
            value,
        )
    }

    // Method-level annotations.

    pub fn method_name(&self, method: &MemberInfo) -> Result<&str, ClassFileError> {
        self.pool.utf8(method.name_index)
    }

    pub fn method_descriptor(&self, method: &MemberInfo) -> Result<&str, ClassFileError> {
        self.pool.utf8(method.descriptor_index)
    }

    pub fn has_method_annotation(
        &self,
        method: &MemberInfo,
        type_name: &str,
    ) -> Result<bool, ClassFileError> {
        annotation::has_annotation(&self.pool, &method.attributes, type_name)
    }
}

fn read_members(cursor: &mut ReadCursor<'_>) -> Result<Vec<MemberInfo>, ClassFileError> {
    let count = cursor.u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = cursor.u16()?;
        let name_index = cursor.u16()?;
        let descriptor_index = cursor.u16()?;
        let attributes = read_attributes(cursor)?;
        members.push(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }
    Ok(members)
}

fn write_members(out: &mut WriteCursor, members: &[MemberInfo]) {
    out.u16(members.len() as u16);
    for member in members {
        out.u16(member.access_flags);
        out.u16(member.name_index);
        out.u16(member.descriptor_index);
        write_attributes(out, &member.attributes);
    }
}

fn read_attributes(cursor: &mut ReadCursor<'_>) -> Result<Vec<AttributeInfo>, ClassFileError> {
    let count = cursor.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = cursor.u16()?;
        let len = cursor.u32()? as usize;
        let info = cursor.bytes(len)?.to_vec();
        attributes.push(AttributeInfo { name_index, info });
    }
    Ok(attributes)
}

fn write_attributes(out: &mut WriteCursor, attributes: &[AttributeInfo]) {
    out.u16(attributes.len() as u16);
    for attribute in attributes {
        out.u16(attribute.name_index);
        out.u32(attribute.info.len() as u32);
        out.bytes(&attribute.info);
    }
}

/// Converts an internal (slash-separated) name to a qualified (dotted) one.
pub fn internal_to_qualified(internal: &str) -> String {
    internal.replace('/', ".")
}

/// Converts a qualified (dotted) name to an internal (slash-separated) one.
pub fn qualified_to_internal(qualified: &str) -> String {
    qualified.replace('.', "/")
}

/// Converts a Java type name to a descriptor, e.g. `java.lang.String` to
/// `Ljava/lang/String;`, `int` to `I`, `byte[]` to `[B`. Total inverse of
/// [`descriptor_to_type_name`], so decoding and re-encoding an annotation
/// member preserves its descriptor exactly.
pub fn type_descriptor(qualified: &str) -> String {
    if let Some(element) = qualified.strip_suffix("[]") {
        return format!("[{}", type_descriptor(element));
    }
    match qualified {
        "byte" => "B".to_string(),
        "char" => "C".to_string(),
        "double" => "D".to_string(),
        "float" => "F".to_string(),
        "int" => "I".to_string(),
        "long" => "J".to_string(),
        "short" => "S".to_string(),
        "boolean" => "Z".to_string(),
        "void" => "V".to_string(),
        _ => format!("L{};", qualified_to_internal(qualified)),
    }
}

/// Decodes a field descriptor into a Java type name.
pub fn descriptor_to_type_name(descriptor: &str) -> String {
    match descriptor.as_bytes().first() {
        Some(b'[') => format!("{}[]", descriptor_to_type_name(&descriptor[1..])),
        Some(b'L') => internal_to_qualified(descriptor[1..].trim_end_matches(';')),
        Some(b'B') => "byte".to_string(),
        Some(b'C') => "char".to_string(),
        Some(b'D') => "double".to_string(),
        Some(b'F') => "float".to_string(),
        Some(b'I') => "int".to_string(),
        Some(b'J') => "long".to_string(),
        Some(b'S') => "short".to_string(),
        Some(b'Z') => "boolean".to_string(),
        Some(b'V') => "void".to_string(),
        _ => descriptor.to_string(),
    }
}
