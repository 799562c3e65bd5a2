//! Class-file constant pool.
//!
//! Every JVMS constant kind is modeled so that arbitrary compiler output
//! round-trips byte-for-byte. The weaver itself only ever reads `Utf8` and
//! `Class` entries and appends `Utf8`/numeric entries for annotation
//! members; everything else is carried through untouched.

use super::io::{ReadCursor, WriteCursor};
use super::ClassFileError;

/// One constant pool entry.
///
/// Index fields reference other pool slots. `Unusable` fills the phantom
/// slot that follows a `Long` or `Double` entry (JVMS §4.4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
    Unusable,
}

/// The constant pool of one class file.
///
/// Slot 0 is reserved by the format; entries are addressed 1-based as in
/// the JVMS. Adding is append-only with dedup, so existing indices never
/// shift under mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
}

impl ConstantPool {
    pub fn new() -> Self {
        ConstantPool {
            entries: vec![PoolEntry::Unusable],
        }
    }

    /// The value to write as `constant_pool_count` (slot count + 1 semantics
    /// of the format fall out of the reserved slot 0).
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn entry(&self, index: u16) -> Result<&PoolEntry, ClassFileError> {
        self.entries
            .get(index as usize)
            .filter(|e| !matches!(e, PoolEntry::Unusable))
            .ok_or(ClassFileError::BadPoolIndex(index))
    }

    /// Resolves a `Utf8` entry.
    pub fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.entry(index)? {
            PoolEntry::Utf8(s) => Ok(s),
            _ => Err(ClassFileError::WrongPoolTag {
                index,
                expected: "Utf8",
            }),
        }
    }

    pub fn integer(&self, index: u16) -> Result<i32, ClassFileError> {
        match self.entry(index)? {
            PoolEntry::Integer(v) => Ok(*v),
            _ => Err(ClassFileError::WrongPoolTag {
                index,
                expected: "Integer",
            }),
        }
    }

    pub fn long(&self, index: u16) -> Result<i64, ClassFileError> {
        match self.entry(index)? {
            PoolEntry::Long(v) => Ok(*v),
            _ => Err(ClassFileError::WrongPoolTag {
                index,
                expected: "Long",
            }),
        }
    }

    pub fn float(&self, index: u16) -> Result<f32, ClassFileError> {
        match self.entry(index)? {
            PoolEntry::Float(v) => Ok(*v),
            _ => Err(ClassFileError::WrongPoolTag {
                index,
                expected: "Float",
            }),
        }
    }

    pub fn double(&self, index: u16) -> Result<f64, ClassFileError> {
        match self.entry(index)? {
            PoolEntry::Double(v) => Ok(*v),
            _ => Err(ClassFileError::WrongPoolTag {
                index,
                expected: "Double",
            }),
        }
    }

    /// Resolves a `Class` entry to its internal (slash-separated) name.
    pub fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.entry(index)? {
            PoolEntry::Class(name_index) => self.utf8(*name_index),
            _ => Err(ClassFileError::WrongPoolTag {
                index,
                expected: "Class",
            }),
        }
    }

    fn push(&mut self, entry: PoolEntry) -> Result<u16, ClassFileError> {
        let index = self.entries.len();
        let wide = matches!(entry, PoolEntry::Long(_) | PoolEntry::Double(_));
        let slots = if wide { 2 } else { 1 };
        // `constant_pool_count` is a u16, so the slot count after the add
        // must still fit; checked up front so a refused add leaves the
        // pool untouched.
        if index + slots > u16::MAX as usize {
            return Err(ClassFileError::PoolOverflow);
        }
        self.entries.push(entry);
        if wide {
            self.entries.push(PoolEntry::Unusable);
        }
        Ok(index as u16)
    }

    fn find(&self, entry: &PoolEntry) -> Option<u16> {
        self.entries.iter().position(|e| e == entry).map(|i| i as u16)
    }

    fn add(&mut self, entry: PoolEntry) -> Result<u16, ClassFileError> {
        match self.find(&entry) {
            Some(index) => Ok(index),
            None => self.push(entry),
        }
    }

    pub fn add_utf8(&mut self, value: &str) -> Result<u16, ClassFileError> {
        self.add(PoolEntry::Utf8(value.to_string()))
    }

    pub fn add_integer(&mut self, value: i32) -> Result<u16, ClassFileError> {
        self.add(PoolEntry::Integer(value))
    }

    pub fn add_long(&mut self, value: i64) -> Result<u16, ClassFileError> {
        self.add(PoolEntry::Long(value))
    }

    pub fn add_float(&mut self, value: f32) -> Result<u16, ClassFileError> {
        // Compare by bit pattern so NaNs dedup instead of growing the pool.
        match self.entries.iter().position(
            |e| matches!(e, PoolEntry::Float(f) if f.to_bits() == value.to_bits()),
        ) {
            Some(index) => Ok(index as u16),
            None => self.push(PoolEntry::Float(value)),
        }
    }

    pub fn add_double(&mut self, value: f64) -> Result<u16, ClassFileError> {
        match self.entries.iter().position(
            |e| matches!(e, PoolEntry::Double(d) if d.to_bits() == value.to_bits()),
        ) {
            Some(index) => Ok(index as u16),
            None => self.push(PoolEntry::Double(value)),
        }
    }

    /// Adds a `Class` entry for an internal (slash-separated) name.
    pub fn add_class(&mut self, internal_name: &str) -> Result<u16, ClassFileError> {
        let name_index = self.add_utf8(internal_name)?;
        self.add(PoolEntry::Class(name_index))
    }

    pub(super) fn read(cursor: &mut ReadCursor<'_>) -> Result<Self, ClassFileError> {
        let count = cursor.u16()?;
        let mut pool = ConstantPool::new();
        while pool.entries.len() < count as usize {
            let tag = cursor.u8()?;
            let entry = match tag {
                1 => {
                    let len = cursor.u16()? as usize;
                    let bytes = cursor.bytes(len)?;
                    // Java's modified UTF-8 differs from UTF-8 only for
                    // NUL and supplementary characters; annotation names
                    // never contain either, and raw bytes are preserved
                    // for everything the weaver does not rewrite.
                    PoolEntry::Utf8(mutf8_to_string(bytes)?)
                }
                3 => PoolEntry::Integer(cursor.u32()? as i32),
                4 => PoolEntry::Float(f32::from_bits(cursor.u32()?)),
                5 => PoolEntry::Long(cursor.u64()? as i64),
                6 => PoolEntry::Double(f64::from_bits(cursor.u64()?)),
                7 => PoolEntry::Class(cursor.u16()?),
                8 => PoolEntry::String(cursor.u16()?),
                9 => PoolEntry::FieldRef {
                    class: cursor.u16()?,
                    name_and_type: cursor.u16()?,
                },
                10 => PoolEntry::MethodRef {
                    class: cursor.u16()?,
                    name_and_type: cursor.u16()?,
                },
                11 => PoolEntry::InterfaceMethodRef {
                    class: cursor.u16()?,
                    name_and_type: cursor.u16()?,
                },
                12 => PoolEntry::NameAndType {
                    name: cursor.u16()?,
                    descriptor: cursor.u16()?,
                },
                15 => PoolEntry::MethodHandle {
                    kind: cursor.u8()?,
                    reference: cursor.u16()?,
                },
                16 => PoolEntry::MethodType(cursor.u16()?),
                17 => PoolEntry::Dynamic {
                    bootstrap: cursor.u16()?,
                    name_and_type: cursor.u16()?,
                },
                18 => PoolEntry::InvokeDynamic {
                    bootstrap: cursor.u16()?,
                    name_and_type: cursor.u16()?,
                },
                19 => PoolEntry::Module(cursor.u16()?),
                20 => PoolEntry::Package(cursor.u16()?),
                other => return Err(ClassFileError::UnknownPoolTag(other)),
            };
            let wide = matches!(entry, PoolEntry::Long(_) | PoolEntry::Double(_));
            pool.entries.push(entry);
            if wide {
                pool.entries.push(PoolEntry::Unusable);
            }
        }
        Ok(pool)
    }

    pub(super) fn write(&self, out: &mut WriteCursor) {
        out.u16(self.count());
        for entry in &self.entries {
            match entry {
                PoolEntry::Unusable => {}
                PoolEntry::Utf8(s) => {
                    out.u8(1);
                    let bytes = string_to_mutf8(s);
                    out.u16(bytes.len() as u16);
                    out.bytes(&bytes);
                }
                PoolEntry::Integer(v) => {
                    out.u8(3);
                    out.u32(*v as u32);
                }
                PoolEntry::Float(v) => {
                    out.u8(4);
                    out.u32(v.to_bits());
                }
                PoolEntry::Long(v) => {
                    out.u8(5);
                    out.u64(*v as u64);
                }
                PoolEntry::Double(v) => {
                    out.u8(6);
                    out.u64(v.to_bits());
                }
                PoolEntry::Class(i) => {
                    out.u8(7);
                    out.u16(*i);
                }
                PoolEntry::String(i) => {
                    out.u8(8);
                    out.u16(*i);
                }
                PoolEntry::FieldRef {
                    class,
                    name_and_type,
                } => {
                    out.u8(9);
                    out.u16(*class);
                    out.u16(*name_and_type);
                }
                PoolEntry::MethodRef {
                    class,
                    name_and_type,
                } => {
                    out.u8(10);
                    out.u16(*class);
                    out.u16(*name_and_type);
                }
                PoolEntry::InterfaceMethodRef {
                    class,
                    name_and_type,
                } => {
                    out.u8(11);
                    out.u16(*class);
                    out.u16(*name_and_type);
                }
                PoolEntry::NameAndType { name, descriptor } => {
                    out.u8(12);
                    out.u16(*name);
                    out.u16(*descriptor);
                }
                PoolEntry::MethodHandle { kind, reference } => {
                    out.u8(15);
                    out.u8(*kind);
                    out.u16(*reference);
                }
                PoolEntry::MethodType(i) => {
                    out.u8(16);
                    out.u16(*i);
                }
                PoolEntry::Dynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    out.u8(17);
                    out.u16(*bootstrap);
                    out.u16(*name_and_type);
                }
                PoolEntry::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    out.u8(18);
                    out.u16(*bootstrap);
                    out.u16(*name_and_type);
                }
                PoolEntry::Module(i) => {
                    out.u8(19);
                    out.u16(*i);
                }
                PoolEntry::Package(i) => {
                    out.u8(20);
                    out.u16(*i);
                }
            }
        }
    }
}

impl Default for ConstantPool {
    fn default() -> Self {
        ConstantPool::new()
    }
}

/// Decodes Java's modified UTF-8 (JVMS §4.4.7).
fn mutf8_to_string(bytes: &[u8]) -> Result<String, ClassFileError> {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 & 0x80 == 0 {
            if b0 == 0 {
                return Err(ClassFileError::MalformedUtf8);
            }
            out.push(b0 as char);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = *bytes.get(i + 1).ok_or(ClassFileError::MalformedUtf8)?;
            let cp = ((b0 as u32 & 0x1F) << 6) | (b1 as u32 & 0x3F);
            out.push(char::from_u32(cp).ok_or(ClassFileError::MalformedUtf8)?);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = *bytes.get(i + 1).ok_or(ClassFileError::MalformedUtf8)?;
            let b2 = *bytes.get(i + 2).ok_or(ClassFileError::MalformedUtf8)?;
            let unit = ((b0 as u32 & 0x0F) << 12) | ((b1 as u32 & 0x3F) << 6) | (b2 as u32 & 0x3F);
            // Surrogate pairs arrive as two three-byte units.
            if (0xD800..0xDC00).contains(&unit) && i + 5 < bytes.len() {
                let c0 = bytes[i + 3];
                let c1 = bytes[i + 4];
                let c2 = bytes[i + 5];
                if c0 & 0xF0 == 0xE0 {
                    let low = ((c0 as u32 & 0x0F) << 12)
                        | ((c1 as u32 & 0x3F) << 6)
                        | (c2 as u32 & 0x3F);
                    if (0xDC00..0xE000).contains(&low) {
                        let cp = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                        out.push(char::from_u32(cp).ok_or(ClassFileError::MalformedUtf8)?);
                        i += 6;
                        continue;
                    }
                }
            }
            out.push(char::from_u32(unit).ok_or(ClassFileError::MalformedUtf8)?);
            i += 3;
        } else {
            return Err(ClassFileError::MalformedUtf8);
        }
    }
    Ok(out)
}

/// Encodes to Java's modified UTF-8.
fn string_to_mutf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        let cp = c as u32;
        if cp != 0 && cp < 0x80 {
            out.push(cp as u8);
        } else if cp < 0x800 {
            out.push(0xC0 | (cp >> 6) as u8);
            out.push(0x80 | (cp & 0x3F) as u8);
        } else if cp < 0x10000 {
            out.push(0xE0 | (cp >> 12) as u8);
            out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
            out.push(0x80 | (cp & 0x3F) as u8);
        } else {
            // Supplementary characters encode as a surrogate pair of
            // three-byte units.
            let v = cp - 0x10000;
            let high = 0xD800 + (v >> 10);
            let low = 0xDC00 + (v & 0x3FF);
            for unit in [high, low] {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
