//! Annotation member values.

use serde::{Deserialize, Serialize};

/// A value of an annotation member (aka element).
///
/// This is the closed set of kinds the class-file `element_value` format
/// can carry, minus nested annotations, which the weaver never injects.
/// Numeric variants keep their exact width so that encoding emits the
/// matching tag instead of widening everything to `int`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// A UTF-16 code unit, as Java's `char` is defined. Kept raw because
    /// an unpaired surrogate is a legal value there.
    Char(u16),
    Str(String),
    /// An enum constant: the enum's qualified type name and the constant name.
    Enum {
        type_name: String,
        const_name: String,
    },
    /// A class reference by qualified type name.
    Class(String),
    /// A homogeneous array of any of the other kinds.
    Array(Vec<MemberValue>),
}

impl From<bool> for MemberValue {
    fn from(v: bool) -> Self {
        MemberValue::Bool(v)
    }
}

impl From<i32> for MemberValue {
    fn from(v: i32) -> Self {
        MemberValue::Int(v)
    }
}

impl From<i64> for MemberValue {
    fn from(v: i64) -> Self {
        MemberValue::Long(v)
    }
}

impl From<&str> for MemberValue {
    fn from(v: &str) -> Self {
        MemberValue::Str(v.to_string())
    }
}

impl From<String> for MemberValue {
    fn from(v: String) -> Self {
        MemberValue::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_pick_the_expected_variant() {
        assert_eq!(MemberValue::from(true), MemberValue::Bool(true));
        assert_eq!(MemberValue::from(7), MemberValue::Int(7));
        assert_eq!(MemberValue::from("x"), MemberValue::Str("x".to_string()));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_string(&MemberValue::Int(42)).unwrap();
        assert_eq!(json, r#"{"int":42}"#);
    }
}
