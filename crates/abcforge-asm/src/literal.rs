//! Tagged literal values and literal arrays.
//!
//! Tag codes are part of the on-disk format and must not change: compiled
//! artifacts reference them by numeric value.

use serde::{Deserialize, Serialize};

/// On-disk literal tag byte.
///
/// In most literal arrays a `TagValue` literal precedes each payload entry
/// and records that entry's tag byte. Module-descriptor arrays are the
/// exception: their layout is positional (section order is fixed), so no
/// tag-prefix literals appear there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LiteralTag {
    TagValue = 0x00,
    Bool = 0x01,
    Integer = 0x02,
    Float = 0x03,
    Double = 0x04,
    String = 0x05,
    Method = 0x06,
    GeneratorMethod = 0x07,
    Accessor = 0x08,
    MethodAffiliate = 0x09,
    ArrayU1 = 0x0a,
    ArrayU8 = 0x0b,
    ArrayI8 = 0x0c,
    ArrayU16 = 0x0d,
    ArrayI16 = 0x0e,
    ArrayU32 = 0x0f,
    ArrayI32 = 0x10,
    ArrayU64 = 0x11,
    ArrayI64 = 0x12,
    ArrayF32 = 0x13,
    ArrayF64 = 0x14,
    ArrayString = 0x15,
    AsyncGeneratorMethod = 0x16,
    LiteralBufferIndex = 0x17,
    LiteralArray = 0x18,
    BuiltinTypeIndex = 0x19,
    Getter = 0x1a,
    Setter = 0x1b,
    /// Tombstone sentinel for logically-deleted table entries.
    NullValue = 0xff,
}

/// Payload of one literal.
///
/// Symbolic references (`Str`, `MethodRef`, `ArrayRef`) are resolved to
/// binary offsets/indices by the emission pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// Raw tag byte carried by a `TagValue` literal.
    TagByte(u8),
    Bool(bool),
    U32(u32),
    /// Stored as the raw 32-bit pattern, never re-derived from a double.
    F32(f32),
    F64(f64),
    Str(String),
    /// Mangled name of a function in the program.
    MethodRef(String),
    /// 16-bit affiliate value (module-request indices use this).
    Affiliate(u16),
    /// Key of another literal array in the program table.
    ArrayRef(String),
    /// Payload of an `ArrayString` literal (scope-name tables use this).
    StringArray(Vec<String>),
    Null,
}

/// One tagged literal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub tag: LiteralTag,
    pub value: LiteralValue,
}

impl Literal {
    pub fn tag_value(tag: u8) -> Self {
        Self {
            tag: LiteralTag::TagValue,
            value: LiteralValue::TagByte(tag),
        }
    }

    pub fn bool(v: bool) -> Self {
        Self {
            tag: LiteralTag::Bool,
            value: LiteralValue::Bool(v),
        }
    }

    pub fn u32(v: u32) -> Self {
        Self {
            tag: LiteralTag::Integer,
            value: LiteralValue::U32(v),
        }
    }

    pub fn f32(v: f32) -> Self {
        Self {
            tag: LiteralTag::Float,
            value: LiteralValue::F32(v),
        }
    }

    pub fn f64(v: f64) -> Self {
        Self {
            tag: LiteralTag::Double,
            value: LiteralValue::F64(v),
        }
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self {
            tag: LiteralTag::String,
            value: LiteralValue::Str(v.into()),
        }
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self {
            tag: LiteralTag::Method,
            value: LiteralValue::MethodRef(name.into()),
        }
    }

    pub fn affiliate(v: u16) -> Self {
        Self {
            tag: LiteralTag::MethodAffiliate,
            value: LiteralValue::Affiliate(v),
        }
    }

    pub fn array_ref(key: impl Into<String>) -> Self {
        Self {
            tag: LiteralTag::LiteralArray,
            value: LiteralValue::ArrayRef(key.into()),
        }
    }

    pub fn string_array(items: Vec<String>) -> Self {
        Self {
            tag: LiteralTag::ArrayString,
            value: LiteralValue::StringArray(items),
        }
    }

    pub fn null() -> Self {
        Self {
            tag: LiteralTag::NullValue,
            value: LiteralValue::Null,
        }
    }

    /// Whether this literal is the tombstone sentinel.
    pub fn is_tombstone(&self) -> bool {
        self.tag == LiteralTag::NullValue
    }

    /// String payload, if this literal carries one.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            LiteralValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Affiliate payload, if this literal carries one.
    pub fn as_affiliate(&self) -> Option<u16> {
        match self.value {
            LiteralValue::Affiliate(v) => Some(v),
            _ => None,
        }
    }

    /// Integer payload, if this literal carries one.
    pub fn as_u32(&self) -> Option<u32> {
        match self.value {
            LiteralValue::U32(v) => Some(v),
            _ => None,
        }
    }
}

/// An ordered sequence of tagged literals.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LiteralArray {
    pub literals: Vec<Literal>,
}

impl LiteralArray {
    pub fn new(literals: Vec<Literal>) -> Self {
        Self { literals }
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Whether any entry has been tombstoned.
    pub fn has_tombstones(&self) -> bool {
        self.literals.iter().any(Literal::is_tombstone)
    }
}
