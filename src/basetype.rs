//! Base-type registry: identifier -> (name, size, invalid sentinel, parse/unparse).
//!
//! Mirrors the FIT SDK's base type table. Unknown identifiers fall back to
//! `byte` rather than erroring, keeping that fallback strict rather than
//! silently widening it.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::convert::TryFrom;

use crate::structcodec::RawNum;

#[derive(Debug, Eq, Clone, Copy, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BaseTypeId {
    Enum = 0x00,
    Sint8 = 0x01,
    Uint8 = 0x02,
    Sint16 = 0x83,
    Uint16 = 0x84,
    Sint32 = 0x85,
    Uint32 = 0x86,
    String = 0x07,
    Float32 = 0x88,
    Float64 = 0x89,
    Uint8z = 0x0A,
    Uint16z = 0x8B,
    Uint32z = 0x8C,
    Byte = 0x0D,
    Sint64 = 0x8E,
    Uint64 = 0x8F,
    Uint64z = 0x90,
}

/// A decoded scalar, post base-type parse but pre scale/offset.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    SInt(i64),
    UInt(u64),
    Float(f64),
    /// Raw bytes of a `byte` or `string` field: always carried as a tuple of
    /// individual bytes at the base-type level, since byte-typed fields
    /// always yield a tuple on the wire.
    Bytes(Vec<u8>),
}

impl RawValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::SInt(v) => Some(*v),
            RawValue::UInt(v) => i64::try_from(*v).ok(),
            RawValue::Float(v) => Some(*v as i64),
            RawValue::Bytes(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            RawValue::SInt(v) => u64::try_from(*v).ok(),
            RawValue::UInt(v) => Some(*v),
            RawValue::Float(v) => Some(*v as u64),
            RawValue::Bytes(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::SInt(v) => Some(*v as f64),
            RawValue::UInt(v) => Some(*v as f64),
            RawValue::Float(v) => Some(*v),
            RawValue::Bytes(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BaseType {
    pub id: BaseTypeId,
    pub name: &'static str,
    pub size: u8,
    pub endian_aware: bool,
}

impl BaseType {
    /// Reads `raw` (as produced by the struct codec for one element) and
    /// maps the type's invalid sentinel to `None`.
    pub fn parse(&self, raw: RawNum) -> Option<RawValue> {
        match self.id {
            BaseTypeId::Enum | BaseTypeId::Uint8 | BaseTypeId::Byte => match raw {
                RawNum::U(v) if v == 0xFF => None,
                RawNum::U(v) => Some(RawValue::UInt(v)),
                _ => None,
            },
            BaseTypeId::Sint8 => match raw {
                RawNum::I(v) if v == 0x7F => None,
                RawNum::I(v) => Some(RawValue::SInt(v)),
                _ => None,
            },
            BaseTypeId::Uint8z => match raw {
                RawNum::U(0) => None,
                RawNum::U(v) => Some(RawValue::UInt(v)),
                _ => None,
            },
            BaseTypeId::Sint16 => match raw {
                RawNum::I(v) if v == 0x7FFF => None,
                RawNum::I(v) => Some(RawValue::SInt(v)),
                _ => None,
            },
            BaseTypeId::Uint16 => match raw {
                RawNum::U(v) if v == 0xFFFF => None,
                RawNum::U(v) => Some(RawValue::UInt(v)),
                _ => None,
            },
            BaseTypeId::Uint16z => match raw {
                RawNum::U(0) => None,
                RawNum::U(v) => Some(RawValue::UInt(v)),
                _ => None,
            },
            BaseTypeId::Sint32 => match raw {
                RawNum::I(v) if v == 0x7FFFFFFF => None,
                RawNum::I(v) => Some(RawValue::SInt(v)),
                _ => None,
            },
            BaseTypeId::Uint32 => match raw {
                RawNum::U(v) if v == 0xFFFFFFFF => None,
                RawNum::U(v) => Some(RawValue::UInt(v)),
                _ => None,
            },
            BaseTypeId::Uint32z => match raw {
                RawNum::U(0) => None,
                RawNum::U(v) => Some(RawValue::UInt(v)),
                _ => None,
            },
            BaseTypeId::Sint64 => match raw {
                RawNum::I(v) if v == 0x7FFFFFFFFFFFFFFF => None,
                RawNum::I(v) => Some(RawValue::SInt(v)),
                _ => None,
            },
            BaseTypeId::Uint64 => match raw {
                RawNum::U(v) if v == 0xFFFFFFFFFFFFFFFF => None,
                RawNum::U(v) => Some(RawValue::UInt(v)),
                _ => None,
            },
            BaseTypeId::Uint64z => match raw {
                RawNum::U(0) => None,
                RawNum::U(v) => Some(RawValue::UInt(v)),
                _ => None,
            },
            BaseTypeId::Float32 | BaseTypeId::Float64 => match raw {
                RawNum::Invalid => None,
                RawNum::F(v) => Some(RawValue::Float(v)),
                _ => None,
            },
            BaseTypeId::String => match raw {
                RawNum::U(v) => Some(RawValue::UInt(v)),
                _ => None,
            },
        }
    }

}

const ENUM: BaseType = BaseType { id: BaseTypeId::Enum, name: "enum", size: 1, endian_aware: false };
const SINT8: BaseType = BaseType { id: BaseTypeId::Sint8, name: "sint8", size: 1, endian_aware: false };
const UINT8: BaseType = BaseType { id: BaseTypeId::Uint8, name: "uint8", size: 1, endian_aware: false };
const SINT16: BaseType = BaseType { id: BaseTypeId::Sint16, name: "sint16", size: 2, endian_aware: true };
const UINT16: BaseType = BaseType { id: BaseTypeId::Uint16, name: "uint16", size: 2, endian_aware: true };
const SINT32: BaseType = BaseType { id: BaseTypeId::Sint32, name: "sint32", size: 4, endian_aware: true };
const UINT32: BaseType = BaseType { id: BaseTypeId::Uint32, name: "uint32", size: 4, endian_aware: true };
const STRING: BaseType = BaseType { id: BaseTypeId::String, name: "string", size: 1, endian_aware: false };
const FLOAT32: BaseType = BaseType { id: BaseTypeId::Float32, name: "float32", size: 4, endian_aware: true };
const FLOAT64: BaseType = BaseType { id: BaseTypeId::Float64, name: "float64", size: 8, endian_aware: true };
const UINT8Z: BaseType = BaseType { id: BaseTypeId::Uint8z, name: "uint8z", size: 1, endian_aware: false };
const UINT16Z: BaseType = BaseType { id: BaseTypeId::Uint16z, name: "uint16z", size: 2, endian_aware: true };
const UINT32Z: BaseType = BaseType { id: BaseTypeId::Uint32z, name: "uint32z", size: 4, endian_aware: true };
const BYTE: BaseType = BaseType { id: BaseTypeId::Byte, name: "byte", size: 1, endian_aware: false };
const SINT64: BaseType = BaseType { id: BaseTypeId::Sint64, name: "sint64", size: 8, endian_aware: true };
const UINT64: BaseType = BaseType { id: BaseTypeId::Uint64, name: "uint64", size: 8, endian_aware: true };
const UINT64Z: BaseType = BaseType { id: BaseTypeId::Uint64z, name: "uint64z", size: 8, endian_aware: true };

/// Resolves a wire base-type identifier byte. Unknown identifiers fall back
/// to `byte`.
pub fn lookup_base_type(id: u8) -> BaseType {
    match BaseTypeId::try_from(id) {
        Ok(BaseTypeId::Enum) => ENUM,
        Ok(BaseTypeId::Sint8) => SINT8,
        Ok(BaseTypeId::Uint8) => UINT8,
        Ok(BaseTypeId::Sint16) => SINT16,
        Ok(BaseTypeId::Uint16) => UINT16,
        Ok(BaseTypeId::Sint32) => SINT32,
        Ok(BaseTypeId::Uint32) => UINT32,
        Ok(BaseTypeId::String) => STRING,
        Ok(BaseTypeId::Float32) => FLOAT32,
        Ok(BaseTypeId::Float64) => FLOAT64,
        Ok(BaseTypeId::Uint8z) => UINT8Z,
        Ok(BaseTypeId::Uint16z) => UINT16Z,
        Ok(BaseTypeId::Uint32z) => UINT32Z,
        Ok(BaseTypeId::Byte) => BYTE,
        Ok(BaseTypeId::Sint64) => SINT64,
        Ok(BaseTypeId::Uint64) => UINT64,
        Ok(BaseTypeId::Uint64z) => UINT64Z,
        Err(_) => BYTE,
    }
}
