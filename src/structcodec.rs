//! Struct Codec: decodes fixed-width integer and float fields under a
//! chosen endianness.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::basetype::{BaseType, BaseTypeId};
use crate::error::{FitError, FitResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// A single decoded element, prior to base-type invalid-sentinel mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawNum {
    I(i64),
    U(u64),
    F(f64),
    /// The wire bit pattern was the type's invalid sentinel. Detected here,
    /// on the raw integer bits, because widening a float32 invalid sentinel
    /// to `f64` does not reliably preserve its bit pattern (NaN payloads can
    /// get canonicalized on the cast).
    Invalid,
}

fn read_one(data: &[u8], id: BaseTypeId, endian: Endian) -> RawNum {
    match (id, endian) {
        (BaseTypeId::Enum, _) | (BaseTypeId::Uint8, _) | (BaseTypeId::Byte, _) | (BaseTypeId::Uint8z, _) => {
            RawNum::U(data[0] as u64)
        }
        (BaseTypeId::Sint8, _) => RawNum::I(data[0] as i8 as i64),
        (BaseTypeId::String, _) => RawNum::U(data[0] as u64),
        (BaseTypeId::Sint16, Endian::Little) => RawNum::I(LittleEndian::read_i16(data) as i64),
        (BaseTypeId::Sint16, Endian::Big) => RawNum::I(BigEndian::read_i16(data) as i64),
        (BaseTypeId::Uint16, Endian::Little) | (BaseTypeId::Uint16z, Endian::Little) => {
            RawNum::U(LittleEndian::read_u16(data) as u64)
        }
        (BaseTypeId::Uint16, Endian::Big) | (BaseTypeId::Uint16z, Endian::Big) => {
            RawNum::U(BigEndian::read_u16(data) as u64)
        }
        (BaseTypeId::Sint32, Endian::Little) => RawNum::I(LittleEndian::read_i32(data) as i64),
        (BaseTypeId::Sint32, Endian::Big) => RawNum::I(BigEndian::read_i32(data) as i64),
        (BaseTypeId::Uint32, Endian::Little) | (BaseTypeId::Uint32z, Endian::Little) => {
            RawNum::U(LittleEndian::read_u32(data) as u64)
        }
        (BaseTypeId::Uint32, Endian::Big) | (BaseTypeId::Uint32z, Endian::Big) => {
            RawNum::U(BigEndian::read_u32(data) as u64)
        }
        (BaseTypeId::Sint64, Endian::Little) => RawNum::I(LittleEndian::read_i64(data)),
        (BaseTypeId::Sint64, Endian::Big) => RawNum::I(BigEndian::read_i64(data)),
        (BaseTypeId::Uint64, Endian::Little) | (BaseTypeId::Uint64z, Endian::Little) => {
            RawNum::U(LittleEndian::read_u64(data))
        }
        (BaseTypeId::Uint64, Endian::Big) | (BaseTypeId::Uint64z, Endian::Big) => {
            RawNum::U(BigEndian::read_u64(data))
        }
        (BaseTypeId::Float32, Endian::Little) => {
            let bits = LittleEndian::read_u32(data);
            if bits == u32::MAX { RawNum::Invalid } else { RawNum::F(f32::from_bits(bits) as f64) }
        }
        (BaseTypeId::Float32, Endian::Big) => {
            let bits = BigEndian::read_u32(data);
            if bits == u32::MAX { RawNum::Invalid } else { RawNum::F(f32::from_bits(bits) as f64) }
        }
        (BaseTypeId::Float64, Endian::Little) => {
            let bits = LittleEndian::read_u64(data);
            if bits == u64::MAX { RawNum::Invalid } else { RawNum::F(f64::from_bits(bits)) }
        }
        (BaseTypeId::Float64, Endian::Big) => {
            let bits = BigEndian::read_u64(data);
            if bits == u64::MAX { RawNum::Invalid } else { RawNum::F(f64::from_bits(bits)) }
        }
    }
}

/// Reads a bare `u16` under `endian`, used for the global-message-number and
/// definition-record bookkeeping fields that sit outside any base type.
pub fn read_u16(data: &[u8], endian: Endian) -> u16 {
    match endian {
        Endian::Little => LittleEndian::read_u16(data),
        Endian::Big => BigEndian::read_u16(data),
    }
}

/// Reads `count` elements of `base_type` from `data` under `endian`.
///
/// `data.len()` must equal `count * base_type.size`. Errors: `InvalidFormat`
/// (surfaced as `FitError::Parse`) when `count == 0`.
pub fn read_struct(data: &[u8], base_type: &BaseType, count: usize, endian: Endian) -> FitResult<Vec<RawNum>> {
    if count == 0 {
        return Err(FitError::Parse("invalid struct format: zero element count".into()));
    }
    let elem = base_type.size as usize;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let slice = &data[i * elem..(i + 1) * elem];
        out.push(read_one(slice, base_type.id, endian));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basetype::lookup_base_type;

    #[test]
    fn reads_little_endian_u16() {
        let bt = lookup_base_type(crate::basetype::BaseTypeId::Uint16.into());
        let data = [0x02, 0x01];
        let out = read_struct(&data, &bt, 1, Endian::Little).unwrap();
        assert_eq!(out, vec![RawNum::U(0x0102)]);
    }

    #[test]
    fn reads_big_endian_i32() {
        let bt = lookup_base_type(crate::basetype::BaseTypeId::Sint32.into());
        let bytes = (-5i32).to_be_bytes();
        let out = read_struct(&bytes, &bt, 1, Endian::Big).unwrap();
        assert_eq!(out, vec![RawNum::I(-5)]);
    }

    #[test]
    fn zero_count_is_invalid_format() {
        let bt = lookup_base_type(crate::basetype::BaseTypeId::Uint8.into());
        assert!(read_struct(&[], &bt, 0, Endian::Little).is_err());
    }
}
