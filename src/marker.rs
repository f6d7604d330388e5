//! Wire tag bytes. For internal use only.
//!
//! Every encoded value begins with a single tag byte. Bytes 0x00–0x17 are
//! sized headers carrying a type id in the high bits and a length-byte count
//! in the low two bits, bytes 0x18–0x1C are single-purpose markers, and bytes
//! 0x1D–0xFF carry a small value inline.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// First tag byte of the inline range. Inline tags carry `byte - FIRST_INLINE`
/// directly, so one byte spans the values 0..=226.
pub const FIRST_INLINE: u8 = 0x1D;

/// Number of values representable by an inline tag. Multi-byte reference
/// headers count upward from here.
pub const INLINE_SPAN: usize = 256 - FIRST_INLINE as usize;

/// Largest value a sized header can carry, using all four length bytes plus
/// the extended-value offset.
pub const MAX_HEADER_VALUE: u64 = 0x1_00FF_FFFF;

/// Per-length-byte-count maximum header values. A header with `n` length
/// bytes can carry values up to `BYTECOUNT_THRESHOLDS[n - 1]`.
pub(crate) const BYTECOUNT_THRESHOLDS: [u64; 4] = [0xFF, 0x1_00FF, 0x100_FFFF, 0x1_00FF_FFFF];

/// Offsets reclaimed by the extended-value trick. When the final length byte
/// of an `n`-byte header is zero, the decoder adds `EXTENDED_OFFSET[n - 1]`.
/// One-byte headers have no extended form.
const EXTENDED_OFFSET: [u64; 4] = [0, 0x1_0000, 0x100_0000, 0x1_0000_0000];

/// Type classes carried by a sized header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizedType {
    Ref,
    Map,
    Array,
    Str,
    PosInt,
    NegInt,
}

impl SizedType {
    /// Return the assigned type id.
    pub fn into_u8(self) -> u8 {
        match self {
            SizedType::Ref => 0,
            SizedType::Map => 1,
            SizedType::Array => 2,
            SizedType::Str => 3,
            SizedType::PosInt => 4,
            SizedType::NegInt => 5,
        }
    }

}

/// Decoded form of a tag byte.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Marker {
    /// Sized header: type class plus the count of length bytes that follow.
    Sized(SizedType, u8),
    /// IEEE-754 single; four little-endian bytes follow.
    F32,
    /// IEEE-754 double; eight little-endian bytes follow.
    F64,
    True,
    False,
    Nan,
    /// Inline value 0..=226, either a reference id or a small integer
    /// depending on how many reference ids have been assigned.
    Inline(u8),
}

impl Marker {
    /// Construct a marker from a single byte. Every byte decodes to
    /// something: the six sized type ids exactly cover 0x00–0x17, and
    /// everything from 0x1D up is an inline value.
    pub fn from_u8(n: u8) -> Marker {
        match n {
            0x00..=0x03 => Marker::Sized(SizedType::Ref, (n & 3) + 1),
            0x04..=0x07 => Marker::Sized(SizedType::Map, (n & 3) + 1),
            0x08..=0x0B => Marker::Sized(SizedType::Array, (n & 3) + 1),
            0x0C..=0x0F => Marker::Sized(SizedType::Str, (n & 3) + 1),
            0x10..=0x13 => Marker::Sized(SizedType::PosInt, (n & 3) + 1),
            0x14..=0x17 => Marker::Sized(SizedType::NegInt, (n & 3) + 1),
            0x18 => Marker::F32,
            0x19 => Marker::F64,
            0x1A => Marker::True,
            0x1B => Marker::False,
            0x1C => Marker::Nan,
            _ => Marker::Inline(n - FIRST_INLINE),
        }
    }

    /// Converts a marker into its single-byte representation. Sized markers
    /// assume their length-byte count is already in 1..=4.
    pub fn into_u8(self) -> u8 {
        match self {
            Marker::Sized(ty, len_bytes) => ty.into_u8() * 4 + (len_bytes - 1),
            Marker::F32 => 0x18,
            Marker::F64 => 0x19,
            Marker::True => 0x1A,
            Marker::False => 0x1B,
            Marker::Nan => 0x1C,
            Marker::Inline(v) => FIRST_INLINE + v,
        }
    }
}

impl From<u8> for Marker {
    fn from(val: u8) -> Marker {
        Marker::from_u8(val)
    }
}

impl From<Marker> for u8 {
    fn from(val: Marker) -> u8 {
        val.into_u8()
    }
}

/// Write a sized header: the tag byte plus the fewest length bytes that can
/// carry `value`, using the extended-value offsets to reach the upper end of
/// each length class.
pub fn write_header(buf: &mut Vec<u8>, ty: SizedType, value: u64) -> Result<()> {
    let len = BYTECOUNT_THRESHOLDS
        .iter()
        .position(|&t| value <= t)
        .ok_or(Error::OutOfRange(value))?
        + 1;
    let mut v = value;
    if v >= EXTENDED_OFFSET[len - 1] && len > 1 {
        v -= EXTENDED_OFFSET[len - 1];
    }
    buf.push(Marker::Sized(ty, len as u8).into_u8());
    buf.extend_from_slice(&v.to_le_bytes()[..len]);
    Ok(())
}

/// Read the length bytes of a sized header, applying the extended-value
/// offset when the final length byte is zero.
pub fn read_header_value(buf: &mut &[u8], len_bytes: u8) -> Result<u64> {
    let len = len_bytes as usize;
    let v = buf.read_uint::<LittleEndian>(len)?;
    if len > 1 && v < 1 << (8 * (len - 1)) {
        Ok(v + EXTENDED_OFFSET[len - 1])
    } else {
        Ok(v)
    }
}
