//! Byte-sequence decoding.
//!
//! The decoder reads tags sequentially from a shrinking slice, mirroring the
//! encoder's reference bookkeeping as it goes: tables claim an entry before
//! their contents are read, other values claim one after, and only when the
//! bytes they consumed beat the cost of a reference. Getting this mirror
//! exactly right is what makes the wire's unwritten reference ids line up.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};
use crate::marker::{self, Marker, SizedType, INLINE_SPAN};
use crate::refs::ref_cost;
use crate::table::Table;
use crate::value::Value;

/// Nesting limit for hostile input; honest graphs deeper than this do not
/// occur in practice and would otherwise exhaust the stack.
const MAX_DEPTH: usize = 512;

/// Decode a byte sequence into a value graph. The empty sequence is nil.
pub(crate) fn decode(
    buf: &[u8],
    externals: &[Value],
    external_count: Option<usize>,
) -> Result<Value> {
    if buf.is_empty() {
        return Ok(Value::Nil);
    }
    let count = external_count.unwrap_or(externals.len());
    let mut entries: Vec<Value> = externals.iter().take(count).cloned().collect();
    entries.resize(count, Value::Nil);
    let mut cursor = buf;
    let value = read_value(&mut cursor, &mut entries, 0)?;
    if !cursor.is_empty() {
        return Err(Error::TrailingData {
            used: buf.len() - cursor.len(),
            len: buf.len(),
        });
    }
    Ok(value)
}

fn read_value(buf: &mut &[u8], entries: &mut Vec<Value>, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(Error::Corrupt("nesting depth limit exceeded"));
    }
    let start = buf.len();
    let value = match Marker::from_u8(buf.read_u8()?) {
        Marker::Inline(h) => {
            let h = h as usize;
            if h < entries.len() {
                // An assigned id: this is a reference.
                return Ok(entries[h].clone());
            }
            Value::Int(h as i64)
        }
        Marker::True => Value::Bool(true),
        Marker::False => Value::Bool(false),
        Marker::Nan => Value::F64(f64::NAN),
        Marker::F32 => Value::F32(f32::from_bits(buf.read_u32::<LittleEndian>()?)),
        Marker::F64 => Value::F64(f64::from_bits(buf.read_u64::<LittleEndian>()?)),
        Marker::Sized(ty, len_bytes) => {
            let header = marker::read_header_value(buf, len_bytes)?;
            match ty {
                SizedType::Ref => {
                    let id = header + INLINE_SPAN as u64;
                    return usize::try_from(id)
                        .ok()
                        .and_then(|id| entries.get(id))
                        .cloned()
                        .ok_or(Error::Corrupt("reference to an unassigned id"));
                }
                SizedType::PosInt => Value::Int(header as i64),
                SizedType::NegInt => {
                    if header == 0 {
                        // The zero slot of the negative range carries -0.0.
                        Value::F64(-0.0)
                    } else {
                        Value::Int(-(header as i64))
                    }
                }
                SizedType::Str => {
                    let len = header as usize;
                    if len > buf.len() {
                        return Err(Error::Corrupt("string runs past the end of input"));
                    }
                    let (bytes, rest) = buf.split_at(len);
                    let value = Value::Str(bytes.to_vec());
                    *buf = rest;
                    value
                }
                SizedType::Array => return read_array(buf, entries, header, depth),
                SizedType::Map => return read_map(buf, entries, header, depth),
            }
        }
    };
    // Mirror of the encoder's economy rule.
    let used = start - buf.len();
    if used > ref_cost(entries.len()) {
        entries.push(value.clone());
    }
    Ok(value)
}

fn read_array(buf: &mut &[u8], entries: &mut Vec<Value>, len: u64, depth: usize) -> Result<Value> {
    let t = Table::new();
    entries.push(Value::Table(t.clone()));
    for i in 0..len {
        let v = read_value(buf, entries, depth + 1)?;
        // A nil here can only come from an unlisted external placeholder;
        // tables hold no nil values, so the slot stays empty.
        if !v.is_nil() {
            t.append(Value::Int(i as i64 + 1), v);
        }
    }
    Ok(Value::Table(t))
}

fn read_map(buf: &mut &[u8], entries: &mut Vec<Value>, len: u64, depth: usize) -> Result<Value> {
    let t = Table::new();
    entries.push(Value::Table(t.clone()));
    for _ in 0..len {
        let k = read_value(buf, entries, depth + 1)?;
        let v = read_value(buf, entries, depth + 1)?;
        t.insert(k, v);
    }
    Ok(Value::Table(t))
}
