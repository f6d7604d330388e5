//! Value-graph encoding.
//!
//! Values are written depth-first. Tables take a reference id before their
//! contents are walked, which is what lets a table contain itself; every
//! other value is registered after the fact, and only when re-encoding it
//! would cost more bytes than referencing it (the economy rule). The decoder
//! applies the identical rule, so reference ids agree without ever being
//! written to the wire.

use crate::error::{Error, Result};
use crate::marker::{self, Marker, SizedType, INLINE_SPAN};
use crate::refs::{ref_cost, CacheKey, RefCache};
use crate::table::Table;
use crate::value::{Value, MAX_INT};

/// How a number will hit the wire.
pub(crate) enum Num {
    Nan,
    NegZero,
    Int(i64),
    F32(f32),
    F64(f64),
}

/// Pick the wire route for a numeric value. Non-numbers return `None`.
pub(crate) fn classify(v: &Value) -> Option<Num> {
    match *v {
        Value::Int(i) => Some(if i.unsigned_abs() <= MAX_INT as u64 {
            Num::Int(i)
        } else {
            classify_f64(i as f64)
        }),
        Value::F32(x) => Some(classify_f64(x as f64)),
        Value::F64(x) => Some(classify_f64(x)),
        _ => None,
    }
}

/// Route for a double: NaN and negative zero have dedicated encodings,
/// in-range integral values ride the integer headers, and everything else is
/// stored as the narrowest IEEE-754 width that loses nothing. Infinities
/// always fit the single-precision form.
fn classify_f64(x: f64) -> Num {
    if x.is_nan() {
        return Num::Nan;
    }
    if x == 0.0 && x.is_sign_negative() {
        return Num::NegZero;
    }
    if x.trunc() == x && x.abs() <= MAX_INT as f64 {
        return Num::Int(x as i64);
    }
    let narrow = x as f32;
    if narrow as f64 == x {
        return Num::F32(narrow);
    }
    Num::F64(x)
}

/// Encode a value graph into a fresh byte sequence. With `omit` set, values
/// that have no wire encoding are silently dropped; the second return is how
/// many table slots that opened up (map entries count both halves).
pub(crate) fn encode(
    value: &Value,
    externals: &[Value],
    external_count: Option<usize>,
    omit: bool,
) -> Result<(Vec<u8>, usize)> {
    let mut enc = Encoder {
        buf: Vec::new(),
        cache: RefCache::new(externals, external_count),
        omit,
        omitted: 0,
    };
    if !value.is_nil() && !enc.write(value)? {
        enc.omitted += 1;
    }
    Ok((enc.buf, enc.omitted))
}

struct Encoder {
    buf: Vec<u8>,
    cache: RefCache,
    omit: bool,
    omitted: usize,
}

impl Encoder {
    /// Write one value. Returns false when the value has no encoding and
    /// omission is enabled; the caller accounts for the gap.
    fn write(&mut self, value: &Value) -> Result<bool> {
        let key = CacheKey::for_value(value);
        if let Some(ref k) = key {
            if let Some(id) = self.cache.lookup(k) {
                self.write_ref(id)?;
                return Ok(true);
            }
        }
        let start = self.buf.len();
        match value {
            Value::Nil | Value::Opaque(_) => {
                return if self.omit {
                    Ok(false)
                } else {
                    Err(Error::UnsupportedType(value.type_name()))
                };
            }
            Value::Table(t) => {
                self.write_table(t)?;
                return Ok(true);
            }
            Value::Bool(b) => {
                let marker = if *b { Marker::True } else { Marker::False };
                self.buf.push(marker.into_u8());
            }
            Value::Str(bytes) => {
                marker::write_header(&mut self.buf, SizedType::Str, bytes.len() as u64)?;
                self.buf.extend_from_slice(bytes);
            }
            Value::Int(_) | Value::F32(_) | Value::F64(_) => {
                if let Some(num) = classify(value) {
                    self.write_number(num)?;
                }
            }
        }
        let used = self.buf.len() - start;
        if let Some(k) = key {
            if used > ref_cost(self.cache.next_id()) {
                self.cache.register(k);
            }
        }
        Ok(true)
    }

    fn write_number(&mut self, num: Num) -> Result<()> {
        match num {
            Num::Nan => self.buf.push(Marker::Nan.into_u8()),
            Num::NegZero => marker::write_header(&mut self.buf, SizedType::NegInt, 0)?,
            Num::Int(i) => {
                if i < 0 {
                    marker::write_header(&mut self.buf, SizedType::NegInt, i.unsigned_abs())?;
                } else if i < INLINE_SPAN as i64 && i as usize >= self.cache.next_id() {
                    // While no entry claims this id, the one-byte inline form
                    // still reads back as the integer itself.
                    self.buf.push(Marker::Inline(i as u8).into_u8());
                } else {
                    marker::write_header(&mut self.buf, SizedType::PosInt, i as u64)?;
                }
            }
            Num::F32(v) => {
                self.buf.push(Marker::F32.into_u8());
                self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            Num::F64(v) => {
                self.buf.push(Marker::F64.into_u8());
                self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }
        }
        Ok(())
    }

    fn write_ref(&mut self, id: usize) -> Result<()> {
        if id < INLINE_SPAN {
            self.buf.push(Marker::Inline(id as u8).into_u8());
            Ok(())
        } else {
            marker::write_header(&mut self.buf, SizedType::Ref, (id - INLINE_SPAN) as u64)
        }
    }

    fn write_table(&mut self, t: &Table) -> Result<()> {
        // Register before descending so cycles resolve to a reference.
        self.cache.register(CacheKey::Table(t.addr()));
        // Shape classification looks at the whole table; omission happens
        // after, closing up any holes it leaves.
        if let Some(values) = t.array_values() {
            let keep: Vec<&Value> = if self.omit {
                values.iter().filter(|v| self.encodable(v)).collect()
            } else {
                values.iter().collect()
            };
            self.omitted += values.len() - keep.len();
            marker::write_header(&mut self.buf, SizedType::Array, keep.len() as u64)?;
            for v in keep {
                self.write(v)?;
            }
        } else {
            let entries = t.entries();
            let keep: Vec<&(Value, Value)> = if self.omit {
                entries
                    .iter()
                    .filter(|(k, v)| self.encodable(k) && self.encodable(v))
                    .collect()
            } else {
                entries.iter().collect()
            };
            // A dropped map entry loses both its key and its value.
            self.omitted += 2 * (entries.len() - keep.len());
            marker::write_header(&mut self.buf, SizedType::Map, keep.len() as u64)?;
            for (k, v) in keep {
                self.write(k)?;
                self.write(v)?;
            }
        }
        Ok(())
    }

    /// Whether a value can reach the wire at all. Opaque values can, but
    /// only by reference to an external.
    fn encodable(&self, v: &Value) -> bool {
        match v {
            Value::Nil => false,
            Value::Opaque(_) => CacheKey::for_value(v)
                .and_then(|k| self.cache.lookup(&k))
                .is_some(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Opaque;

    fn bytes(value: &Value) -> Vec<u8> {
        encode(value, &[], None, false).unwrap().0
    }

    #[test]
    fn nil_encodes_to_nothing() {
        assert!(bytes(&Value::Nil).is_empty());
    }

    #[test]
    fn booleans() {
        assert_eq!(bytes(&Value::Bool(true)), vec![0x1A]);
        assert_eq!(bytes(&Value::Bool(false)), vec![0x1B]);
    }

    #[test]
    fn small_integer_rides_the_inline_range() {
        assert_eq!(bytes(&Value::Int(42)), vec![42 + 29]);
        assert_eq!(bytes(&Value::Int(0)), vec![29]);
        assert_eq!(bytes(&Value::Int(226)), vec![0xFF]);
    }

    #[test]
    fn larger_integers_take_sized_headers() {
        assert_eq!(bytes(&Value::Int(227)), vec![0x10, 227u8]);
        assert_eq!(bytes(&Value::Int(300)), vec![0x11, 0x2C, 0x01]);
        assert_eq!(bytes(&Value::Int(-5)), vec![0x14, 0x05]);
    }

    #[test]
    fn claimed_inline_ids_push_integers_to_headers() {
        // With one external holding id 0, the integer 0 can no longer use
        // the inline form, but 5 still can.
        let externals = vec![Value::from("anchor")];
        let (buf, _) = encode(&Value::Int(0), &externals, None, false).unwrap();
        assert_eq!(buf, vec![0x10, 0x00]);
        let (buf, _) = encode(&Value::Int(5), &externals, None, false).unwrap();
        assert_eq!(buf, vec![5 + 29]);
    }

    #[test]
    fn negative_zero_takes_the_negative_header() {
        assert_eq!(bytes(&Value::F64(-0.0)), vec![0x14, 0x00]);
        // Positive zero is an ordinary integer.
        assert_eq!(bytes(&Value::F64(0.0)), vec![29]);
    }

    #[test]
    fn floats() {
        assert_eq!(bytes(&Value::F64(1.5)), vec![0x18, 0x00, 0x00, 0xC0, 0x3F]);
        let buf = bytes(&Value::F64(0.1));
        assert_eq!(buf[0], 0x19);
        assert_eq!(buf.len(), 9);
        assert_eq!(bytes(&Value::F64(f64::NAN)), vec![0x1C]);
        assert_eq!(
            bytes(&Value::F64(f64::INFINITY)),
            vec![0x18, 0x00, 0x00, 0x80, 0x7F]
        );
    }

    #[test]
    fn out_of_range_integers_fall_back_to_floats() {
        // MAX_INT + 1 is 2^24 * 257, which single precision carries exactly.
        let buf = bytes(&Value::Int(MAX_INT + 1));
        assert_eq!(buf[0], 0x18);
        let buf = bytes(&Value::Int(MAX_INT));
        assert_eq!(buf[0], 0x13);
    }

    #[test]
    fn strings() {
        assert_eq!(bytes(&Value::from("hi")), vec![0x0C, 0x02, b'h', b'i']);
        assert_eq!(bytes(&Value::from("")), vec![0x0C, 0x00]);
    }

    #[test]
    fn array_of_small_integers() {
        let t = Table::new();
        t.push(1);
        t.push(2);
        t.push(3);
        assert_eq!(
            bytes(&Value::Table(t)),
            vec![0x08, 0x03, 0x1E, 0x1F, 0x20]
        );
    }

    #[test]
    fn repeated_string_becomes_a_reference() {
        let t = Table::new();
        t.push("ab");
        t.push("ab");
        // The table takes id 0, the first "ab" id 1; the second occurrence
        // is the one-byte reference 29 + 1.
        assert_eq!(
            bytes(&Value::Table(t)),
            vec![0x08, 0x02, 0x0C, 0x02, b'a', b'b', 0x1E]
        );
    }

    #[test]
    fn map_encoding() {
        let t = Table::new();
        t.insert("k", 300);
        assert_eq!(
            bytes(&Value::Table(t)),
            vec![0x04, 0x01, 0x0C, 0x01, b'k', 0x11, 0x2C, 0x01]
        );
    }

    #[test]
    fn opaque_without_external_is_unsupported() {
        let v = Value::Opaque(Opaque::new(0u8));
        let err = encode(&v, &[], None, false).unwrap_err();
        assert_eq!(err, Error::UnsupportedType("opaque"));
    }

    #[test]
    fn opaque_external_encodes_as_reference() {
        let o = Opaque::new(0u8);
        let externals = vec![Value::Opaque(o.clone())];
        let (buf, omitted) = encode(&Value::Opaque(o), &externals, None, false).unwrap();
        assert_eq!(buf, vec![29]);
        assert_eq!(omitted, 0);
    }

    #[test]
    fn omission_counts_array_and_map_slots() {
        let t = Table::new();
        t.push(1);
        t.push(Opaque::new(0u8));
        t.push(3);
        let (buf, omitted) = encode(&Value::Table(t), &[], None, true).unwrap();
        // Classified as a three-slot array first, then the hole closes up.
        assert_eq!(buf[0..2], [0x08, 0x02]);
        assert_eq!(omitted, 1);

        let t = Table::new();
        t.insert("keep", 1);
        t.insert("drop", Opaque::new(0u8));
        let (buf, omitted) = encode(&Value::Table(t), &[], None, true).unwrap();
        assert_eq!(buf[0..2], [0x04, 0x01]);
        assert_eq!(omitted, 2);
    }

    #[test]
    fn top_level_opaque_omission() {
        let (buf, omitted) = encode(&Value::Opaque(Opaque::new(0u8)), &[], None, true).unwrap();
        assert!(buf.is_empty());
        assert_eq!(omitted, 1);
    }
}
