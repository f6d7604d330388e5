//! Serialization: from Rust data to [`Value`] trees.
//!
//! Enum variants, when mapped, are:
//! - Unit - just the variant name as a string
//! - Newtype - map with one pair. Key is the variant name, content is the value
//! - Tuple - map with one pair. Key is the variant name, content is the tuple as an array
//! - Struct - map with one pair. Key is the variant name, content is the struct
//!
//! `Value` itself serializes through any serde serializer, but only as a
//! tree: cyclic tables and opaque values are rejected, since serde's data
//! model has no way to express them.

use std::cell::RefCell;

use serde::ser::{self, Serialize, SerializeMap, SerializeSeq};

use crate::error::{Error, Result};
use crate::table::Table;
use crate::value::Value;

/// Build a [`Value`] tree from any serializable type.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    value.serialize(ValueSerializer)
}

struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;
    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = TupleVariantSerializer;
    type SerializeMap = MapSerializer;
    type SerializeStruct = StructSerializer;
    type SerializeStructVariant = StructVariantSerializer;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| ser::Error::custom("integer is too large for the value model"))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::F32(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::F64(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::from(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Nil)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<Value> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Nil)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::Nil)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::from(variant))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<Value> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        let wrap = Table::new();
        wrap.insert(variant, to_value(value)?);
        Ok(Value::Table(wrap))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqSerializer> {
        Ok(SeqSerializer {
            table: Table::new(),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqSerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqSerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<TupleVariantSerializer> {
        Ok(TupleVariantSerializer {
            variant,
            items: Table::new(),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapSerializer> {
        Ok(MapSerializer {
            table: Table::new(),
            pending: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<StructSerializer> {
        Ok(StructSerializer {
            table: Table::new(),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<StructVariantSerializer> {
        Ok(StructVariantSerializer {
            variant,
            fields: Table::new(),
        })
    }
}

struct SeqSerializer {
    table: Table,
}

impl ser::SerializeSeq for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.table.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Table(self.table))
    }
}

impl ser::SerializeTuple for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

struct TupleVariantSerializer {
    variant: &'static str,
    items: Table,
}

impl ser::SerializeTupleVariant for TupleVariantSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        let wrap = Table::new();
        wrap.insert(self.variant, self.items);
        Ok(Value::Table(wrap))
    }
}

struct MapSerializer {
    table: Table,
    pending: Option<Value>,
}

impl ser::SerializeMap for MapSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        self.pending = Some(to_value(key)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let key = self
            .pending
            .take()
            .ok_or_else(|| <crate::error::Error as ser::Error>::custom("map value arrived before its key"))?;
        self.table.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Table(self.table))
    }
}

struct StructSerializer {
    table: Table,
}

impl ser::SerializeStruct for StructSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.table.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Table(self.table))
    }
}

struct StructVariantSerializer {
    variant: &'static str,
    fields: Table,
}

impl ser::SerializeStructVariant for StructVariantSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.fields.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        let wrap = Table::new();
        wrap.insert(self.variant, self.fields);
        Ok(Value::Table(wrap))
    }
}

impl Serialize for Value {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let seen = RefCell::new(Vec::new());
        ser_value(self, serializer, &seen)
    }
}

/// A value plus the table addresses on the path down to it.
struct SerValue<'a> {
    value: &'a Value,
    seen: &'a RefCell<Vec<usize>>,
}

impl Serialize for SerValue<'_> {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ser_value(self.value, serializer, self.seen)
    }
}

fn ser_value<S: ser::Serializer>(
    value: &Value,
    serializer: S,
    seen: &RefCell<Vec<usize>>,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Value::Nil => serializer.serialize_unit(),
        Value::Bool(v) => serializer.serialize_bool(*v),
        Value::Int(v) => serializer.serialize_i64(*v),
        Value::F32(v) => serializer.serialize_f32(*v),
        Value::F64(v) => serializer.serialize_f64(*v),
        Value::Str(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.serialize_bytes(bytes),
        },
        Value::Opaque(_) => Err(ser::Error::custom("opaque value has no tree form")),
        Value::Table(t) => {
            {
                let mut seen = seen.borrow_mut();
                if seen.contains(&t.addr()) {
                    return Err(ser::Error::custom("cyclic table has no tree form"));
                }
                seen.push(t.addr());
            }
            let result = match t.array_values() {
                Some(values) => {
                    let mut seq = serializer.serialize_seq(Some(values.len()))?;
                    for item in &values {
                        seq.serialize_element(&SerValue { value: item, seen })?;
                    }
                    seq.end()
                }
                None => {
                    let entries = t.entries();
                    let mut map = serializer.serialize_map(Some(entries.len()))?;
                    for (k, v) in &entries {
                        map.serialize_entry(
                            &SerValue { value: k, seen },
                            &SerValue { value: v, seen },
                        )?;
                    }
                    map.end()
                }
            };
            seen.borrow_mut().pop();
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Job {
        name: String,
        retries: u32,
        backoff: Option<f64>,
        tags: Vec<i32>,
    }

    #[test]
    fn structs_become_maps() {
        let v = to_value(&Job {
            name: "sync".into(),
            retries: 3,
            backoff: Some(1.5),
            tags: vec![4, 5],
        })
        .unwrap();
        let t = v.as_table().unwrap();
        assert_eq!(t.get("name"), Some(Value::from("sync")));
        assert_eq!(t.get("retries"), Some(Value::Int(3)));
        assert_eq!(t.get("backoff"), Some(Value::F64(1.5)));
        let tags = t.get("tags").unwrap();
        assert_eq!(tags.as_table().map(|t| t.len()), Some(2));
    }

    #[test]
    fn absent_options_leave_no_entry() {
        let v = to_value(&Job {
            name: "sync".into(),
            retries: 0,
            backoff: None,
            tags: vec![],
        })
        .unwrap();
        let t = v.as_table().unwrap();
        assert_eq!(t.get("backoff"), None);
        assert_eq!(t.len(), 3);
    }

    #[derive(Serialize)]
    enum Shape {
        Point,
        Circle(f64),
        Segment(f64, f64),
        Rect { w: f64, h: f64 },
    }

    #[test]
    fn enum_variant_mapping() {
        assert_eq!(to_value(&Shape::Point).unwrap(), Value::from("Point"));

        let circle = to_value(&Shape::Circle(2.0)).unwrap();
        let t = circle.as_table().unwrap();
        assert_eq!(t.get("Circle"), Some(Value::F64(2.0)));

        let seg = to_value(&Shape::Segment(1.0, 2.0)).unwrap();
        let inner = seg.as_table().unwrap().get("Segment").unwrap();
        assert_eq!(inner.as_table().map(|t| t.len()), Some(2));

        let rect = to_value(&Shape::Rect { w: 3.0, h: 4.0 }).unwrap();
        let inner = rect.as_table().unwrap().get("Rect").unwrap();
        assert_eq!(inner.as_table().unwrap().get("w"), Some(Value::F64(3.0)));
    }

    #[test]
    fn value_reserializes_as_a_tree() {
        let t = Table::new();
        t.push(1);
        t.push("two");
        let copy = to_value(&Value::Table(t.clone())).unwrap();
        assert_eq!(copy, Value::Table(t.clone()));
        // A fresh tree, not a shared handle.
        assert!(!copy.as_table().unwrap().ptr_eq(&t));
    }

    #[test]
    fn cyclic_value_cannot_serialize() {
        let t = Table::new();
        t.insert("me", t.clone());
        let err = to_value(&Value::Table(t)).unwrap_err();
        assert_eq!(err, Error::Serde("cyclic table has no tree form".into()));
    }

    #[test]
    fn opaque_cannot_serialize() {
        let v = Value::Opaque(crate::value::Opaque::new(1u8));
        assert!(to_value(&v).is_err());
    }

    #[test]
    fn huge_u64_is_rejected() {
        assert!(to_value(&u64::MAX).is_err());
        assert_eq!(to_value(&(i64::MAX as u64)).unwrap(), Value::Int(i64::MAX));
    }
}
