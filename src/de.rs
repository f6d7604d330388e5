//! Deserialization: from [`Value`] trees to Rust data.
//!
//! The inverse of the mapping in [`crate::ser`]: arrays drive sequence
//! visitors, maps drive map visitors, and enums arrive either as a bare
//! variant-name string or as a single-pair map from variant name to content.

use serde::de::{self, DeserializeOwned, DeserializeSeed, Visitor};
use serde::forward_to_deserialize_any;

use crate::error::{Error, Result};
use crate::table::Table;
use crate::value::Value;

/// Recursion bound. A cyclic table handed to [`from_value`] bottoms out here
/// instead of on the stack.
const MAX_DEPTH: usize = 128;

/// Rebuild any deserializable type from a [`Value`] tree.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(ValueDeserializer { value, depth: 0 })
}

impl<'de> de::Deserialize<'de> for Value {
    fn deserialize<D: de::Deserializer<'de>>(d: D) -> std::result::Result<Value, D::Error> {
        d.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("any codec value")
    }

    fn visit_bool<E>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::F64(v as f64),
        })
    }

    fn visit_f32<E>(self, v: f32) -> std::result::Result<Value, E> {
        Ok(Value::F32(v))
    }

    fn visit_f64<E>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::F64(v))
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_string<E>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_unit<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_none<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_some<D: de::Deserializer<'de>>(
        self,
        d: D,
    ) -> std::result::Result<Value, D::Error> {
        de::Deserialize::deserialize(d)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(
        self,
        mut seq: A,
    ) -> std::result::Result<Value, A::Error> {
        let t = Table::new();
        while let Some(item) = seq.next_element::<Value>()? {
            t.push(item);
        }
        Ok(Value::Table(t))
    }

    fn visit_map<A: de::MapAccess<'de>>(
        self,
        mut map: A,
    ) -> std::result::Result<Value, A::Error> {
        let t = Table::new();
        while let Some((k, v)) = map.next_entry::<Value, Value>()? {
            t.insert(k, v);
        }
        Ok(Value::Table(t))
    }
}

struct ValueDeserializer {
    value: Value,
    depth: usize,
}

impl ValueDeserializer {
    fn descend(&self) -> Result<usize> {
        if self.depth >= MAX_DEPTH {
            Err(de::Error::custom("nesting depth limit exceeded"))
        } else {
            Ok(self.depth + 1)
        }
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Nil => visitor.visit_unit(),
            Value::Bool(v) => visitor.visit_bool(v),
            Value::Int(v) => visitor.visit_i64(v),
            Value::F32(v) => visitor.visit_f32(v),
            Value::F64(v) => visitor.visit_f64(v),
            Value::Str(bytes) => match String::from_utf8(bytes) {
                Ok(text) => visitor.visit_string(text),
                Err(raw) => visitor.visit_byte_buf(raw.into_bytes()),
            },
            Value::Table(ref t) => {
                let depth = self.descend()?;
                match t.array_values() {
                    Some(values) => visitor.visit_seq(SeqDeserializer {
                        iter: values.into_iter(),
                        depth,
                    }),
                    None => visitor.visit_map(MapDeserializer {
                        iter: t.entries().into_iter(),
                        pending: None,
                        depth,
                    }),
                }
            }
            Value::Opaque(_) => Err(de::Error::custom("opaque value has no tree form")),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.value.is_nil() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::Str(bytes) => visitor.visit_byte_buf(bytes),
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let depth = self.descend()?;
        match self.value {
            Value::Str(ref bytes) => match std::str::from_utf8(bytes) {
                Ok(variant) => visitor.visit_enum(EnumDeserializer {
                    variant: variant.to_string(),
                    value: None,
                    depth,
                }),
                Err(_) => Err(de::Error::custom("variant name is not UTF-8")),
            },
            Value::Table(ref t) => {
                let entries = t.entries();
                match entries.as_slice() {
                    [(key, content)] => match key.as_str() {
                        Some(variant) => visitor.visit_enum(EnumDeserializer {
                            variant: variant.to_string(),
                            value: Some(content.clone()),
                            depth,
                        }),
                        None => Err(de::Error::custom("variant key is not a string")),
                    },
                    _ => Err(de::Error::custom("expected a single-pair variant map")),
                }
            }
            _ => Err(de::Error::invalid_type(
                unexpected(&self.value),
                &"a variant string or single-pair map",
            )),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str
        string unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

fn unexpected(value: &Value) -> de::Unexpected {
    match value {
        Value::Nil => de::Unexpected::Unit,
        Value::Bool(v) => de::Unexpected::Bool(*v),
        Value::Int(v) => de::Unexpected::Signed(*v),
        Value::F32(v) => de::Unexpected::Float(*v as f64),
        Value::F64(v) => de::Unexpected::Float(*v),
        Value::Str(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => de::Unexpected::Str(s),
            Err(_) => de::Unexpected::Bytes(bytes),
        },
        Value::Table(_) => de::Unexpected::Map,
        Value::Opaque(_) => de::Unexpected::Other("opaque value"),
    }
}

struct SeqDeserializer {
    iter: std::vec::IntoIter<Value>,
    depth: usize,
}

impl<'de> de::SeqAccess<'de> for SeqDeserializer {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        match self.iter.next() {
            Some(value) => seed
                .deserialize(ValueDeserializer {
                    value,
                    depth: self.depth,
                })
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: std::vec::IntoIter<(Value, Value)>,
    pending: Option<Value>,
    depth: usize,
}

impl<'de> de::MapAccess<'de> for MapDeserializer {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.iter.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(ValueDeserializer {
                    value: key,
                    depth: self.depth,
                })
                .map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| <crate::error::Error as de::Error>::custom("map value requested before its key"))?;
        seed.deserialize(ValueDeserializer {
            value,
            depth: self.depth,
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer {
    variant: String,
    value: Option<Value>,
    depth: usize,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer {
    type Error = Error;
    type Variant = VariantDeserializer;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, VariantDeserializer)> {
        let variant = seed.deserialize(ValueDeserializer {
            value: Value::from(self.variant),
            depth: self.depth,
        })?;
        Ok((
            variant,
            VariantDeserializer {
                value: self.value,
                depth: self.depth,
            },
        ))
    }
}

struct VariantDeserializer {
    value: Option<Value>,
    depth: usize,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            None => Ok(()),
            Some(value) => Err(de::Error::invalid_type(unexpected(&value), &"unit variant")),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        match self.value {
            Some(value) => seed.deserialize(ValueDeserializer {
                value,
                depth: self.depth,
            }),
            None => Err(de::Error::custom("newtype variant carries no content")),
        }
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        match self.value {
            Some(Value::Table(ref t)) => match t.array_values() {
                Some(values) => visitor.visit_seq(SeqDeserializer {
                    iter: values.into_iter(),
                    depth: self.depth,
                }),
                None => Err(de::Error::custom("tuple variant content is not an array")),
            },
            Some(value) => Err(de::Error::invalid_type(unexpected(&value), &"tuple variant")),
            None => Err(de::Error::custom("tuple variant carries no content")),
        }
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Some(Value::Table(ref t)) => visitor.visit_map(MapDeserializer {
                iter: t.entries().into_iter(),
                pending: None,
                depth: self.depth,
            }),
            Some(value) => Err(de::Error::invalid_type(
                unexpected(&value),
                &"struct variant",
            )),
            None => Err(de::Error::custom("struct variant carries no content")),
        }
    }
}
