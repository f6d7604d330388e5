//! The assembled pipeline: value codec, optional cipher, radix-85 transport.

use crate::cipher;
use crate::error::Result;
use crate::radix85;
use crate::value::Value;

/// A configured encode/decode pipeline.
///
/// A `Codec` owns the per-call options: the external value list, an optional
/// explicit external count, and an optional cipher key. The same options
/// must be used on both ends. Every call owns its transient state, so one
/// `Codec` may be reused freely.
///
/// ```
/// use tangle_pack::{Codec, Table, Value};
///
/// let codec = Codec::new().crypt_key("sekrit");
/// let t = Table::new();
/// t.insert("level", 9);
/// let text = codec.encode(&Value::Table(t))?;
/// let back = codec.decode(&text)?;
/// assert_eq!(back.as_table().unwrap().get("level"), Some(Value::Int(9)));
/// # Ok::<(), tangle_pack::Error>(())
/// ```
#[derive(Clone, Default)]
pub struct Codec {
    externals: Vec<Value>,
    external_count: Option<usize>,
    crypt_key: Option<Vec<u8>>,
}

impl Codec {
    pub fn new() -> Codec {
        Codec::default()
    }

    /// Values carried by identity rather than encoded. Index order matters:
    /// both ends must supply the same values in the same order.
    pub fn externals(mut self, externals: Vec<Value>) -> Codec {
        self.externals = externals;
        self
    }

    /// Reserve `count` external ids regardless of the list length. Unlisted
    /// trailing ids decode as nil placeholders.
    pub fn external_count(mut self, count: usize) -> Codec {
        self.external_count = Some(count);
        self
    }

    /// Scramble the byte stage with this key before transport encoding.
    pub fn crypt_key(mut self, key: impl Into<Vec<u8>>) -> Codec {
        self.crypt_key = Some(key.into());
        self
    }

    /// Encode a value graph into a transport string.
    pub fn encode(&self, value: &Value) -> Result<String> {
        let bytes = self.to_bytes(value)?;
        self.finish(bytes)
    }

    /// Like [`Codec::encode`], but values with no wire form are dropped
    /// instead of failing. Also returns how many table slots were dropped;
    /// a dropped map entry counts both its key and its value.
    pub fn encode_lossy(&self, value: &Value) -> Result<(String, usize)> {
        let (bytes, omitted) = self.to_bytes_lossy(value)?;
        Ok((self.finish(bytes)?, omitted))
    }

    /// Decode a transport string back into a value graph.
    pub fn decode(&self, text: &str) -> Result<Value> {
        let bytes = radix85::decode(text)?;
        let bytes = match &self.crypt_key {
            Some(key) => cipher::decrypt(bytes, key)?,
            None => bytes,
        };
        self.from_bytes(&bytes)
    }

    /// Run only the value codec stage: value graph to bytes.
    pub fn to_bytes(&self, value: &Value) -> Result<Vec<u8>> {
        let (bytes, _) =
            crate::encode::encode(value, &self.externals, self.external_count, false)?;
        Ok(bytes)
    }

    /// Lossy form of [`Codec::to_bytes`], with the omitted-slot count.
    pub fn to_bytes_lossy(&self, value: &Value) -> Result<(Vec<u8>, usize)> {
        crate::encode::encode(value, &self.externals, self.external_count, true)
    }

    /// Run only the value codec stage: bytes to value graph.
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Value> {
        crate::decode::decode(bytes, &self.externals, self.external_count)
    }

    fn finish(&self, bytes: Vec<u8>) -> Result<String> {
        let bytes = match &self.crypt_key {
            Some(key) => cipher::encrypt(bytes, key)?,
            None => bytes,
        };
        Ok(radix85::encode(&bytes))
    }
}

/// Encode a value graph with default options.
pub fn encode(value: &Value) -> Result<String> {
    Codec::new().encode(value)
}

/// Decode a transport string with default options.
pub fn decode(text: &str) -> Result<Value> {
    Codec::new().decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use crate::value::Opaque;

    #[test]
    fn nil_is_the_empty_string() {
        assert_eq!(encode(&Value::Nil).unwrap(), "");
        assert_eq!(decode("").unwrap(), Value::Nil);
    }

    #[test]
    fn booleans_are_two_characters() {
        let text = encode(&Value::Bool(true)).unwrap();
        assert_eq!(text.len(), 2);
        assert_eq!(decode(&text).unwrap(), Value::Bool(true));
        let text = encode(&Value::Bool(false)).unwrap();
        assert_eq!(decode(&text).unwrap(), Value::Bool(false));
    }

    #[test]
    fn the_answer() {
        // 42 is a single inline byte 0x47, which transports as "@?".
        let text = encode(&Value::Int(42)).unwrap();
        assert_eq!(text, "@?");
        assert_eq!(decode(&text).unwrap(), Value::Int(42));
    }

    #[test]
    fn small_array_end_to_end() {
        let t = Table::new();
        t.push(1);
        t.push(2);
        t.push(3);
        let v = Value::Table(t);
        let text = encode(&v).unwrap();
        assert_eq!(decode(&text).unwrap(), v);
    }

    #[test]
    fn cycle_survives_the_whole_pipeline() {
        let t = Table::new();
        t.insert("self", t.clone());
        let text = encode(&Value::Table(t)).unwrap();
        let out = decode(&text).unwrap();
        let out_t = out.as_table().unwrap();
        assert!(out_t.get("self").unwrap().as_table().unwrap().ptr_eq(out_t));
    }

    #[test]
    fn ciphered_pipeline_round_trips() {
        let codec = Codec::new().crypt_key("key of any length");
        let t = Table::new();
        t.insert("secret", "contents");
        t.push(3.25);
        let v = Value::Table(t);
        let text = codec.encode(&v).unwrap();
        assert!(text.is_ascii());
        assert_eq!(codec.decode(&text).unwrap(), v);
        // The plain codec reads something else entirely, or nothing.
        assert_ne!(decode(&text).ok(), Some(v));
    }

    #[test]
    fn ciphered_nil_still_round_trips() {
        let codec = Codec::new().crypt_key("abc");
        let text = codec.encode(&Value::Nil).unwrap();
        assert_eq!(codec.decode(&text).unwrap(), Value::Nil);
    }

    #[test]
    fn lossy_pipeline_reports_drops() {
        let t = Table::new();
        t.insert("keep", 1);
        t.insert("handle", Opaque::new(0u8));
        let (text, omitted) = Codec::new().encode_lossy(&Value::Table(t)).unwrap();
        assert_eq!(omitted, 2);
        let out = decode(&text).unwrap();
        let out_t = out.as_table().unwrap();
        assert_eq!(out_t.len(), 1);
        assert_eq!(out_t.get("keep"), Some(Value::Int(1)));
    }

    #[test]
    fn externals_cross_the_pipeline_by_identity() {
        let marker = Opaque::new("host handle");
        let externals = vec![Value::Opaque(marker.clone()), Value::from("shared")];
        let codec = Codec::new().externals(externals.clone());
        let t = Table::new();
        t.insert("handle", marker.clone());
        t.insert("label", "shared");
        let text = codec.encode(&Value::Table(t)).unwrap();
        let out = codec.decode(&text).unwrap();
        let out_t = out.as_table().unwrap();
        assert!(out_t
            .get("handle")
            .unwrap()
            .as_opaque()
            .unwrap()
            .ptr_eq(&marker));
        assert_eq!(out_t.get("label"), Some(Value::from("shared")));
    }

    #[test]
    fn external_count_reserves_placeholder_ids() {
        let codec = Codec::new()
            .externals(vec![Value::from("only")])
            .external_count(3);
        let t = Table::new();
        t.insert("a", "only");
        let text = codec.encode(&Value::Table(t)).unwrap();
        let out = codec.decode(&text).unwrap();
        assert_eq!(out.as_table().unwrap().get("a"), Some(Value::from("only")));
    }

    #[test]
    fn reference_economy_shrinks_repetitive_graphs() {
        let a = Table::new();
        for i in 0..8 {
            a.insert(format!("key{}", i), "the same long string value");
        }
        let repeated = Codec::new().to_bytes(&Value::Table(a)).unwrap();
        // One full copy of the string plus one-byte references afterwards.
        let needle: &[u8] = b"same";
        let copies = repeated.windows(4).filter(|w| *w == needle).count();
        assert_eq!(copies, 1);
    }
}
