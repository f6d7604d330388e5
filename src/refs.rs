//! The reference table.
//!
//! Both ends of the codec walk the value stream while assigning reference
//! ids: the encoder keeps a value-to-id cache, the decoder keeps an id-to-
//! value list. The two must assign ids at exactly the same points or every
//! later reference is off by one, so the cost rule lives here and is shared.

use std::collections::HashMap;

use crate::encode::{classify, Num};
use crate::marker::{BYTECOUNT_THRESHOLDS, INLINE_SPAN};
use crate::value::Value;

/// Dedup key for the encode-side reference table. Aggregates key by
/// identity, primitives by content. Numbers key by their wire route, so a
/// value that encodes identically to an earlier one shares its reference id
/// no matter which host variant carried it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum CacheKey {
    Bool(bool),
    Int(i64),
    NegZero,
    F32(u32),
    F64(u64),
    Str(Vec<u8>),
    Table(usize),
    Opaque(usize),
}

impl CacheKey {
    /// Derive the dedup key for a value. Nil and NaN have none: nil never
    /// reaches the wire and NaN is unequal even to itself.
    pub fn for_value(v: &Value) -> Option<CacheKey> {
        match v {
            Value::Nil => None,
            Value::Bool(b) => Some(CacheKey::Bool(*b)),
            Value::Str(s) => Some(CacheKey::Str(s.clone())),
            Value::Table(t) => Some(CacheKey::Table(t.addr())),
            Value::Opaque(o) => Some(CacheKey::Opaque(o.addr())),
            _ => match classify(v)? {
                Num::Nan => None,
                Num::NegZero => Some(CacheKey::NegZero),
                Num::Int(i) => Some(CacheKey::Int(i)),
                Num::F32(f) => Some(CacheKey::F32(f.to_bits())),
                Num::F64(f) => Some(CacheKey::F64(f.to_bits())),
            },
        }
    }
}

/// Encode-side reference table: value identity to reference id, plus the
/// cursor for the next id to hand out.
pub(crate) struct RefCache {
    ids: HashMap<CacheKey, usize>,
    next: usize,
}

impl RefCache {
    /// Build a cache seeded with the caller's external values. The externals
    /// occupy ids `0..count`; internal ids start at `count`. A duplicate
    /// external keeps its later id.
    pub fn new(externals: &[Value], count: Option<usize>) -> RefCache {
        let count = count.unwrap_or(externals.len());
        let mut ids = HashMap::new();
        for (i, v) in externals.iter().take(count).enumerate() {
            if let Some(key) = CacheKey::for_value(v) {
                ids.insert(key, i);
            }
        }
        RefCache { ids, next: count }
    }

    /// The id the next registered value will receive.
    pub fn next_id(&self) -> usize {
        self.next
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<usize> {
        self.ids.get(key).copied()
    }

    /// Hand out the next reference id.
    pub fn register(&mut self, key: CacheKey) -> usize {
        let id = self.next;
        self.ids.insert(key, id);
        self.next += 1;
        id
    }
}

/// Bytes a future reference to id `id` would occupy: one byte while the
/// inline range lasts, then a sized header over `id - 227`. Ids beyond the
/// header's reach cost "infinity" and therefore never register.
pub(crate) fn ref_cost(id: usize) -> usize {
    if id < INLINE_SPAN {
        return 1;
    }
    let v = (id - INLINE_SPAN) as u64;
    match BYTECOUNT_THRESHOLDS.iter().position(|&t| v <= t) {
        Some(i) => i + 2,
        None => usize::MAX,
    }
}
