use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::value::{self, Value};

/// A shared, mutable, insertion-ordered collection of key/value pairs.
///
/// `Table` is the aggregate type of the value model. Cloning a table clones a
/// handle to the same underlying storage, so one table may appear at several
/// positions in a value graph and may contain itself. The codec preserves
/// that sharing: two positions holding the same table before encoding hold
/// the same table after decoding.
///
/// Key handling follows the host model:
/// - keys are unique; inserting under an existing key replaces its value
/// - primitive keys compare by content, table and opaque keys by identity
/// - float keys with an exact integer value are folded to integer keys, so
///   `get(2.0)` and `get(2)` address the same slot
/// - inserting [`Value::Nil`] removes the key; nil and NaN keys are ignored
///
/// A table whose keys are exactly the integers `1..=n` is *array-shaped* and
/// takes the shorter array encoding on the wire.
#[derive(Clone, Default)]
pub struct Table {
    inner: Rc<RefCell<Vec<(Value, Value)>>>,
}

impl Table {
    /// Create a new, empty table.
    pub fn new() -> Table {
        Table::default()
    }

    /// Returns `true` if both handles refer to the same underlying table.
    pub fn ptr_eq(&self, other: &Table) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stable address of the underlying storage, used for identity tracking.
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Look up the value stored under `key`, if any.
    pub fn get(&self, key: impl Into<Value>) -> Option<Value> {
        let key = normalize_key(key.into())?;
        self.inner
            .borrow()
            .iter()
            .find(|(k, _)| key_eq(k, &key))
            .map(|(_, v)| v.clone())
    }

    /// Store `value` under `key`, replacing any existing entry. Inserting
    /// [`Value::Nil`] removes the key instead. Nil and NaN keys are ignored.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) {
        let key = match normalize_key(key.into()) {
            Some(key) => key,
            None => return,
        };
        let value = value.into();
        let mut entries = self.inner.borrow_mut();
        let slot = entries.iter().position(|(k, _)| key_eq(k, &key));
        match (slot, value.is_nil()) {
            (Some(i), true) => {
                entries.remove(i);
            }
            (Some(i), false) => entries[i].1 = value,
            (None, true) => {}
            (None, false) => entries.push((key, value)),
        }
    }

    /// Append `value` under the next free 1-based integer key.
    pub fn push(&self, value: impl Into<Value>) {
        let next = self
            .inner
            .borrow()
            .iter()
            .filter_map(|(k, _)| match k {
                Value::Int(i) if *i > 0 => Some(*i),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1;
        self.insert(Value::Int(next), value);
    }

    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.inner.borrow().clone()
    }

    /// Append an entry without the existing-key scan. The caller guarantees
    /// the key is normalized and not already present.
    pub(crate) fn append(&self, key: Value, value: Value) {
        self.inner.borrow_mut().push((key, value));
    }

    /// If the table is array-shaped (keys exactly `1..=n`), return its values
    /// in ascending key order.
    pub(crate) fn array_values(&self) -> Option<Vec<Value>> {
        let entries = self.inner.borrow();
        let n = entries.len();
        let mut slots: Vec<Option<Value>> = vec![None; n];
        for (k, v) in entries.iter() {
            let i = match k {
                Value::Int(i) if *i >= 1 && *i <= n as i64 => (*i - 1) as usize,
                _ => return None,
            };
            if slots[i].is_some() {
                return None;
            }
            slots[i] = Some(v.clone());
        }
        slots.into_iter().collect()
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        value::fmt_table(self, f, &mut Vec::new())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Table) -> bool {
        value::table_eq(self, other, &mut Vec::new())
    }
}

/// Fold a key into its stored form. Returns `None` for keys that cannot
/// address a slot (nil and NaN).
fn normalize_key(key: Value) -> Option<Value> {
    match key {
        Value::Nil => None,
        Value::F32(v) if v.is_nan() => None,
        Value::F64(v) if v.is_nan() => None,
        _ => match key.exact_int() {
            Some(i) => Some(Value::Int(i)),
            None => Some(key),
        },
    }
}

/// Key equality: content for primitives, identity for tables and opaques.
/// Both sides are assumed normalized.
pub(crate) fn key_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Table(x), Value::Table(y)) => x.ptr_eq(y),
        (Value::Opaque(x), Value::Opaque(y)) => x.ptr_eq(y),
        (Value::F32(_), _) | (Value::F64(_), _) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => false,
    }
}
