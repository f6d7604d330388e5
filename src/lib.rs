//! A self-describing binary codec for dynamically-typed value graphs.
//!
//! tangle-pack turns a graph of [`Value`]s - nil, booleans, numbers, byte
//! strings, and tables that may be shared or cyclic - into a compact byte
//! sequence, re-encodes that sequence as printable ASCII through a radix-85
//! transport with a small adaptive compression dictionary, and can scramble
//! the bytes in between with a keyed stream cipher. Repeated values are
//! deduplicated through a reference table that both ends reconstruct
//! independently, which is also what lets a table contain itself.
//!
//! The cipher is an obfuscator, not cryptography: it hides structure from
//! casual inspection and nothing more.
//!
//! ```
//! use tangle_pack::{Table, Value};
//!
//! let t = Table::new();
//! t.insert("name", "compass");
//! t.insert("heading", 7);
//! t.insert("loop", t.clone()); // cycles are fine
//!
//! let text = tangle_pack::encode(&Value::Table(t))?;
//! let back = tangle_pack::decode(&text)?;
//! assert_eq!(back.as_table().unwrap().get("heading"), Some(Value::Int(7)));
//! let closed = back.as_table().unwrap().get("loop").unwrap();
//! assert!(closed.as_table().unwrap().ptr_eq(back.as_table().unwrap()));
//! # Ok::<(), tangle_pack::Error>(())
//! ```
//!
//! Rust data that is tree-shaped can skip hand-building tables and go
//! through serde instead, via [`to_value`] and [`from_value`].

mod codec;
mod de;
mod decode;
mod encode;
mod error;
mod marker;
mod refs;
mod ser;
mod table;
mod value;

pub mod cipher;
pub mod radix85;

pub use self::codec::{decode, encode, Codec};
pub use self::de::from_value;
pub use self::error::{Error, Result};
pub use self::ser::to_value;
pub use self::table::Table;
pub use self::value::{Opaque, Value, MAX_INT};
