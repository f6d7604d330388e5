//! Library error types.

use std::fmt;

use serde::{de, ser};

/// A tangle-pack Result, normally returning a tangle-pack [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A tangle-pack error. Encompasses any issue that can happen while encoding a
/// value graph, decoding a byte sequence, converting through the radix-85
/// transport, or running the stream cipher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// An integer exceeded the maximum encodable magnitude, either as a header
    /// value or as a reference id.
    OutOfRange(u64),
    /// The encoder met a value that has no wire encoding and omission wasn't
    /// requested. Carries the name of the offending type.
    UnsupportedType(&'static str),
    /// The radix-85 decoder met a byte that is neither an alphabet symbol nor a
    /// compression symbol with a live dictionary slot.
    InvalidByte {
        /// The offending byte
        byte: u8,
        /// Offset of the byte within the transport string
        offset: usize,
    },
    /// The radix-85 header was malformed: not an alphabet symbol, more than six
    /// dictionary blocks, or a dictionary cut short.
    InvalidHeader(&'static str),
    /// The value decoder failed: malformed tag, truncated stream, or a
    /// reference to an id that was never assigned.
    Corrupt(&'static str),
    /// The value decoder finished before consuming the full byte sequence.
    TrailingData {
        /// Bytes consumed by the decoded value
        used: usize,
        /// Total length of the byte sequence
        len: usize,
    },
    /// A caller-supplied argument was unusable, e.g. an empty cipher key.
    BadArgument(&'static str),
    /// Serde serialization or deserialization failed.
    Serde(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::OutOfRange(v) => {
                write!(f, "Value {} exceeds the maximum encodable magnitude", v)
            }
            Error::UnsupportedType(name) => {
                write!(f, "No encoding exists for values of type {}", name)
            }
            Error::InvalidByte { byte, offset } => write!(
                f,
                "Byte 0x{:02X} at offset {} is not a valid transport symbol",
                byte, offset
            ),
            Error::InvalidHeader(msg) => write!(f, "Bad transport header: {}", msg),
            Error::Corrupt(msg) => write!(f, "Corrupt byte sequence: {}", msg),
            Error::TrailingData { used, len } => write!(
                f,
                "Decoding finished after {} of {} bytes, trailing data remains",
                used, len
            ),
            Error::BadArgument(msg) => write!(f, "Bad argument: {}", msg),
            Error::Serde(ref msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        // The decoder only reads from in-memory slices, so the sole I/O failure
        // mode is running off the end of the input.
        Error::Corrupt("unexpected end of input")
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Serde(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Serde(msg.to_string())
    }
}
