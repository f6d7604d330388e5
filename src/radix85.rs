//! The radix-85 transport.
//!
//! Maps arbitrary byte sequences onto an 85-symbol printable alphabet.
//! Input bytes are packed into little-endian 32-bit blocks, each written as
//! five base-85 digits least-significant first. Six extra symbols outside
//! the alphabet act as one-byte stand-ins for up to six frequently repeated
//! blocks, chosen adaptively per message. The leading symbol folds together
//! the final block's zero padding and the dictionary size.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// The 85 transport symbols, in digit order.
const ALPHABET: &[u8; 85] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ.-:+=^!/*?&<>()[]{}@%$#";

/// The six dictionary stand-in symbols, in slot order. None of them appear
/// in the alphabet.
const COMPRESS: &[u8; 6] = b",;_`|~";

/// Most dictionary slots a message may use.
const MAX_DICT: usize = 6;

const fn build_digits() -> [i8; 256] {
    let mut table = [-1i8; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    table
}

/// Symbol byte -> digit value, or -1.
static DIGITS: [i8; 256] = build_digits();

fn digit(symbol: u8) -> Option<u32> {
    match DIGITS[symbol as usize] {
        -1 => None,
        d => Some(d as u32),
    }
}

fn compress_slot(symbol: u8) -> Option<usize> {
    COMPRESS.iter().position(|&c| c == symbol)
}

/// Pack bytes into little-endian 32-bit blocks. The final partial block is
/// zero-padded; the returned count is how many padding bytes were added.
fn to_blocks(bytes: &[u8]) -> (Vec<u32>, usize) {
    let discard = (4 - bytes.len() % 4) % 4;
    let blocks = bytes
        .chunks(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(word)
        })
        .collect();
    (blocks, discard)
}

/// Pick up to six blocks worth a dictionary slot. A block becomes a
/// candidate once its occurrence count clears the running threshold; when a
/// seventh candidate appears, the least frequent one is dropped and the
/// threshold rises to the lowest surviving count. Slot order is insertion
/// order, which the header makes self-describing.
fn build_dict(blocks: &[u32]) -> Vec<u32> {
    let mut counts: HashMap<u32, u32> = HashMap::new();
    let mut dict: Vec<u32> = Vec::new();
    let mut threshold = 1u32;
    for &block in blocks {
        let count = counts.entry(block).or_insert(0);
        *count += 1;
        if *count > threshold && !dict.contains(&block) {
            dict.push(block);
            if dict.len() > MAX_DICT {
                let weight = |b: u32| counts.get(&b).copied().unwrap_or(0);
                if let Some(drop) = (0..dict.len()).min_by_key(|&i| weight(dict[i])) {
                    dict.remove(drop);
                }
                threshold = dict.iter().map(|&b| weight(b)).min().unwrap_or(threshold);
            }
        }
    }
    dict
}

fn push_block(out: &mut String, block: u32) {
    let mut v = block;
    for _ in 0..5 {
        out.push(ALPHABET[(v % 85) as usize] as char);
        v /= 85;
    }
}

/// Encode bytes as a transport string. The empty sequence stays empty.
pub fn encode(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    let (blocks, discard) = to_blocks(bytes);
    let dict = build_dict(&blocks);
    let mut out = String::with_capacity(1 + 5 * (dict.len() + blocks.len()));
    out.push(ALPHABET[84 - (discard + 4 * dict.len())] as char);
    for &block in &dict {
        push_block(&mut out, block);
    }
    for &block in &blocks {
        match dict.iter().position(|&d| d == block) {
            Some(slot) => out.push(COMPRESS[slot] as char),
            None => push_block(&mut out, block),
        }
    }
    // The decoder treats missing digits of the final block as zeros, so up
    // to four trailing zero digits can go. Dictionary stand-ins are never
    // the zero symbol, so they stop the trim on their own.
    let mut trimmed = 0;
    while trimmed < 4 && out.ends_with('0') {
        out.pop();
        trimmed += 1;
    }
    out
}

/// Decode a transport string back into bytes.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let header = 84
        - digit(bytes[0]).ok_or(Error::InvalidHeader("leading symbol is not a digit"))? as usize;
    let discard = header % 4;
    let dict_len = header / 4;
    if dict_len > MAX_DICT {
        return Err(Error::InvalidHeader("more than six dictionary blocks"));
    }
    let mut pos = 1;
    let mut dict = Vec::with_capacity(dict_len);
    for _ in 0..dict_len {
        if pos + 5 > bytes.len() {
            return Err(Error::InvalidHeader("dictionary cut short"));
        }
        let mut block = 0u64;
        for (i, &symbol) in bytes[pos..pos + 5].iter().enumerate() {
            let d = digit(symbol).ok_or(Error::InvalidByte {
                byte: symbol,
                offset: pos + i,
            })?;
            block += d as u64 * 85u64.pow(i as u32);
        }
        dict.push(block as u32);
        pos += 5;
    }
    let mut out = Vec::new();
    while pos < bytes.len() {
        let symbol = bytes[pos];
        let block = if let Some(slot) = compress_slot(symbol) {
            pos += 1;
            *dict.get(slot).ok_or(Error::InvalidByte {
                byte: symbol,
                offset: pos - 1,
            })?
        } else {
            // Up to five digits; a trimmed final block reads short and the
            // missing digits count as zero.
            let mut block = 0u64;
            let mut scale = 1u64;
            for _ in 0..5 {
                if pos >= bytes.len() {
                    break;
                }
                let symbol = bytes[pos];
                if compress_slot(symbol).is_some() {
                    break;
                }
                let d = digit(symbol).ok_or(Error::InvalidByte {
                    byte: symbol,
                    offset: pos,
                })?;
                block += d as u64 * scale;
                scale *= 85;
                pos += 1;
            }
            block as u32
        };
        out.extend_from_slice(&block.to_le_bytes());
    }
    out.truncate(out.len().saturating_sub(discard));
    Ok(out)
}
