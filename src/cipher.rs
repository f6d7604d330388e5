//! The stream cipher.
//!
//! A reversible obfuscator keyed by an arbitrary non-empty byte string. This
//! is scrambling, not cryptography: the keystream is a 32-bit linear
//! congruential generator seeded from the plaintext length and the key, and
//! each plaintext byte is smeared across `key_len` output positions, so the
//! ciphertext runs `key_len - 1` bytes longer than the plaintext.

use crate::error::{Error, Result};
use crate::radix85;

const LCG_MUL: u32 = 1_103_515_245;
const LCG_ADD: u32 = 12345;
const SEED_MUL: u32 = 57163;

/// The keyed keystream generator.
struct KeyStream {
    state: u32,
}

impl KeyStream {
    /// Seed from the plaintext length, then fold in each key byte: the state
    /// is wrapped to 22 bits, run through the LCG step, and nudged by a
    /// scaled slice of its own high half.
    fn new(data_len: usize, key: &[u8]) -> KeyStream {
        let mut s = (data_len as u32).wrapping_mul(SEED_MUL);
        for (i, &b) in key.iter().enumerate() {
            let i = i as u32 + 1;
            s = (s.wrapping_add((b as u32).wrapping_mul(i)) & 0x3F_FFFF)
                .wrapping_mul(LCG_MUL)
                .wrapping_add(LCG_ADD);
            s = s.wrapping_add((i + 101).wrapping_mul(s >> 16) >> 16);
        }
        KeyStream { state: s }
    }

    fn next_byte(&mut self) -> u8 {
        self.state = self.state.wrapping_mul(LCG_MUL).wrapping_add(LCG_ADD);
        (self.state >> 16) as u8
    }
}

/// Encrypt a byte buffer. Consumes the plaintext and returns the ciphertext,
/// which is `key.len() - 1` bytes longer.
pub fn encrypt(data: Vec<u8>, key: &[u8]) -> Result<Vec<u8>> {
    if key.is_empty() {
        return Err(Error::BadArgument("cipher key must not be empty"));
    }
    let mut stream = KeyStream::new(data.len(), key);
    let mut out = vec![0u8; data.len() + key.len() - 1];
    for (i, &d) in data.iter().enumerate() {
        for (j, &k) in key.iter().enumerate() {
            let r = stream.next_byte();
            out[i + j] = out[i + j].wrapping_add(d).wrapping_add(k).wrapping_add(r);
        }
    }
    Ok(out)
}

/// Decrypt a byte buffer in place and return it, truncated to the plaintext
/// length. Peels plaintext bytes off the tail: the last untouched position
/// holds exactly one smeared byte, and removing its contributions from the
/// positions before it exposes the next one.
pub fn decrypt(mut data: Vec<u8>, key: &[u8]) -> Result<Vec<u8>> {
    if key.is_empty() {
        return Err(Error::BadArgument("cipher key must not be empty"));
    }
    let klen = key.len();
    if data.len() + 1 < klen {
        return Err(Error::BadArgument("ciphertext shorter than its cipher key"));
    }
    let n = data.len() + 1 - klen;
    let mut stream = KeyStream::new(n, key);
    let keystream: Vec<u8> = (0..n * klen).map(|_| stream.next_byte()).collect();
    for i in (0..n).rev() {
        let row = i * klen;
        let d = data[i + klen - 1]
            .wrapping_sub(key[klen - 1])
            .wrapping_sub(keystream[row + klen - 1]);
        for j in (0..klen - 1).rev() {
            data[i + j] = data[i + j]
                .wrapping_sub(d)
                .wrapping_sub(key[j])
                .wrapping_sub(keystream[row + j]);
        }
        data[i + klen - 1] = d;
    }
    data.copy_within(klen - 1.., 0);
    data.truncate(n);
    Ok(data)
}

/// Encrypt and wrap in the radix-85 transport.
pub fn encrypt_str(plain: impl Into<Vec<u8>>, key: &[u8]) -> Result<String> {
    Ok(radix85::encode(&encrypt(plain.into(), key)?))
}

/// Unwrap the radix-85 transport and decrypt.
pub fn decrypt_str(text: &str, key: &[u8]) -> Result<Vec<u8>> {
    decrypt(radix85::decode(text)?, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(
            encrypt(vec![1], b"").unwrap_err(),
            Error::BadArgument("cipher key must not be empty")
        );
        assert_eq!(
            decrypt(vec![1], b"").unwrap_err(),
            Error::BadArgument("cipher key must not be empty")
        );
    }

    #[test]
    fn ciphertext_length_invariant() {
        // The decrypt seed expression only matches the encrypt one because
        // ciphertext runs key_len - 1 bytes past the plaintext.
        for (data_len, key) in [
            (5usize, &b"k"[..]),
            (5, &b"key"[..]),
            (1, &b"longer key"[..]),
            (0, &b"ab"[..]),
        ] {
            let out = encrypt(vec![7u8; data_len], key).unwrap();
            assert_eq!(out.len(), data_len + key.len() - 1);
        }
    }

    #[test]
    fn single_byte_round_trip() {
        let cipher = encrypt(vec![0x5A], b"k").unwrap();
        assert_eq!(cipher.len(), 1);
        assert_eq!(decrypt(cipher, b"k").unwrap(), vec![0x5A]);
    }

    #[test]
    fn hello_round_trip() {
        let cipher = encrypt(b"hello".to_vec(), b"k").unwrap();
        assert_eq!(cipher.len(), 5);
        assert_ne!(cipher, b"hello".to_vec());
        assert_eq!(decrypt(cipher, b"k").unwrap(), b"hello".to_vec());
    }

    #[test]
    fn empty_plaintext_round_trip() {
        let cipher = encrypt(Vec::new(), b"abc").unwrap();
        assert_eq!(cipher.len(), 2);
        assert_eq!(decrypt(cipher, b"abc").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn short_ciphertext_is_rejected() {
        assert_eq!(
            decrypt(vec![1], b"abc").unwrap_err(),
            Error::BadArgument("ciphertext shorter than its cipher key")
        );
    }

    #[test]
    fn keystream_is_deterministic_and_key_sensitive() {
        let mut a = KeyStream::new(16, b"alpha");
        let mut b = KeyStream::new(16, b"alpha");
        let mut c = KeyStream::new(16, b"beta");
        let bytes_a: Vec<u8> = (0..32).map(|_| a.next_byte()).collect();
        let bytes_b: Vec<u8> = (0..32).map(|_| b.next_byte()).collect();
        let bytes_c: Vec<u8> = (0..32).map(|_| c.next_byte()).collect();
        assert_eq!(bytes_a, bytes_b);
        assert_ne!(bytes_a, bytes_c);
    }

    #[test]
    fn random_round_trips() {
        // Bit-for-bit inversion across random inputs, keys, and lengths.
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x7A4C);
        for _ in 0..200 {
            let data_len = rng.gen_range(0..64);
            let key_len = rng.gen_range(1..=16);
            let data: Vec<u8> = (0..data_len).map(|_| rng.gen()).collect();
            let key: Vec<u8> = (0..key_len).map(|_| rng.gen()).collect();
            let cipher = encrypt(data.clone(), &key).unwrap();
            assert_eq!(cipher.len(), data.len() + key.len() - 1);
            let plain = decrypt(cipher, &key).unwrap();
            assert_eq!(plain, data, "key {:02X?} failed", key);
        }
    }

    #[test]
    fn string_pipeline_round_trip() {
        let text = encrypt_str("attack at dawn", b"owl").unwrap();
        assert!(text.is_ascii());
        let plain = decrypt_str(&text, b"owl").unwrap();
        assert_eq!(plain, b"attack at dawn".to_vec());
        assert!(decrypt_str(&text, b"wrong").unwrap() != b"attack at dawn".to_vec());
    }
}
