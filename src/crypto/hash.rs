use serde::Serialize;
use sha2::{Digest, Sha256};

/// Order-independent SHA-256 over any number of serialisable values.
///
/// `crypto_hash!(a, b, c) == crypto_hash!(c, a, b)`.
#[macro_export]
macro_rules! crypto_hash {
    ($($arg:expr),+ $(,)?) => {
        $crate::crypto::hash::hash_tokens(vec![$($crate::crypto::hash::canonical_token(&$arg)),+])
    };
}

/// JSON rendering of a single hash argument.
pub fn canonical_token<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).expect("hash input is JSON-serialisable")
}

/// Sort the tokens, join them with a space and return the lowercase hex digest.
pub fn hash_tokens(mut tokens: Vec<String>) -> String {
    tokens.sort();
    let mut hasher = Sha256::new();
    hasher.update(tokens.join(" ").as_bytes());
    hex::encode(hasher.finalize())
}

/// Number of leading zero bits in the binary expansion of a hex digest
/// (4 bits per character, most significant bit first).
pub fn hex_leading_zero_bits(hash: &str) -> u32 {
    let mut total = 0u32;
    for c in hash.chars() {
        match c.to_digit(16) {
            Some(0) => total += 4,
            Some(nibble) => {
                total += nibble.leading_zeros() - 28;
                break;
            }
            None => break,
        }
    }
    total
}
