pub mod hash;
pub mod keys;

pub use hash::{canonical_token, hash_tokens, hex_leading_zero_bits};
pub use keys::{generate_keypair, sign, verify_signature};
