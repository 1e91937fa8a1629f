use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use serde::Serialize;

use crate::crypto_hash;

/// Generate a new secp256k1 keypair. The public key is returned as the hex
/// of its compressed encoding (33 bytes), which doubles as the address.
pub fn generate_keypair() -> (SecretKey, String) {
    let secp = Secp256k1::new();
    let (sk, pk) = secp.generate_keypair(&mut OsRng);
    (sk, hex::encode(pk.serialize()))
}

/// Digest that is actually signed: the canonical hash of `data`.
fn message_for<T: Serialize + ?Sized>(data: &T) -> Message {
    let digest = hex::decode(crypto_hash!(data)).expect("crypto_hash yields hex");
    Message::from_digest_slice(&digest).expect("sha-256 digest is 32 bytes")
}

/// Sign the canonical hash of `data`. Returns the hex-encoded DER signature.
pub fn sign<T: Serialize + ?Sized>(secret_key: &SecretKey, data: &T) -> String {
    let secp = Secp256k1::signing_only();
    let sig = secp.sign_ecdsa(&message_for(data), secret_key);
    hex::encode(&*sig.serialize_der())
}

/// Verify a hex DER signature over `data` against a hex public key.
/// Anything malformed verifies as `false`.
pub fn verify_signature<T: Serialize + ?Sized>(pubkey_hex: &str, data: &T, sig_hex: &str) -> bool {
    let secp = Secp256k1::verification_only();

    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(sig) = Signature::from_der(&sig_bytes) else {
        return false;
    };
    let Ok(pk_bytes) = hex::decode(pubkey_hex) else {
        return false;
    };
    let Ok(pk) = PublicKey::from_slice(&pk_bytes) else {
        return false;
    };

    secp.verify_ecdsa(&message_for(data), &sig, &pk).is_ok()
}
