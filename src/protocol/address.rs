//! Chain address derivation from the device public key.
//!
//! `address = "0x" ‖ hex(BLAKE2b-256(0x00 ‖ public_key))`.  The leading
//! zero byte is the Ed25519 signature-scheme flag.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::error::ProtocolError;

type Blake2b256 = Blake2b<U32>;

/// Public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

const ED25519_FLAG: u8 = 0x00;

/// Derive the printable address from a hex-encoded public key.
pub fn derive_address(public_key_hex: &str) -> Result<String, ProtocolError> {
    let key = hex::decode(public_key_hex.trim()).map_err(|_| ProtocolError::InvalidHex)?;
    if key.len() != PUBLIC_KEY_LEN {
        return Err(ProtocolError::InvalidKeyLength(key.len()));
    }

    let mut hasher = Blake2b256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(&key);
    Ok(format!("0x{}", hex::encode(hasher.finalize())))
}
