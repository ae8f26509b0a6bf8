//! HKDF-SHA-256 wrapper and the nonce/counter XOR used by the transport
//! security layer (§4.4).

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{Error, Result};

/// `HKDF-SHA-256(ikm, salt, info, L)`, writing exactly `out.len()` bytes.
pub fn hkdf_expand(ikm: &[u8], salt: &[u8], info: &[u8], out: &mut [u8]) -> Result<()> {
    let (_prk, hk) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    hk.expand(info, out)
        .map_err(|e| Error::crypto(format!("hkdf expand failed: {e}")))
}

/// XOR the little-endian bytes of `counter` into the low 8 bytes of a
/// 12-byte nonce base, leaving the first 4 bytes untouched (§4.4).
pub fn aead_nonce_xor(base: &[u8; 12], counter: u64) -> [u8; 12] {
    let mut nonce = *base;
    let ctr = counter.to_le_bytes();
    for i in 0..8 {
        nonce[4 + i] ^= ctr[i];
    }
    nonce
}
