//! Thin ChaCha20-Poly1305 (IETF) wrapper. Associated data is always empty
//! on this transport (§4.4); the parameter is kept so the type is not
//! single-purpose and so tests can exercise AAD mismatch detection.

use chacha20poly1305::aead::{Aead, NewAead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use std::sync::OnceLock;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// A 32-byte AEAD key, zeroized on drop.
#[derive(Clone)]
pub struct AeadKey(pub [u8; 32]);

impl Drop for AeadKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A 96-bit nonce.
#[derive(Clone, Copy)]
pub struct AeadNonce(pub [u8; 12]);

/// ChaCha20-Poly1305 cipher over a fixed key, with the underlying cipher
/// instance constructed lazily and cached.
pub struct AeadCipher {
    key: AeadKey,
    cipher: OnceLock<ChaCha20Poly1305>,
}

impl AeadCipher {
    pub fn new(key: AeadKey) -> Self {
        Self {
            key,
            cipher: OnceLock::new(),
        }
    }

    fn get_cipher(&self) -> &ChaCha20Poly1305 {
        self.cipher.get_or_init(|| {
            let key = Key::from_slice(&self.key.0);
            ChaCha20Poly1305::new(key)
        })
    }

    /// Seal `plaintext`, returning `ciphertext || 16-byte tag`.
    pub fn seal(&self, nonce: AeadNonce, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(&nonce.0);
        self.get_cipher()
            .encrypt(nonce, Payload { msg: plaintext, aad })
            .map_err(|e| Error::crypto(format!("aead seal failed: {e}")))
    }

    /// Open a `ciphertext || tag` buffer, returning the plaintext.
    pub fn open(&self, nonce: AeadNonce, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(&nonce.0);
        self.get_cipher()
            .decrypt(nonce, Payload { msg: ciphertext, aad })
            .map_err(|e| Error::crypto(format!("aead open failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn chacha20_roundtrip() {
        let cipher = AeadCipher::new(AeadKey([7u8; 32]));
        let nonce = AeadNonce([1u8; 12]);
        let ct = cipher.seal(nonce, b"", b"hello").unwrap();
        assert_eq!(ct.len(), "hello".len() + 16);
        let pt = cipher.open(nonce, b"", &ct).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn open_fails_with_wrong_aad() {
        let cipher = AeadCipher::new(AeadKey([3u8; 32]));
        let nonce = AeadNonce([2u8; 12]);
        let ct = cipher.seal(nonce, b"A", b"m").unwrap();
        assert!(cipher.open(nonce, b"B", &ct).is_err());
    }

    #[test]
    fn open_fails_with_wrong_nonce() {
        let cipher = AeadCipher::new(AeadKey([9u8; 32]));
        let ct = cipher.seal(AeadNonce([1u8; 12]), b"", b"m").unwrap();
        assert!(cipher.open(AeadNonce([2u8; 12]), b"", &ct).is_err());
    }

    proptest! {
        #[test]
        fn roundtrip_random_input(m in prop::collection::vec(any::<u8>(), 0..2048)) {
            let cipher = AeadCipher::new(AeadKey([5u8; 32]));
            let nonce = AeadNonce([0u8; 12]);
            let ct = cipher.seal(nonce, b"", &m).unwrap();
            let pt = cipher.open(nonce, b"", &ct).unwrap();
            prop_assert_eq!(pt, m);
        }
    }
}
