//! Per-direction AEAD session: a fixed key, a fixed 12-byte nonce base, and
//! a monotonic counter XORed into the nonce's low 8 bytes (§4.4). One
//! `AeadSession` handles exactly one direction (tx or rx) of one call.

use crate::aead::{AeadCipher, AeadKey, AeadNonce};
use crate::error::Result;
use crate::kdf::aead_nonce_xor;

pub struct AeadSession {
    cipher: AeadCipher,
    nonce_base: [u8; 12],
    counter: u64,
}

impl AeadSession {
    pub fn new(key: [u8; 32], nonce_base: [u8; 12]) -> Self {
        Self {
            cipher: AeadCipher::new(AeadKey(key)),
            nonce_base,
            counter: 0,
        }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Seal one frame with the next counter value, advancing the counter
    /// on success. Returns the counter value that was consumed so the
    /// caller can place it in diagnostics if desired (the wire format does
    /// not carry it explicitly; ordering is implicit in send order).
    pub fn seal_next(&mut self, plaintext: &[u8]) -> Result<(u64, Vec<u8>)> {
        let used = self.counter;
        let nonce = AeadNonce(aead_nonce_xor(&self.nonce_base, used));
        let ct = self.cipher.seal(nonce, b"", plaintext)?;
        self.counter += 1;
        Ok((used, ct))
    }

    /// Open one frame using the next counter value. The counter always
    /// advances, even when decryption fails (§4.1: "the rx_counter has
    /// already advanced; this is a deliberate design choice").
    pub fn open_next(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let used = self.counter;
        self.counter += 1;
        let nonce = AeadNonce(aead_nonce_xor(&self.nonce_base, used));
        self.cipher.open(nonce, b"", ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_next_increments_counter_on_success() {
        let mut s = AeadSession::new([1u8; 32], [2u8; 12]);
        assert_eq!(s.counter(), 0);
        let (used, _) = s.seal_next(b"hi").unwrap();
        assert_eq!(used, 0);
        assert_eq!(s.counter(), 1);
    }

    #[test]
    fn open_next_increments_counter_even_on_failure() {
        let mut s = AeadSession::new([1u8; 32], [2u8; 12]);
        let bogus = vec![0u8; 32];
        assert!(s.open_next(&bogus).is_err());
        assert_eq!(s.counter(), 1);
    }

    #[test]
    fn matching_sessions_round_trip_in_send_order() {
        let mut tx = AeadSession::new([9u8; 32], [4u8; 12]);
        let mut rx = AeadSession::new([9u8; 32], [4u8; 12]);
        for i in 0..5u8 {
            let (_, ct) = tx.seal_next(&[i]).unwrap();
            let pt = rx.open_next(&ct).unwrap();
            assert_eq!(pt, vec![i]);
        }
        assert_eq!(tx.counter(), rx.counter());
    }

    #[test]
    fn out_of_order_ciphertext_fails_to_decrypt() {
        let mut tx = AeadSession::new([9u8; 32], [4u8; 12]);
        let mut rx = AeadSession::new([9u8; 32], [4u8; 12]);
        let (_, ct0) = tx.seal_next(b"a").unwrap();
        let (_, ct1) = tx.seal_next(b"b").unwrap();
        // rx expects counter 0 first; feeding ct1 first must fail.
        assert!(rx.open_next(&ct1).is_err());
        assert!(rx.open_next(&ct0).is_err());
    }
}
