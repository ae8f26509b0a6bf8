//! Long-term identity: a 32-byte seed clamped into an X25519 static keypair
//! (data model §3 "Identity"). The seed is never exposed once loaded; only
//! the derived public key leaves this module.

use rand::{rngs::OsRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// A static (long-term) X25519 keypair derived from a 32-byte seed.
pub struct StaticKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl StaticKeypair {
    /// Derive a keypair from a 32-byte seed. The same seed always yields
    /// the same public key: `StaticSecret::from` applies the X25519 clamp
    /// deterministically, so there is no randomness in this path.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let secret = StaticSecret::from(seed);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Generate a fresh random keypair (used for ephemeral keys).
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let kp = Self::from_seed(seed);
        seed.zeroize();
        kp
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    /// Diffie-Hellman this keypair's secret with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &[u8; 32]) -> [u8; 32] {
        let peer = PublicKey::from(*peer_public);
        self.secret.diffie_hellman(&peer).to_bytes()
    }
}

/// Validate and parse a 32-byte seed supplied across the Core API boundary.
pub fn seed_from_slice(seed: &[u8]) -> Result<[u8; 32]> {
    seed.try_into()
        .map_err(|_| Error::invalid_key(format!("expected 32-byte seed, got {} bytes", seed.len())))
}

/// `init(seed32)` / `derive_public_key(seed32)` from the Core API: derive
/// just the public key without retaining the secret.
pub fn derive_public_key(seed: &[u8]) -> Result<[u8; 32]> {
    let seed = seed_from_slice(seed)?;
    Ok(StaticKeypair::from_seed(seed).public_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_public_key_across_runs() {
        let seed = [0u8; 32];
        let a = StaticKeypair::from_seed(seed).public_bytes();
        let b = StaticKeypair::from_seed(seed).public_bytes();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_yield_different_keys() {
        let a = StaticKeypair::from_seed([0u8; 32]).public_bytes();
        let b = StaticKeypair::from_seed([1u8; 32]).public_bytes();
        assert_ne!(a, b);
    }

    #[test]
    fn seed_from_slice_rejects_wrong_length() {
        assert!(seed_from_slice(&[0u8; 31]).is_err());
        assert!(seed_from_slice(&[0u8; 33]).is_err());
        assert!(seed_from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn diffie_hellman_is_symmetric() {
        let a = StaticKeypair::generate();
        let b = StaticKeypair::generate();
        let ab = a.diffie_hellman(&b.public_bytes());
        let ba = b.diffie_hellman(&a.public_bytes());
        assert_eq!(ab, ba);
    }
}
