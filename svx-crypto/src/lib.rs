#![forbid(unsafe_code)]
//! Identity, handshake key schedule, and AEAD session primitives for the
//! secure voice transport core. Crypto primitives themselves (X25519,
//! ChaCha20-Poly1305, SHA-256, HKDF) come from audited crates; nothing in
//! this crate reimplements a primitive.

pub mod aead;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod kdf;
pub mod session;

pub use error::{Error, Result};
