//! Layered error taxonomy for the session engine (§7): config errors at
//! init, recoverable protocol errors, hard crypto errors, transport
//! errors treated as remote hangup, and capacity errors that are always
//! handled internally by drop-oldest and never surfaced here.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Crypto(#[from] svx_crypto::Error),

    #[error(transparent)]
    Fec(#[from] svx_fec::Error),

    #[error(transparent)]
    Audio(#[from] svx_audio::Error),

    #[error(transparent)]
    Core(#[from] svx_core::Error),

    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// `true` for the taxonomy's "hard" errors (§7 CryptoError): these are
    /// session-fatal and must never be treated as ordinary packet loss.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Crypto(_) | Error::Transport(_))
    }
}

pub type Result<T> = core::result::Result<T, Error>;
