#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid audio frame: {0}")]
    InvalidFrame(String),
}

impl Error {
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Error::InvalidFrame(msg.into())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
