#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid length: {0}")]
    InvalidLength(String),
    #[error("uncorrectable: more errors than the code can correct")]
    Uncorrectable,
}

pub type Result<T> = core::result::Result<T, Error>;
