#![forbid(unsafe_code)]
//! Real-time audio pipeline: the IMA-ADPCM voice codec and the reference
//! 4-FSK audio-band modem (spec.md §4.5, §4.7).

pub mod adpcm;
pub mod error;
pub mod fsk;

pub use adpcm::{decode_frame, encode_frame, AdpcmState, ENCODED_FRAME_LEN, FRAME_SAMPLES};
pub use error::{Error, Result};
pub use fsk::{FskDemodulator, FskModem, FskModulator, DEFAULT_POWER_THRESHOLD};
