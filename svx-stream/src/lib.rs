#![forbid(unsafe_code)]
//! Framed duplex wire protocol, session state machine, and the
//! four-thread scheduler that together form the secure voice transport
//! core's outward-facing engine (spec.md §4.1–§4.2, §5, §6).

pub mod engine;
pub mod error;
pub mod frame;
pub mod frame_codec;
pub mod scheduler;
pub mod session;

pub use engine::{SessionEngine, SessionEvent};
pub use error::{Error, Result};
pub use session::{Dispatched, SessionState};
