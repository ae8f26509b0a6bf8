//! The four-thread concurrency model (§5): mic-capture, tx, rx, and
//! speaker-playback each run on their own `std::thread`, talking to the
//! shared `SessionEngine` only through its own internally-locked rings
//! and session mutex — so no lock here is ever held across a call into
//! `SessionEngine`, and the "at most one ring mutex while holding the
//! session mutex" ordering rule lives entirely inside `engine`, not here.
//!
//! Platform audio capture/playback and the underlying transport socket
//! are host concerns; this module only defines the narrow traits each
//! thread polls and drives them to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::engine::SessionEngine;

/// Polling backoff between empty reads, per suspension-point budget (§5:
/// "4-10ms sleeps between empty polls").
const POLL_SLEEP: Duration = Duration::from_millis(5);

/// One block's worth of audio per mic/speaker poll.
const AUDIO_BLOCK_SAMPLES: usize = svx_audio::FRAME_SAMPLES;
/// Generous scratch size for one `generate_outgoing`/`handle_incoming` poll.
const BYTE_BLOCK: usize = 4096;

/// Pulls PCM samples from the platform microphone. Returns the number of
/// samples written into `buf`; `0` means "nothing captured this poll."
pub trait AudioCapture: Send {
    fn capture(&mut self, buf: &mut [i16]) -> usize;
}

/// Pushes decoded PCM samples to the platform speaker.
pub trait AudioPlayback: Send {
    fn play(&mut self, samples: &[i16]);
}

/// The outbound half of the transport (e.g. a Bluetooth RFCOMM socket's
/// write side).
pub trait TransportWriter: Send {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}

/// The inbound half of the transport. `read` is expected to be
/// non-blocking or short-timeout; `Ok(0)` means "nothing available yet."
pub trait TransportReader: Send {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Owns the four worker threads and the shared cancellation flag.
/// Dropping a `Scheduler` without calling `stop`/`shutdown` first leaves
/// the threads running detached from this handle (they still observe
/// `running` if another `Scheduler::stop` or the same flag is reached
/// some other way, but ordinarily callers should always stop explicitly).
pub struct Scheduler {
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn all four threads against `engine`. The capture/playback/
    /// transport trait objects are moved one per thread; there is no
    /// sharing between them, so no additional locking is needed here.
    pub fn spawn(
        engine: Arc<SessionEngine>,
        capture: Box<dyn AudioCapture>,
        playback: Box<dyn AudioPlayback>,
        writer: Box<dyn TransportWriter>,
        reader: Box<dyn TransportReader>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));

        let handles = vec![
            spawn_mic_thread(Arc::clone(&engine), Arc::clone(&running), capture),
            spawn_tx_thread(Arc::clone(&engine), Arc::clone(&running), writer),
            spawn_rx_thread(Arc::clone(&engine), Arc::clone(&running), reader),
            spawn_speaker_thread(engine, Arc::clone(&running), playback),
        ];

        Self { running, handles }
    }

    /// Cancel all four threads immediately and wait for them to exit, with
    /// no attempt to flush a hangup. Use `shutdown` for a graceful close.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        self.join_all();
    }

    /// Enqueue a hangup frame, give the tx thread `hangup_drain_ms` to get
    /// it out the door, then cancel and join every thread.
    pub fn shutdown(self, engine: &SessionEngine, hangup_drain_ms: u64) {
        engine.send_hangup();
        thread::sleep(Duration::from_millis(hangup_drain_ms));
        self.stop();
    }

    fn join_all(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn spawn_mic_thread(
    engine: Arc<SessionEngine>,
    running: Arc<AtomicBool>,
    mut capture: Box<dyn AudioCapture>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0i16; AUDIO_BLOCK_SAMPLES];
        while running.load(Ordering::Relaxed) {
            let n = capture.capture(&mut buf);
            if n > 0 {
                engine.feed_mic(&buf[..n]);
            } else {
                thread::sleep(POLL_SLEEP);
            }
        }
    })
}

fn spawn_speaker_thread(
    engine: Arc<SessionEngine>,
    running: Arc<AtomicBool>,
    mut playback: Box<dyn AudioPlayback>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0i16; AUDIO_BLOCK_SAMPLES];
        while running.load(Ordering::Relaxed) {
            let n = engine.pull_speaker(&mut buf);
            if n > 0 {
                playback.play(&buf[..n]);
            } else {
                thread::sleep(POLL_SLEEP);
            }
        }
    })
}

fn spawn_tx_thread(
    engine: Arc<SessionEngine>,
    running: Arc<AtomicBool>,
    mut writer: Box<dyn TransportWriter>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; BYTE_BLOCK];
        while running.load(Ordering::Relaxed) {
            let n = engine.generate_outgoing(&mut buf);
            if n > 0 {
                if let Err(e) = writer.write(&buf[..n]) {
                    tracing::warn!(error = %e, "transport write failed");
                }
            } else {
                thread::sleep(POLL_SLEEP);
            }
        }
    })
}

fn spawn_rx_thread(
    engine: Arc<SessionEngine>,
    running: Arc<AtomicBool>,
    mut reader: Box<dyn TransportReader>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; BYTE_BLOCK];
        while running.load(Ordering::Relaxed) {
            match reader.read(&mut buf) {
                Ok(0) => thread::sleep(POLL_SLEEP),
                Ok(n) => engine.handle_incoming(&buf[..n]),
                Err(e) => {
                    tracing::warn!(error = %e, "transport read failed");
                    thread::sleep(POLL_SLEEP);
                }
            }
        }
    })
}
