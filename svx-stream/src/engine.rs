//! `SessionEngine`: the host-facing Core API (§6) that owns the four
//! ring buffers, the session mutex, and the byte-stream framing. This is
//! the facade a platform binding (mobile UI, Bluetooth RFCOMM socket
//! plumbing, platform audio capture/playback) calls into; `scheduler`
//! wraps it with the four worker threads.

use std::sync::{Mutex, MutexGuard};

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use svx_core::config::{ConfigSnapshot, SessionConfig};
use svx_core::ring::RingBuffer;
use svx_core::timestamp::Clock;
use svx_crypto::handshake::Role;

use crate::error::Result;
use crate::frame::Frame;
use crate::frame_codec::FrameCodec;
use crate::session::{Dispatched, Session, SessionState};

/// ~65,536 int16 samples, matching the data model's "mic PCM (~65 K
/// samples)" ring.
const PCM_RING_CAPACITY: usize = 65_536;
/// ~256 KiB byte rings for the framed transport.
const BYTE_RING_CAPACITY: usize = 256 * 1024;

/// Host-visible notifications (§7): state transitions and stage-tagged
/// errors. The host drains these with `poll_events` — there is no
/// separate thread or channel, since every engine method already runs
/// under the session mutex and can append to this log before returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    Error { stage: &'static str, message: String },
}

pub struct SessionEngine {
    session: Mutex<Session>,
    config: ConfigSnapshot,
    clock: Clock,

    mic_ring: Mutex<RingBuffer<i16>>,
    speaker_ring: Mutex<RingBuffer<i16>>,
    outbound_ring: Mutex<RingBuffer<u8>>,
    inbound_ring: Mutex<RingBuffer<u8>>,

    events: Mutex<Vec<SessionEvent>>,
    last_reported_state: Mutex<SessionState>,
}

impl SessionEngine {
    /// `init(seed32)`.
    pub fn new(seed: [u8; 32], config: SessionConfig) -> Self {
        Self {
            session: Mutex::new(Session::new(seed)),
            config: ConfigSnapshot::new(&config),
            clock: Clock::new(),
            mic_ring: Mutex::new(RingBuffer::new(PCM_RING_CAPACITY)),
            speaker_ring: Mutex::new(RingBuffer::new(PCM_RING_CAPACITY)),
            outbound_ring: Mutex::new(RingBuffer::new(BYTE_RING_CAPACITY)),
            inbound_ring: Mutex::new(RingBuffer::new(BYTE_RING_CAPACITY)),
            events: Mutex::new(Vec::new()),
            last_reported_state: Mutex::new(SessionState::Idle),
        }
    }

    /// `derive_public_key(seed32)`, usable before any session exists.
    pub fn derive_public_key(seed: &[u8]) -> Result<[u8; 32]> {
        Ok(svx_crypto::identity::derive_public_key(seed)?)
    }

    pub fn static_public_key(&self) -> [u8; 32] {
        self.lock_session().static_public_key()
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_mic(&self) -> MutexGuard<'_, RingBuffer<i16>> {
        self.mic_ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_speaker(&self) -> MutexGuard<'_, RingBuffer<i16>> {
        self.speaker_ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_outbound(&self) -> MutexGuard<'_, RingBuffer<u8>> {
        self.outbound_ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_inbound(&self) -> MutexGuard<'_, RingBuffer<u8>> {
        self.inbound_ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_rings(&self) {
        self.lock_mic().clear();
        self.lock_speaker().clear();
        self.lock_outbound().clear();
        self.lock_inbound().clear();
    }

    fn push_event(&self, event: SessionEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }

    /// Drain accumulated `state_changed`/`error` notifications.
    pub fn poll_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn maybe_emit_state_change(&self) {
        let current = self.lock_session().state();
        let mut last = self.last_reported_state.lock().unwrap_or_else(|e| e.into_inner());
        if *last != current {
            *last = current;
            drop(last);
            self.push_event(SessionEvent::StateChanged(current));
        }
    }

    fn start_as(&self, role: Role, peer_pub: Option<[u8; 32]>) {
        self.clear_rings();
        self.lock_session().start_as_role(role, peer_pub, self.clock.now_ms());
        self.maybe_emit_state_change();
    }

    /// `start_server(peer_pub32?)`.
    pub fn start_server(&self, peer_pub: Option<[u8; 32]>) {
        self.start_as(Role::Server, peer_pub);
    }

    /// `start_client(peer_pub32?)`.
    pub fn start_client(&self, peer_pub: Option<[u8; 32]>) {
        self.start_as(Role::Client, peer_pub);
    }

    /// `stop()`.
    pub fn stop(&self) {
        self.lock_session().stop();
        self.clear_rings();
        self.maybe_emit_state_change();
    }

    /// `feed_mic(pcm[], n)`.
    pub fn feed_mic(&self, pcm: &[i16]) {
        self.lock_mic().push_iter(pcm.iter().copied());
    }

    /// `pull_speaker(buf, cap)`.
    pub fn pull_speaker(&self, buf: &mut [i16]) -> usize {
        let items = self.lock_speaker().pop_n(buf.len());
        let n = items.len();
        buf[..n].copy_from_slice(&items);
        n
    }

    fn enqueue_frame(&self, frame: Frame) {
        self.lock_outbound().push_iter(frame.encode());
    }

    /// `generate_outgoing(buf, cap)`: drive the egress cadence (handshake
    /// retransmission, keepalives), encode any full mic block once the
    /// handshake has completed, then drain ready bytes into `buf`.
    pub fn generate_outgoing(&self, buf: &mut [u8]) -> usize {
        match self.lock_session().egress_tick(&self.config, &self.clock) {
            Ok(frames) => {
                for frame in frames {
                    self.enqueue_frame(frame);
                }
            }
            Err(e) => self.push_event(SessionEvent::Error {
                stage: "egress_tick",
                message: e.to_string(),
            }),
        }

        if self.lock_session().handshake_complete() {
            loop {
                let block = self.lock_mic().pop_exact(svx_audio::FRAME_SAMPLES);
                let Some(samples) = block else { break };
                match self.lock_session().encode_audio_frame(&self.config, &samples) {
                    Ok(frame) => self.enqueue_frame(frame),
                    Err(e) => {
                        self.push_event(SessionEvent::Error {
                            stage: "audio_encode",
                            message: e.to_string(),
                        });
                        break;
                    }
                }
            }
        }

        self.maybe_emit_state_change();

        let items = self.lock_outbound().pop_n(buf.len());
        let n = items.len();
        buf[..n].copy_from_slice(&items);
        n
    }

    /// `handle_incoming(buf, n)`: buffer bytes, then repeatedly frame and
    /// dispatch everything currently available.
    pub fn handle_incoming(&self, bytes: &[u8]) {
        self.lock_inbound().push_iter(bytes.iter().copied());

        let drained = {
            let mut ring = self.lock_inbound();
            let n = ring.len();
            ring.pop_n(n)
        };
        let mut scratch = BytesMut::from(&drained[..]);
        let mut codec = FrameCodec::new();

        loop {
            let frame = match codec.decode(&mut scratch) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    self.push_event(SessionEvent::Error {
                        stage: "frame_decode",
                        message: e.to_string(),
                    });
                    break;
                }
            };
            self.dispatch_frame(&frame);
        }

        // Put back whatever didn't form a complete frame yet.
        let mut ring = self.lock_inbound();
        ring.clear();
        ring.push_iter(scratch.iter().copied());
        drop(ring);

        self.maybe_emit_state_change();
    }

    fn dispatch_frame(&self, frame: &Frame) {
        let dispatched = self.lock_session().handle_frame(frame, &self.config);
        match dispatched {
            Ok(Dispatched::Audio(samples)) => {
                self.lock_speaker().push_iter(samples);
            }
            Ok(Dispatched::RemoteHangup) | Ok(Dispatched::None) => {}
            Err(e) => {
                let fatal = e.is_fatal();
                self.push_event(SessionEvent::Error {
                    stage: if fatal { "crypto" } else { "protocol" },
                    message: e.to_string(),
                });
                // §4.1/§7/§9: a decrypt failure is a hard error — abort the
                // session rather than let the rx thread keep polling it.
                if fatal {
                    self.lock_session().stop();
                    self.clear_rings();
                }
            }
        }
    }

    /// `send_hangup()`: flush outbound, then enqueue one control frame.
    pub fn send_hangup(&self) {
        self.lock_outbound().clear();
        let frame = self.lock_session().send_hangup();
        self.enqueue_frame(frame);
        self.maybe_emit_state_change();
    }

    /// `consume_remote_hangup()`.
    pub fn consume_remote_hangup(&self) -> bool {
        self.lock_session().consume_remote_hangup()
    }

    /// `set_config({encrypt, decrypt, fsk_enabled})`.
    pub fn set_config(&self, json: &str) -> Result<()> {
        let parsed = SessionConfig::from_json(json)?;
        self.config.apply(parsed.encrypt, parsed.decrypt, parsed.fsk_enabled);
        Ok(())
    }

    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Build a reference 4-FSK modem (§4.7) configured with this engine's
    /// `fsk_power_threshold` tunable, for a host that needs to carry the
    /// byte stream over a voice-only channel instead of handing raw bytes
    /// to `handle_incoming`/reading them from `generate_outgoing`. Not
    /// otherwise wired into the engine: whether to use it is a transport
    /// choice the host makes, not something the frame/crypto layer above
    /// needs to know about.
    pub fn new_fsk_modem(&self, ring_capacity: usize) -> svx_audio::FskModem {
        svx_audio::FskModem::new(self.config.fsk_power_threshold(), ring_capacity)
    }
}
