//! The session state machine (§4.1): role, handshake progression, the
//! AEAD key schedule, per-direction counters, and hangup handling. This
//! module owns exactly the fields the data model (§3) calls "Session" —
//! crypto and protocol state — plus the two persistent ADPCM coder
//! states. Ring buffers, threads, and the host-facing Core API live in
//! `engine`.
//!
//! Keepalives and audio share one wrapping rule: both are built as an
//! audio-cipher-style plaintext body and sent as a `Cipher` frame when
//! `outbound_encrypted`, or a `Plaintext` frame otherwise — this is what
//! lets a keepalive "produce a decryptable AEAD frame that acknowledges
//! the handshake" (per the glossary) exactly the way an audio frame
//! would. `Control` frames are reserved for hangup, which must work
//! unencrypted and even before keys exist.
//!
//! `outbound_encrypted`/`inbound_encrypted` are re-derived from the live
//! config snapshot on every frame rather than cached once at handshake
//! completion, so a mid-call `encrypt`/`decrypt` toggle takes effect on
//! the very next frame without a renegotiation round trip.

use svx_audio::AdpcmState;
use svx_core::config::ConfigSnapshot;
use svx_core::timestamp::Clock;
use svx_crypto::handshake::{
    derive_transport_keys, HandshakePayload, Role, CAP_REQUIRE_ENCRYPTED_INBOUND,
    CAP_WILL_ENCRYPT_OUTBOUND,
};
use svx_crypto::identity::StaticKeypair;
use svx_crypto::session::AeadSession;

use crate::error::{Error, Result};
use crate::frame::{
    build_audio_plaintext, parse_audio_plaintext, AudioFrameHeader, Frame, FrameKind,
    AUDIO_FRAME_TYPE, CONTROL_HANGUP, CONTROL_KEEPALIVE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    HandshakeReady,
    KeysDerived,
    Acknowledged,
    Active,
    Terminating,
}

/// What `Session::handle_frame` observed, for `engine` to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Nothing the host needs to react to (handshake progress, a
    /// keepalive, a bad-version handshake that was ignored, ...).
    None,
    /// A decoded audio frame's PCM samples, ready for the speaker ring.
    Audio(Vec<i16>),
    /// The peer asked to hang up.
    RemoteHangup,
}

pub struct Session {
    identity: StaticKeypair,
    role: Role,
    expected_peer_static: Option<[u8; 32]>,

    ephemeral: Option<StaticKeypair>,
    peer_static_pub: Option<[u8; 32]>,

    tx: Option<AeadSession>,
    rx: Option<AeadSession>,

    audio_seq: u16,
    encode_state: AdpcmState,
    decode_state: AdpcmState,

    state: SessionState,
    handshake_ready: bool,
    handshake_complete: bool,
    handshake_acknowledged: bool,
    outbound_encrypted: bool,
    inbound_encrypted: bool,
    peer_accepts_encrypt: bool,
    peer_sends_encrypt: bool,
    remote_hangup_requested: bool,
    pending_handshake_response: bool,

    session_started_ms: u64,
    /// `None` until the first handshake/keepalive of this session has
    /// gone out, so the very first tick fires immediately instead of
    /// waiting out a full cadence interval.
    last_handshake_ms: Option<u64>,
    last_keepalive_ms: Option<u64>,
}

impl Session {
    /// `init(seed32)`: derive the long-term identity keypair. The session
    /// itself starts `Idle` until `start_as_role` is called.
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            identity: StaticKeypair::from_seed(seed),
            role: Role::Client,
            expected_peer_static: None,
            ephemeral: None,
            peer_static_pub: None,
            tx: None,
            rx: None,
            audio_seq: 0,
            encode_state: AdpcmState::new(),
            decode_state: AdpcmState::new(),
            state: SessionState::Idle,
            handshake_ready: false,
            handshake_complete: false,
            handshake_acknowledged: false,
            outbound_encrypted: false,
            inbound_encrypted: false,
            peer_accepts_encrypt: false,
            peer_sends_encrypt: false,
            remote_hangup_requested: false,
            pending_handshake_response: false,
            session_started_ms: 0,
            last_handshake_ms: None,
            last_keepalive_ms: None,
        }
    }

    pub fn static_public_key(&self) -> [u8; 32] {
        self.identity.public_bytes()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handshake_ready(&self) -> bool {
        self.handshake_ready
    }

    pub fn handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    pub fn handshake_acknowledged(&self) -> bool {
        self.handshake_acknowledged
    }

    /// Returns and clears the remote-hangup flag (`consume_remote_hangup`).
    pub fn consume_remote_hangup(&mut self) -> bool {
        std::mem::take(&mut self.remote_hangup_requested)
    }

    pub fn outbound_encrypted(&self) -> bool {
        self.outbound_encrypted
    }

    pub fn inbound_encrypted(&self) -> bool {
        self.inbound_encrypted
    }

    pub fn peer_static_pub(&self) -> Option<[u8; 32]> {
        self.peer_static_pub
    }

    pub fn session_started_ms(&self) -> u64 {
        self.session_started_ms
    }

    /// `start_as_role`: reset all per-session fields (identity keys are
    /// preserved), generate a fresh ephemeral, and move to
    /// `HandshakeReady`.
    pub fn start_as_role(&mut self, role: Role, expected_peer_static: Option<[u8; 32]>, now_ms: u64) {
        self.role = role;
        self.expected_peer_static = expected_peer_static;
        self.ephemeral = Some(StaticKeypair::generate());
        self.peer_static_pub = None;
        self.tx = None;
        self.rx = None;
        self.audio_seq = 0;
        self.encode_state = AdpcmState::new();
        self.decode_state = AdpcmState::new();
        self.handshake_ready = true;
        self.handshake_complete = false;
        self.handshake_acknowledged = false;
        self.outbound_encrypted = false;
        self.inbound_encrypted = false;
        self.peer_accepts_encrypt = false;
        self.peer_sends_encrypt = false;
        self.remote_hangup_requested = false;
        self.pending_handshake_response = false;
        self.session_started_ms = now_ms;
        self.last_handshake_ms = None;
        self.last_keepalive_ms = None;
        self.state = SessionState::HandshakeReady;
    }

    /// `stop()`: move to `Terminating`. Ephemeral keys and AEAD sessions
    /// are dropped here, zeroizing on the way out.
    pub fn stop(&mut self) {
        self.ephemeral = None;
        self.tx = None;
        self.rx = None;
        self.state = SessionState::Terminating;
    }

    fn build_handshake_payload(&self, cfg: &ConfigSnapshot) -> Result<HandshakePayload> {
        let ephemeral = self
            .ephemeral
            .as_ref()
            .ok_or_else(|| Error::protocol("no ephemeral keypair: session was never started"))?;
        let mut capabilities = 0u8;
        if cfg.encrypt() {
            capabilities |= CAP_WILL_ENCRYPT_OUTBOUND;
        }
        if cfg.decrypt() {
            capabilities |= CAP_REQUIRE_ENCRYPTED_INBOUND;
        }
        Ok(HandshakePayload::new(
            self.role,
            capabilities,
            ephemeral.public_bytes(),
            self.identity.public_bytes(),
        ))
    }

    /// Build and AEAD-seal/plain-wrap one keepalive-or-audio-shaped body
    /// into the frame the tx thread should queue, per `outbound_encrypted`.
    ///
    /// §5: the config snapshot is consulted on every outbound frame, not
    /// just at handshake completion, so toggling `encrypt` mid-call takes
    /// effect on the very next frame without renegotiating.
    fn wrap_outbound(&mut self, cfg: &ConfigSnapshot, body: Vec<u8>) -> Result<Frame> {
        self.outbound_encrypted = cfg.encrypt() && self.peer_accepts_encrypt;
        if self.outbound_encrypted {
            let tx = self
                .tx
                .as_mut()
                .ok_or_else(|| Error::protocol("outbound_encrypted set with no tx session"))?;
            let (_, ct) = tx.seal_next(&body)?;
            Ok(Frame::new(FrameKind::Cipher, ct))
        } else {
            Ok(Frame::new(FrameKind::Plaintext, body))
        }
    }

    /// Drive the egress cadence: handshake retransmission until
    /// acknowledged, and keepalives once keys are derived. Returns the
    /// frames (if any) the tx thread should queue this tick.
    pub fn egress_tick(&mut self, cfg: &ConfigSnapshot, clock: &Clock) -> Result<Vec<Frame>> {
        let now_ms = clock.now_ms();
        let mut out = Vec::new();

        if matches!(self.state, SessionState::Terminating | SessionState::Idle) {
            return Ok(out);
        }

        let handshake_due = self.pending_handshake_response
            || (!self.handshake_acknowledged
                && match self.last_handshake_ms {
                    None => true,
                    Some(last) => clock.elapsed_at_least(last, cfg.handshake_retry_ms()),
                });
        if handshake_due {
            self.pending_handshake_response = false;
            out.push(Frame::new(
                FrameKind::Handshake,
                self.build_handshake_payload(cfg)?.encode().to_vec(),
            ));
            self.last_handshake_ms = Some(now_ms);
        }

        let keepalive_due = self.handshake_complete
            && match self.last_keepalive_ms {
                None => true,
                Some(last) => clock.elapsed_at_least(last, cfg.keepalive_interval_ms()),
            };
        if keepalive_due {
            out.push(self.wrap_outbound(cfg, vec![CONTROL_KEEPALIVE])?);
            self.last_keepalive_ms = Some(now_ms);
        }

        Ok(out)
    }

    /// Encode one 320-sample audio block using the persistent encode
    /// state and wrap it per the live `encrypt` config, per
    /// `outbound_encrypted`.
    pub fn encode_audio_frame(&mut self, cfg: &ConfigSnapshot, samples: &[i16]) -> Result<Frame> {
        if !self.handshake_complete {
            return Err(Error::protocol("cannot encode audio before handshake completes"));
        }
        let adpcm = svx_audio::encode_frame(&mut self.encode_state, samples)?;
        let seq = self.audio_seq;
        self.audio_seq = self.audio_seq.wrapping_add(1);
        let body = build_audio_plaintext(seq, samples.len() as u16, &adpcm);
        self.wrap_outbound(cfg, body)
    }

    /// `send_hangup()`: enqueue a plain, unencrypted hangup control
    /// frame and move to `Terminating`. The caller (engine) is
    /// responsible for clearing the outbound ring before/with this call.
    pub fn send_hangup(&mut self) -> Frame {
        self.state = SessionState::Terminating;
        Frame::new(FrameKind::Control, vec![CONTROL_HANGUP])
    }

    /// Handle one received frame, advancing the state machine and
    /// returning what the host should do about it.
    pub fn handle_frame(&mut self, frame: &Frame, cfg: &ConfigSnapshot) -> Result<Dispatched> {
        match frame.kind {
            FrameKind::Handshake => {
                self.on_handshake_received(&frame.body, cfg)?;
                Ok(Dispatched::None)
            }
            FrameKind::Control => {
                if frame.body.first() == Some(&CONTROL_HANGUP) {
                    self.remote_hangup_requested = true;
                    Ok(Dispatched::RemoteHangup)
                } else {
                    Ok(Dispatched::None)
                }
            }
            FrameKind::Plaintext => {
                self.inbound_encrypted = cfg.decrypt() && self.peer_sends_encrypt;
                self.dispatch_body(&frame.body, false)
            }
            FrameKind::Cipher => {
                self.inbound_encrypted = cfg.decrypt() && self.peer_sends_encrypt;
                let rx = self
                    .rx
                    .as_mut()
                    .ok_or_else(|| Error::protocol("received a cipher frame with no rx session"))?;
                // §4.1: the rx counter advances even on failure; a
                // decrypt failure is a hard, session-fatal error.
                let plaintext = rx.open_next(&frame.body)?;
                self.dispatch_body(&plaintext, true)
            }
        }
    }

    fn dispatch_body(&mut self, body: &[u8], was_aead: bool) -> Result<Dispatched> {
        match body.first() {
            Some(&AUDIO_FRAME_TYPE) => {
                if was_aead {
                    self.note_aead_decrypt_success();
                }
                let (header, adpcm) = parse_audio_plaintext(body)?;
                let samples = svx_audio::decode_frame(
                    &mut self.decode_state,
                    &audio_wire_frame(&header, adpcm),
                    header.sample_count as usize,
                )?;
                Ok(Dispatched::Audio(samples))
            }
            Some(&CONTROL_KEEPALIVE) => {
                if was_aead {
                    self.note_aead_decrypt_success();
                }
                Ok(Dispatched::None)
            }
            _ => Ok(Dispatched::None),
        }
    }

    fn note_aead_decrypt_success(&mut self) {
        if !self.handshake_acknowledged {
            self.handshake_acknowledged = true;
            self.state = SessionState::Active;
        }
    }

    fn on_handshake_received(&mut self, body: &[u8], cfg: &ConfigSnapshot) -> Result<()> {
        let payload = match HandshakePayload::decode(body) {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!("malformed handshake payload: ignoring");
                return Ok(());
            }
        };
        if payload.version != svx_crypto::handshake::VERSION {
            tracing::warn!(version = payload.version, "unsupported handshake version: ignoring");
            return Ok(());
        }
        if let Some(expected) = self.expected_peer_static {
            if expected != payload.static_pub {
                return Err(Error::protocol("peer static key does not match expected_peer_static"));
            }
        }

        let ephemeral = self
            .ephemeral
            .as_ref()
            .ok_or_else(|| Error::protocol("handshake received before start_as_role"))?;
        let keys = derive_transport_keys(
            self.role,
            &self.identity,
            ephemeral,
            &payload.static_pub,
            &payload.ephemeral_pub,
        )?;

        self.peer_static_pub = Some(payload.static_pub);
        self.peer_accepts_encrypt = payload.capabilities & CAP_WILL_ENCRYPT_OUTBOUND != 0;
        self.peer_sends_encrypt = payload.capabilities & CAP_REQUIRE_ENCRYPTED_INBOUND != 0;
        self.outbound_encrypted = cfg.encrypt() && self.peer_accepts_encrypt;
        self.inbound_encrypted = cfg.decrypt() && self.peer_sends_encrypt;

        self.tx = Some(AeadSession::new(keys.tx_key, keys.tx_nonce_base));
        self.rx = Some(AeadSession::new(keys.rx_key, keys.rx_nonce_base));

        self.handshake_complete = true;
        self.pending_handshake_response = true;
        self.state = SessionState::KeysDerived;
        Ok(())
    }
}

/// Rebuild the `{predictor, index, reserved}` + nibble-packed wire layout
/// `svx_audio::decode_frame` expects from a parsed audio-cipher header.
/// The preamble isn't carried in `AudioFrameHeader` (it lives inside the
/// ADPCM body itself per §3), so this just passes the ADPCM bytes through
/// unchanged — kept as a named seam in case the two layouts ever diverge.
fn audio_wire_frame(_header: &AudioFrameHeader, adpcm: &[u8]) -> Vec<u8> {
    adpcm.to_vec()
}
