//! Runtime tunables that sit alongside the wire protocol: the
//! `encrypt`/`decrypt`/`fsk_enabled` flags exposed through `set_config`, and
//! the handshake/keepalive/drain cadences and FSK power threshold that the
//! spec calls out by literal value but which a real deployment should be
//! able to override without recompiling.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub encrypt: bool,
    pub decrypt: bool,
    pub fsk_enabled: bool,
    pub fsk_power_threshold: f32,
    pub handshake_retry_ms: u64,
    pub keepalive_interval_ms: u64,
    pub hangup_drain_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            encrypt: true,
            decrypt: true,
            fsk_enabled: false,
            fsk_power_threshold: 1.0e6,
            handshake_retry_ms: 500,
            keepalive_interval_ms: 1000,
            hangup_drain_ms: 200,
        }
    }
}

impl SessionConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(Error::from)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(e.to_string()))
    }
}

/// The live configuration a running session consults. `encrypt`/`decrypt`/
/// `fsk_enabled` are exactly the fields `set_config`'s JSON body can toggle
/// mid-call (§6); the cadence/threshold fields are construction-time
/// tunables carried through from `SessionConfig` so the egress cadence and
/// the FSK power threshold are not hardcoded constants (§9 Open Question:
/// "FSK threshold tuning ... should expose it as a tunable rather than a
/// constant" — the same reasoning applies to the handshake-retry and
/// keepalive cadences §4.1/§9 call out by literal value). Everything here
/// is a plain atomic so the tx/rx threads can read it without taking the
/// session mutex.
#[derive(Debug)]
pub struct ConfigSnapshot {
    encrypt: AtomicBool,
    decrypt: AtomicBool,
    fsk_enabled: AtomicBool,
    handshake_retry_ms: AtomicU64,
    keepalive_interval_ms: AtomicU64,
    hangup_drain_ms: AtomicU64,
    fsk_power_threshold_bits: AtomicU32,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl ConfigSnapshot {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            encrypt: AtomicBool::new(cfg.encrypt),
            decrypt: AtomicBool::new(cfg.decrypt),
            fsk_enabled: AtomicBool::new(cfg.fsk_enabled),
            handshake_retry_ms: AtomicU64::new(cfg.handshake_retry_ms),
            keepalive_interval_ms: AtomicU64::new(cfg.keepalive_interval_ms),
            hangup_drain_ms: AtomicU64::new(cfg.hangup_drain_ms),
            fsk_power_threshold_bits: AtomicU32::new(cfg.fsk_power_threshold.to_bits()),
        }
    }

    pub fn encrypt(&self) -> bool {
        self.encrypt.load(Ordering::Relaxed)
    }

    pub fn decrypt(&self) -> bool {
        self.decrypt.load(Ordering::Relaxed)
    }

    pub fn fsk_enabled(&self) -> bool {
        self.fsk_enabled.load(Ordering::Relaxed)
    }

    /// Handshake retransmission interval (§4.1: "emit handshake frames at
    /// >=500 ms intervals").
    pub fn handshake_retry_ms(&self) -> u64 {
        self.handshake_retry_ms.load(Ordering::Relaxed)
    }

    /// Keepalive cadence once keys are derived (§4.1/§9: "emit keepalives
    /// ... at 1 s intervals").
    pub fn keepalive_interval_ms(&self) -> u64 {
        self.keepalive_interval_ms.load(Ordering::Relaxed)
    }

    /// How long `Scheduler::shutdown` waits for a queued hangup frame to
    /// reach the wire before tearing down (§5: "a bounded hangup-drain
    /// wait (~200 ms)").
    pub fn hangup_drain_ms(&self) -> u64 {
        self.hangup_drain_ms.load(Ordering::Relaxed)
    }

    /// Goertzel peak-power threshold below which an FSK block is silence
    /// (§4.7/§9).
    pub fn fsk_power_threshold(&self) -> f32 {
        f32::from_bits(self.fsk_power_threshold_bits.load(Ordering::Relaxed))
    }

    /// Apply `set_config`'s mid-call-toggleable fields (§6:
    /// `{encrypt, decrypt, fsk_enabled}`). The cadence/threshold tunables
    /// are construction-time only and are not part of this call.
    pub fn apply(&self, encrypt: bool, decrypt: bool, fsk_enabled: bool) {
        self.encrypt.store(encrypt, Ordering::Relaxed);
        self.decrypt.store(decrypt, Ordering::Relaxed);
        self.fsk_enabled.store(fsk_enabled, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_literal_spec_constants() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.handshake_retry_ms, 500);
        assert_eq!(cfg.keepalive_interval_ms, 1000);
        assert_eq!(cfg.hangup_drain_ms, 200);
        assert!((cfg.fsk_power_threshold - 1.0e6).abs() < 1.0);
    }

    #[test]
    fn toml_round_trip() {
        let toml_text = "encrypt = false\ndecrypt = true\nfsk_enabled = true\n";
        let cfg = SessionConfig::from_toml(toml_text).unwrap();
        assert!(!cfg.encrypt);
        assert!(cfg.decrypt);
        assert!(cfg.fsk_enabled);
        // omitted fields fall back to Default via #[serde(default)]
        assert_eq!(cfg.keepalive_interval_ms, 1000);
    }

    #[test]
    fn snapshot_carries_cadence_and_threshold_tunables() {
        let mut cfg = SessionConfig::default();
        cfg.handshake_retry_ms = 750;
        cfg.keepalive_interval_ms = 2000;
        cfg.fsk_power_threshold = 5.0e5;
        let snap = ConfigSnapshot::new(&cfg);
        assert_eq!(snap.handshake_retry_ms(), 750);
        assert_eq!(snap.keepalive_interval_ms(), 2000);
        assert!((snap.fsk_power_threshold() - 5.0e5).abs() < 1.0);
    }

    #[test]
    fn json_set_config_updates_snapshot() {
        let cfg = SessionConfig::default();
        let snap = ConfigSnapshot::new(&cfg);
        assert!(snap.encrypt());
        let updated = SessionConfig::from_json(r#"{"encrypt":false,"decrypt":false,"fsk_enabled":true}"#).unwrap();
        snap.apply(updated.encrypt, updated.decrypt, updated.fsk_enabled);
        assert!(!snap.encrypt());
        assert!(!snap.decrypt());
        assert!(snap.fsk_enabled());
    }
}
