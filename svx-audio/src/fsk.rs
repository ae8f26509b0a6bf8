//! Reference 4-FSK audio-band modem (§4.7), used when the underlying
//! link cannot carry binary bytes directly and bytes must instead be
//! carried as tones inside the same 8 kHz PCM path the voice codec uses.
//!
//! Each byte is split into four 2-bit symbols, LSB-first, one symbol per
//! 80-sample (10 ms) block at 100 Bd. The modulator drives a continuous
//! phase accumulator across symbol boundaries so there is no phase
//! discontinuity — and hence no click — at symbol edges. The demodulator
//! runs a four-bin Goertzel filter bank per block and picks the carrier
//! with the most energy, rejecting blocks whose peak power falls below a
//! tunable threshold as silence.

use std::f64::consts::{PI, TAU};

use svx_core::ring::RingBuffer;

/// PCM sample rate shared with the voice codec.
pub const SAMPLE_RATE: u32 = 8_000;
/// Symbol rate in baud.
pub const SYMBOL_RATE: u32 = 100;
/// Samples per symbol: `SAMPLE_RATE / SYMBOL_RATE`.
pub const SAMPLES_PER_SYMBOL: usize = (SAMPLE_RATE / SYMBOL_RATE) as usize;
/// Carrier frequencies for the four 2-bit symbol values, in Hz.
pub const CARRIERS_HZ: [f64; 4] = [1200.0, 1600.0, 2000.0, 2400.0];
/// Peak sample amplitude used by the modulator.
pub const AMPLITUDE: f64 = 16_000.0;
/// Default Goertzel power threshold below which a block is silence.
pub const DEFAULT_POWER_THRESHOLD: f32 = 1.0e6;

/// Continuous-phase 4-FSK modulator.
#[derive(Debug, Clone, Copy)]
pub struct FskModulator {
    phase: f64,
}

impl Default for FskModulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FskModulator {
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Modulate a single 2-bit symbol (only the low two bits are used)
    /// into one `SAMPLES_PER_SYMBOL`-sample block.
    pub fn modulate_symbol(&mut self, symbol: u8) -> [i16; SAMPLES_PER_SYMBOL] {
        let freq = CARRIERS_HZ[(symbol & 0x3) as usize];
        let step = TAU * freq / SAMPLE_RATE as f64;
        let mut out = [0i16; SAMPLES_PER_SYMBOL];
        for s in out.iter_mut() {
            *s = (AMPLITUDE * self.phase.sin()).round() as i16;
            self.phase += step;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
        out
    }

    /// Modulate one byte into four symbol blocks, LSB-first: the low two
    /// bits become the first symbol transmitted.
    pub fn modulate_byte(&mut self, byte: u8) -> Vec<i16> {
        let mut out = Vec::with_capacity(SAMPLES_PER_SYMBOL * 4);
        for i in 0..4u8 {
            let symbol = (byte >> (i * 2)) & 0x3;
            out.extend_from_slice(&self.modulate_symbol(symbol));
        }
        out
    }
}

/// Goertzel-filter-bank 4-FSK demodulator.
#[derive(Debug, Clone)]
pub struct FskDemodulator {
    power_threshold: f32,
    block: Vec<i16>,
    nibble: u8,
    symbol_slot: u8,
}

impl FskDemodulator {
    pub fn new(power_threshold: f32) -> Self {
        Self {
            power_threshold,
            block: Vec::with_capacity(SAMPLES_PER_SYMBOL),
            nibble: 0,
            symbol_slot: 0,
        }
    }

    pub fn reset(&mut self) {
        self.block.clear();
        self.nibble = 0;
        self.symbol_slot = 0;
    }

    /// Feed PCM samples; returns any bytes fully assembled as a result.
    /// Blocks whose peak Goertzel power falls below the threshold are
    /// treated as silence and do not advance the symbol accumulator.
    pub fn push_samples(&mut self, samples: &[i16]) -> Vec<u8> {
        let mut out = Vec::new();
        for &s in samples {
            self.block.push(s);
            if self.block.len() == SAMPLES_PER_SYMBOL {
                if let Some(symbol) = detect_symbol(&self.block, self.power_threshold) {
                    self.nibble |= symbol << (self.symbol_slot * 2);
                    self.symbol_slot += 1;
                    if self.symbol_slot == 4 {
                        out.push(self.nibble);
                        self.nibble = 0;
                        self.symbol_slot = 0;
                    }
                }
                self.block.clear();
            }
        }
        out
    }
}

fn goertzel_power(block: &[i16], freq: f64) -> f64 {
    let n = block.len() as f64;
    let k = (n * freq / SAMPLE_RATE as f64).round();
    let omega = 2.0 * PI * k / n;
    let coeff = 2.0 * omega.cos();
    let mut s_prev = 0.0f64;
    let mut s_prev2 = 0.0f64;
    for &sample in block {
        let s = sample as f64 + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }
    s_prev * s_prev + s_prev2 * s_prev2 - coeff * s_prev * s_prev2
}

fn detect_symbol(block: &[i16], power_threshold: f32) -> Option<u8> {
    let mut best_idx = 0usize;
    let mut best_power = -1.0f64;
    for (i, &freq) in CARRIERS_HZ.iter().enumerate() {
        let power = goertzel_power(block, freq);
        if power > best_power {
            best_power = power;
            best_idx = i;
        }
    }
    if best_power > power_threshold as f64 {
        Some(best_idx as u8)
    } else {
        None
    }
}

/// A modulator/demodulator pair with the byte-level queues a scheduler
/// thread drains and fills. State (phase, symbol accumulator, nibble
/// counter, both rings) resets together whenever a session starts.
pub struct FskModem {
    modulator: FskModulator,
    demodulator: FskDemodulator,
    tx_samples: RingBuffer<i16>,
    rx_bytes: RingBuffer<u8>,
}

impl FskModem {
    pub fn new(power_threshold: f32, ring_capacity: usize) -> Self {
        Self {
            modulator: FskModulator::new(),
            demodulator: FskDemodulator::new(power_threshold),
            tx_samples: RingBuffer::new(ring_capacity),
            rx_bytes: RingBuffer::new(ring_capacity),
        }
    }

    /// Reset all modem state: phase to zero, symbol/nibble accumulators
    /// to zero, and both rings cleared.
    pub fn reset(&mut self) {
        self.modulator.reset();
        self.demodulator.reset();
        self.tx_samples.clear();
        self.rx_bytes.clear();
    }

    /// Modulate outgoing bytes and enqueue their PCM samples for playback.
    pub fn send_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            for s in self.modulator.modulate_byte(b) {
                self.tx_samples.push(s);
            }
        }
    }

    /// Drain up to `buf.len()` pending outgoing PCM samples, returning how
    /// many were written.
    pub fn pull_samples(&mut self, buf: &mut [i16]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.tx_samples.pop() {
                Some(s) => {
                    buf[n] = s;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Feed incoming PCM samples into the demodulator, queuing any fully
    /// decoded bytes.
    pub fn push_samples(&mut self, samples: &[i16]) {
        for b in self.demodulator.push_samples(samples) {
            self.rx_bytes.push(b);
        }
    }

    /// Drain up to `buf.len()` pending decoded bytes, returning how many
    /// were written.
    pub fn pull_bytes(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.rx_bytes.pop() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trips_through_modulate_demodulate() {
        let mut modulator = FskModulator::new();
        let mut demodulator = FskDemodulator::new(DEFAULT_POWER_THRESHOLD);

        let samples = modulator.modulate_byte(0xC3);
        assert_eq!(samples.len(), SAMPLES_PER_SYMBOL * 4);

        let bytes = demodulator.push_samples(&samples);
        assert_eq!(bytes, vec![0xC3]);
    }

    #[test]
    fn symbol_ordering_is_lsb_first() {
        let mut modulator = FskModulator::new();
        // 0b11000011: symbols (LSB-first) are 3, 0, 0, 3.
        let samples = modulator.modulate_byte(0b1100_0011);
        let first_block = &samples[..SAMPLES_PER_SYMBOL];
        let last_block = &samples[SAMPLES_PER_SYMBOL * 3..];
        let sym0 = detect_symbol(first_block, DEFAULT_POWER_THRESHOLD).unwrap();
        let sym3 = detect_symbol(last_block, DEFAULT_POWER_THRESHOLD).unwrap();
        assert_eq!(sym0, 3);
        assert_eq!(sym3, 3);
    }

    #[test]
    fn silence_is_rejected_below_threshold() {
        let silence = [0i16; SAMPLES_PER_SYMBOL];
        assert_eq!(detect_symbol(&silence, DEFAULT_POWER_THRESHOLD), None);
    }

    #[test]
    fn multi_byte_stream_round_trips() {
        let mut modulator = FskModulator::new();
        let mut demodulator = FskDemodulator::new(DEFAULT_POWER_THRESHOLD);
        let message = b"Hi!";
        let mut samples = Vec::new();
        for &b in message {
            samples.extend(modulator.modulate_byte(b));
        }
        let decoded = demodulator.push_samples(&samples);
        assert_eq!(decoded, message.to_vec());
    }

    #[test]
    fn modem_send_and_pull_round_trips_via_loopback() {
        let mut modem = FskModem::new(DEFAULT_POWER_THRESHOLD, 4096);
        modem.send_bytes(b"ok");
        let mut pcm = vec![0i16; SAMPLES_PER_SYMBOL * 8];
        let n = modem.pull_samples(&mut pcm);
        assert_eq!(n, SAMPLES_PER_SYMBOL * 8);

        modem.push_samples(&pcm[..n]);
        let mut out = [0u8; 8];
        let got = modem.pull_bytes(&mut out);
        assert_eq!(&out[..got], b"ok");
    }

    #[test]
    fn reset_clears_phase_and_rings() {
        let mut modem = FskModem::new(DEFAULT_POWER_THRESHOLD, 16);
        modem.send_bytes(b"x");
        modem.reset();
        let mut buf = [0i16; 8];
        assert_eq!(modem.pull_samples(&mut buf), 0);
    }
}
