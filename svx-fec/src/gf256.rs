//! GF(2^8) arithmetic for primitive polynomial `x^8 + x^4 + x^3 + x^2 + 1`
//! (0x11D), the field RS(255,223) is built over (§4.6).

use std::sync::OnceLock;

use crate::error::{Error, Result};

/// `0x11D` with the implicit leading `x^8` term dropped (standard
/// reduction-polynomial representation).
const PRIMITIVE: u16 = 0x11D;

/// The generator element used throughout this module (`alpha = 2`).
pub const ALPHA: u8 = 2;

struct Tables {
    /// `exp[i] = alpha^i`, extended to 512 entries so `exp[a + b]` never
    /// needs an explicit modulo when `a, b < 256`.
    exp: [u8; 512],
    /// `log[x] = i` such that `alpha^i == x`, for `x != 0`. `log[0]` is
    /// unused (never looked up).
    log: [u8; 256],
}

impl Tables {
    fn build() -> Self {
        let mut exp = [0u8; 512];
        let mut log = [0u8; 256];
        let mut x: u16 = 1;
        for i in 0..255usize {
            exp[i] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & 0x100 != 0 {
                x ^= PRIMITIVE;
            }
        }
        for i in 255..512 {
            exp[i] = exp[i - 255];
        }
        Self { exp, log }
    }
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(Tables::build)
}

/// `a * b` in GF(2^8).
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = tables();
    let sum = t.log[a as usize] as usize + t.log[b as usize] as usize;
    t.exp[sum]
}

/// `a / b` in GF(2^8). Errors if `b == 0`.
pub fn div(a: u8, b: u8) -> Result<u8> {
    if b == 0 {
        return Err(Error::InvalidLength("division by zero in GF(2^8)".into()));
    }
    if a == 0 {
        return Ok(0);
    }
    let t = tables();
    let diff = t.log[a as usize] as isize - t.log[b as usize] as isize;
    let idx = diff.rem_euclid(255) as usize;
    Ok(t.exp[idx])
}

/// `a^e` in GF(2^8).
pub fn pow(a: u8, e: u32) -> u8 {
    if a == 0 {
        return if e == 0 { 1 } else { 0 };
    }
    let t = tables();
    let log_a = t.log[a as usize] as u64;
    let idx = ((log_a * e as u64) % 255) as usize;
    t.exp[idx]
}

/// The multiplicative inverse of `a`. Errors if `a == 0`.
pub fn inv(a: u8) -> Result<u8> {
    div(1, a)
}

/// `alpha^e`, computed directly from the extended exponent table.
pub fn alpha_pow(e: i64) -> u8 {
    let idx = e.rem_euclid(255) as usize;
    tables().exp[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_by_zero_is_zero() {
        assert_eq!(mul(0, 200), 0);
        assert_eq!(mul(200, 0), 0);
    }

    #[test]
    fn mul_by_one_is_identity() {
        for a in 0..=255u8 {
            assert_eq!(mul(a, 1), a);
        }
    }

    #[test]
    fn mul_matches_exp_log_identity() {
        for a in 1..=255u8 {
            for b in 1..=255u8 {
                let prod = mul(a, b);
                let quotient = div(prod, b).unwrap();
                assert_eq!(quotient, a);
            }
        }
    }

    #[test]
    fn inv_round_trips() {
        for a in 1..=255u8 {
            let inv_a = inv(a).unwrap();
            assert_eq!(mul(a, inv_a), 1);
        }
    }

    #[test]
    fn pow_matches_repeated_multiplication() {
        let mut acc = 1u8;
        for e in 0..20u32 {
            assert_eq!(pow(ALPHA, e), acc);
            acc = mul(acc, ALPHA);
        }
    }

    #[test]
    fn alpha_has_order_255() {
        assert_eq!(alpha_pow(0), 1);
        assert_eq!(alpha_pow(255), 1);
        assert_ne!(alpha_pow(1), 1);
    }

    #[test]
    fn div_by_zero_errors() {
        assert!(div(5, 0).is_err());
    }
}
