//! Systematic Reed-Solomon RS(255,223) over GF(2^8), shortened for any
//! `data_len in [1,223]` (§4.6). Primitive polynomial and consecutive
//! roots `alpha^1..alpha^32` come from `gf256`; this module builds the
//! generator polynomial, the systematic encoder, and the full
//! syndrome/Berlekamp-Massey/Chien/Forney decode pipeline.
//!
//! Shortening convention (§4.6/§9): a block with `data_len < 223` is
//! treated as if `223 - data_len` leading (high-order) data symbols were
//! present and equal to zero, but those virtual symbols are never
//! transmitted. Evaluating a codeword polynomial via Horner's method is
//! insensitive to un-transmitted leading zero coefficients, so the encoder
//! and decoder below operate directly on the `data_len + 32`-byte wire
//! representation without materializing the virtual padding — the
//! resulting syndromes and Chien-search roots are exactly the ones a full
//! 255-symbol block would produce, restricted to the positions actually on
//! the wire.

use crate::error::{Error, Result};
use crate::gf256;
use crate::poly;

/// Total codeword length of an unshortened block.
pub const N: usize = 255;
/// Number of parity (Reed-Solomon check) symbols appended to every block.
pub const PARITY_LEN: usize = 32;
/// Largest `data_len` a single block may carry before shortening is needed.
pub const MAX_DATA_LEN: usize = N - PARITY_LEN;
/// Upper bound on the number of symbol errors a block can correct.
pub const MAX_CORRECTABLE: usize = PARITY_LEN / 2;

/// Build the degree-`nsym` generator polynomial
/// `g(x) = prod_{i=0..nsym-1} (x - alpha^(1+i))`, highest-degree-first.
/// In GF(2^8) subtraction is addition, so each factor is `[1, alpha^(1+i)]`.
fn generator_poly(nsym: usize) -> Vec<u8> {
    let mut g = vec![1u8];
    for i in 0..nsym {
        let root = gf256::alpha_pow((i + 1) as i64);
        g = poly::mul(&g, &[1, root]);
    }
    g
}

/// Systematic RS encode: append `PARITY_LEN` parity bytes to `data`.
/// `data.len()` must be in `[1, MAX_DATA_LEN]`; shorter inputs produce a
/// shortened block per the module-level convention.
pub fn encode(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() || data.len() > MAX_DATA_LEN {
        return Err(Error::InvalidLength(format!(
            "rs255 data length must be in 1..={MAX_DATA_LEN}, got {}",
            data.len()
        )));
    }
    let gen = generator_poly(PARITY_LEN);
    // Classic systematic long-division encode: treat `data` followed by
    // PARITY_LEN zero bytes as the dividend, XOR-reduce by `gen` in place;
    // what remains in the trailing PARITY_LEN slots is the remainder
    // (the parity). Leading coefficients beyond `data.len()` are never
    // materialized, which is exactly the shortened-code convention above.
    let mut buf = vec![0u8; data.len() + PARITY_LEN];
    buf[..data.len()].copy_from_slice(data);
    for i in 0..data.len() {
        let coef = buf[i];
        if coef != 0 {
            for (j, &g) in gen.iter().enumerate() {
                buf[i + j] ^= gf256::mul(g, coef);
            }
        }
    }
    let mut out = Vec::with_capacity(data.len() + PARITY_LEN);
    out.extend_from_slice(data);
    out.extend_from_slice(&buf[data.len()..]);
    Ok(out)
}

/// `S_{j+1} = codeword(alpha^(j+1))` for `j in 0..nsym`, ascending order
/// (`synd[0] == S_1`). Computed directly on the wire bytes: see the
/// module-level note on why shortening needs no explicit padding here.
fn syndromes(codeword: &[u8], nsym: usize) -> Vec<u8> {
    (0..nsym)
        .map(|j| poly::eval(codeword, gf256::alpha_pow((j + 1) as i64)))
        .collect()
}

/// Evaluate an ascending-order polynomial (`p[i]` is the coefficient of
/// `x^i`) at `x`. Used only inside the decoder, where Berlekamp-Massey and
/// Forney's algorithm are conventionally expressed in ascending order.
fn eval_ascending(p: &[u8], x: u8) -> u8 {
    let mut result = 0u8;
    let mut power = 1u8;
    for &c in p {
        result ^= gf256::mul(c, power);
        power = gf256::mul(power, x);
    }
    result
}

/// `p(x) * q(x)` for ascending-order polynomials.
fn mul_ascending(p: &[u8], q: &[u8]) -> Vec<u8> {
    if p.is_empty() || q.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0u8; p.len() + q.len() - 1];
    for (i, &pi) in p.iter().enumerate() {
        if pi == 0 {
            continue;
        }
        for (j, &qj) in q.iter().enumerate() {
            out[i + j] ^= gf256::mul(pi, qj);
        }
    }
    out
}

/// Berlekamp-Massey over the syndrome sequence, textbook formulation
/// (discrepancy `delta`, length update `L := n+1-L` when `2L <= n`, §4.6).
/// Returns the error-locator polynomial `sigma(x)` in ascending order
/// (`sigma[0] == 1`), or `Uncorrectable` if its degree exceeds
/// `MAX_CORRECTABLE`.
fn berlekamp_massey(synd: &[u8], nsym: usize) -> Result<Vec<u8>> {
    let mut c = vec![1u8];
    let mut b = vec![1u8];
    let mut l = 0usize;
    let mut m = 1usize;
    let mut b_coef = 1u8;

    for n in 0..nsym {
        let mut delta = synd[n];
        for i in 1..=l {
            if i < c.len() {
                delta ^= gf256::mul(c[i], synd[n - i]);
            }
        }
        if delta == 0 {
            m += 1;
        } else {
            let scale = gf256::mul(delta, gf256::inv(b_coef)?);
            if 2 * l <= n {
                let t = c.clone();
                xor_shifted_scaled(&mut c, &b, m, scale);
                l = n + 1 - l;
                b = t;
                b_coef = delta;
                m = 1;
            } else {
                xor_shifted_scaled(&mut c, &b, m, scale);
                m += 1;
            }
        }
    }

    if l > MAX_CORRECTABLE {
        return Err(Error::Uncorrectable);
    }
    if c.len() > l + 1 {
        c.truncate(l + 1);
    } else {
        c.resize(l + 1, 0);
    }
    Ok(c)
}

/// `c(x) ^= scale * x^shift * b(x)`, growing `c` as needed.
fn xor_shifted_scaled(c: &mut Vec<u8>, b: &[u8], shift: usize, scale: u8) {
    let needed = shift + b.len();
    if c.len() < needed {
        c.resize(needed, 0);
    }
    for (i, &bi) in b.iter().enumerate() {
        c[shift + i] ^= gf256::mul(bi, scale);
    }
}

/// The exponent `e` such that `alpha^e` is the inverse of the error
/// locator value at transmitted position `pos` in a block of `msg_len`
/// bytes (position 0 = first/highest-order transmitted byte).
fn inverse_locator_exponent(pos: usize, msg_len: usize) -> i64 {
    pos as i64 - msg_len as i64 + 1
}

/// Chien search: the positions (0-indexed into the transmitted codeword)
/// at which `sigma(X_pos^-1) == 0`, i.e. the error locations. Only
/// positions actually present in the (possibly shortened) block are
/// tried, per §4.6 step 3.
fn chien_search(sigma: &[u8], msg_len: usize) -> Result<Vec<usize>> {
    let errs = sigma.len() - 1;
    let mut positions = Vec::with_capacity(errs);
    for pos in 0..msg_len {
        let x = gf256::alpha_pow(inverse_locator_exponent(pos, msg_len));
        if eval_ascending(sigma, x) == 0 {
            positions.push(pos);
        }
    }
    if positions.len() != errs {
        return Err(Error::Uncorrectable);
    }
    Ok(positions)
}

/// Formal derivative of `sigma(x)` in characteristic 2: only odd-degree
/// terms survive (§4.6 step 4), each contributing its coefficient one
/// degree lower.
fn formal_derivative(sigma: &[u8]) -> Vec<u8> {
    if sigma.len() <= 1 {
        return Vec::new();
    }
    let mut deriv = vec![0u8; sigma.len() - 1];
    let mut i = 1;
    while i < sigma.len() {
        deriv[i - 1] = sigma[i];
        i += 2;
    }
    deriv
}

/// Decode a (possibly shortened) RS(255,223) block. Returns the original
/// data and the number of symbol errors corrected (0 if the block was
/// already clean), or `Uncorrectable` if the block carries more errors
/// than `MAX_CORRECTABLE` or re-verification fails.
pub fn decode(received: &[u8]) -> Result<(Vec<u8>, usize)> {
    if received.len() <= PARITY_LEN || received.len() > N {
        return Err(Error::InvalidLength(format!(
            "rs255 codeword length must be in {}..={N}, got {}",
            PARITY_LEN + 1,
            received.len()
        )));
    }
    let data_len = received.len() - PARITY_LEN;
    let mut msg = received.to_vec();

    let synd = syndromes(&msg, PARITY_LEN);
    if synd.iter().all(|&s| s == 0) {
        return Ok((msg[..data_len].to_vec(), 0));
    }

    let sigma = berlekamp_massey(&synd, PARITY_LEN)?;
    let errs = sigma.len() - 1;
    if errs == 0 {
        // Nonzero syndromes but a degree-0 locator is internally
        // inconsistent; treat as uncorrectable rather than silently
        // returning the untouched (still corrupt) message.
        return Err(Error::Uncorrectable);
    }

    let err_positions = chien_search(&sigma, msg.len())?;

    let omega: Vec<u8> = mul_ascending(&synd, &sigma)
        .into_iter()
        .take(PARITY_LEN)
        .collect();
    let sigma_deriv = formal_derivative(&sigma);

    for &pos in &err_positions {
        let exponent = inverse_locator_exponent(pos, msg.len());
        let xi = gf256::alpha_pow(exponent);
        let numerator = eval_ascending(&omega, xi);
        let denominator = eval_ascending(&sigma_deriv, xi);
        if denominator == 0 {
            return Err(Error::Uncorrectable);
        }
        // First-consecutive-root is alpha^1 (fcr=1), so the X_pos^(1-fcr)
        // factor in Forney's formula is X_pos^0 == 1 and drops out.
        let magnitude = gf256::div(numerator, denominator)?;
        msg[pos] ^= magnitude;
    }

    let verify = syndromes(&msg, PARITY_LEN);
    if !verify.iter().all(|&s| s == 0) {
        return Err(Error::Uncorrectable);
    }

    Ok((msg[..data_len].to_vec(), errs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_appends_parity_length() {
        let data = [1u8, 2, 3];
        let cw = encode(&data).unwrap();
        assert_eq!(cw.len(), data.len() + PARITY_LEN);
        assert_eq!(&cw[..3], &data);
    }

    #[test]
    fn encode_rejects_empty_and_oversized() {
        assert!(encode(&[]).is_err());
        assert!(encode(&[0u8; MAX_DATA_LEN + 1]).is_err());
        assert!(encode(&[0u8; MAX_DATA_LEN]).is_ok());
    }

    #[test]
    fn decode_clean_codeword_reports_zero_corrections() {
        let data = [5u8, 6, 7, 8, 9];
        let cw = encode(&data).unwrap();
        let (out, corrected) = decode(&cw).unwrap();
        assert_eq!(out, data);
        assert_eq!(corrected, 0);
    }

    /// Boundary scenario 5 (spec.md §8): single-bit flip in a shortened
    /// 3-data-byte block is corrected and reported as exactly 1 error.
    #[test]
    fn single_bit_flip_is_corrected() {
        let data = [0x01u8, 0x02, 0x03];
        let mut cw = encode(&data).unwrap();
        assert_eq!(cw.len(), 35);
        cw[1] ^= 0x01;
        let (out, corrected) = decode(&cw).unwrap();
        assert_eq!(out, data);
        assert_eq!(corrected, 1);
    }

    #[test]
    fn sixteen_errors_are_still_correctable() {
        let data = vec![0xAAu8; 223];
        let mut cw = encode(&data).unwrap();
        for i in 0..16 {
            cw[i * 2] ^= 0xFF;
        }
        let (out, corrected) = decode(&cw).unwrap();
        assert_eq!(out, data);
        assert_eq!(corrected, 16);
    }

    /// Boundary scenario 6 (spec.md §8): 17 flipped bytes exceed the
    /// 16-symbol correction bound and must return the failure sentinel.
    #[test]
    fn seventeen_errors_are_uncorrectable() {
        let data = vec![0x00u8; 100];
        let mut cw = encode(&data).unwrap();
        for i in 0..17 {
            cw[i] ^= 0xFF;
        }
        assert!(matches!(decode(&cw), Err(Error::Uncorrectable)));
    }

    #[test]
    fn decode_rejects_short_or_long_input() {
        assert!(decode(&[0u8; PARITY_LEN]).is_err());
        assert!(decode(&[0u8; N + 1]).is_err());
    }

    proptest! {
        #[test]
        fn prop_roundtrip_no_errors(data in prop::collection::vec(any::<u8>(), 1..=MAX_DATA_LEN)) {
            let cw = encode(&data).unwrap();
            let (out, corrected) = decode(&cw).unwrap();
            prop_assert_eq!(out, data);
            prop_assert_eq!(corrected, 0);
        }

        #[test]
        fn prop_roundtrip_up_to_sixteen_errors(
            data in prop::collection::vec(any::<u8>(), 1..=MAX_DATA_LEN),
            error_count in 1usize..=MAX_CORRECTABLE,
            seed in any::<u64>(),
        ) {
            let mut cw = encode(&data).unwrap();
            let mut positions: Vec<usize> = (0..cw.len()).collect();
            // Deterministic pseudo-shuffle from the proptest-supplied seed,
            // good enough to scatter error positions without pulling in a
            // full RNG dependency just for this property.
            let mut state = seed | 1;
            for i in (1..positions.len()).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                let j = (state >> 33) as usize % (i + 1);
                positions.swap(i, j);
            }
            for &pos in positions.iter().take(error_count) {
                cw[pos] ^= 0xFF;
            }
            let (out, corrected) = decode(&cw).unwrap();
            prop_assert_eq!(out, data);
            prop_assert_eq!(corrected, error_count);
        }
    }
}
