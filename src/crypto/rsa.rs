//! rsa.rs — RSA PKCS#1 v1.5 signature verification
//!
//! Verification only: recover the encoded message with a public-exponent
//! modular exponentiation, then compare it against the expected
//! `0x00 0x01 FF… 0x00 ‖ DigestInfo ‖ digest` encoding for SHA-256.
//! The big-number arithmetic is fixed-width big-endian byte arrays with a
//! shift-and-add modular multiply; widths follow the modulus, so the same
//! routines serve the 2048-bit production key and small test vectors.
//! A mismatch anywhere yields `false` — never a panic, never an error.

use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;

use super::constant_time_eq;

/// Decoded public key: big-endian modulus plus exponent. Built once at
/// startup from the embedded constants (see `keys`).
pub struct RsaPublicKey {
    pub modulus: Vec<u8>,
    pub exponent: u32,
}

impl RsaPublicKey {
    /// Signature length must match the modulus length exactly.
    #[inline]
    pub fn signature_len(&self) -> usize {
        self.modulus.len()
    }
}

/// ASN.1 DigestInfo prefix for SHA-256 (RFC 8017 §9.2 note 1).
pub const SHA256_DIGEST_INFO: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0D, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
    0x05, 0x00, 0x04, 0x20,
];

/// Minimum modulus length for the encoding: 0x00 0x01, eight bytes of
/// padding, 0x00, DigestInfo, 32-byte digest.
pub const MIN_MODULUS_LEN: usize = 2 + 8 + 1 + SHA256_DIGEST_INFO.len() + 32;

/// True iff `signature` is a valid PKCS#1 v1.5 signature of `digest`
/// under `key`.
pub fn verify(digest: &[u8; 32], signature: &[u8], key: &RsaPublicKey) -> bool {
    let modulus = &key.modulus;
    if signature.len() != modulus.len() {
        return false;
    }
    // The signature is a number below the modulus by definition.
    if cmp_be(signature, modulus) != Ordering::Less {
        return false;
    }

    let recovered = mod_pow(signature, key.exponent, modulus);
    let expected = match encode_digest(digest, modulus.len()) {
        Some(em) => em,
        None => return false,
    };

    constant_time_eq(&recovered, &expected)
}

/// EMSA-PKCS1-v1_5 encoding of a SHA-256 digest at the given modulus
/// length. `None` if the modulus is too short to carry the encoding.
pub fn encode_digest(digest: &[u8; 32], modulus_len: usize) -> Option<Vec<u8>> {
    if modulus_len < MIN_MODULUS_LEN {
        return None;
    }
    let mut em = vec![0xFFu8; modulus_len];
    em[0] = 0x00;
    em[1] = 0x01;
    let info_start = modulus_len - 32 - SHA256_DIGEST_INFO.len();
    em[info_start - 1] = 0x00;
    em[info_start..info_start + SHA256_DIGEST_INFO.len()].copy_from_slice(&SHA256_DIGEST_INFO);
    em[modulus_len - 32..].copy_from_slice(digest);
    Some(em)
}

/// `base ^ exponent mod modulus`, square-and-multiply over the exponent
/// bits. Result width equals the modulus width.
pub fn mod_pow(base: &[u8], exponent: u32, modulus: &[u8]) -> Vec<u8> {
    let width = modulus.len();
    let mut result = vec![0u8; width];
    result[width - 1] = 1;

    if exponent == 0 {
        return result;
    }

    let base = reduce(base, modulus);
    let bits = 32 - exponent.leading_zeros();
    for i in (0..bits).rev() {
        result = mod_mul(&result, &result, modulus);
        if (exponent >> i) & 1 == 1 {
            result = mod_mul(&result, &base, modulus);
        }
    }
    result
}

/// `a * b mod m` via shift-and-add. Both operands already reduced.
fn mod_mul(a: &[u8], b: &[u8], m: &[u8]) -> Vec<u8> {
    let mut acc = vec![0u8; m.len()];
    for &byte in a {
        for bit in (0..8).rev() {
            shl1_mod(&mut acc, m);
            if (byte >> bit) & 1 == 1 {
                add_mod(&mut acc, b, m);
            }
        }
    }
    acc
}

/// Width-normalize `x` against `m` and bring it below `m`.
fn reduce(x: &[u8], m: &[u8]) -> Vec<u8> {
    let width = m.len();
    let mut out = vec![0u8; width];
    let src = if x.len() > width {
        // High bytes beyond the modulus width must be zero for the copy
        // to be exact; live values here never exceed the width.
        &x[x.len() - width..]
    } else {
        x
    };
    out[width - src.len()..].copy_from_slice(src);
    while cmp_be(&out, m) != Ordering::Less {
        sub_in_place(&mut out, m);
    }
    out
}

/// Double `x` in place, reducing mod `m`. `x < m` on entry.
fn shl1_mod(x: &mut [u8], m: &[u8]) {
    let mut carry = 0u8;
    for i in (0..x.len()).rev() {
        let next = x[i] >> 7;
        x[i] = (x[i] << 1) | carry;
        carry = next;
    }
    // 2x < 2m, so a single conditional subtract restores the invariant.
    // A carry out means the true value is 2^W + x, still below 2m.
    if carry == 1 || cmp_be(x, m) != Ordering::Less {
        sub_in_place(x, m);
    }
}

/// `x += b mod m`. Both below `m` on entry.
fn add_mod(x: &mut [u8], b: &[u8], m: &[u8]) {
    let mut carry = 0u16;
    for i in (0..x.len()).rev() {
        let sum = x[i] as u16 + b[i] as u16 + carry;
        x[i] = sum as u8;
        carry = sum >> 8;
    }
    if carry == 1 || cmp_be(x, m) != Ordering::Less {
        sub_in_place(x, m);
    }
}

/// `x -= m`, wrapping: the final borrow cancels a pending carry out.
fn sub_in_place(x: &mut [u8], m: &[u8]) {
    let mut borrow = 0u16;
    for i in (0..x.len()).rev() {
        let sub = m[i] as u16 + borrow;
        let xi = x[i] as u16;
        if xi >= sub {
            x[i] = (xi - sub) as u8;
            borrow = 0;
        } else {
            x[i] = (xi + 0x100 - sub) as u8;
            borrow = 1;
        }
    }
}

/// Big-endian magnitude compare, tolerant of differing leading-zero runs.
fn cmp_be(a: &[u8], b: &[u8]) -> Ordering {
    let a_trim = strip_leading_zeros(a);
    let b_trim = strip_leading_zeros(b);
    match a_trim.len().cmp(&b_trim.len()) {
        Ordering::Equal => a_trim.cmp(b_trim),
        other => other,
    }
}

fn strip_leading_zeros(x: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < x.len() && x[i] == 0 {
        i += 1;
    }
    &x[i..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha256;

    fn be_bytes(v: u64, width: usize) -> Vec<u8> {
        let raw = v.to_be_bytes();
        let mut out = vec![0u8; width];
        out.copy_from_slice(&raw[8 - width..]);
        out
    }

    #[test]
    fn mod_pow_small_vectors() {
        // 4^13 mod 497 = 445
        assert_eq!(mod_pow(&be_bytes(4, 2), 13, &be_bytes(497, 2)), be_bytes(445, 2));
        // 2^10 mod 1000 = 24
        assert_eq!(mod_pow(&be_bytes(2, 2), 10, &be_bytes(1000, 2)), be_bytes(24, 2));
        // 5^0 mod 7 = 1
        assert_eq!(mod_pow(&be_bytes(5, 1), 0, &be_bytes(7, 1)), be_bytes(1, 1));
        // 7^65537 mod 11 = 7^(65537 mod 10) mod 11 = 7^7 mod 11 = 6
        assert_eq!(mod_pow(&be_bytes(7, 1), 65537, &be_bytes(11, 1)), be_bytes(6, 1));
    }

    #[test]
    fn mod_pow_width_follows_modulus() {
        let m = be_bytes(0xFFF1, 2);
        let r = mod_pow(&be_bytes(0x1234, 2), 17, &m);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn encoding_shape() {
        let digest = sha256(b"payload");
        let em = encode_digest(&digest, 256).unwrap();
        assert_eq!(em.len(), 256);
        assert_eq!(em[0], 0x00);
        assert_eq!(em[1], 0x01);
        assert!(em[2..256 - 32 - 19 - 1].iter().all(|&b| b == 0xFF));
        assert_eq!(em[256 - 32 - 19 - 1], 0x00);
        assert_eq!(&em[256 - 32..], &digest[..]);
        // Too short a modulus cannot carry the encoding.
        assert!(encode_digest(&digest, 32).is_none());
    }

    // With exponent 1 the recovered message is the signature itself, so a
    // correctly encoded signature exercises the full verify path without
    // any private-key material.
    fn identity_key() -> RsaPublicKey {
        RsaPublicKey {
            modulus: vec![0xFFu8; 256],
            exponent: 1,
        }
    }

    #[test]
    fn verify_accepts_wellformed_signature() {
        let digest = sha256(b"kernel image bytes");
        let key = identity_key();
        let sig = encode_digest(&digest, 256).unwrap();
        assert!(verify(&digest, &sig, &key));
    }

    #[test]
    fn verify_rejects_any_signature_byte_flip() {
        let digest = sha256(b"kernel image bytes");
        let key = identity_key();
        let good = encode_digest(&digest, 256).unwrap();

        for pos in [0usize, 1, 2, 100, 204, 224, 255] {
            let mut bad = good.clone();
            bad[pos] ^= 0x01;
            assert!(!verify(&digest, &bad, &key), "flip at {} accepted", pos);
        }
    }

    #[test]
    fn verify_rejects_digest_change() {
        let digest = sha256(b"kernel image bytes");
        let key = identity_key();
        let sig = encode_digest(&digest, 256).unwrap();

        let mut other = digest;
        other[7] ^= 0x80;
        assert!(!verify(&other, &sig, &key));
    }

    #[test]
    fn verify_rejects_wrong_length_or_range() {
        let digest = sha256(b"x");
        let key = identity_key();
        let sig = encode_digest(&digest, 256).unwrap();

        assert!(!verify(&digest, &sig[..255], &key));

        // A signature equal to the modulus is out of range.
        let oversized = key.modulus.clone();
        assert!(!verify(&digest, &oversized, &key));
    }
}
