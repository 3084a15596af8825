//! crypto — digesting and static signature verification
//!
//! The kernel digest is SHA-256 over the raw file bytes, so the value the
//! signature covers is independent of where the image is later placed.
//! Authenticity is RSA PKCS#1 v1.5 against one trusted key embedded at
//! build time.

pub mod hash;
pub mod keys;
pub mod rsa;

use alloc::vec::Vec;

use crate::log::logger::{log_info, log_warn};
use rsa::RsaPublicKey;

/// The detached signature as read from the boot volume. A missing or
/// unreadable signature file is an absent record; verification then
/// records `valid = false` and the boot continues; policy lives in the
/// kernel, not here.
pub struct SignatureRecord {
    pub bytes: Option<Vec<u8>>,
    pub valid: bool,
}

impl SignatureRecord {
    pub fn absent() -> Self {
        Self {
            bytes: None,
            valid: false,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes),
            valid: false,
        }
    }

    /// Run verification to completion and record the outcome. Mismatch is
    /// an ordinary `false`, never an error.
    pub fn verify_against(&mut self, digest: &[u8; 32], key: &RsaPublicKey) -> bool {
        self.valid = match &self.bytes {
            Some(sig) => rsa::verify(digest, sig, key),
            None => false,
        };
        if self.valid {
            log_info("verify", "kernel signature verified against trusted key");
        } else {
            log_warn("verify", "kernel signature missing or invalid");
        }
        self.valid
    }
}

/// Byte-wise comparison that does not short-circuit on the first
/// difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for i in 0..a.len() {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn absent_record_never_verifies() {
        let key = RsaPublicKey {
            modulus: alloc::vec![0xFFu8; 256],
            exponent: 65537,
        };
        let mut record = SignatureRecord::absent();
        assert!(!record.verify_against(&[0u8; 32], &key));
        assert!(!record.valid);
    }
}
