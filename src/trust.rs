//! trust.rs — trust fusion and boot identity
//!
//! Two additive factors, each traceable to one verifiable condition:
//! a valid signature is worth 80 points, an available PCR measurement 20.
//! Missing Secure-Boot enforcement downgrades the signature before any
//! points are counted — a platform that does not enforce image signing
//! gives the signature check no anchor. The score is computed exactly
//! once, after verification has run to completion, and never mutated.

use uuid::Uuid;

use crate::crypto::hash::sha256;
use crate::crypto::SignatureRecord;
use crate::measure::PlatformMeasurement;

pub const SCORE_SIGNATURE: u8 = 80;
pub const SCORE_MEASUREMENT: u8 = 20;

/// Bounded trust score in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TrustScore(u8);

impl TrustScore {
    #[inline]
    pub fn value(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.0 == SCORE_SIGNATURE + SCORE_MEASUREMENT
    }
}

/// Fuse signature validity and platform measurement into the score.
/// Returns the score and the post-downgrade signature validity that the
/// handoff block carries.
pub fn compute_score(
    signature: &SignatureRecord,
    measurement: &PlatformMeasurement,
) -> (TrustScore, bool) {
    let mut signature_valid = signature.valid;
    if !measurement.secure_boot_enabled() {
        signature_valid = false;
    }

    let mut score = 0u8;
    if signature_valid {
        score += SCORE_SIGNATURE;
    }
    if measurement.pcr_available() {
        score += SCORE_MEASUREMENT;
    }

    (TrustScore(score), signature_valid)
}

/// Per-boot correlation token: `SHA256(digest ‖ timestamp)` truncated to
/// 16 bytes. Both inputs are derivable by anyone with filesystem and
/// clock access; this identifies a boot attempt in logs, it does not
/// authenticate anything.
pub fn derive_identity(digest: &[u8; 32], timestamp: u64) -> [u8; 16] {
    let mut material = [0u8; 40];
    material[..32].copy_from_slice(digest);
    material[32..].copy_from_slice(&timestamp.to_le_bytes());

    let full = sha256(&material);
    let mut identity = [0u8; 16];
    identity.copy_from_slice(&full[..16]);
    identity
}

/// The identity as a UUID, for log lines.
#[inline]
pub fn identity_uuid(identity: &[u8; 16]) -> Uuid {
    Uuid::from_bytes(*identity)
}
