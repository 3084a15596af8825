//! stage.rs — the boot pipeline as an explicit state machine
//!
//! Strictly linear, no cycles: each stage has exactly one successor, and
//! any fatal error moves straight to the terminal `Aborted`. Non-fatal
//! conditions never touch the machine — they are recorded as data and the
//! pipeline continues. The context is an explicit value threaded through
//! the pipeline; there is no module-level mutable state.

use crate::error::LoadError;
use crate::log::logger::{log_debug, log_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    Idle,
    ImageLocated,
    HeaderValidated,
    SegmentsLoaded,
    Digested,
    SignatureChecked,
    Measured,
    TrustComputed,
    IdentityDerived,
    ParamsAssembled,
    HandedOff,
    Aborted,
}

impl BootStage {
    /// The single legal successor, `None` for terminal states.
    pub fn successor(self) -> Option<BootStage> {
        use BootStage::*;
        match self {
            Idle => Some(ImageLocated),
            ImageLocated => Some(HeaderValidated),
            HeaderValidated => Some(SegmentsLoaded),
            SegmentsLoaded => Some(Digested),
            Digested => Some(SignatureChecked),
            SignatureChecked => Some(Measured),
            Measured => Some(TrustComputed),
            TrustComputed => Some(IdentityDerived),
            IdentityDerived => Some(ParamsAssembled),
            ParamsAssembled => Some(HandedOff),
            HandedOff | Aborted => None,
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, BootStage::HandedOff | BootStage::Aborted)
    }

    pub fn name(self) -> &'static str {
        use BootStage::*;
        match self {
            Idle => "idle",
            ImageLocated => "image-located",
            HeaderValidated => "header-validated",
            SegmentsLoaded => "segments-loaded",
            Digested => "digested",
            SignatureChecked => "signature-checked",
            Measured => "measured",
            TrustComputed => "trust-computed",
            IdentityDerived => "identity-derived",
            ParamsAssembled => "params-assembled",
            HandedOff => "handed-off",
            Aborted => "aborted",
        }
    }
}

/// Pipeline position, owned by the orchestrator and advanced one legal
/// step at a time.
pub struct BootContext {
    stage: BootStage,
}

impl BootContext {
    pub fn new() -> Self {
        Self {
            stage: BootStage::Idle,
        }
    }

    #[inline]
    pub fn stage(&self) -> BootStage {
        self.stage
    }

    /// Move to `next`. Only the linear successor is legal; a skipped or
    /// repeated stage is a loader bug, not a runtime condition.
    pub fn advance(&mut self, next: BootStage) {
        debug_assert_eq!(self.stage.successor(), Some(next), "illegal stage transition");
        self.stage = next;
        log_debug("stage", next.name());
    }

    /// Fatal unwind from wherever the pipeline stands. Never re-entered.
    pub fn abort(&mut self, err: &LoadError) {
        log_error("stage", err.category());
        self.stage = BootStage::Aborted;
    }
}

impl Default for BootContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: [BootStage; 11] = [
        BootStage::Idle,
        BootStage::ImageLocated,
        BootStage::HeaderValidated,
        BootStage::SegmentsLoaded,
        BootStage::Digested,
        BootStage::SignatureChecked,
        BootStage::Measured,
        BootStage::TrustComputed,
        BootStage::IdentityDerived,
        BootStage::ParamsAssembled,
        BootStage::HandedOff,
    ];

    #[test]
    fn successor_chain_is_linear() {
        for pair in ORDER.windows(2) {
            assert_eq!(pair[0].successor(), Some(pair[1]));
        }
        assert_eq!(BootStage::HandedOff.successor(), None);
        assert_eq!(BootStage::Aborted.successor(), None);
    }

    #[test]
    fn context_walks_the_full_pipeline() {
        let mut ctx = BootContext::new();
        assert_eq!(ctx.stage(), BootStage::Idle);
        for &stage in &ORDER[1..] {
            ctx.advance(stage);
            assert_eq!(ctx.stage(), stage);
        }
        assert!(ctx.stage().is_terminal());
    }

    #[test]
    fn abort_is_reachable_from_any_stage() {
        for (i, &stage) in ORDER[..ORDER.len() - 1].iter().enumerate() {
            let mut ctx = BootContext::new();
            for &s in &ORDER[1..=i] {
                ctx.advance(s);
            }
            assert_eq!(ctx.stage(), stage);
            ctx.abort(&LoadError::EmptyImage);
            assert_eq!(ctx.stage(), BootStage::Aborted);
            assert!(ctx.stage().is_terminal());
        }
    }

    #[test]
    fn terminals_are_terminal() {
        assert!(BootStage::HandedOff.is_terminal());
        assert!(BootStage::Aborted.is_terminal());
        assert!(!BootStage::Digested.is_terminal());
        assert!(!BootStage::Idle.is_terminal());
    }
}
