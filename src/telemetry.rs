//! telemetry.rs — fire-and-forget boot event sink
//!
//! The peripheral subsystem observers consume these events; none of them
//! can influence whether the boot proceeds. Emission is synchronous,
//! infallible, and one-way — the pipeline drops events here and moves on.

use bitflags::bitflags;

use crate::log::logger::log_debug;
use crate::stage::BootStage;

bitflags! {
    /// Conditions accumulated across the pipeline, reported with the
    /// final trust event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BootConditions: u32 {
        const SIGNATURE_VALID = 1 << 0;
        const SECURE_BOOT = 1 << 1;
        const PCR_PRESENT = 1 << 2;
        const DIGEST_EXTENDED = 1 << 3;
    }
}

pub enum BootEvent {
    StageEntered(BootStage),
    ImageSized { bytes: usize },
    TrustScored { score: u8, conditions: BootConditions },
    Aborting { category: &'static str },
}

/// Drop an event into the sink. Nothing here may fail and nothing here
/// may block the pipeline.
pub fn emit(event: BootEvent) {
    match event {
        BootEvent::StageEntered(stage) => log_debug("telemetry", stage.name()),
        BootEvent::ImageSized { bytes } => {
            log_debug("telemetry", &alloc::format!("image {} bytes", bytes))
        }
        BootEvent::TrustScored { score, conditions } => log_debug(
            "telemetry",
            &alloc::format!("trust {} conditions {:#06x}", score, conditions.bits()),
        ),
        BootEvent::Aborting { category } => log_debug("telemetry", category),
    }
}
