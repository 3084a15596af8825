//! main.rs — UEFI entry and the boot pipeline orchestrator
//!
//! Drives the ten-stage state machine end to end: locate → parse → load →
//! digest → verify → measure → fuse → identify → assemble → hand off.
//! Fatal errors unwind to `Aborted` and a firmware reset with no resident
//! partial kernel; non-fatal conditions ride along as data in the params
//! block and the kernel decides what to do about them.

#![no_std]
#![no_main]

extern crate alloc;

use alloc::format;
use alloc::vec::Vec;

use uefi::cstr16;
use uefi::prelude::*;
use uefi::table::runtime::ResetType;
use uefi_services::init;

use vanta_boot::crypto::{hash, keys, SignatureRecord};
use vanta_boot::elf::{self, SegmentDescriptor};
use vanta_boot::error::LoadError;
use vanta_boot::fs;
use vanta_boot::handoff::{self, HandoffData};
use vanta_boot::loader;
use vanta_boot::log::logger::{log_critical, log_info};
use vanta_boot::measure;
use vanta_boot::stage::{BootContext, BootStage};
use vanta_boot::telemetry::{self, BootConditions, BootEvent};
use vanta_boot::trust;
use vanta_boot::ui;

#[entry]
fn efi_main(_handle: Handle, mut system_table: SystemTable<Boot>) -> Status {
    if init(&mut system_table).is_err() {
        let _ = system_table
            .stdout()
            .output_string(cstr16!("[FATAL] UEFI service init failed\r\n"));
        system_table
            .runtime_services()
            .reset(ResetType::SHUTDOWN, Status::LOAD_ERROR, None);
    }

    ui::draw_boot_banner(&mut system_table);
    log_info("boot", "Vanta sealed-boot loader active");

    let mut ctx = BootContext::new();

    // The embedded key decodes once, up front. Failure here means the
    // loader binary itself is corrupt and nothing else is worth attempting.
    let trusted_key = match keys::trusted_kernel_key() {
        Ok(key) => key,
        Err(e) => fail(&mut ctx, &mut system_table, &e),
    };

    // Stage: image located
    let image = match fs::locate_kernel_image(&system_table) {
        Ok(bytes) => bytes,
        Err(e) => fail(&mut ctx, &mut system_table, &e),
    };
    let mut signature = match fs::locate_signature(&system_table) {
        Some(bytes) => SignatureRecord::from_bytes(bytes),
        None => SignatureRecord::absent(),
    };
    enter(&mut ctx, BootStage::ImageLocated);
    telemetry::emit(BootEvent::ImageSized { bytes: image.len() });

    // Stage: header validated
    let header = match elf::parse_header(&image) {
        Ok(h) => h,
        Err(e) => fail(&mut ctx, &mut system_table, &e),
    };
    if let Err(e) = elf::validate_machine(&header) {
        fail(&mut ctx, &mut system_table, &e);
    }
    enter(&mut ctx, BootStage::HeaderValidated);

    // Stage: segments loaded
    let segments: Vec<SegmentDescriptor> = match elf::read_program_headers(&image, &header) {
        Ok(phdrs) => phdrs.iter().map(SegmentDescriptor::from_phdr).collect(),
        Err(e) => fail(&mut ctx, &mut system_table, &e),
    };
    let kernel = match loader::load_segments(
        system_table.boot_services(),
        &image,
        &segments,
        header.e_entry.get(),
    ) {
        Ok(k) => k,
        Err(e) => fail(&mut ctx, &mut system_table, &e),
    };
    enter(&mut ctx, BootStage::SegmentsLoaded);
    log_info(
        "boot",
        &format!(
            "kernel placed: base=0x{:x} size=0x{:x} entry=0x{:x}",
            kernel.base, kernel.size, kernel.entry
        ),
    );

    // Stage: digested. Always over the raw file bytes: the digest must
    // not depend on where the image landed.
    let digest = hash::sha256(&image);
    enter(&mut ctx, BootStage::Digested);

    // Stage: signature checked. Runs to completion either way; an
    // invalid signature is recorded, not raised.
    signature.verify_against(&digest, &trusted_key);
    enter(&mut ctx, BootStage::SignatureChecked);

    // Stage: measured. Both reads are best-effort.
    let measurement = measure::collect(&system_table);
    let extended = measure::extend_kernel_measurement(system_table.boot_services(), &digest);
    enter(&mut ctx, BootStage::Measured);

    // Stage: trust computed
    let (score, signature_valid) = trust::compute_score(&signature, &measurement);
    enter(&mut ctx, BootStage::TrustComputed);

    let mut conditions = BootConditions::empty();
    if signature_valid {
        conditions |= BootConditions::SIGNATURE_VALID;
    }
    if measurement.secure_boot_enabled() {
        conditions |= BootConditions::SECURE_BOOT;
    }
    if measurement.pcr_available() {
        conditions |= BootConditions::PCR_PRESENT;
    }
    if extended {
        conditions |= BootConditions::DIGEST_EXTENDED;
    }
    telemetry::emit(BootEvent::TrustScored {
        score: score.value(),
        conditions,
    });
    log_info("boot", &format!("trust score {}", score.value()));

    // Stage: identity derived
    let timestamp = handoff::epoch_seconds(&system_table);
    let identity = trust::derive_identity(&digest, timestamp);
    enter(&mut ctx, BootStage::IdentityDerived);
    log_info(
        "boot",
        &format!("boot identity {}", trust::identity_uuid(&identity)),
    );

    // Stage: params assembled. Transient buffers go now; only the placed
    // kernel and what the handoff allocates survive the jump.
    let data = HandoffData {
        kernel_digest: digest,
        signature_valid,
        trust_score: score.value(),
        boot_identity: identity,
    };
    drop(image);
    drop(signature);
    drop(segments);
    enter(&mut ctx, BootStage::ParamsAssembled);

    // Stage: handed off. This never returns.
    ui::display_handoff(&mut system_table);
    enter(&mut ctx, BootStage::HandedOff);
    handoff::exit_and_jump(system_table, &kernel, &data)
}

fn enter(ctx: &mut BootContext, stage: BootStage) {
    ctx.advance(stage);
    telemetry::emit(BootEvent::StageEntered(stage));
}

/// Fatal unwind: terminal state, fault panel, firmware reset. No partial
/// kernel survives; every fallible loader step frees what it allocated
/// before reporting failure.
fn fail(ctx: &mut BootContext, st: &mut SystemTable<Boot>, err: &LoadError) -> ! {
    ctx.abort(err);
    telemetry::emit(BootEvent::Aborting {
        category: err.category(),
    });
    log_critical("boot", &format!("{}", err));
    ui::display_failure(st, &format!("{}", err));

    // Leave the fault on screen long enough to be read.
    for _ in 0..40_000_000 {
        core::hint::spin_loop();
    }

    st.runtime_services().reset(
        ResetType::SHUTDOWN,
        Status::LOAD_ERROR,
        None,
    )
}
