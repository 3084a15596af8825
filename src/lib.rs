//! lib.rs — Vanta Sealed-Boot Loader library surface
//!
//! UEFI stage-0 loader for the Vanta kernel. The binary entry point lives
//! in `main.rs`; everything testable lives here. The boot pipeline is a
//! strictly linear state machine (`stage`) driving: image location (`fs`),
//! ELF parsing (`elf`), segment loading (`loader`), digesting and signature
//! verification (`crypto`), platform measurement (`measure`), trust fusion
//! and identity derivation (`trust`), and the final parameter-block handoff
//! (`handoff`).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod crypto;
pub mod elf;
pub mod error;
pub mod fs;
pub mod handoff;
pub mod loader;
pub mod log;
pub mod measure;
pub mod stage;
pub mod telemetry;
pub mod trust;
pub mod ui;
