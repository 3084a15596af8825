//! ui.rs — early boot console visuals
//!
//! Splash and fault panels rendered over the UEFI text output. Purely
//! cosmetic: every call here is best-effort and discards errors, because
//! a broken console must never break the boot.

use uefi::cstr16;
use uefi::prelude::*;
use uefi::proto::console::text::Color;

/// Top-of-boot splash.
pub fn draw_boot_banner(st: &mut SystemTable<Boot>) {
    let stdout = st.stdout();
    let _ = stdout.set_color(Color::LightCyan, Color::Black);
    let _ = stdout.clear();

    let _ = stdout.output_string(cstr16!(
        "\r\n\
            ============================================================\r\n\
            ||              VANTA  ::  SEALED-BOOT  LOADER            ||\r\n\
            ||        UEFI stage-0 / measured kernel handoff          ||\r\n\
            ============================================================\r\n\r\n"
    ));

    let _ = stdout.set_color(Color::LightGray, Color::Black);
    let _ = stdout.output_string(cstr16!("   loader staged :: awaiting kernel image\r\n\r\n"));
    let _ = stdout.set_color(Color::White, Color::Black);
}

/// Red fault panel shown on the abort path, before the firmware reset.
pub fn display_failure(st: &mut SystemTable<Boot>, reason: &str) {
    let stdout = st.stdout();
    let _ = stdout.set_color(Color::Red, Color::Black);
    let _ = stdout.output_string(cstr16!(
        "\r\n   ------------------- BOOT FAULT -------------------\r\n   [!] "
    ));
    if let Ok(msg) = uefi::CString16::try_from(reason) {
        let _ = stdout.output_string(&msg);
    }
    let _ = stdout.output_string(cstr16!(
        "\r\n   --------------------------------------------------\r\n"
    ));
    let _ = stdout.set_color(Color::White, Color::Black);
}

/// Final line before control leaves the loader for good.
pub fn display_handoff(st: &mut SystemTable<Boot>) {
    let stdout = st.stdout();
    let _ = stdout.set_color(Color::LightGreen, Color::Black);
    let _ = stdout.output_string(cstr16!("   [>] transferring control to kernel\r\n"));
    let _ = stdout.set_color(Color::White, Color::Black);
}
