//! measure.rs — platform measurement collection (TPM PCR + Secure Boot)
//!
//! Everything here is best-effort: a platform without a TPM, or firmware
//! that refuses the SecureBoot variable, yields `Unavailable` values that
//! lower the trust score. Measured boot is an attestation input, never a
//! boot gate. TPM traffic goes through the UEFI TCG2 protocol with
//! hand-marshalled big-endian command blocks.

use uefi::cstr16;
use uefi::prelude::*;
use uefi::proto::unsafe_protocol;
use uefi::table::boot::{BootServices, SearchType};
use uefi::Identify;

use crate::log::logger::{log_debug, log_info, log_warn};

/// TPM_ALG_SHA256 bank identifier.
pub const PCR_BANK_SHA256: u16 = 0x000B;

pub mod pcr {
    /// The PCR sampled into the trust computation.
    pub const MEASURED_BOOT: u32 = 0;
    /// The PCR the kernel digest is extended into after verification.
    pub const KERNEL: u32 = 9;
}

const TPM_ST_NO_SESSIONS: u16 = 0x8001;
const TPM_CC_PCR_READ: u32 = 0x0000_017E;
const EV_POST_CODE: u32 = 0x0000_0001;

/// Platform state sampled once per boot attempt, read-only afterwards.
/// Either side may independently be absent.
#[derive(Debug, Clone, Copy)]
pub struct PlatformMeasurement {
    pub pcr_digest: Option<[u8; 32]>,
    pub secure_boot: Option<bool>,
}

impl PlatformMeasurement {
    #[inline]
    pub fn pcr_available(&self) -> bool {
        self.pcr_digest.is_some()
    }

    /// Absent Secure-Boot state counts as not enforced.
    #[inline]
    pub fn secure_boot_enabled(&self) -> bool {
        self.secure_boot.unwrap_or(false)
    }
}

#[repr(C)]
#[unsafe_protocol("607f766c-7455-42be-930b-e4d76db2720f")]
struct Tcg2Protocol {
    get_capability: unsafe extern "efiapi" fn(
        this: *mut Tcg2Protocol,
        protocol_capability: *mut u8,
    ) -> Status,
    get_event_log: unsafe extern "efiapi" fn(
        this: *mut Tcg2Protocol,
        event_log_format: u32,
        event_log_location: *mut u64,
        event_log_last_entry: *mut u64,
        event_log_truncated: *mut bool,
    ) -> Status,
    hash_log_extend_event: unsafe extern "efiapi" fn(
        this: *mut Tcg2Protocol,
        flags: u64,
        data_to_hash: *const u8,
        data_to_hash_len: u64,
        event: *const Tcg2EventHeader,
    ) -> Status,
    submit_command: unsafe extern "efiapi" fn(
        this: *mut Tcg2Protocol,
        input_parameter_block_size: u32,
        input_parameter_block: *const u8,
        output_parameter_block_size: u32,
        output_parameter_block: *mut u8,
    ) -> Status,
    get_active_pcr_banks:
        unsafe extern "efiapi" fn(this: *mut Tcg2Protocol, active_pcr_banks: *mut u32) -> Status,
    set_active_pcr_banks:
        unsafe extern "efiapi" fn(this: *mut Tcg2Protocol, active_pcr_banks: u32) -> Status,
    get_result_of_set_active_pcr_banks: unsafe extern "efiapi" fn(
        this: *mut Tcg2Protocol,
        operation_present: *mut u32,
        response: *mut u32,
    ) -> Status,
}

#[repr(C)]
struct Tcg2EventHeader {
    header_size: u32,
    header_version: u16,
    pcr_index: u32,
    event_type: u32,
}

/// Sample PCR state and the Secure-Boot flag. Called exactly once per
/// boot attempt.
pub fn collect(st: &SystemTable<Boot>) -> PlatformMeasurement {
    let pcr_digest = read_pcr(st.boot_services(), pcr::MEASURED_BOOT);
    let secure_boot = read_secure_boot_flag(st);

    match pcr_digest {
        Some(_) => log_info("measure", "TPM PCR state captured"),
        None => log_debug("measure", "TPM unavailable, measurement skipped"),
    }
    match secure_boot {
        Some(true) => log_info("measure", "SecureBoot reported ENABLED"),
        Some(false) => log_warn("measure", "SecureBoot reported DISABLED"),
        None => log_warn("measure", "SecureBoot variable unreadable"),
    }

    PlatformMeasurement {
        pcr_digest,
        secure_boot,
    }
}

/// TPM2_PCR_Read of one SHA-256 PCR. Any failure along the way (no TCG2
/// protocol, command rejected, malformed response) is `None`.
pub fn read_pcr(bs: &BootServices, index: u32) -> Option<[u8; 32]> {
    let tcg2 = locate_tcg2(bs)?;

    let cmd = build_pcr_read_command(index);
    let mut resp = [0u8; 256];

    // SAFETY: protocol pointer was located this call; buffers outlive it.
    let status = unsafe {
        ((*tcg2).submit_command)(
            tcg2,
            cmd.len() as u32,
            cmd.as_ptr(),
            resp.len() as u32,
            resp.as_mut_ptr(),
        )
    };
    if !status.is_success() {
        log_debug("measure", "TCG2 SubmitCommand failed");
        return None;
    }

    parse_pcr_read_response(&resp)
}

/// The `SecureBoot` global variable: 1 byte, 1 = enforcement active.
/// Unreadable is a valid outcome, not an error.
pub fn read_secure_boot_flag(st: &SystemTable<Boot>) -> Option<bool> {
    let rt = st.runtime_services();
    let mut buf = [0u8; 1];
    match rt.get_variable(
        cstr16!("SecureBoot"),
        &uefi::table::runtime::VariableVendor::GLOBAL_VARIABLE,
        &mut buf,
    ) {
        Ok(_) => Some(buf[0] == 1),
        Err(_) => None,
    }
}

/// Extend the verified kernel digest into the kernel PCR, best-effort.
/// The result is logged and otherwise ignored.
pub fn extend_kernel_measurement(bs: &BootServices, digest: &[u8; 32]) -> bool {
    let tcg2 = match locate_tcg2(bs) {
        Some(p) => p,
        None => {
            log_debug("measure", "no TPM, kernel digest not extended");
            return false;
        }
    };

    let header = Tcg2EventHeader {
        header_size: core::mem::size_of::<Tcg2EventHeader>() as u32,
        header_version: 1,
        pcr_index: pcr::KERNEL,
        event_type: EV_POST_CODE,
    };

    // SAFETY: protocol pointer was located this call; the digest and the
    // event header live across the call.
    let status = unsafe {
        ((*tcg2).hash_log_extend_event)(
            tcg2,
            0,
            digest.as_ptr(),
            digest.len() as u64,
            &header,
        )
    };

    if status.is_success() {
        log_info("measure", "kernel digest extended into PCR9");
        true
    } else {
        log_warn("measure", "TPM2 extend of kernel digest failed");
        false
    }
}

fn locate_tcg2(bs: &BootServices) -> Option<*mut Tcg2Protocol> {
    let handles = bs
        .locate_handle_buffer(SearchType::ByProtocol(&Tcg2Protocol::GUID))
        .ok()?;
    let handle = handles.first()?;

    let protocol = bs.open_protocol_exclusive::<Tcg2Protocol>(*handle).ok()?;
    let ptr = &*protocol as *const Tcg2Protocol as *mut Tcg2Protocol;

    // Keep the protocol open for the lifetime of this boot stage; it is
    // reclaimed wholesale at ExitBootServices.
    core::mem::forget(protocol);

    Some(ptr)
}

/// Marshal TPM2_PCR_Read for one SHA-256 PCR, big-endian throughout.
fn build_pcr_read_command(index: u32) -> [u8; 20] {
    const CMD_LEN: u32 = 20;
    let mut cmd = [0u8; CMD_LEN as usize];
    cmd[0..2].copy_from_slice(&TPM_ST_NO_SESSIONS.to_be_bytes());
    cmd[2..6].copy_from_slice(&CMD_LEN.to_be_bytes());
    cmd[6..10].copy_from_slice(&TPM_CC_PCR_READ.to_be_bytes());
    // TPML_PCR_SELECTION: one selection in the SHA-256 bank.
    cmd[10..14].copy_from_slice(&1u32.to_be_bytes());
    cmd[14..16].copy_from_slice(&PCR_BANK_SHA256.to_be_bytes());
    cmd[16] = 3; // sizeofSelect
    cmd[17 + (index as usize / 8)] = 1 << (index % 8);
    cmd
}

/// Unmarshal the TPM2_PCR_Read response down to the first digest. The
/// selected bank must return a 32-byte value; anything else is absent.
fn parse_pcr_read_response(resp: &[u8]) -> Option<[u8; 32]> {
    if resp.len() < 10 {
        return None;
    }
    let rc = u32::from_be_bytes(resp[6..10].try_into().ok()?);
    if rc != 0 {
        return None;
    }

    // Header, pcrUpdateCounter, then the echoed TPML_PCR_SELECTION.
    let mut off = 14usize;
    let sel_count = u32::from_be_bytes(resp.get(off..off + 4)?.try_into().ok()?) as usize;
    off += 4;
    for _ in 0..sel_count {
        let sizeof_select = *resp.get(off + 2)? as usize;
        off += 3 + sizeof_select;
    }

    // TPML_DIGEST
    let digest_count = u32::from_be_bytes(resp.get(off..off + 4)?.try_into().ok()?) as usize;
    off += 4;
    if digest_count == 0 {
        return None;
    }

    let size = u16::from_be_bytes(resp.get(off..off + 2)?.try_into().ok()?) as usize;
    off += 2;
    if size != 32 {
        return None;
    }

    let mut digest = [0u8; 32];
    digest.copy_from_slice(resp.get(off..off + 32)?);
    Some(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_shape() {
        let cmd = build_pcr_read_command(0);
        assert_eq!(&cmd[0..2], &[0x80, 0x01]);
        assert_eq!(&cmd[2..6], &20u32.to_be_bytes());
        assert_eq!(&cmd[6..10], &TPM_CC_PCR_READ.to_be_bytes());
        assert_eq!(&cmd[14..16], &PCR_BANK_SHA256.to_be_bytes());
        assert_eq!(cmd[16], 3);
        assert_eq!(cmd[17], 0x01);
        assert_eq!(cmd[18], 0x00);

        let cmd9 = build_pcr_read_command(9);
        assert_eq!(cmd9[17], 0x00);
        assert_eq!(cmd9[18], 0x02);
    }

    fn wellformed_response(digest: &[u8; 32]) -> alloc::vec::Vec<u8> {
        let mut r = alloc::vec![0u8; 0];
        r.extend_from_slice(&0x8001u16.to_be_bytes()); // tag
        r.extend_from_slice(&0u32.to_be_bytes()); // size (unchecked)
        r.extend_from_slice(&0u32.to_be_bytes()); // rc = success
        r.extend_from_slice(&1u32.to_be_bytes()); // pcrUpdateCounter
        r.extend_from_slice(&1u32.to_be_bytes()); // selection count
        r.extend_from_slice(&PCR_BANK_SHA256.to_be_bytes());
        r.push(3); // sizeofSelect
        r.extend_from_slice(&[0x01, 0x00, 0x00]);
        r.extend_from_slice(&1u32.to_be_bytes()); // digest count
        r.extend_from_slice(&32u16.to_be_bytes());
        r.extend_from_slice(digest);
        r
    }

    #[test]
    fn parses_wellformed_response() {
        let digest = [0x5Au8; 32];
        let resp = wellformed_response(&digest);
        assert_eq!(parse_pcr_read_response(&resp), Some(digest));
    }

    #[test]
    fn rejects_tpm_error_code() {
        let mut resp = wellformed_response(&[0u8; 32]);
        resp[6..10].copy_from_slice(&0x0000_0101u32.to_be_bytes());
        assert_eq!(parse_pcr_read_response(&resp), None);
    }

    #[test]
    fn rejects_empty_digest_list() {
        let mut resp = wellformed_response(&[0u8; 32]);
        // digest count sits after header(10) + counter(4) + selection
        // list (4 + 2 + 1 + 3)
        resp[24..28].copy_from_slice(&0u32.to_be_bytes());
        assert_eq!(parse_pcr_read_response(&resp), None);
    }

    #[test]
    fn rejects_short_buffers() {
        assert_eq!(parse_pcr_read_response(&[0u8; 4]), None);
        let resp = wellformed_response(&[0u8; 32]);
        assert_eq!(parse_pcr_read_response(&resp[..resp.len() - 8]), None);
    }

    #[test]
    fn unavailable_measurement_defaults() {
        let m = PlatformMeasurement {
            pcr_digest: None,
            secure_boot: None,
        };
        assert!(!m.pcr_available());
        assert!(!m.secure_boot_enabled());
    }
}
