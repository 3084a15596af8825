//! handoff.rs — the loader→kernel parameter block and the final jump
//!
//! `LoaderParams` is the binding ABI between loader and kernel: field
//! order and sizes are a frozen contract, pinned by tests below.
//! Reordering anything breaks the kernel's parsing. The jump sequence
//! releases boot services, snapshots the final memory map into a buffer
//! the kernel inherits, and transfers control with the params pointer as
//! the sole argument. That transition never returns; after it the loader
//! owns nothing.

use core::mem::size_of;
use uefi::prelude::*;
use uefi::table::boot::{AllocateType, MemoryType};
use uefi::table::runtime::ResetType;

use crate::loader::{LoadedKernel, PAGE_SIZE};
use crate::log::logger::{log_error, log_info};

/// Snapshot of the firmware memory map as re-encoded by the loader.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MemoryMapEntry {
    pub memory_type: u32,
    pub reserved: u32,
    pub physical_start: u64,
    pub virtual_start: u64,
    pub page_count: u64,
    pub attribute: u64,
}

pub const MEMORY_MAP_DESC_VERSION: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MemoryMapInfo {
    pub ptr: u64,
    pub size: u64,
    pub desc_size: u32,
    pub desc_version: u32,
    pub key: u64,
}

/// The handoff contract. Owned by the loader until the jump, never
/// written after control transfer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LoaderParams {
    pub memory_map: MemoryMapInfo,
    pub kernel_base: u64,
    pub kernel_size: u64,
    pub kernel_entry: u64,
    pub kernel_digest: [u8; 32],
    pub signature_valid: u8,
    pub trust_score: u8,
    pub boot_identity: [u8; 16],
}

/// Verification and trust results threaded into the params block.
pub struct HandoffData {
    pub kernel_digest: [u8; 32],
    pub signature_valid: bool,
    pub trust_score: u8,
    pub boot_identity: [u8; 16],
}

/// Epoch seconds from the firmware RTC, 0 when the clock is unreadable.
/// Feeds boot-identity derivation; nothing here needs sub-second
/// precision.
pub fn epoch_seconds(st: &SystemTable<Boot>) -> u64 {
    match st.runtime_services().get_time() {
        Ok(time) => {
            let days = days_from_civil(
                time.year() as i64,
                time.month() as u64,
                time.day() as u64,
            );
            if days < 0 {
                return 0;
            }
            days as u64 * 86_400
                + time.hour() as u64 * 3_600
                + time.minute() as u64 * 60
                + time.second() as u64
        }
        Err(_) => 0,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian civil date.
fn days_from_civil(year: i64, month: u64, day: u64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let mp = if month > 2 { month - 3 } else { month + 9 };
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe as i64 - 719_468
}

fn fatal_alloc(st: &SystemTable<Boot>, reason: &str) -> ! {
    log_error("handoff", reason);
    st.runtime_services().reset(
        ResetType::SHUTDOWN,
        Status::OUT_OF_RESOURCES,
        Some(reason.as_bytes()),
    )
}

/// Release boot services and transfer control to the kernel. All
/// loader-owned transient buffers must already be gone; the only
/// survivors are the loaded kernel span, the params page, the stack, and
/// the memory-map snapshot, all owned by the kernel from here on.
pub fn exit_and_jump(st: SystemTable<Boot>, kernel: &LoadedKernel, data: &HandoffData) -> ! {
    log_info("handoff", "assembling loader params");

    let (params_addr, stack_top, mmap_buffer, mmap_capacity) = {
        let bs = st.boot_services();

        let params_addr =
            match bs.allocate_pages(AllocateType::AnyPages, MemoryType::LOADER_DATA, 1) {
                Ok(addr) => addr,
                Err(_) => fatal_alloc(&st, "params page allocation failed"),
            };

        let stack_pages = 8usize;
        let stack_addr =
            match bs.allocate_pages(AllocateType::AnyPages, MemoryType::LOADER_DATA, stack_pages) {
                Ok(addr) => addr,
                Err(_) => fatal_alloc(&st, "kernel stack allocation failed"),
            };
        let stack_top = stack_addr as usize + stack_pages * PAGE_SIZE;

        // Size the snapshot from the firmware's current map, with slack
        // for the descriptors these allocations themselves add.
        let hint = bs.memory_map_size();
        let capacity = hint.map_size / hint.entry_size + 16;
        let snapshot_bytes = capacity * size_of::<MemoryMapEntry>();
        let snapshot_pages = (snapshot_bytes + PAGE_SIZE - 1) / PAGE_SIZE;
        let mmap_buffer = match bs.allocate_pages(
            AllocateType::AnyPages,
            MemoryType::LOADER_DATA,
            snapshot_pages,
        ) {
            Ok(addr) => addr,
            Err(_) => fatal_alloc(&st, "memory map snapshot allocation failed"),
        };

        (params_addr, stack_top, mmap_buffer, capacity)
    };

    let params_ptr = params_addr as *mut LoaderParams;
    // SAFETY: params_addr points to one freshly allocated LOADER_DATA
    // page, large enough for LoaderParams.
    unsafe {
        core::ptr::write_bytes(params_ptr as *mut u8, 0, size_of::<LoaderParams>());
        (*params_ptr).kernel_base = kernel.base;
        (*params_ptr).kernel_size = kernel.size as u64;
        (*params_ptr).kernel_entry = kernel.entry;
        (*params_ptr).kernel_digest = data.kernel_digest;
        (*params_ptr).signature_valid = data.signature_valid as u8;
        (*params_ptr).trust_score = data.trust_score;
        (*params_ptr).boot_identity = data.boot_identity;
    }

    log_info("handoff", "calling ExitBootServices");

    let (_runtime, final_map) = st.exit_boot_services();

    // Firmware allocator is gone; copy the final map into the snapshot
    // buffer the kernel inherits.
    let mut entry_count: u64 = 0;
    // SAFETY: mmap_buffer holds `mmap_capacity` MemoryMapEntry slots and
    // nothing else aliases it.
    unsafe {
        let entries = mmap_buffer as *mut MemoryMapEntry;
        for (i, desc) in final_map.entries().enumerate() {
            if i >= mmap_capacity {
                break;
            }
            let slot = entries.add(i);
            (*slot).memory_type = desc.ty.0;
            (*slot).reserved = 0;
            (*slot).physical_start = desc.phys_start;
            (*slot).virtual_start = desc.virt_start;
            (*slot).page_count = desc.page_count;
            (*slot).attribute = desc.att.bits();
            entry_count += 1;
        }

        (*params_ptr).memory_map = MemoryMapInfo {
            ptr: mmap_buffer,
            size: entry_count * size_of::<MemoryMapEntry>() as u64,
            desc_size: size_of::<MemoryMapEntry>() as u32,
            desc_version: MEMORY_MAP_DESC_VERSION,
            // The firmware's map key was consumed by ExitBootServices;
            // the field is carried for ABI stability.
            key: 0,
        };
    }

    let entry_addr = kernel.entry;

    // SAFETY: control transfer to the verified, relocated kernel entry.
    // RDI carries the params pointer per the handoff ABI; the fresh
    // stack keeps the kernel off firmware-owned memory.
    unsafe {
        core::arch::asm!(
            "cli",
            "mov rsp, rcx",
            "xor rbp, rbp",
            "jmp rax",
            in("rax") entry_addr,
            in("rcx") stack_top as u64,
            in("rdi") params_addr,
            options(noreturn)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn params_layout_is_frozen() {
        assert_eq!(size_of::<MemoryMapInfo>(), 32);
        assert_eq!(size_of::<MemoryMapEntry>(), 40);

        assert_eq!(offset_of!(LoaderParams, memory_map), 0);
        assert_eq!(offset_of!(LoaderParams, kernel_base), 32);
        assert_eq!(offset_of!(LoaderParams, kernel_size), 40);
        assert_eq!(offset_of!(LoaderParams, kernel_entry), 48);
        assert_eq!(offset_of!(LoaderParams, kernel_digest), 56);
        assert_eq!(offset_of!(LoaderParams, signature_valid), 88);
        assert_eq!(offset_of!(LoaderParams, trust_score), 89);
        assert_eq!(offset_of!(LoaderParams, boot_identity), 90);
        assert_eq!(size_of::<LoaderParams>(), 112);
    }

    #[test]
    fn memory_map_info_field_order() {
        assert_eq!(offset_of!(MemoryMapInfo, ptr), 0);
        assert_eq!(offset_of!(MemoryMapInfo, size), 8);
        assert_eq!(offset_of!(MemoryMapInfo, desc_size), 16);
        assert_eq!(offset_of!(MemoryMapInfo, desc_version), 20);
        assert_eq!(offset_of!(MemoryMapInfo, key), 24);
    }

    #[test]
    fn civil_to_epoch_days() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(1970, 1, 2), 1);
        assert_eq!(days_from_civil(1969, 12, 31), -1);
        assert_eq!(days_from_civil(2000, 3, 1), 11_017);
        assert_eq!(days_from_civil(2026, 1, 1), 20_454);
    }
}
