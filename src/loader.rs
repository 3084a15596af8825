//! loader.rs — PT_LOAD segment placement and entry relocation
//!
//! The loadable segments are placed into one contiguous page-rounded
//! allocation covering `[min(paddr), max(paddr + memsz))`. Per segment the
//! file bytes are copied and the BSS tail is zero-filled. Overlapping
//! segments are permitted; the last write wins. The span math and the copy
//! loop are pure so they can be exercised on synthetic images; only the
//! page allocation itself talks to firmware.

use uefi::table::boot::{AllocateType, BootServices, MemoryType};

use crate::elf::SegmentDescriptor;
use crate::error::{LoadError, LoadResult};
use crate::log::logger::{log_debug, log_info};

pub const PAGE_SIZE: usize = 0x1000;

/// Upper bound on the placed span. Anything larger is a malformed image,
/// not a real kernel.
pub const MAX_KERNEL_SPAN: u64 = 256 * 1024 * 1024;

/// The relocated, memory-resident kernel. Ownership of the allocation
/// transfers to the kernel at handoff; the loader must not free or touch
/// it afterwards.
#[derive(Debug, Clone, Copy)]
pub struct LoadedKernel {
    pub base: u64,
    pub size: usize,
    pub pages: usize,
    pub entry: u64,
}

/// Compute `(min_addr, max_end)` across the PT_LOAD segments.
pub fn load_span(segments: &[SegmentDescriptor]) -> LoadResult<(u64, u64)> {
    let mut min_addr: Option<u64> = None;
    let mut max_end: Option<u64> = None;

    for seg in segments.iter().filter(|s| s.is_load()) {
        if seg.mem_size < seg.file_size {
            return Err(LoadError::MalformedImage("segment memsz below filesz"));
        }
        let start = seg.placement();
        let end = start
            .checked_add(seg.mem_size)
            .ok_or(LoadError::MalformedImage("segment end overflow"))?;

        min_addr = Some(min_addr.map_or(start, |m| m.min(start)));
        max_end = Some(max_end.map_or(end, |m| m.max(end)));
    }

    match (min_addr, max_end) {
        (Some(min), Some(end)) => {
            let span = end
                .checked_sub(min)
                .ok_or(LoadError::MalformedImage("negative span"))?;
            if span == 0 {
                return Err(LoadError::EmptyImage);
            }
            if span > MAX_KERNEL_SPAN {
                return Err(LoadError::MalformedImage("kernel span exceeds limit"));
            }
            Ok((min, end))
        }
        _ => Err(LoadError::EmptyImage),
    }
}

/// Copy every PT_LOAD segment into `dest` (which covers the whole span)
/// and zero the `[filesz, memsz)` tail. A segment whose file bytes reach
/// past the image read is fatal truncation.
pub fn copy_segments_into(
    dest: &mut [u8],
    file: &[u8],
    segments: &[SegmentDescriptor],
    min_addr: u64,
) -> LoadResult<()> {
    for seg in segments.iter().filter(|s| s.is_load()) {
        let file_off = seg.file_offset as usize;
        let file_size = seg.file_size as usize;
        let mem_size = seg.mem_size as usize;

        let file_end = file_off
            .checked_add(file_size)
            .ok_or(LoadError::TruncatedImage("segment offset overflow"))?;
        if file_end > file.len() {
            return Err(LoadError::TruncatedImage("segment data past EOF"));
        }

        let dst_off = (seg.placement() - min_addr) as usize;
        dest[dst_off..dst_off + file_size].copy_from_slice(&file[file_off..file_end]);
        dest[dst_off + file_size..dst_off + mem_size].fill(0);
    }
    Ok(())
}

/// Relocate the file-declared entry into the placed span.
pub fn relocate_entry(file_entry: u64, base: u64, min_addr: u64, span: u64) -> LoadResult<u64> {
    if file_entry < min_addr || file_entry >= min_addr + span {
        return Err(LoadError::MalformedImage("entry outside loaded span"));
    }
    Ok(base + (file_entry - min_addr))
}

/// Allocate the span, place every segment, relocate the entry. On any
/// failure after allocation the pages are freed before the error is
/// returned: a partially loaded image must never survive.
pub fn load_segments(
    bs: &BootServices,
    file: &[u8],
    segments: &[SegmentDescriptor],
    file_entry: u64,
) -> LoadResult<LoadedKernel> {
    let (min_addr, max_end) = load_span(segments)?;
    let span = (max_end - min_addr) as usize;
    let pages = (span + PAGE_SIZE - 1) / PAGE_SIZE;

    let base = bs
        .allocate_pages(AllocateType::AnyPages, MemoryType::LOADER_DATA, pages)
        .map_err(|e| LoadError::OutOfMemory {
            pages,
            status: e.status(),
        })?;

    log_info(
        "loader",
        &alloc::format!("allocated {} pages at 0x{:x} for kernel span", pages, base),
    );

    // SAFETY: base points to `pages` freshly allocated LOADER_DATA pages,
    // which cover `span` bytes.
    let dest = unsafe { core::slice::from_raw_parts_mut(base as *mut u8, span) };

    if let Err(e) = copy_segments_into(dest, file, segments, min_addr) {
        let _ = bs.free_pages(base, pages);
        return Err(e);
    }

    let entry = match relocate_entry(file_entry, base, min_addr, span as u64) {
        Ok(entry) => entry,
        Err(e) => {
            let _ = bs.free_pages(base, pages);
            return Err(e);
        }
    };

    log_debug("loader", "segments placed, bss zeroed");

    Ok(LoadedKernel {
        base,
        size: span,
        pages,
        entry,
    })
}
