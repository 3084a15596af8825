//! fs.rs — kernel image and signature location on the boot volume
//!
//! Fixed path convention: the kernel ELF and its detached signature sit
//! side by side under `\EFI\vanta\`, with root-of-volume fallbacks. Every
//! volume exposing SimpleFileSystem is probed in order. Reads are whole-
//! file and never retried; a short read is unrecoverable for this boot
//! attempt. A missing image is fatal, a missing signature is not — the
//! verifier records it as invalid and the boot continues.

use alloc::vec;
use alloc::vec::Vec;
use uefi::cstr16;
use uefi::prelude::*;
use uefi::proto::media::file::{File, FileAttribute, FileInfo, FileMode, FileType, RegularFile};
use uefi::proto::media::fs::SimpleFileSystem;
use uefi::CStr16;

use crate::error::{LoadError, LoadResult};
use crate::log::logger::{log_debug, log_info, log_warn};

const MAX_IMAGE_SIZE: usize = 64 * 1024 * 1024;
const MAX_SIGNATURE_SIZE: usize = 4096;

/// Locate and read the kernel image. Absence at every path is fatal.
pub fn locate_kernel_image(st: &SystemTable<Boot>) -> LoadResult<Vec<u8>> {
    log_debug("fs", "probing \\EFI\\vanta\\kernel.elf");
    if let Some(bytes) = try_read(st, cstr16!("\\EFI\\vanta\\kernel.elf"), MAX_IMAGE_SIZE)? {
        log_info("fs", "kernel image located");
        return Ok(bytes);
    }

    log_debug("fs", "probing \\kernel.elf");
    if let Some(bytes) = try_read(st, cstr16!("\\kernel.elf"), MAX_IMAGE_SIZE)? {
        log_info("fs", "kernel image located at volume root");
        return Ok(bytes);
    }

    Err(LoadError::ImageNotFound)
}

/// Locate the detached signature adjacent to the image. `None` when the
/// file is absent or unreadable; that outcome is data, not an error.
pub fn locate_signature(st: &SystemTable<Boot>) -> Option<Vec<u8>> {
    for path in [cstr16!("\\EFI\\vanta\\kernel.sig"), cstr16!("\\kernel.sig")] {
        match try_read(st, path, MAX_SIGNATURE_SIZE) {
            Ok(Some(bytes)) => {
                log_info("fs", "detached signature located");
                return Some(bytes);
            }
            Ok(None) => continue,
            Err(_) => {
                log_warn("fs", "signature file unreadable, treating as unsigned");
                return None;
            }
        }
    }
    log_warn("fs", "no detached signature found");
    None
}

/// Probe every volume for `path`. `Ok(None)` means not present anywhere;
/// `Err` means a volume had the file but the read failed.
fn try_read(
    st: &SystemTable<Boot>,
    path: &CStr16,
    max_size: usize,
) -> LoadResult<Option<Vec<u8>>> {
    let bs = st.boot_services();

    let handles = bs
        .find_handles::<SimpleFileSystem>()
        .map_err(|e| LoadError::FirmwareCall {
            desc: "no SimpleFileSystem volumes",
            status: e.status(),
        })?;

    for &handle in handles.iter() {
        let mut fs = match bs.open_protocol_exclusive::<SimpleFileSystem>(handle) {
            Ok(fs) => fs,
            Err(_) => continue,
        };
        let mut root = match fs.open_volume() {
            Ok(root) => root,
            Err(_) => continue,
        };

        let file_handle = match root.open(path, FileMode::Read, FileAttribute::empty()) {
            Ok(h) => h,
            Err(_) => continue,
        };

        let file = file_handle
            .into_type()
            .map_err(|_| LoadError::ReadFailed("cannot type boot file"))?;
        let mut regular = match file {
            FileType::Regular(f) => f,
            _ => return Err(LoadError::ReadFailed("boot path is not a regular file")),
        };

        return read_exact(&mut regular, max_size).map(Some);
    }

    Ok(None)
}

/// Read the whole file, sized from FileInfo. A read that comes up short
/// is fatal: nothing downstream may see a partial buffer.
fn read_exact(file: &mut RegularFile, max_size: usize) -> LoadResult<Vec<u8>> {
    let mut info_buf = [0u8; 512];
    let info = file
        .get_info::<FileInfo>(&mut info_buf)
        .map_err(|_| LoadError::ReadFailed("file info unavailable"))?;
    let size = info.file_size() as usize;

    if size == 0 {
        return Err(LoadError::ReadFailed("file is empty"));
    }
    if size > max_size {
        return Err(LoadError::ReadFailed("file exceeds size limit"));
    }

    let mut buffer = vec![0u8; size];
    let read = file
        .read(&mut buffer)
        .map_err(|_| LoadError::ReadFailed("media read failed"))?;
    if read != size {
        return Err(LoadError::ReadFailed("short read from boot volume"));
    }

    Ok(buffer)
}
