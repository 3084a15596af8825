//! elf.rs — ELF64 header and program-header decoding
//!
//! Wire-format views are `zerocopy` little-endian reads over the raw file
//! bytes; nothing here allocates and nothing here is `unsafe`. Validation
//! order matches the boot pipeline: identification first, then machine,
//! then the program-header table. A table that does not fit inside the
//! bytes actually read is a fatal truncation — a partially read image is
//! never carried any further.

use zerocopy::byteorder::{LittleEndian, U16, U32, U64};
use zerocopy::{FromBytes, LayoutVerified, Unaligned};

use crate::error::{LoadError, LoadResult};

pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

pub mod ident {
    pub const ELFCLASS64: u8 = 2;
    pub const ELFDATA2LSB: u8 = 1;
}

pub mod machine {
    pub const EM_X86_64: u16 = 62;
}

pub mod elf_type {
    pub const ET_EXEC: u16 = 2;
    pub const ET_DYN: u16 = 3;
}

pub mod ph_type {
    pub const PT_LOAD: u32 = 1;
}

/// ELF64 file header. Field layout mirrors the on-disk format exactly;
/// multi-byte fields are explicit little-endian so the view is valid at
/// any alignment.
#[derive(FromBytes, Unaligned, Clone, Copy, Debug)]
#[repr(C)]
pub struct Elf64Header {
    pub e_ident: [u8; 16],
    pub e_type: U16<LittleEndian>,
    pub e_machine: U16<LittleEndian>,
    pub e_version: U32<LittleEndian>,
    pub e_entry: U64<LittleEndian>,
    pub e_phoff: U64<LittleEndian>,
    pub e_shoff: U64<LittleEndian>,
    pub e_flags: U32<LittleEndian>,
    pub e_ehsize: U16<LittleEndian>,
    pub e_phentsize: U16<LittleEndian>,
    pub e_phnum: U16<LittleEndian>,
    pub e_shentsize: U16<LittleEndian>,
    pub e_shnum: U16<LittleEndian>,
    pub e_shstrndx: U16<LittleEndian>,
}

#[derive(FromBytes, Unaligned, Clone, Copy, Debug)]
#[repr(C)]
pub struct Elf64Phdr {
    pub p_type: U32<LittleEndian>,
    pub p_flags: U32<LittleEndian>,
    pub p_offset: U64<LittleEndian>,
    pub p_vaddr: U64<LittleEndian>,
    pub p_paddr: U64<LittleEndian>,
    pub p_filesz: U64<LittleEndian>,
    pub p_memsz: U64<LittleEndian>,
    pub p_align: U64<LittleEndian>,
}

/// A loadable-segment descriptor lifted out of the wire format, in host
/// integers. Built for every program header; the segment loader filters
/// to PT_LOAD.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub seg_type: u32,
    pub vaddr: u64,
    pub paddr: u64,
    pub file_offset: u64,
    pub file_size: u64,
    pub mem_size: u64,
}

impl SegmentDescriptor {
    pub fn from_phdr(ph: &Elf64Phdr) -> Self {
        Self {
            seg_type: ph.p_type.get(),
            vaddr: ph.p_vaddr.get(),
            paddr: ph.p_paddr.get(),
            file_offset: ph.p_offset.get(),
            file_size: ph.p_filesz.get(),
            mem_size: ph.p_memsz.get(),
        }
    }

    #[inline]
    pub fn is_load(&self) -> bool {
        self.seg_type == ph_type::PT_LOAD
    }

    /// Physical placement address. Kernels that leave p_paddr zeroed are
    /// placed by p_vaddr instead.
    #[inline]
    pub fn placement(&self) -> u64 {
        if self.paddr != 0 {
            self.paddr
        } else {
            self.vaddr
        }
    }
}

/// Decode and validate the file header: magic, 64-bit class, little-endian
/// encoding.
pub fn parse_header(bytes: &[u8]) -> LoadResult<Elf64Header> {
    let (view, _rest) = LayoutVerified::<_, Elf64Header>::new_unaligned_from_prefix(bytes)
        .ok_or(LoadError::MalformedImage("file shorter than ELF header"))?;
    let header = *view;

    if header.e_ident[0..4] != ELF_MAGIC {
        return Err(LoadError::MalformedImage("bad ELF magic"));
    }
    if header.e_ident[4] != ident::ELFCLASS64 {
        return Err(LoadError::UnsupportedFormat("not a 64-bit image"));
    }
    if header.e_ident[5] != ident::ELFDATA2LSB {
        return Err(LoadError::UnsupportedFormat("not little-endian"));
    }

    Ok(header)
}

/// Check the target machine and executable type. ET_DYN is accepted for
/// position-independent kernels.
pub fn validate_machine(header: &Elf64Header) -> LoadResult<()> {
    if header.e_machine.get() != machine::EM_X86_64 {
        return Err(LoadError::UnsupportedArchitecture("machine is not x86_64"));
    }
    let ty = header.e_type.get();
    if ty != elf_type::ET_EXEC && ty != elf_type::ET_DYN {
        return Err(LoadError::UnsupportedArchitecture(
            "neither ET_EXEC nor ET_DYN",
        ));
    }
    Ok(())
}

/// Decode the program-header table: exactly `phentsize * phnum` bytes at
/// `phoff`. A table that runs past the file is fatal.
pub fn read_program_headers<'a>(
    bytes: &'a [u8],
    header: &Elf64Header,
) -> LoadResult<LayoutVerified<&'a [u8], [Elf64Phdr]>> {
    let phentsize = header.e_phentsize.get() as usize;
    let phnum = header.e_phnum.get() as usize;
    let phoff = header.e_phoff.get() as usize;

    if phentsize != core::mem::size_of::<Elf64Phdr>() {
        return Err(LoadError::MalformedImage("unexpected phentsize"));
    }
    if phnum == 0 {
        return Err(LoadError::EmptyImage);
    }

    let table_len = phentsize
        .checked_mul(phnum)
        .ok_or(LoadError::MalformedImage("phnum overflow"))?;
    let table_end = phoff
        .checked_add(table_len)
        .ok_or(LoadError::MalformedImage("phoff overflow"))?;
    if table_end > bytes.len() {
        return Err(LoadError::TruncatedImage("program-header table past EOF"));
    }

    LayoutVerified::new_slice_unaligned(&bytes[phoff..table_end])
        .ok_or(LoadError::TruncatedImage("program-header table short"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn minimal_header(phnum: u16, phoff: u64, entry: u64) -> Vec<u8> {
        let mut h = vec![0u8; 64];
        h[0..4].copy_from_slice(&ELF_MAGIC);
        h[4] = ident::ELFCLASS64;
        h[5] = ident::ELFDATA2LSB;
        h[6] = 1; // EV_CURRENT
        h[16..18].copy_from_slice(&elf_type::ET_EXEC.to_le_bytes());
        h[18..20].copy_from_slice(&machine::EM_X86_64.to_le_bytes());
        h[20..24].copy_from_slice(&1u32.to_le_bytes());
        h[24..32].copy_from_slice(&entry.to_le_bytes());
        h[32..40].copy_from_slice(&phoff.to_le_bytes());
        h[52..54].copy_from_slice(&64u16.to_le_bytes());
        h[54..56].copy_from_slice(&56u16.to_le_bytes());
        h[56..58].copy_from_slice(&phnum.to_le_bytes());
        h
    }

    fn raw_phdr(
        p_type: u32,
        offset: u64,
        paddr: u64,
        filesz: u64,
        memsz: u64,
    ) -> Vec<u8> {
        let mut p = vec![0u8; 56];
        p[0..4].copy_from_slice(&p_type.to_le_bytes());
        p[8..16].copy_from_slice(&offset.to_le_bytes());
        p[16..24].copy_from_slice(&paddr.to_le_bytes());
        p[24..32].copy_from_slice(&paddr.to_le_bytes());
        p[32..40].copy_from_slice(&filesz.to_le_bytes());
        p[40..48].copy_from_slice(&memsz.to_le_bytes());
        p[48..56].copy_from_slice(&0x1000u64.to_le_bytes());
        p
    }

    #[test]
    fn accepts_wellformed_header() {
        let bytes = minimal_header(1, 64, 0x10_0000);
        let header = parse_header(&bytes).unwrap();
        assert_eq!(header.e_entry.get(), 0x10_0000);
        assert_eq!(header.e_phnum.get(), 1);
        validate_machine(&header).unwrap();
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = minimal_header(1, 64, 0);
        bytes[0] = 0x00;
        assert!(matches!(
            parse_header(&bytes),
            Err(LoadError::MalformedImage(_))
        ));
    }

    #[test]
    fn rejects_short_file() {
        assert!(matches!(
            parse_header(&[0x7F, b'E']),
            Err(LoadError::MalformedImage(_))
        ));
    }

    #[test]
    fn rejects_wrong_class() {
        let mut bytes = minimal_header(1, 64, 0);
        bytes[4] = 1; // ELFCLASS32
        assert!(matches!(
            parse_header(&bytes),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn rejects_big_endian() {
        let mut bytes = minimal_header(1, 64, 0);
        bytes[5] = 2; // ELFDATA2MSB
        assert!(matches!(
            parse_header(&bytes),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn rejects_wrong_machine() {
        let mut bytes = minimal_header(1, 64, 0);
        bytes[18..20].copy_from_slice(&40u16.to_le_bytes()); // EM_ARM
        let header = parse_header(&bytes).unwrap();
        assert!(matches!(
            validate_machine(&header),
            Err(LoadError::UnsupportedArchitecture(_))
        ));
    }

    #[test]
    fn accepts_pie_type() {
        let mut bytes = minimal_header(1, 64, 0);
        bytes[16..18].copy_from_slice(&elf_type::ET_DYN.to_le_bytes());
        let header = parse_header(&bytes).unwrap();
        validate_machine(&header).unwrap();
    }

    #[test]
    fn rejects_relocatable_type() {
        let mut bytes = minimal_header(1, 64, 0);
        bytes[16..18].copy_from_slice(&1u16.to_le_bytes()); // ET_REL
        let header = parse_header(&bytes).unwrap();
        assert!(matches!(
            validate_machine(&header),
            Err(LoadError::UnsupportedArchitecture(_))
        ));
    }

    #[test]
    fn reads_program_header_table() {
        let mut bytes = minimal_header(2, 64, 0x20_0000);
        bytes.extend(raw_phdr(ph_type::PT_LOAD, 0x1000, 0x20_0000, 0x800, 0x1000));
        bytes.extend(raw_phdr(6 /* PT_PHDR */, 0, 0, 0, 0));

        let header = parse_header(&bytes).unwrap();
        let phdrs = read_program_headers(&bytes, &header).unwrap();
        assert_eq!(phdrs.len(), 2);

        let seg = SegmentDescriptor::from_phdr(&phdrs[0]);
        assert!(seg.is_load());
        assert_eq!(seg.placement(), 0x20_0000);
        assert_eq!(seg.file_size, 0x800);
        assert_eq!(seg.mem_size, 0x1000);
        assert!(!SegmentDescriptor::from_phdr(&phdrs[1]).is_load());
    }

    #[test]
    fn truncated_table_is_fatal() {
        // Header claims two program headers but only one is present.
        let mut bytes = minimal_header(2, 64, 0);
        bytes.extend(raw_phdr(ph_type::PT_LOAD, 0, 0x10_0000, 0x100, 0x100));

        let header = parse_header(&bytes).unwrap();
        assert!(matches!(
            read_program_headers(&bytes, &header),
            Err(LoadError::TruncatedImage(_))
        ));
    }

    #[test]
    fn zero_phnum_is_empty_image() {
        let bytes = minimal_header(0, 64, 0);
        let header = parse_header(&bytes).unwrap();
        assert!(matches!(
            read_program_headers(&bytes, &header),
            Err(LoadError::EmptyImage)
        ));
    }

    #[test]
    fn placement_falls_back_to_vaddr() {
        let mut raw = raw_phdr(ph_type::PT_LOAD, 0, 0, 0x100, 0x100);
        raw[16..24].copy_from_slice(&0x30_0000u64.to_le_bytes()); // vaddr
        raw[24..32].copy_from_slice(&0u64.to_le_bytes()); // paddr unset
        let view = LayoutVerified::<_, Elf64Phdr>::new_unaligned(&raw[..])
            .expect("phdr view");
        let seg = SegmentDescriptor::from_phdr(&view);
        assert_eq!(seg.placement(), 0x30_0000);
    }
}
