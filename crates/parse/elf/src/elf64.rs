//! ELF64 file header and program headers.
//!
//! The 64-bit counterpart to [`crate::elf32`], carried for the dispatcher's
//! class-byte split. Only the load path is needed, so there is no 64-bit
//! section table support. Note the layout difference: in ELF64 the `p_flags`
//! word moves up to offset 4, ahead of `p_offset`.

use crate::endian::DataEncoding;
use crate::ident::{Ident, IDENT_SIZE};
use crate::elf32::{SegmentFlags, PT_LOAD};
use crate::ElfError;

/// Size of the ELF64 file header.
pub const EHDR64_SIZE: usize = 64;

/// Size of one ELF64 program header entry.
pub const PHDR64_SIZE: usize = 56;

/// Parsed ELF64 file header, all fields in native byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64Header {
    /// Decoded identification block.
    pub ident: Ident,
    /// Object file type.
    pub etype: u16,
    /// Machine id (advisory, as in the 32-bit case).
    pub machine: u16,
    /// Object file version.
    pub version: u32,
    /// Entry point address.
    pub entry: u64,
    /// File offset of the program header table.
    pub phoff: u64,
    /// File offset of the section header table.
    pub shoff: u64,
    /// Processor-specific flags.
    pub flags: u32,
    /// Size of this header; 64 for every conforming file.
    pub ehsize: u16,
    /// Size of one program header table entry.
    pub phentsize: u16,
    /// Number of program header table entries.
    pub phnum: u16,
    /// Size of one section header table entry.
    pub shentsize: u16,
    /// Number of section header table entries.
    pub shnum: u16,
    /// Section header index of the section name string table.
    pub shstrndx: u16,
}

impl Elf64Header {
    /// Parses the 64-byte file header at the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError`] on bad magic, undefined class/encoding bytes, or
    /// short input.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        let ident = Ident::parse(data)?;
        let e = ident.encoding;

        if data.len() < EHDR64_SIZE {
            return Err(ElfError::Truncated);
        }

        let u16_at = |off| e.read_u16(data, off).ok_or(ElfError::Truncated);
        let u32_at = |off| e.read_u32(data, off).ok_or(ElfError::Truncated);
        let u64_at = |off| e.read_u64(data, off).ok_or(ElfError::Truncated);

        Ok(Self {
            ident,
            etype: u16_at(IDENT_SIZE)?,
            machine: u16_at(18)?,
            version: u32_at(20)?,
            entry: u64_at(24)?,
            phoff: u64_at(32)?,
            shoff: u64_at(40)?,
            flags: u32_at(48)?,
            ehsize: u16_at(52)?,
            phentsize: u16_at(54)?,
            phnum: u16_at(56)?,
            shentsize: u16_at(58)?,
            shnum: u16_at(60)?,
            shstrndx: u16_at(62)?,
        })
    }
}

/// Parsed ELF64 program header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader64 {
    /// Segment type; only `PT_LOAD` is actionable.
    pub ptype: u32,
    /// Permission flags.
    pub flags: SegmentFlags,
    /// Offset of the segment's first byte in the file.
    pub offset: u64,
    /// Virtual address of the segment's first byte in memory.
    pub vaddr: u64,
    /// Physical address of the segment's first byte in memory.
    pub paddr: u64,
    /// Number of bytes the segment occupies in the file.
    pub filesz: u64,
    /// Number of bytes the segment occupies in memory.
    pub memsz: u64,
    /// Alignment requirement.
    pub align: u64,
}

impl ProgramHeader64 {
    /// Parses one 56-byte entry at the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::Truncated`] on short input.
    pub fn parse(data: &[u8], e: DataEncoding) -> Result<Self, ElfError> {
        if data.len() < PHDR64_SIZE {
            return Err(ElfError::Truncated);
        }
        let u32_at = |off| e.read_u32(data, off).ok_or(ElfError::Truncated);
        let u64_at = |off| e.read_u64(data, off).ok_or(ElfError::Truncated);

        Ok(Self {
            ptype: u32_at(0)?,
            flags: SegmentFlags::from_bits_retain(u32_at(4)?),
            offset: u64_at(8)?,
            vaddr: u64_at(16)?,
            paddr: u64_at(24)?,
            filesz: u64_at(32)?,
            memsz: u64_at(40)?,
            align: u64_at(48)?,
        })
    }

    /// Whether this segment must be copied into memory before execution.
    #[must_use]
    pub fn is_load(&self) -> bool {
        self.ptype == PT_LOAD
    }
}
