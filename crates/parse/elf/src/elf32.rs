//! ELF32 file header, program headers, and section headers.
//!
//! Fixed layouts per the public ELF specification: 52-byte file header,
//! 32-byte program header entries, 40-byte section header entries. Parsing
//! is zero-allocation and never assumes the host byte order.

use bitflags::bitflags;

use crate::endian::DataEncoding;
use crate::ident::{Ident, IDENT_SIZE};
use crate::ElfError;

/// Size of the ELF32 file header.
pub const EHDR32_SIZE: usize = 52;

/// Size of one ELF32 program header entry.
pub const PHDR32_SIZE: usize = 32;

/// Size of one ELF32 section header entry.
pub const SHDR32_SIZE: usize = 40;

// ---------------------------------------------------------------------------
// Segment and section type constants
// ---------------------------------------------------------------------------

/// Segment type: loadable bytes, the only type the loader acts on.
pub const PT_LOAD: u32 = 1;

/// Section type: no space in the file, zero-filled in memory.
pub const SHT_NOBITS: u32 = 8;

// ---------------------------------------------------------------------------
// Elf32Header
// ---------------------------------------------------------------------------

/// Parsed ELF32 file header, all fields in native byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32Header {
    /// Decoded identification block.
    pub ident: Ident,
    /// Object file type (2 = executable).
    pub etype: u16,
    /// Machine id. Advisory only: router vendors ship images with
    /// unregistered values, so an unexpected id must not gate a load.
    pub machine: u16,
    /// Object file version.
    pub version: u32,
    /// Entry point address.
    pub entry: u32,
    /// File offset of the program header table.
    pub phoff: u32,
    /// File offset of the section header table.
    pub shoff: u32,
    /// Processor-specific flags.
    pub flags: u32,
    /// Size of this header; 52 for every conforming file.
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

impl Elf32Header {
    /// Parses the 52-byte file header at the start of `data`.
    ///
    /// The ident block is validated first; every following multi-byte field
    /// is normalized through the encoding it declares.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError`] on bad magic, undefined class/encoding bytes, or
    /// short input.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        let ident = Ident::parse(data)?;
        let e = ident.encoding;

        if data.len() < EHDR32_SIZE {
            return Err(ElfError::Truncated);
        }

        let u16_at = |off| e.read_u16(data, off).ok_or(ElfError::Truncated);
        let u32_at = |off| e.read_u32(data, off).ok_or(ElfError::Truncated);

        Ok(Self {
            ident,
            etype: u16_at(IDENT_SIZE)?,
            machine: u16_at(18)?,
            version: u32_at(20)?,
            entry: u32_at(24)?,
            phoff: u32_at(28)?,
            shoff: u32_at(32)?,
            flags: u32_at(36)?,
            ehsize: u16_at(40)?,
            phentsize: u16_at(42)?,
            phnum: u16_at(44)?,
            shentsize: u16_at(46)?,
            shnum: u16_at(48)?,
            shstrndx: u16_at(50)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ProgramHeader32
// ---------------------------------------------------------------------------

bitflags! {
    /// Segment permission flags (`p_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        /// Executable.
        const X = 1;
        /// Writable.
        const W = 2;
        /// Readable.
        const R = 4;
    }
}

/// Parsed ELF32 program header entry (one segment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader32 {
    /// Segment type; only [`PT_LOAD`] is actionable, everything else is
    /// skipped by the loader.
    pub ptype: u32,
    /// Offset of the segment's first byte in the file.
    pub offset: u32,
    /// Virtual address of the segment's first byte in memory.
    pub vaddr: u32,
    /// Physical address of the segment's first byte in memory.
    pub paddr: u32,
    /// Number of bytes the segment occupies in the file.
    pub filesz: u32,
    /// Number of bytes the segment occupies in memory; `memsz - filesz` is
    /// the BSS gap, zero-filled and never read from the file.
    pub memsz: u32,
    /// Permission flags.
    pub flags: SegmentFlags,
    /// Alignment requirement.
    pub align: u32,
}

impl ProgramHeader32 {
    /// Parses one 32-byte entry at the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::Truncated`] on short input.
    pub fn parse(data: &[u8], e: DataEncoding) -> Result<Self, ElfError> {
        if data.len() < PHDR32_SIZE {
            return Err(ElfError::Truncated);
        }
        let u32_at = |off| e.read_u32(data, off).ok_or(ElfError::Truncated);

        Ok(Self {
            ptype: u32_at(0)?,
            offset: u32_at(4)?,
            vaddr: u32_at(8)?,
            paddr: u32_at(12)?,
            filesz: u32_at(16)?,
            memsz: u32_at(20)?,
            flags: SegmentFlags::from_bits_retain(u32_at(24)?),
            align: u32_at(28)?,
        })
    }

    /// Whether this segment must be copied into memory before execution.
    #[must_use]
    pub fn is_load(&self) -> bool {
        self.ptype == PT_LOAD
    }
}

// ---------------------------------------------------------------------------
// SectionHeader32
// ---------------------------------------------------------------------------

/// Parsed ELF32 section header entry.
///
/// Sections are inspection-only here: the runtime loader works from program
/// headers, and only the standalone analysis tool walks the section table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader32 {
    /// Index of this section's name in the section name string table.
    pub name: u32,
    /// Section type.
    pub stype: u32,
    /// Section flags.
    pub flags: u32,
    /// Address of the section in the memory image, if allocated.
    pub addr: u32,
    /// Byte offset of the section contents in the file.
    pub offset: u32,
    /// Size of the section in bytes.
    pub size: u32,
    /// Section header table index link.
    pub link: u32,
    /// Extra type-dependent information.
    pub info: u32,
    /// Alignment constraint.
    pub addralign: u32,
    /// Per-entry size, for sections holding fixed-size records.
    pub entsize: u32,
}

impl SectionHeader32 {
    /// Parses one 40-byte entry at the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::Truncated`] on short input.
    pub fn parse(data: &[u8], e: DataEncoding) -> Result<Self, ElfError> {
        if data.len() < SHDR32_SIZE {
            return Err(ElfError::Truncated);
        }
        let u32_at = |off| e.read_u32(data, off).ok_or(ElfError::Truncated);

        Ok(Self {
            name: u32_at(0)?,
            stype: u32_at(4)?,
            flags: u32_at(8)?,
            addr: u32_at(12)?,
            offset: u32_at(16)?,
            size: u32_at(20)?,
            link: u32_at(24)?,
            info: u32_at(28)?,
            addralign: u32_at(32)?,
            entsize: u32_at(36)?,
        })
    }

    /// Human-readable name of this section's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.stype {
            0 => "NULL",
            1 => "PROGBITS",
            2 => "SYMTAB",
            3 => "STRTAB",
            4 => "RELA",
            5 => "HASH",
            6 => "DYNAMIC",
            7 => "NOTE",
            8 => "NOBITS",
            9 => "REL",
            10 => "SHLIB",
            11 => "DYNSYM",
            0x7000_0000..=0x7fff_ffff => "processor-specific",
            0x8000_0000..=0xffff_ffff => "application-specific",
            _ => "unknown",
        }
    }

    /// Whether the section occupies memory during execution (`SHF_ALLOC`).
    #[must_use]
    pub fn is_alloc(&self) -> bool {
        self.flags & 0x2 != 0
    }

    /// Whether the section contains writable data (`SHF_WRITE`).
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.flags & 0x1 != 0
    }

    /// Whether the section contains executable instructions
    /// (`SHF_EXECINSTR`).
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.flags & 0x4 != 0
    }
}
