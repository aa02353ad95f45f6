//! `muon-elf` --- a standalone, `no_std` ELF structural parser.
//!
//! This crate decodes the fixed-layout structures of ELF object files (file
//! header, program headers, section headers) from raw byte slices, for both
//! the 32-bit and 64-bit classes and both data encodings. It is a *read
//! path* only: there is no relocation, symbol resolution, or dynamic-linking
//! support, because the images it feeds are statically-linked kernels.
//!
//! The loader and the host-side imaging tools share this crate, so every
//! multi-byte field goes through [`endian::DataEncoding`] and nothing here
//! assumes the host byte order.
//!
//! # Usage
//!
//! ```ignore
//! let hdr = Elf32Header::parse(&file_bytes)?;
//! for i in 0..hdr.phnum {
//!     let off = hdr.phoff as usize + i as usize * PHDR32_SIZE;
//!     let ph = ProgramHeader32::parse(&file_bytes[off..], hdr.ident.encoding)?;
//!     if ph.is_load() { /* ... */ }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]

pub mod elf32;
pub mod elf64;
pub mod endian;
pub mod ident;
pub mod machine;

pub use elf32::{
    Elf32Header, ProgramHeader32, SectionHeader32, EHDR32_SIZE, PHDR32_SIZE, SHDR32_SIZE,
};
pub use elf64::{Elf64Header, ProgramHeader64, EHDR64_SIZE, PHDR64_SIZE};
pub use endian::DataEncoding;
pub use ident::{Class, Ident, ELF_MAGIC, IDENT_SIZE};

/// Errors that can occur while decoding ELF structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// The first four bytes were not `0x7f 'E' 'L' 'F'`.
    BadMagic,
    /// The class byte named neither the 32-bit nor the 64-bit class.
    BadClass,
    /// The data-encoding byte named neither LSB nor MSB encoding.
    BadEncoding,
    /// The input ended before the declared structure did.
    Truncated,
}

impl core::fmt::Display for ElfError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadMagic => write!(f, "bad ELF magic"),
            Self::BadClass => write!(f, "invalid ELF class"),
            Self::BadEncoding => write!(f, "invalid ELF data encoding"),
            Self::Truncated => write!(f, "ELF data truncated"),
        }
    }
}

impl core::error::Error for ElfError {}
