//! ELF segment loading.
//!
//! Loading is two passes over the program header table, re-read through raw
//! seeks each time (a [`FlashFile`] has no structured rewind, only
//! positions):
//!
//! 1. the *footprint pass* sums `memsz` over every `PT_LOAD` entry and
//!    finds the lowest physical address among them; nothing is written
//!    until the total span is known, because loader, image, and jump target
//!    share one unprotected address space;
//! 2. the *copy pass* places each loadable segment at `footprint + paddr`
//!    and zero-fills its BSS gap.
//!
//! Structural failures abort the load. An oversized header or an unexpected
//! machine id are compatibility hints on this hardware, not correctness
//! violations: they warn and continue.

use muon_elf::{
    machine, Elf32Header, Elf64Header, ProgramHeader32, ProgramHeader64, EHDR32_SIZE, EHDR64_SIZE,
    PHDR32_SIZE, PHDR64_SIZE,
};

use crate::error::{FormatError, LoadError};
use crate::io::{FlashFile, Whence};
use crate::mem::LoadTarget;
use crate::{binfo, bwarn};

/// The result of placing an image in memory, everything the dispatcher
/// needs for the final control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    /// Entry point recorded in the file header.
    pub entry: u64,
    /// Total memory span of all loadable segments.
    pub footprint: u64,
    /// Lowest physical address among the loadable segments.
    pub lowest_paddr: u64,
}

impl LoadedImage {
    /// Address the image bytes were staged at: `footprint + lowest_paddr`.
    #[must_use]
    pub fn staging_addr(&self) -> u64 {
        self.footprint + self.lowest_paddr
    }
}

fn warn_header_oddities(ehsize: u16, expected: usize, machine: u16) {
    if usize::from(ehsize) != expected {
        bwarn!("ELF header of {ehsize} bytes found, expected {expected}");
    }
    if !machine::is_expected_kernel_machine(machine) {
        bwarn!(
            "unexpected machine type {:#06x} ({})",
            machine,
            machine::machine_name(machine)
        );
    }
}

/// Loads a 32-bit image through `target`.
///
/// # Errors
///
/// Fails on bad magic, undecodable headers, `phnum == 0`, `shnum == 0`,
/// inverted segment sizes, or truncated reads; advisory conditions only
/// warn.
pub fn load_elf32(
    fp: &mut FlashFile<'_>,
    target: &mut impl LoadTarget,
) -> Result<LoadedImage, LoadError> {
    let mut raw = [0u8; EHDR32_SIZE];
    fp.seek(0, Whence::Set)?;
    fp.read_exact(&mut raw)?;
    let hdr = Elf32Header::parse(&raw)?;

    if hdr.phnum == 0 {
        return Err(FormatError::NoProgramHeaders.into());
    }
    if hdr.shnum == 0 {
        return Err(FormatError::NoSectionHeaders.into());
    }
    warn_header_oddities(hdr.ehsize, EHDR32_SIZE, hdr.machine);

    // Footprint pass.
    let mut footprint: u64 = 0;
    let mut lowest_paddr = u64::MAX;
    let mut raw_ph = [0u8; PHDR32_SIZE];
    for i in 0..u32::from(hdr.phnum) {
        fp.seek(hdr.phoff.saturating_add(i * PHDR32_SIZE as u32), Whence::Set)?;
        fp.read_exact(&mut raw_ph)?;
        let ph = ProgramHeader32::parse(&raw_ph, hdr.ident.encoding)?;
        if !ph.is_load() {
            continue;
        }
        if ph.memsz < ph.filesz {
            return Err(FormatError::SegmentSizeInverted.into());
        }
        footprint += u64::from(ph.memsz);
        lowest_paddr = lowest_paddr.min(u64::from(ph.paddr));
    }

    // Copy pass.
    for i in 0..u32::from(hdr.phnum) {
        fp.seek(hdr.phoff.saturating_add(i * PHDR32_SIZE as u32), Whence::Set)?;
        fp.read_exact(&mut raw_ph)?;
        let ph = ProgramHeader32::parse(&raw_ph, hdr.ident.encoding)?;
        if !ph.is_load() {
            continue;
        }
        place_segment(
            fp,
            target,
            footprint + u64::from(ph.paddr),
            u64::from(ph.offset),
            u64::from(ph.filesz),
            u64::from(ph.memsz),
        )?;
    }

    binfo!("loaded {footprint} bytes at {:#010x}", footprint + u64::from(hdr.entry));

    Ok(LoadedImage {
        entry: u64::from(hdr.entry),
        footprint,
        lowest_paddr: if lowest_paddr == u64::MAX {
            0
        } else {
            lowest_paddr
        },
    })
}

/// Loads a 64-bit image through `target`. Same shape as [`load_elf32`] with
/// the wider header layouts.
///
/// # Errors
///
/// As [`load_elf32`].
pub fn load_elf64(
    fp: &mut FlashFile<'_>,
    target: &mut impl LoadTarget,
) -> Result<LoadedImage, LoadError> {
    let mut raw = [0u8; EHDR64_SIZE];
    fp.seek(0, Whence::Set)?;
    fp.read_exact(&mut raw)?;
    let hdr = Elf64Header::parse(&raw)?;

    if hdr.phnum == 0 {
        return Err(FormatError::NoProgramHeaders.into());
    }
    if hdr.shnum == 0 {
        return Err(FormatError::NoSectionHeaders.into());
    }
    warn_header_oddities(hdr.ehsize, EHDR64_SIZE, hdr.machine);

    let mut footprint: u64 = 0;
    let mut lowest_paddr = u64::MAX;
    let mut raw_ph = [0u8; PHDR64_SIZE];
    for i in 0..u64::from(hdr.phnum) {
        fp.seek(hdr.phoff.saturating_add(i * PHDR64_SIZE as u64) as u32, Whence::Set)?;
        fp.read_exact(&mut raw_ph)?;
        let ph = ProgramHeader64::parse(&raw_ph, hdr.ident.encoding)?;
        if !ph.is_load() {
            continue;
        }
        if ph.memsz < ph.filesz {
            return Err(FormatError::SegmentSizeInverted.into());
        }
        footprint += ph.memsz;
        lowest_paddr = lowest_paddr.min(ph.paddr);
    }

    for i in 0..u64::from(hdr.phnum) {
        fp.seek(hdr.phoff.saturating_add(i * PHDR64_SIZE as u64) as u32, Whence::Set)?;
        fp.read_exact(&mut raw_ph)?;
        let ph = ProgramHeader64::parse(&raw_ph, hdr.ident.encoding)?;
        if !ph.is_load() {
            continue;
        }
        place_segment(
            fp,
            target,
            footprint + ph.paddr,
            ph.offset,
            ph.filesz,
            ph.memsz,
        )?;
    }

    binfo!("loaded {footprint} bytes at {:#018x}", footprint + hdr.entry);

    Ok(LoadedImage {
        entry: hdr.entry,
        footprint,
        lowest_paddr: if lowest_paddr == u64::MAX {
            0
        } else {
            lowest_paddr
        },
    })
}

/// Copies one segment's file bytes to `addr` and zero-fills its BSS gap.
fn place_segment(
    fp: &mut FlashFile<'_>,
    target: &mut impl LoadTarget,
    addr: u64,
    offset: u64,
    filesz: u64,
    memsz: u64,
) -> Result<(), LoadError> {
    fp.seek(offset as u32, Whence::Set)?;
    let bytes = fp.read_ref(filesz as u32)?;
    target.copy_to(addr, bytes)?;

    let gap = memsz - filesz;
    if gap > 0 {
        target.zero_fill(addr + filesz, gap)?;
        binfo!("created uninitialized data region of {gap} bytes at {:#010x}", addr + filesz);
    }
    Ok(())
}
