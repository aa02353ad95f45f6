//! Flat memory-image assembly from an ELF32 input.
//!
//! The image covers the span `[min_paddr, max(paddr + memsz))` over the
//! loadable segments: every `PT_LOAD` segment's file bytes are copied to
//! its physical address relative to the span base, and everything not
//! covered by file bytes, inter-segment gaps and BSS tails alike, stays
//! zero.

use anyhow::{bail, Result};
use muon_elf::{Class, DataEncoding, Elf32Header, ProgramHeader32, PHDR32_SIZE};

/// An assembled flat image plus the facts the container build needs.
#[derive(Debug)]
pub struct FlatImage {
    /// Entry point from the file header.
    pub entry: u32,
    /// Lowest loadable physical address; the image's base.
    pub base: u32,
    /// Byte order of the input, which the container output inherits.
    pub encoding: DataEncoding,
    /// The zero-filled memory image.
    pub bytes: Vec<u8>,
}

impl FlatImage {
    /// Parses `data` as ELF32 and assembles the flat image.
    ///
    /// # Errors
    ///
    /// Fails on non-ELF input, a 64-bit class (containers carry 32-bit
    /// images only), zero program headers, or an input with no loadable
    /// bytes.
    pub fn from_elf(data: &[u8]) -> Result<Self> {
        let hdr = Elf32Header::parse(data)?;

        if hdr.ident.class != Class::Elf32 {
            bail!("64-bit input; only 32-bit images can be converted");
        }
        if hdr.phnum == 0 {
            bail!("no program headers found");
        }

        let mut phdrs = Vec::with_capacity(usize::from(hdr.phnum));
        for i in 0..usize::from(hdr.phnum) {
            let off = hdr.phoff as usize + i * PHDR32_SIZE;
            let raw = data
                .get(off..off + PHDR32_SIZE)
                .ok_or_else(|| anyhow::anyhow!("program header table truncated"))?;
            phdrs.push(ProgramHeader32::parse(raw, hdr.ident.encoding)?);
        }

        // Span of the memory image across all loadable segments.
        let mut min_addr = u32::MAX;
        let mut max_addr = 0u32;
        for ph in phdrs.iter().filter(|ph| ph.is_load()) {
            let top = ph
                .paddr
                .checked_add(ph.memsz)
                .ok_or_else(|| anyhow::anyhow!("segment span overflows a 32-bit address"))?;
            min_addr = min_addr.min(ph.paddr);
            max_addr = max_addr.max(top);
        }
        if min_addr > max_addr || max_addr - min_addr == 0 {
            bail!("no loadable segments; is this a bootable image?");
        }

        let mut bytes = vec![0u8; (max_addr - min_addr) as usize];
        for ph in phdrs.iter().filter(|ph| ph.is_load()) {
            let end = ph
                .offset
                .checked_add(ph.filesz)
                .ok_or_else(|| anyhow::anyhow!("segment data truncated"))?;
            let src = data
                .get(ph.offset as usize..end as usize)
                .ok_or_else(|| anyhow::anyhow!("segment data truncated"))?;
            let dst = (ph.paddr - min_addr) as usize;
            bytes[dst..dst + src.len()].copy_from_slice(src);
        }

        Ok(Self {
            entry: hdr.entry,
            base: min_addr,
            encoding: hdr.ident.encoding,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muon_elf::{EHDR32_SIZE, ELF_MAGIC};

    struct Segment {
        ptype: u32,
        paddr: u32,
        data: Vec<u8>,
        memsz: u32,
    }

    /// Builds a big-endian ELF32 byte image with the given segments.
    fn build_elf32(class: u8, entry: u32, segments: &[Segment]) -> Vec<u8> {
        let e = DataEncoding::Msb;
        let phnum = segments.len() as u16;
        let phoff = EHDR32_SIZE as u32;
        let mut data_off = phoff + u32::from(phnum) * PHDR32_SIZE as u32;

        let mut v = Vec::new();
        v.extend_from_slice(&ELF_MAGIC);
        v.extend_from_slice(&[class, 2, 1]);
        v.resize(16, 0);
        v.extend_from_slice(&e.write_u16(2)); // etype
        v.extend_from_slice(&e.write_u16(8)); // machine
        v.extend_from_slice(&e.write_u32(1));
        v.extend_from_slice(&e.write_u32(entry));
        v.extend_from_slice(&e.write_u32(phoff));
        v.extend_from_slice(&e.write_u32(0)); // shoff
        v.extend_from_slice(&e.write_u32(0));
        v.extend_from_slice(&e.write_u16(EHDR32_SIZE as u16));
        v.extend_from_slice(&e.write_u16(PHDR32_SIZE as u16));
        v.extend_from_slice(&e.write_u16(phnum));
        v.extend_from_slice(&e.write_u16(40));
        v.extend_from_slice(&e.write_u16(3)); // shnum
        v.extend_from_slice(&e.write_u16(2));

        for seg in segments {
            v.extend_from_slice(&e.write_u32(seg.ptype));
            v.extend_from_slice(&e.write_u32(data_off));
            v.extend_from_slice(&e.write_u32(seg.paddr));
            v.extend_from_slice(&e.write_u32(seg.paddr));
            v.extend_from_slice(&e.write_u32(seg.data.len() as u32));
            v.extend_from_slice(&e.write_u32(seg.memsz));
            v.extend_from_slice(&e.write_u32(5));
            v.extend_from_slice(&e.write_u32(4));
            data_off += seg.data.len() as u32;
        }
        for seg in segments {
            v.extend_from_slice(&seg.data);
        }
        v
    }

    #[test]
    fn assembles_segments_at_their_span_relative_addresses() {
        let elf = build_elf32(
            1,
            0x8000_9000,
            &[
                Segment {
                    ptype: 1,
                    paddr: 0x9000,
                    data: vec![0xaa; 4],
                    memsz: 4,
                },
                Segment {
                    ptype: 1,
                    paddr: 0x9010,
                    data: vec![0xbb; 4],
                    memsz: 16,
                },
            ],
        );
        let img = FlatImage::from_elf(&elf).unwrap();

        assert_eq!(img.base, 0x9000);
        assert_eq!(img.entry, 0x8000_9000);
        // Span runs to 0x9010 + 16.
        assert_eq!(img.bytes.len(), 0x20);
        assert_eq!(&img.bytes[0..4], &[0xaa; 4]);
        assert_eq!(&img.bytes[4..0x10], &[0u8; 12]); // inter-segment gap
        assert_eq!(&img.bytes[0x10..0x14], &[0xbb; 4]);
        assert_eq!(&img.bytes[0x14..0x20], &[0u8; 12]); // BSS tail
    }

    #[test]
    fn skips_non_loadable_segments() {
        let elf = build_elf32(
            1,
            0,
            &[
                Segment {
                    ptype: 4, // PT_NOTE
                    paddr: 0,
                    data: vec![0xff; 32],
                    memsz: 32,
                },
                Segment {
                    ptype: 1,
                    paddr: 0x100,
                    data: vec![0x11; 8],
                    memsz: 8,
                },
            ],
        );
        let img = FlatImage::from_elf(&elf).unwrap();
        assert_eq!(img.base, 0x100);
        assert_eq!(img.bytes, vec![0x11; 8]);
    }

    #[test]
    fn rejects_inputs_without_loadable_bytes() {
        let elf = build_elf32(
            1,
            0,
            &[Segment {
                ptype: 4,
                paddr: 0,
                data: vec![1; 4],
                memsz: 4,
            }],
        );
        assert!(FlatImage::from_elf(&elf).is_err());
    }

    #[test]
    fn rejects_sixty_four_bit_input() {
        let elf = build_elf32(
            2,
            0,
            &[Segment {
                ptype: 1,
                paddr: 0,
                data: vec![1; 4],
                memsz: 4,
            }],
        );
        let err = FlatImage::from_elf(&elf).unwrap_err();
        assert!(err.to_string().contains("64-bit"));
    }

    #[test]
    fn rejects_non_elf_input() {
        assert!(FlatImage::from_elf(b"BZh91AY&SY...").is_err());
    }
}
