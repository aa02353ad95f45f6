//! The fixed 0x70-byte MZIP header.

use core::fmt;

use muon_elf::DataEncoding;

use crate::{crc, MzipError};

/// The four magic bytes at offset 0.
pub const MZIP_MAGIC: [u8; 4] = *b"MZIP";

/// Size of the fixed header; the code segment starts at this offset.
pub const HDR_SIZE: usize = 0x70;

/// End (exclusive) of the header-CRC scope.
pub const HDR_CRC_END: usize = 0x36;

/// Start of the header sub-range whose checksum seeds the code CRC.
pub const CODE_CRC_SEED_START: usize = 0x38;

// Field offsets within the serialized header.
const OFF_VERSION: usize = 0x04;
const OFF_ENTRY: usize = 0x08;
const OFF_FLAGS1: usize = 0x0c;
const OFF_FLAGS2: usize = 0x10;
const OFF_CRC_CODE: usize = 0x34;
const OFF_CRC_HEADER: usize = 0x36;
const OFF_HEADER_SIZE: usize = 0x38;
const OFF_LOADER_ADDR: usize = 0x3c;
const OFF_FLAGS3: usize = 0x40;
const OFF_PACKED_SIZE: usize = 0x44;
const OFF_UNPACKED_SIZE: usize = 0x48;
const OFF_IMAGE_SIZE: usize = 0x4c;

/// Parsed (or to-be-serialized) MZIP header, fields in native byte order.
///
/// The two padding blocks (`[0x14, 0x34)` and `[0x50, 0x70)`) are always
/// zero and are not represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MzipHeader {
    /// Format version; 1 for every image this codec produces.
    pub version: u32,
    /// Entry point of the unpacked image.
    pub entry: u32,
    /// First flag word.
    pub flags1: u32,
    /// Second flag word.
    pub flags2: u32,
    /// Checksum of the code segment (seeded from header bytes
    /// `[0x38, 0x70)`).
    pub crc_code: u16,
    /// Checksum of header bytes `[0x00, 0x36)`.
    pub crc_header: u16,
    /// Size of this header; always 0x70.
    pub header_size: u32,
    /// Address the unpacked code is loaded at.
    pub loader_addr: u32,
    /// Third flag word.
    pub flags3: u32,
    /// Byte length of the packed code segment as stored in the file.
    pub code_packed_size: u32,
    /// Byte length of the code segment after unpacking.
    pub code_unpacked_size: u32,
    /// Total memory span of the unpacked image, BSS included.
    pub memory_image_size: u32,
}

impl MzipHeader {
    /// A fresh version-1 header with every other field zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: 1,
            ..Self::default()
        }
    }

    /// Parses a serialized header stored in the given byte order.
    ///
    /// # Errors
    ///
    /// Returns [`MzipError::BadMagic`] on a magic mismatch and
    /// [`MzipError::Truncated`] if fewer than 0x70 bytes are available.
    pub fn parse(data: &[u8], e: DataEncoding) -> Result<Self, MzipError> {
        let raw = data.get(..HDR_SIZE).ok_or(MzipError::Truncated)?;
        if raw[..4] != MZIP_MAGIC {
            return Err(MzipError::BadMagic);
        }

        let u16_at = |off| e.read_u16(raw, off).unwrap_or(0);
        let u32_at = |off| e.read_u32(raw, off).unwrap_or(0);

        Ok(Self {
            version: u32_at(OFF_VERSION),
            entry: u32_at(OFF_ENTRY),
            flags1: u32_at(OFF_FLAGS1),
            flags2: u32_at(OFF_FLAGS2),
            crc_code: u16_at(OFF_CRC_CODE),
            crc_header: u16_at(OFF_CRC_HEADER),
            header_size: u32_at(OFF_HEADER_SIZE),
            loader_addr: u32_at(OFF_LOADER_ADDR),
            flags3: u32_at(OFF_FLAGS3),
            code_packed_size: u32_at(OFF_PACKED_SIZE),
            code_unpacked_size: u32_at(OFF_UNPACKED_SIZE),
            memory_image_size: u32_at(OFF_IMAGE_SIZE),
        })
    }

    /// Serializes the header in the given byte order.
    ///
    /// The CRC fields are written as-is; [`MzipHeader::seal`] is the
    /// operation that actually computes them.
    #[must_use]
    pub fn to_bytes(&self, e: DataEncoding) -> [u8; HDR_SIZE] {
        let mut b = [0u8; HDR_SIZE];
        b[..4].copy_from_slice(&MZIP_MAGIC);

        let mut put16 = |off: usize, v: u16| b[off..off + 2].copy_from_slice(&e.write_u16(v));
        put16(OFF_CRC_CODE, self.crc_code);
        put16(OFF_CRC_HEADER, self.crc_header);

        let mut put32 = |off: usize, v: u32| b[off..off + 4].copy_from_slice(&e.write_u32(v));
        put32(OFF_VERSION, self.version);
        put32(OFF_ENTRY, self.entry);
        put32(OFF_FLAGS1, self.flags1);
        put32(OFF_FLAGS2, self.flags2);
        put32(OFF_HEADER_SIZE, self.header_size);
        put32(OFF_LOADER_ADDR, self.loader_addr);
        put32(OFF_FLAGS3, self.flags3);
        put32(OFF_PACKED_SIZE, self.code_packed_size);
        put32(OFF_UNPACKED_SIZE, self.code_unpacked_size);
        put32(OFF_IMAGE_SIZE, self.memory_image_size);
        b
    }

    /// Computes both checksums over the serialized header and `code`, stores
    /// them in `self`, and returns the sealed header bytes.
    ///
    /// Order matters: the stored code CRC at `0x34` lies inside the header
    /// CRC's scope, so the code CRC is computed and patched in first.
    pub fn seal(&mut self, code: &[u8], e: DataEncoding) -> [u8; HDR_SIZE] {
        self.crc_code = 0;
        self.crc_header = 0;

        let mut bytes = self.to_bytes(e);

        // Code CRC only depends on [0x38, 0x70), which holds no CRC field.
        self.crc_code = crc::code_crc(&bytes, code).expect("fixed-size header");
        bytes[OFF_CRC_CODE..OFF_CRC_CODE + 2].copy_from_slice(&e.write_u16(self.crc_code));

        self.crc_header = crc::header_crc(&bytes).expect("fixed-size header");
        bytes[OFF_CRC_HEADER..OFF_CRC_HEADER + 2].copy_from_slice(&e.write_u16(self.crc_header));
        bytes
    }

    /// Recomputes both checksums of a serialized image and compares them
    /// with the stored fields.
    ///
    /// # Errors
    ///
    /// Returns the first mismatching scope, or a structural error for short
    /// or mis-tagged input.
    pub fn verify(image: &[u8], e: DataEncoding) -> Result<Self, MzipError> {
        let hdr = Self::parse(image, e)?;

        let packed = hdr.code_packed_size as usize;
        let code = image
            .get(HDR_SIZE..HDR_SIZE + packed)
            .ok_or(MzipError::Truncated)?;

        if crc::header_crc(image)? != hdr.crc_header {
            return Err(MzipError::HeaderCrcMismatch);
        }
        if crc::code_crc(image, code)? != hdr.crc_code {
            return Err(MzipError::CodeCrcMismatch);
        }
        Ok(hdr)
    }

    /// Whether `data` starts with the container magic.
    #[must_use]
    pub fn matches_magic(data: &[u8]) -> bool {
        data.len() >= 4 && data[..4] == MZIP_MAGIC
    }
}

impl fmt::Display for MzipHeader {
    /// Renders every field in hexadecimal, for engineering verification of
    /// freshly built images.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Magic: MZIP")?;
        writeln!(f, "Version: {:08x}", self.version)?;
        writeln!(f, "Entry Point: {:08x}", self.entry)?;
        writeln!(f, "Flags 1: {:08x}", self.flags1)?;
        writeln!(f, "Flags 2: {:08x}", self.flags2)?;
        writeln!(f, "CRC Code Segment: {:04x}", self.crc_code)?;
        writeln!(f, "CRC Header: {:04x}", self.crc_header)?;
        writeln!(f, "Header Size: {:08x}", self.header_size)?;
        writeln!(f, "Loader Address: {:08x}", self.loader_addr)?;
        writeln!(f, "Flags 3: {:08x}", self.flags3)?;
        writeln!(f, "Code size (packed): {:08x}", self.code_packed_size)?;
        writeln!(f, "Code size (unpacked): {:08x}", self.code_unpacked_size)?;
        write!(f, "Memory Image Size: {:08x}", self.memory_image_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> MzipHeader {
        let mut hdr = MzipHeader::new();
        hdr.entry = 0x8000_8000;
        hdr.flags1 = 1;
        hdr.flags2 = 1;
        hdr.header_size = HDR_SIZE as u32;
        hdr.loader_addr = 0x8000_0000;
        hdr.flags3 = 1;
        hdr.code_packed_size = 4;
        hdr.code_unpacked_size = 0x100;
        hdr.memory_image_size = 0x180;
        hdr
    }

    #[test]
    fn serialize_then_parse_round_trips_in_both_orders() {
        let mut hdr = sample_header();
        for e in [DataEncoding::Lsb, DataEncoding::Msb] {
            let bytes = hdr.seal(&[1, 2, 3, 4], e);
            let parsed = MzipHeader::parse(&bytes, e).unwrap();
            assert_eq!(parsed, hdr);
        }
    }

    #[test]
    fn seal_then_verify_accepts_the_image() {
        let code = [0xaau8; 4];
        let mut hdr = sample_header();
        let bytes = hdr.seal(&code, DataEncoding::Msb);

        let mut image = bytes.to_vec();
        image.extend_from_slice(&code);
        let checked = MzipHeader::verify(&image, DataEncoding::Msb).unwrap();
        assert_eq!(checked, hdr);
    }

    #[test]
    fn corruption_is_caught_scope_by_scope() {
        let code = [0x55u8; 4];
        let mut hdr = sample_header();
        let bytes = hdr.seal(&code, DataEncoding::Msb);
        let mut image = bytes.to_vec();
        image.extend_from_slice(&code);

        // Inside the header scope.
        let mut bad = image.clone();
        bad[OFF_ENTRY] ^= 0x80;
        assert_eq!(
            MzipHeader::verify(&bad, DataEncoding::Msb),
            Err(MzipError::HeaderCrcMismatch)
        );

        // Inside the code-seed scope: the header CRC does not cover
        // [0x38, 0x70), so only the code checksum trips.
        let mut bad = image.clone();
        bad[OFF_LOADER_ADDR] ^= 0x01;
        assert_eq!(
            MzipHeader::verify(&bad, DataEncoding::Msb),
            Err(MzipError::CodeCrcMismatch)
        );

        // In the code segment itself.
        let mut bad = image.clone();
        bad[HDR_SIZE + 2] ^= 0xff;
        assert_eq!(
            MzipHeader::verify(&bad, DataEncoding::Msb),
            Err(MzipError::CodeCrcMismatch)
        );
    }

    #[test]
    fn rejects_bad_magic_and_short_input() {
        let mut hdr = sample_header();
        let mut bytes = hdr.seal(&[], DataEncoding::Msb);
        bytes[0] = b'Z';
        assert_eq!(
            MzipHeader::parse(&bytes, DataEncoding::Msb),
            Err(MzipError::BadMagic)
        );
        assert_eq!(
            MzipHeader::parse(&bytes[..0x40], DataEncoding::Msb),
            Err(MzipError::Truncated)
        );
    }
}
