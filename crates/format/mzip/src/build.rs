//! Host-side image construction (`std` only).
//!
//! The packed code segment is produced by running the raw memory image
//! through the workspace's archiving facility (gzip via `flate2`): the
//! output is a single-member container stream, and the *entire container*,
//! member header and trailer included, becomes the code segment. The ROM
//! monitor's unpacker consumes the same one-member container shape, so the
//! packed size recorded in the header is the container length, not the
//! length of the bare compressed stream.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::vec::Vec;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use muon_elf::DataEncoding;

use crate::header::{MzipHeader, HDR_SIZE};

/// Compresses a raw memory image into the packed code segment.
///
/// # Errors
///
/// Returns the underlying I/O error if the compressor fails.
pub fn build_code_segment(image: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(image)?;
    encoder.finish()
}

/// Unpacks a code segment produced by [`build_code_segment`].
///
/// Diagnostic counterpart used by image inspection and tests; the on-device
/// unpacker is the ROM monitor's own.
///
/// # Errors
///
/// Returns the underlying I/O error if the stream is not a valid container.
pub fn unpack_code_segment(packed: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(packed).read_to_end(&mut out)?;
    Ok(out)
}

/// Writes a sealed header at the start of `w`, rewinding first.
///
/// # Errors
///
/// Returns the underlying I/O error on seek or write failure.
pub fn write_header<W: Write + Seek>(w: &mut W, sealed: &[u8; HDR_SIZE]) -> io::Result<()> {
    w.seek(SeekFrom::Start(0))?;
    w.write_all(sealed)
}

/// Writes the packed code segment at its fixed offset right after the
/// header.
///
/// # Errors
///
/// Returns the underlying I/O error on seek or write failure.
pub fn write_code_segment<W: Write + Seek>(w: &mut W, code: &[u8]) -> io::Result<()> {
    w.seek(SeekFrom::Start(HDR_SIZE as u64))?;
    w.write_all(code)
}

/// Appends the footer byte strings after everything else.
///
/// # Errors
///
/// Returns the underlying I/O error on seek or write failure.
pub fn write_footer<W: Write + Seek>(w: &mut W, footer: &[&[u8]]) -> io::Result<()> {
    w.seek(SeekFrom::End(0))?;
    for entry in footer {
        w.write_all(entry)?;
    }
    Ok(())
}

/// Seals `header` against `code` and writes the complete image: header,
/// code segment at offset 0x70, then the footer strings.
///
/// # Errors
///
/// Returns the underlying I/O error on any write failure.
pub fn write_image<W: Write + Seek>(
    w: &mut W,
    header: &mut MzipHeader,
    code: &[u8],
    footer: &[&[u8]],
    e: DataEncoding,
) -> io::Result<()> {
    let sealed = header.seal(code, e);
    write_header(w, &sealed)?;
    write_code_segment(w, code)?;
    write_footer(w, footer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc;
    use std::io::Cursor;

    #[test]
    fn packed_segment_is_a_one_member_container() {
        let image = [0x42u8; 300];
        let packed = build_code_segment(&image).unwrap();

        // Container magic, not a bare DEFLATE stream.
        assert_eq!(&packed[..2], &[0x1f, 0x8b]);
        assert_eq!(unpack_code_segment(&packed).unwrap(), image);
    }

    #[test]
    fn written_image_reproduces_both_stored_checksums() {
        let raw: Vec<u8> = (0u8..100).collect();
        let packed = build_code_segment(&raw).unwrap();

        let mut hdr = MzipHeader::new();
        hdr.entry = 0x8000_8000;
        hdr.flags1 = 1;
        hdr.flags2 = 1;
        hdr.header_size = HDR_SIZE as u32;
        hdr.loader_addr = 0x8000_0000;
        hdr.code_packed_size = packed.len() as u32;
        hdr.code_unpacked_size = raw.len() as u32;
        hdr.memory_image_size = raw.len() as u32;

        let mut file = Cursor::new(Vec::new());
        write_image(&mut file, &mut hdr, &packed, &[], DataEncoding::Msb).unwrap();
        let written = file.into_inner();

        // Independent recomputation from the written bytes alone.
        let stored = MzipHeader::parse(&written, DataEncoding::Msb).unwrap();
        let code = &written[HDR_SIZE..HDR_SIZE + packed.len()];
        assert_eq!(stored.crc_header, crc::header_crc(&written).unwrap());
        assert_eq!(stored.crc_code, crc::code_crc(&written, code).unwrap());

        MzipHeader::verify(&written, DataEncoding::Msb).unwrap();
    }

    #[test]
    fn footer_strings_land_after_the_code_segment() {
        let packed = build_code_segment(&[7u8; 10]).unwrap();
        let mut hdr = MzipHeader::new();
        hdr.code_packed_size = packed.len() as u32;

        let mut file = Cursor::new(Vec::new());
        write_image(
            &mut file,
            &mut hdr,
            &packed,
            &[b"board=rev2\0".as_slice(), b"build=local\0".as_slice()],
            DataEncoding::Msb,
        )
        .unwrap();
        let written = file.into_inner();

        let tail = &written[HDR_SIZE + packed.len()..];
        assert_eq!(tail, b"board=rev2\0build=local\0");
    }
}
