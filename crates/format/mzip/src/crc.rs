//! The MZIP CRC-16 and its two coverage scopes.
//!
//! The algorithm is CCITT-style: polynomial `0x1021`, table-driven,
//! MSB-first, with the seed complemented going in and the remainder
//! complemented coming out. The complement-in/complement-out step is what
//! distinguishes it from plain XMODEM; on-device verifiers depend on it, so
//! it must not be "simplified" away.
//!
//! Coverage is split in two scopes over the serialized image:
//!
//! * the **header CRC** covers header bytes `[0x00, 0x36)` with a zero seed;
//! * the **code CRC** is seeded with the checksum of header bytes
//!   `[0x38, 0x70)` (itself computed with a zero seed) and continues over
//!   the full packed code segment.
//!
//! The two bytes at `[0x36, 0x38)`, the stored header CRC itself, are
//! covered by neither scope. The stored code CRC at `[0x34, 0x36)` *is*
//! inside the header scope, which fixes the computation order: code CRC
//! first, then header CRC over the patched bytes.

use crate::header::{CODE_CRC_SEED_START, HDR_CRC_END, HDR_SIZE};
use crate::MzipError;

const POLY: u16 = 0x1021;

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut ent = (i as u16) << 8;
        let mut j = 0;
        while j < 8 {
            ent = if ent & 0x8000 != 0 {
                (ent << 1) ^ POLY
            } else {
                ent << 1
            };
            j += 1;
        }
        table[i] = ent;
        i += 1;
    }
    table
}

static TABLE: [u16; 256] = build_table();

/// Computes the checksum of `data`, continuing from `seed`.
///
/// `seed` is a previous *returned* checksum (or zero to start a fresh
/// computation); it is complemented on entry and the final remainder is
/// complemented again on exit, so chained calls compose exactly like one
/// pass over the concatenated input.
#[must_use]
pub fn crc16(data: &[u8], seed: u16) -> u16 {
    let mut crc = !seed;
    for &byte in data {
        crc = TABLE[(((crc >> 8) ^ u16::from(byte)) & 0xff) as usize] ^ (crc << 8);
    }
    !crc
}

/// Computes the header checksum of a serialized 0x70-byte header.
///
/// # Errors
///
/// Returns [`MzipError::Truncated`] if `header` is shorter than the covered
/// range.
pub fn header_crc(header: &[u8]) -> Result<u16, MzipError> {
    let covered = header.get(..HDR_CRC_END).ok_or(MzipError::Truncated)?;
    Ok(crc16(covered, 0))
}

/// Computes the code-segment checksum: header bytes `[0x38, 0x70)` first,
/// continued over the packed code segment.
///
/// # Errors
///
/// Returns [`MzipError::Truncated`] if `header` is shorter than the fixed
/// header size.
pub fn code_crc(header: &[u8], code: &[u8]) -> Result<u16, MzipError> {
    let tail = header
        .get(CODE_CRC_SEED_START..HDR_SIZE)
        .ok_or(MzipError::Truncated)?;
    Ok(crc16(code, crc16(tail, 0)))
}
