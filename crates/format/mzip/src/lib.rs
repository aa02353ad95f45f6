//! `muon-mzip` --- codec for the self-extracting MZIP container format.
//!
//! MZIP is the fixed-layout container the resident ROM monitor on the
//! supported router families knows how to unpack: a 0x70-byte header, a
//! compressed code segment immediately after it, and an optional trailing
//! footer of opaque byte strings. Two CRC-16 checksums protect the image,
//! with a checksum scheme peculiar enough that it is documented in detail in
//! [`crc`].
//!
//! The header/CRC core is `no_std` and shared with the runtime loader (which
//! uses it to recognize and sanity-check containers it is handed); the build
//! path that actually produces images lives behind the `std` feature and is
//! used by the host-side conversion tool.

#![no_std]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate std;

pub mod crc;
pub mod header;

#[cfg(feature = "std")]
pub mod build;

pub use header::{MzipHeader, HDR_SIZE, MZIP_MAGIC};

/// Errors that can occur while decoding or verifying a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MzipError {
    /// The first four bytes were not `"MZIP"`.
    BadMagic,
    /// The input ended before the fixed header (or declared code segment)
    /// did.
    Truncated,
    /// The stored header checksum does not match the header bytes.
    HeaderCrcMismatch,
    /// The stored code-segment checksum does not match the image.
    CodeCrcMismatch,
}

impl core::fmt::Display for MzipError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadMagic => write!(f, "bad MZIP magic"),
            Self::Truncated => write!(f, "MZIP data truncated"),
            Self::HeaderCrcMismatch => write!(f, "MZIP header checksum mismatch"),
            Self::CodeCrcMismatch => write!(f, "MZIP code segment checksum mismatch"),
        }
    }
}

impl core::error::Error for MzipError {}
