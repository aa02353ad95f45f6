//! The loader's error taxonomy.
//!
//! Three classes, all fatal to the *current load attempt* and none fatal to
//! the loader itself: the dispatcher catches every one of them at the top of
//! its loop and drops back to the prompt. Advisory conditions (unexpected
//! machine id, oversized header) are not errors at all; they are logged via
//! [`crate::bwarn!`] and the load continues.

use core::fmt;

use muon_elf::ElfError;
use muon_mzip::MzipError;

/// Structural problems in the image being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// The underlying ELF structure failed to decode.
    Elf(ElfError),
    /// The underlying container structure failed to decode or verify.
    Mzip(MzipError),
    /// A kernel image must carry at least one program header.
    NoProgramHeaders,
    /// A kernel image must carry at least one section header.
    NoSectionHeaders,
    /// A segment declared `memsz < filesz`.
    SegmentSizeInverted,
    /// The image asks to be placed at addresses the load target does not
    /// cover.
    AddressOutOfRange,
    /// Self-extracting container images are started by the ROM monitor, not
    /// by this loader.
    ContainerNotBootable,
    /// The leading bytes match no format this loader knows.
    UnknownImageFormat,
}

/// Failures of the flash pseudo-file layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// The requested name is not in the flash directory.
    FileNotFound,
    /// Seeking relative to end-of-file is not implemented.
    SeekFromEndUnsupported,
    /// A read came up short against the declared structure.
    ShortRead,
}

/// Failures signalled by the external decompressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The properties block at the start of the stream is invalid.
    BadProperties,
    /// The compressed stream is corrupt, or the decoder asked for input
    /// past the end of the file.
    Data,
}

/// Any failure of a single load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// Bad magic, wrong class, zero header counts, broken checksums.
    Format(FormatError),
    /// File not found, read/seek failure.
    Io(IoError),
    /// The external codec gave up.
    Decode(DecodeError),
}

impl From<FormatError> for LoadError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<IoError> for LoadError {
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}

impl From<DecodeError> for LoadError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<ElfError> for LoadError {
    fn from(e: ElfError) -> Self {
        Self::Format(FormatError::Elf(e))
    }
}

impl From<MzipError> for LoadError {
    fn from(e: MzipError) -> Self {
        Self::Format(FormatError::Mzip(e))
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elf(e) => write!(f, "{e}"),
            Self::Mzip(e) => write!(f, "{e}"),
            Self::NoProgramHeaders => write!(f, "no program headers in kernel image"),
            Self::NoSectionHeaders => write!(f, "no section headers in kernel image"),
            Self::SegmentSizeInverted => write!(f, "segment memory size below its file size"),
            Self::AddressOutOfRange => write!(f, "image addresses outside the load target"),
            Self::ContainerNotBootable => {
                write!(f, "self-extracting container images boot via the ROM monitor")
            }
            Self::UnknownImageFormat => write!(f, "unrecognized image format"),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound => write!(f, "file not found on the flash filesystem"),
            Self::SeekFromEndUnsupported => write!(f, "seek from end-of-file is unsupported"),
            Self::ShortRead => write!(f, "read truncated by end-of-file"),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadProperties => write!(f, "error decoding compression properties"),
            Self::Data => write!(f, "compressed data error"),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "format error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}
