//! Read-only positioned file handles over the flash region.
//!
//! A [`FlashFile`] is a pseudo-file: the flash device is memory-mapped, so
//! "opening" a file resolves a directory entry to an offset/length pair and
//! "reading" copies (or directly references) bytes out of the flash slice.
//! There is no write path and nothing to close.

use crate::dir::{self, DirectoryFormat};
use crate::error::{IoError, LoadError};

/// Maximum stored file-name length, matching the compact directory layout.
pub const NAME_MAX: usize = 48;

/// Seek origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the file.
    Set,
    /// From the current position.
    Cur,
    /// From the end of the file. Unimplemented: seeking this way fails
    /// loudly instead of silently landing somewhere wrong.
    End,
}

/// The directory entry backing an open handle.
///
/// Resolved exactly once, at open time; a handle never re-scans the
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backing {
    /// Offset/length of the file's data within the flash slice.
    Resolved { data_offset: usize, length: u32 },
}

/// An open, read-only file on the flash filesystem.
#[derive(Debug)]
pub struct FlashFile<'a> {
    flash: &'a [u8],
    backing: Backing,
    pos: u32,
    name: [u8; NAME_MAX],
    name_len: usize,
}

impl<'a> FlashFile<'a> {
    /// Opens `name`, resolving it against the directory format `D`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FileNotFound`] when the directory scan comes up
    /// empty.
    pub fn open<D: DirectoryFormat>(flash: &'a [u8], name: &str) -> Result<Self, LoadError> {
        let entry = dir::find_file::<D>(flash, name).ok_or(IoError::FileNotFound)?;

        let mut stored = [0u8; NAME_MAX];
        let len = entry.name.len().min(NAME_MAX);
        stored[..len].copy_from_slice(&entry.name[..len]);

        Ok(Self {
            flash,
            backing: Backing::Resolved {
                data_offset: entry.data_offset,
                length: entry.length,
            },
            pos: 0,
            name: stored,
            name_len: len,
        })
    }

    /// Total file length in bytes.
    #[must_use]
    pub fn len(&self) -> u32 {
        let Backing::Resolved { length, .. } = self.backing;
        length
    }

    /// Whether the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current read position.
    #[must_use]
    pub fn tell(&self) -> u32 {
        self.pos
    }

    /// The short file name recorded in the directory entry.
    #[must_use]
    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len]).unwrap_or("<non-utf8>")
    }

    /// Reads up to `buf.len()` bytes at the current position, advancing it.
    /// Returns the number of bytes read; short counts mean end-of-file.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let Backing::Resolved {
            data_offset,
            length,
        } = self.backing;

        let remaining = (length - self.pos) as usize;
        let n = buf.len().min(remaining);
        let start = data_offset + self.pos as usize;
        buf[..n].copy_from_slice(&self.flash[start..start + n]);
        self.pos += n as u32;
        n
    }

    /// Reads exactly `buf.len()` bytes or fails.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ShortRead`] when end-of-file intervenes.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), LoadError> {
        if self.read(buf) == buf.len() {
            Ok(())
        } else {
            Err(IoError::ShortRead.into())
        }
    }

    /// Borrows `len` bytes at the current position straight out of flash,
    /// advancing the position. The zero-copy path for bulk segment copies.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ShortRead`] when fewer than `len` bytes remain.
    pub fn read_ref(&mut self, len: u32) -> Result<&'a [u8], LoadError> {
        let Backing::Resolved {
            data_offset,
            length,
        } = self.backing;

        if self.pos.checked_add(len).is_none_or(|end| end > length) {
            return Err(IoError::ShortRead.into());
        }
        let start = data_offset + self.pos as usize;
        self.pos += len;
        Ok(&self.flash[start..start + len as usize])
    }

    /// Repositions the handle.
    ///
    /// `Set` and `Cur` clamp a target past end-of-file to end-of-file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::SeekFromEndUnsupported`] for `Whence::End`.
    pub fn seek(&mut self, offset: u32, whence: Whence) -> Result<(), LoadError> {
        let length = self.len();
        match whence {
            Whence::Set => self.pos = offset.min(length),
            Whence::Cur => self.pos = self.pos.saturating_add(offset).min(length),
            Whence::End => return Err(IoError::SeekFromEndUnsupported.into()),
        }
        Ok(())
    }
}
