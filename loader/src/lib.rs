//! `muon-loader` --- the runtime half of the muon boot pipeline.
//!
//! This crate contains everything between the boot prompt and the final jump
//! into a freshly loaded kernel: the flash directory walk, the read-only
//! file handle over a flash-resident pseudo-file, format classification,
//! the ELF segment loader, the pull-callback glue around the external LZMA
//! decoder, and the dispatcher state machine that ties them together.
//!
//! The crate is `no_std` and allocation-free: scratch space is a fixed
//! 512-byte refill buffer plus a handful of fixed-size line buffers, and
//! directory entries are only ever *referenced* as offsets into the flash
//! region. Everything except the [`transfer`] handoff itself runs on the
//! host under `cargo test`; the bare-metal entry point lives in the
//! separate `boot/` crate.

#![no_std]
#![warn(missing_docs)]

#[cfg(test)]
extern crate alloc;

pub mod dir;
pub mod dispatch;
pub mod elf;
pub mod error;
pub mod io;
pub mod log;
pub mod lzma;
pub mod mem;
pub mod transfer;

pub use dispatch::{boot_attempt, run, BootRequest, ImageKind, Platform};
pub use error::{DecodeError, FormatError, IoError, LoadError};
pub use io::{FlashFile, Whence};
pub use mem::LoadTarget;
pub use transfer::Handoff;
