//! Per-family hardware description.
//!
//! Exactly one family feature is selected at build time; the choice fixes
//! the flash window, the directory entry layout, and the well-known
//! addresses the dispatcher needs. Nothing here is probed at runtime.

use muon_loader::Platform;

use crate::prom;

#[cfg(any(
    all(feature = "c1700", feature = "c3600"),
    all(feature = "c1700", feature = "c7200"),
    all(feature = "c3600", feature = "c7200"),
))]
compile_error!("select exactly one hardware family feature");

#[cfg(feature = "c1700")]
mod family {
    use muon_loader::dir::CompactFormat;

    pub const FAMILY: &str = "1700-series";
    pub const FLASH_BASE: usize = 0x6000_0000;
    pub const FLASH_WINDOW: usize = 16 << 20;
    pub const MEMORY_BASE: u32 = 0x8000_0000;
    pub const KERNEL_LOAD_ADDR: u32 = 0x8000_8000;
    pub const STAGE_TWO_ADDR: u32 = 0x8000_1000;
    pub type DirFmt = CompactFormat;
}

#[cfg(feature = "c3600")]
mod family {
    use muon_loader::dir::CompactFormat;

    pub const FAMILY: &str = "3600-series";
    pub const FLASH_BASE: usize = 0x3000_0000;
    pub const FLASH_WINDOW: usize = 32 << 20;
    pub const MEMORY_BASE: u32 = 0x8000_0000;
    pub const KERNEL_LOAD_ADDR: u32 = 0x8000_8000;
    pub const STAGE_TWO_ADDR: u32 = 0x8000_1000;
    pub type DirFmt = CompactFormat;
}

#[cfg(feature = "c7200")]
mod family {
    use muon_loader::dir::ExtendedFormat;

    pub const FAMILY: &str = "7200-series";
    // The directory lives past the monitor's own region of the device.
    pub const FLASH_BASE: usize = 0xba04_0000;
    pub const FLASH_WINDOW: usize = 16 << 20;
    pub const MEMORY_BASE: u32 = 0x8000_0000;
    pub const KERNEL_LOAD_ADDR: u32 = 0x8000_8000;
    pub const STAGE_TWO_ADDR: u32 = 0x8000_1000;
    pub type DirFmt = ExtendedFormat;
}

pub use family::{DirFmt, FAMILY};

/// The selected family, wired to the ROM monitor services.
pub struct PromPlatform {
    flash: &'static [u8],
}

impl PromPlatform {
    /// Maps the family's flash window.
    pub fn new() -> Self {
        // SAFETY: the flash device is memory-mapped and read-only at this
        // window on the selected family.
        let flash =
            unsafe { core::slice::from_raw_parts(family::FLASH_BASE as *const u8, family::FLASH_WINDOW) };
        Self { flash }
    }
}

impl Platform for PromPlatform {
    type DirFmt = DirFmt;

    fn flash(&self) -> &[u8] {
        self.flash
    }

    fn memory_kb(&self) -> u32 {
        prom::memsize()
    }

    fn console_baud(&self) -> u32 {
        prom::baud()
    }

    fn command_line_base(&self) -> u32 {
        family::MEMORY_BASE
    }

    fn stage_two_addr(&self) -> u32 {
        family::STAGE_TWO_ADDR
    }

    fn kernel_load_addr(&self) -> u32 {
        family::KERNEL_LOAD_ADDR
    }

    fn read_line(&mut self, buf: &mut [u8]) -> usize {
        prom::read_line(buf)
    }
}
