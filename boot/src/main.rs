//! Bare-metal entry point for the muon loader.
//!
//! This crate is the platform-specific stub around `muon-loader`: it brings
//! up console output through the ROM monitor (or a polled UART, depending
//! on the family), sanity-checks the flash device, prints the boot banner
//! and directory listing, and then parks in the interactive dispatch loop.
//! Everything with actual logic lives in the workspace crates; this binary
//! is wiring.

#![no_std]
#![no_main]

mod codec;
mod console;
mod platform;
mod prom;

use muon_loader::mem::PhysicalMemory;
use muon_loader::{binfo, bprintln, dir, Platform as _};

use platform::PromPlatform;

#[unsafe(no_mangle)]
extern "C" fn _start() -> ! {
    console::init();

    let mut platform = PromPlatform::new();

    if !dir::check_flash::<platform::DirFmt>(platform.flash()) {
        bprintln!();
        bprintln!("error: unable to find any valid flash! Aborting load.");
        prom::park();
    }

    bprintln!();
    bprintln!("muon - Linux bootloader for {} routers", platform::FAMILY);
    binfo!("available RAM: {} kB", platform.memory_kb());

    binfo!("available files:");
    for entry in dir::entries::<platform::DirFmt>(platform.flash()) {
        bprintln!("{}", core::str::from_utf8(entry.name).unwrap_or("<non-utf8>"));
    }

    // SAFETY: boot-time single thread, flat address space; the footprint
    // arithmetic inside the loader is what keeps loads clear of this image.
    let mut target = unsafe { PhysicalMemory::new() };
    let mut decoder = codec::SdkDecoder::new();

    muon_loader::run(&mut platform, &mut target, &mut decoder)
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo<'_>) -> ! {
    bprintln!();
    bprintln!("loader panic: {info}");
    prom::park()
}
