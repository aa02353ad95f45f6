//! The final control transfer.
//!
//! Jumping into freshly loaded memory has no checked equivalent: it is a
//! one-way door, taken exactly once per successful load, and after it this
//! code no longer exists as far as the machine is concerned. Everything
//! irreversible in the crate is concentrated in [`execute`] so the rest of
//! the pipeline stays ordinary checked Rust.

/// How to enter a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// Jump straight to `entry`. Used for images decompressed in place,
    /// entered with the fixed `(memory size, command line)` convention.
    Direct {
        /// Address to jump to.
        entry: u64,
    },
    /// Enter through the platform's resident copy stub, which moves the
    /// staged image down to its link address and then jumps to the entry
    /// point. Used for ELF images, which are staged above their link
    /// address so the copy cannot overwrite the running loader.
    Staged {
        /// Address of the copy stub.
        stub: u32,
        /// Where the staged image bytes currently sit.
        data_offset: u32,
        /// Length of the staged image in bytes.
        length: u32,
        /// Kernel entry point, jumped to after the copy.
        entry: u32,
        /// Address the image must be copied down to.
        load_addr: u32,
    },
}

/// Hands execution to the loaded image. Never returns.
///
/// `memory_kb` and `cmd_line` follow the fixed kernel calling convention:
/// first argument the installed memory size, second a pointer to the
/// NUL-terminated command line.
///
/// # Safety
///
/// Permanently irreversible. The caller asserts that the bytes at the
/// handoff's addresses are a complete, correctly placed image and that the
/// command line has been written at `cmd_line`. There is no supervisor to
/// return to; if the image is wrong, the machine is gone until reset.
#[cfg(target_arch = "mips")]
pub unsafe fn execute(handoff: Handoff, memory_kb: u32, cmd_line: u32) -> ! {
    match handoff {
        Handoff::Direct { entry } => {
            // SAFETY: upheld by the caller.
            unsafe {
                core::arch::asm!(
                    ".set noreorder",
                    "move $k0, {entry}",
                    "move $a0, {mem}",
                    "move $a1, {cmd}",
                    "jr $k0",
                    " nop",
                    ".set reorder",
                    entry = in(reg) entry as u32,
                    mem = in(reg) memory_kb,
                    cmd = in(reg) cmd_line,
                    options(noreturn),
                )
            }
        }
        Handoff::Staged {
            stub,
            data_offset,
            length,
            entry,
            load_addr,
        } => {
            // SAFETY: upheld by the caller.
            unsafe {
                core::arch::asm!(
                    ".set noreorder",
                    "move $k0, {stub}",
                    "move $a0, {data}",
                    "move $a1, {len}",
                    "move $a2, {entry}",
                    "move $a3, {load}",
                    "jr $k0",
                    " nop",
                    ".set reorder",
                    stub = in(reg) stub,
                    data = in(reg) data_offset,
                    len = in(reg) length,
                    entry = in(reg) entry,
                    load = in(reg) load_addr,
                    options(noreturn),
                )
            }
        }
    }
}

/// Hands execution to the loaded image. Never returns.
///
/// # Safety
///
/// See the hardware implementation. This stub exists so the crate builds on
/// development hosts; it is unreachable anywhere but the bare target.
#[cfg(not(target_arch = "mips"))]
pub unsafe fn execute(handoff: Handoff, memory_kb: u32, cmd_line: u32) -> ! {
    let _ = (handoff, memory_kb, cmd_line);
    unreachable!("control transfer is only meaningful on router hardware");
}
