//! Console byte sink registration.
//!
//! The MIPS families write characters through a monitor syscall; the
//! PowerPC family pokes a memory-mapped UART, busy-waiting on its status
//! register before every byte. Both are blocking primitives with no timeout
//! and no cancellation: a wedged console wedges the loader, which is
//! accepted, since there is nobody underneath us to time out to.

use core::fmt;

use muon_loader::log::set_print_fn;

#[cfg(feature = "c1700")]
mod sink {
    const UART_BASE: *mut u8 = 0x6805_0000 as *mut u8;
    const UART_LSR: usize = 0x5;
    const LSR_THR_EMPTY: u8 = 0x20;

    pub fn putc(c: u8) {
        // SAFETY: fixed UART registers on this family; reads and writes are
        // side-effecting MMIO.
        unsafe {
            while core::ptr::read_volatile(UART_BASE.add(UART_LSR)) & LSR_THR_EMPTY == 0 {
                core::hint::spin_loop();
            }
            core::ptr::write_volatile(UART_BASE, c);
        }
    }
}

#[cfg(not(feature = "c1700"))]
mod sink {
    pub use crate::prom::putc;
}

struct Console;

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &b in s.as_bytes() {
            if b == b'\n' {
                sink::putc(b'\r');
            }
            sink::putc(b);
        }
        Ok(())
    }
}

fn print(args: fmt::Arguments<'_>) {
    let _ = fmt::Write::write_fmt(&mut Console, args);
}

/// Routes the loader's output macros to this platform's console.
pub fn init() {
    set_print_fn(print);
}
