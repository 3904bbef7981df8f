//! # QEMU debug console output
//!
//! Routes kernel diagnostics to QEMU's debug console (I/O port `0x402`).
//! Capture it on the host with `-debugcon stdio` or `-debugcon file:mm.log`.
//!
//! [`QemuLogger`] plugs the console into the `log` facade so the memory
//! subsystem can use `log::info!` and friends. [`qemu_trace!`] writes
//! directly and is usable before a logger is installed.
//!
//! Port I/O is only compiled for bare-metal x86 targets. On hosted targets,
//! and when the `enabled` feature is off, output is discarded.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::{QemuLogger, write_record};

#[cfg(all(
    feature = "enabled",
    target_os = "none",
    any(target_arch = "x86", target_arch = "x86_64")
))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    const QEMU_DEBUG_PORT: u16 = 0x402;

    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn dbg_putc(c: u8) {
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") QEMU_DEBUG_PORT,
                in("al") c,
                options(nomem, nostack, preserves_flags)
            );
        }
    }

    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            s.bytes().for_each(dbg_putc);
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // best effort
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(all(
    feature = "enabled",
    target_os = "none",
    any(target_arch = "x86", target_arch = "x86_64")
)))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline]
    pub const fn qemu_write(_: fmt::Arguments) {}
}

/// `format!`-style write to the QEMU debug console.
///
/// ```
/// kernel_qemu::qemu_trace!("pool at frame {:#x}\n", 0x200);
/// ```
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
