//! Interrupt masking for critical sections that an interrupt handler may re-enter.
//!
//! On bare-metal x86 targets (`target_os = "none"`) the guard issues
//! `cli`/`sti` and reads `IF` from (E/R)FLAGS. On hosted targets there are no
//! interrupts to mask, so the guard only tracks nesting and the code above it
//! runs unchanged in unit tests.

use crate::{Mutex, MutexGuard, RawLock, RawUnlock};
use core::ops::{Deref, DerefMut};

/// Bit 9 of (E/R)FLAGS.
const IF_BIT: usize = 1 << 9;

/// A mutex guard that also keeps interrupts disabled while held.
///
/// Created by [`Mutex::lock_irq`]: interrupts are masked first, then the lock
/// is taken; drop releases in reverse order.
///
/// ```
/// use kernel_sync::{Mutex, RawSpin};
///
/// let m: Mutex<u32, RawSpin> = Mutex::from_raw(RawSpin::new(), 1);
/// {
///     let mut g = m.lock_irq();
///     *g += 1;
/// }
/// assert_eq!(*m.lock(), 2);
/// ```
pub struct IrqMutex<'a, T, R: RawLock + RawUnlock> {
    // Field order matters: the lock is released before interrupts come back.
    guard: MutexGuard<'a, T, R>,
    _irq: IrqGuard,
}

impl<T, R: RawLock + RawUnlock> Mutex<T, R> {
    /// Mask interrupts, then acquire the lock.
    #[inline]
    pub fn lock_irq(&self) -> IrqMutex<'_, T, R> {
        let irq = IrqGuard::new();
        let guard = self.lock();
        IrqMutex { guard, _irq: irq }
    }
}

impl<T, R: RawLock + RawUnlock> Deref for IrqMutex<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, R: RawLock + RawUnlock> DerefMut for IrqMutex<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// RAII guard that disables interrupts on creation and restores the previous
/// state on drop.
///
/// Nested guards are fine: only the outermost one that found interrupts
/// enabled turns them back on.
pub struct IrqGuard {
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let were_enabled = interrupts_enabled();
        if were_enabled {
            arch::disable();
        }
        Self { were_enabled }
    }

    /// Whether interrupts were enabled when this guard was taken.
    #[inline]
    #[must_use]
    pub const fn were_enabled(&self) -> bool {
        self.were_enabled
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            arch::enable();
        }
    }
}

/// Whether maskable interrupts are currently enabled.
#[inline]
#[must_use]
pub fn interrupts_enabled() -> bool {
    arch::flags() & IF_BIT != 0
}

/// Run `f` with interrupts masked.
#[inline]
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    let _irq = IrqGuard::new();
    f()
}

#[cfg(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64")))]
mod arch {
    #[inline]
    pub fn disable() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    #[inline]
    pub fn enable() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }

    #[cfg(target_arch = "x86")]
    #[inline]
    pub fn flags() -> usize {
        let r: usize;
        unsafe { core::arch::asm!("pushfd; pop {}", out(reg) r, options(preserves_flags)) }
        r
    }

    #[cfg(target_arch = "x86_64")]
    #[inline]
    pub fn flags() -> usize {
        let r: usize;
        unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(preserves_flags)) }
        r
    }
}

#[cfg(not(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64"))))]
mod arch {
    use core::sync::atomic::{AtomicBool, Ordering};

    // Software stand-in for IF so nesting behaves like on hardware.
    static ENABLED: AtomicBool = AtomicBool::new(true);

    #[inline]
    pub fn disable() {
        ENABLED.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn enable() {
        ENABLED.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn flags() -> usize {
        if ENABLED.load(Ordering::SeqCst) {
            super::IF_BIT
        } else {
            0
        }
    }
}
