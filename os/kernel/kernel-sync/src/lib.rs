//! # Kernel synchronization primitives
//!
//! The memory subsystem runs on a single CPU; its hazard is an interrupt
//! handler re-entering a half-finished update. [`SpinMutex::lock_irq`]
//! masks interrupts for the lifetime of the guard and takes the lock, which
//! turns a re-entrant access into a visible deadlock instead of silent
//! corruption.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod mutex;
mod raw_spin;

pub use irq::{IrqGuard, IrqMutex, without_interrupts};
pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;

pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    /// Must only be called by the current lock holder.
    unsafe fn raw_unlock(&self);
}
