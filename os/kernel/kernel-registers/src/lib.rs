//! # Typed x86 Paging Control Registers
//!
//! - [`cr0::Cr0`]: paging enable (`PG`) and friends.
//! - [`cr2::Cr2`]: the faulting linear address after a page fault.
//! - [`cr3::Cr3`]: the physical frame of the active page directory.
//!
//! Register access is only compiled for 32-bit x86 with the `asm` feature;
//! the typed layouts are available everywhere so hosted code can build and
//! inspect register images.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr2")]
pub mod cr2;

#[cfg(feature = "cr3")]
pub mod cr3;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control register access is privileged and requires ring 0.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Writing a control register changes how every following memory access
    /// is translated.
    unsafe fn store_unsafe(self);
}
