//! # Physical and Virtual Addresses for 32-bit Paging
//!
//! Strongly typed wrappers for raw addresses and frame numbers used by the
//! frame pools and the two-level page tables.
//!
//! ## Overview
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PhysicalAddress`] | A byte address in physical memory. |
//! | [`VirtualAddress`] | A byte address in the current (translated) address space. |
//! | [`FrameNumber`] | Index of a [`FRAME_SIZE`] physical frame, i.e. `address >> 12`. |
//!
//! Frame pools speak in [`FrameNumber`]s, page tables store them in their
//! entries, and the fault handler receives a [`VirtualAddress`].
//!
//! ## 32-bit virtual address split
//!
//! ```text
//! | 31‒22           | 21‒12       | 11‒0   |
//! | directory index | table index | offset |
//! ```
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x4020_3123);
//! assert_eq!(va.directory_index(), 0x100);
//! assert_eq!(va.table_index(), 0x203);
//! assert_eq!(va.frame_offset(), 0x123);
//!
//! let frame = FrameNumber::containing(PhysicalAddress::new(0x0020_1FFF));
//! assert_eq!(frame.as_u32(), 0x201);
//! assert_eq!(frame.base(), PhysicalAddress::new(0x0020_1000));
//! ```
//!
//! The types are `#[repr(transparent)]` and all helpers are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod frame_number;
mod physical_address;
mod virtual_address;

pub use crate::frame_number::FrameNumber;
pub use crate::physical_address::PhysicalAddress;
pub use crate::virtual_address::VirtualAddress;

/// Size of one physical frame / virtual page in bytes.
pub const FRAME_SIZE: u32 = 4096;

/// log2([`FRAME_SIZE`]).
pub const FRAME_SHIFT: u32 = 12;

/// Number of entries in a page directory or page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Round `bytes` up to a whole number of frames.
///
/// ```rust
/// # use kernel_memory_addresses::frames_for;
/// assert_eq!(frames_for(0), 0);
/// assert_eq!(frames_for(1), 1);
/// assert_eq!(frames_for(4096), 1);
/// assert_eq!(frames_for(10_000), 3);
/// ```
#[inline]
#[must_use]
pub const fn frames_for(bytes: u32) -> u32 {
    bytes.div_ceil(FRAME_SIZE)
}

/// Align `x` down to a frame boundary.
#[inline]
#[must_use]
pub const fn align_down(x: u32) -> u32 {
    x & !(FRAME_SIZE - 1)
}

const _: () = {
    assert!(FRAME_SIZE == 1 << FRAME_SHIFT);
    assert!(ENTRIES_PER_TABLE * size_of::<u32>() == FRAME_SIZE as usize);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(frames_for(4095), 1);
        assert_eq!(frames_for(4097), 2);
        assert_eq!(align_down(0x1FFF), 0x1000);
        assert_eq!(align_down(0x2000), 0x2000);
    }
}
