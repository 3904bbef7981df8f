//! # Demand-paged virtual memory (32-bit x86)
//!
//! Two-level paging with 4 KiB pages on top of the frame pools from
//! `kernel-alloc`.
//!
//! ## 32-bit virtual address → physical address walk
//!
//! ```text
//! | 31‒22     | 21‒12 | 11‒0   |
//! | directory | table | offset |
//! ```
//!
//! ```text
//!  CR3 → page directory (1024 PDEs) → page table (1024 PTEs) → 4 KiB page
//! ```
//!
//! | Level | Table | Entry | Description |
//! |:------|:------|:------|:------------|
//! | 1 | page directory | PDE | One per address space, referenced by CR3. Slot 1023 points back at the directory. |
//! | 2 | page table | PTE | Maps one 4 KiB page. |
//!
//! ## Pieces
//!
//! - [`Paging`]: state shared by all address spaces (pools, active
//!   directory, paging flag).
//! - [`AddressSpace`]: one directory; services page faults and frees pages.
//! - [`RegionTracker`]: hands out virtual regions and tells the fault handler
//!   which addresses are legitimate.
//! - [`Mmu`]: the hardware seam. [`X86Mmu`] on the target; tests bring a
//!   software page walker.
//!
//! ## Example
//!
//! ```rust,ignore
//! let paging = Paging::new(&mmu, &registry, &kernel_pool, &process_pool);
//! let space = AddressSpace::new(&paging)?;
//! space.load();
//! paging.enable()?;
//!
//! let heap = RegionTracker::new(HEAP_BASE, HEAP_SIZE, &process_pool, &space)?;
//! heap.register()?;
//!
//! let buf = heap.allocate(10_000)?; // three pages, backed on first touch
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod address_space;
mod fault;
mod mmu;
mod page_entry_bits;
pub mod page_table;
mod paging;
mod region;
#[cfg(target_arch = "x86")]
mod x86;

pub use crate::address_space::{AddressSpace, MAX_REGION_TRACKERS, RegionCheck};
pub use crate::fault::{
    FaultError, FaultOutcome, PAGE_FAULT_VECTOR, PageFault, PageFaultError, dispatch_page_fault,
};
pub use crate::mmu::Mmu;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::paging::{Paging, PagingError};
pub use crate::region::{MAX_REGIONS, RegionTracker, RegionTrackerError};
#[cfg(target_arch = "x86")]
pub use crate::x86::X86Mmu;
