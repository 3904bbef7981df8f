//! # Memory manager bring-up
//!
//! Wires the frame pools from `kernel-alloc` and the paging code from
//! `kernel-vmem` together according to a [`MemoryLayout`]:
//!
//! ```text
//!  init_logging ─► kernel_pool ─► process_pool ─► register_pools
//!                                                     │
//!        code_region / heap_region ◄─ bring_up ◄─ AddressSpace::new
//! ```
//!
//! Every piece borrows the ones before it, so the steps are plain functions
//! and the caller keeps each result in place:
//!
//! ```rust,ignore
//! let layout = MemoryLayout::standard();
//! let kernel = unsafe { kernel_mm::kernel_pool(&mmu, &layout)? };
//! let process = unsafe { kernel_mm::process_pool(&mmu, &layout, &kernel)? };
//! let registry = FramePoolRegistry::new();
//! kernel_mm::register_pools(&registry, &kernel, &process, &layout)?;
//!
//! let paging = Paging::new(&mmu, &registry, &kernel, &process);
//! let space = AddressSpace::new(&paging)?;
//! kernel_mm::bring_up(&space)?;
//!
//! let code = kernel_mm::code_region(&process, &space)?;
//! let heap = kernel_mm::heap_region(&process, &space)?;
//! code.register()?;
//! heap.register()?;
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod boot;
mod layout;
mod logging;

pub use crate::boot::{
    BootError, bring_up, code_region, heap_region, kernel_pool, process_pool, register_pools,
    reserve_memory_hole,
};
pub use crate::layout::{FrameSpan, MemoryLayout};
pub use crate::logging::init_logging;
