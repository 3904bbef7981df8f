//! # Physical frame allocation
//!
//! Contiguous-run allocation of 4 KiB physical frames for the memory
//! subsystem.
//!
//! ```text
//!   FramePoolRegistry ──► FramePool ──► management frame (2 bits / frame)
//!          ▲                  │
//!   release_frames()     allocate() / reserve()
//! ```
//!
//! - [`FramePool`] owns a fixed range of frames and tracks each one as
//!   free, allocated, or the head of an allocated run.
//! - [`FramePoolRegistry`] knows every live pool so [`release_frames`] can
//!   find the owner of a frame without the caller remembering it.
//! - [`PhysMapper`] is how pools (and the page-table code above them) reach
//!   physical memory.
//!
//! ## Example
//! ```
//! use kernel_alloc::{FramePool, FramePoolRegistry, OffsetPhysMapper, release_frames};
//! use kernel_memory_addresses::FrameNumber;
//!
//! #[repr(C, align(4096))]
//! struct Frame([u8; 4096]);
//! let mut ram: Vec<Frame> = (0..40).map(|_| Frame([0; 4096])).collect();
//! let mapper = OffsetPhysMapper::over(ram.as_mut_ptr().cast());
//!
//! let pool = unsafe { FramePool::new(&mapper, FrameNumber::new(8), 32, None) }.unwrap();
//! let registry = FramePoolRegistry::new();
//! registry.register(&pool).unwrap();
//!
//! let run = pool.allocate(4).unwrap();
//! assert_eq!(run, FrameNumber::new(9));
//! assert_eq!(release_frames(&registry, run), Ok(4));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod frame_pool;
mod frame_state;
mod phys_mapper;
mod registry;

pub use frame_pool::{
    FrameCensus, FramePool, FramePoolError, MAX_FRAMES_PER_POOL, ReserveAccounting,
    management_frames_needed,
};
pub use frame_state::{FrameState, StateQuad};
pub use phys_mapper::{OffsetPhysMapper, PhysMapper};
pub use registry::{FramePoolRegistry, MAX_POOLS, release_frames};
