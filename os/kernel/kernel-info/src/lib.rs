//! # Kernel Memory Configuration
//!
//! Single source of truth for the boot-time memory layout: where the frame
//! pools sit in physical memory, which frames firmware keeps for itself, how
//! much is identity mapped, and where the default virtual regions start.
//!
//! All values are compile-time constants guarded by `const` assertions, so an
//! inconsistent layout fails the build rather than the boot.
//!
//! ```rust
//! use kernel_info::memory::{KERNEL_POOL_START_FRAME, PROCESS_POOL_START_FRAME};
//! assert!(KERNEL_POOL_START_FRAME < PROCESS_POOL_START_FRAME);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
