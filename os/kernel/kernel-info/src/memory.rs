//! # Memory Layout
//!
//! Physical layout (frame numbers, 4 KiB frames):
//!
//! ```text
//! 0 MiB   ┌──────────────────────────────┐ frame 0
//!         │ BIOS, kernel image           │ identity mapped, not pooled
//! 2 MiB   ├──────────────────────────────┤ KERNEL_POOL_START_FRAME
//!         │ kernel frame pool            │ self-hosted state table
//! 4 MiB   ├──────────────────────────────┤ PROCESS_POOL_START_FRAME
//!         │ process frame pool           │ state table in a kernel frame
//! 15 MiB  │ ┌──────────────────────────┐ │ MEM_HOLE_START_FRAME
//!         │ │ memory hole (reserved)   │ │
//! 16 MiB  │ └──────────────────────────┘ │
//! 32 MiB  └──────────────────────────────┘
//! ```
//!
//! Virtual layout: the first [`IDENTITY_MAPPED_BYTES`] are identity mapped in
//! every address space; the top 4 MiB window is the recursive self-map of the
//! page directory.

use kernel_memory_addresses::FRAME_SIZE;

const MIB: u32 = 1024 * 1024;

/// First frame of the kernel frame pool.
pub const KERNEL_POOL_START_FRAME: u32 = 2 * MIB / FRAME_SIZE;

/// Number of frames in the kernel frame pool.
pub const KERNEL_POOL_SIZE: u32 = 2 * MIB / FRAME_SIZE;

/// First frame of the process frame pool.
pub const PROCESS_POOL_START_FRAME: u32 = 4 * MIB / FRAME_SIZE;

/// Number of frames in the process frame pool.
pub const PROCESS_POOL_SIZE: u32 = 28 * MIB / FRAME_SIZE;

/// First frame of the memory hole that firmware keeps for itself.
pub const MEM_HOLE_START_FRAME: u32 = 15 * MIB / FRAME_SIZE;

/// Number of frames in the memory hole.
pub const MEM_HOLE_SIZE: u32 = MIB / FRAME_SIZE;

/// Bytes identity mapped by the initial page table of every address space.
pub const IDENTITY_MAPPED_BYTES: u32 = 4 * MIB;

/// Start of the region tracker used for code.
pub const CODE_REGION_BASE: u32 = 512 * MIB;

/// Size of the region tracker used for code.
pub const CODE_REGION_SIZE: u32 = 256 * MIB;

/// Start of the region tracker used for the heap.
pub const HEAP_REGION_BASE: u32 = 1024 * MIB;

/// Size of the region tracker used for the heap.
pub const HEAP_REGION_SIZE: u32 = 256 * MIB;

const _: () = {
    assert!(KERNEL_POOL_SIZE.is_multiple_of(4));
    assert!(PROCESS_POOL_SIZE.is_multiple_of(4));
    assert!(KERNEL_POOL_START_FRAME + KERNEL_POOL_SIZE <= PROCESS_POOL_START_FRAME);
    assert!(MEM_HOLE_START_FRAME >= PROCESS_POOL_START_FRAME);
    assert!(MEM_HOLE_START_FRAME + MEM_HOLE_SIZE <= PROCESS_POOL_START_FRAME + PROCESS_POOL_SIZE);
    assert!((KERNEL_POOL_START_FRAME + KERNEL_POOL_SIZE) * FRAME_SIZE <= IDENTITY_MAPPED_BYTES);
    assert!(CODE_REGION_BASE >= IDENTITY_MAPPED_BYTES);
    assert!(CODE_REGION_BASE + CODE_REGION_SIZE <= HEAP_REGION_BASE);
};
