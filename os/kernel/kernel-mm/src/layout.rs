use crate::BootError;
use kernel_alloc::{MAX_FRAMES_PER_POOL, ReserveAccounting};
use kernel_info::memory::{
    IDENTITY_MAPPED_BYTES, KERNEL_POOL_SIZE, KERNEL_POOL_START_FRAME, MEM_HOLE_SIZE,
    MEM_HOLE_START_FRAME, PROCESS_POOL_SIZE, PROCESS_POOL_START_FRAME,
};
use kernel_memory_addresses::{FRAME_SIZE, FrameNumber};

/// A contiguous span of physical frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    pub first: FrameNumber,
    pub count: u32,
}

impl FrameSpan {
    #[must_use]
    pub const fn new(first: u32, count: u32) -> Self {
        Self {
            first: FrameNumber::new(first),
            count,
        }
    }

    /// One past the last frame, widened so the sum cannot wrap.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.first.as_u32() as u64 + self.count as u64
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        (self.first.as_u32() as u64) < other.end() && (other.first.as_u32() as u64) < self.end()
    }

    #[must_use]
    pub const fn covers(&self, other: &Self) -> bool {
        self.first.as_u32() <= other.first.as_u32() && other.end() <= self.end()
    }
}

/// Physical memory layout the pools are built from.
///
/// [`MemoryLayout::standard`] is the layout in [`kernel_info::memory`]. Other
/// machines (and hosted tests with less simulated RAM) describe theirs here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Frames for directories, page tables and the process pool's state
    /// table. Hosts its own state table in its first frame.
    pub kernel_pool: FrameSpan,
    /// Frames for data pages.
    pub process_pool: FrameSpan,
    /// Frames inside the process pool that firmware keeps. May be empty.
    pub memory_hole: FrameSpan,
    /// How fencing off the hole treats the process pool's free count. The
    /// standard layout leaves the count untouched, so the hole's frames are
    /// still reported as free.
    pub hole_accounting: ReserveAccounting,
}

impl MemoryLayout {
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            kernel_pool: FrameSpan::new(KERNEL_POOL_START_FRAME, KERNEL_POOL_SIZE),
            process_pool: FrameSpan::new(PROCESS_POOL_START_FRAME, PROCESS_POOL_SIZE),
            memory_hole: FrameSpan::new(MEM_HOLE_START_FRAME, MEM_HOLE_SIZE),
            hole_accounting: ReserveAccounting::KeepFreeCount,
        }
    }

    /// Check the layout before anything is written to memory.
    ///
    /// Both pools must be non-empty multiples of four frames that a single
    /// state table can describe, they must not overlap, the hole must sit
    /// inside the process pool, and the kernel pool must lie in the identity
    /// mapped low memory so state tables stay reachable once paging is on.
    ///
    /// # Errors
    /// [`BootError::InvalidLayout`] naming the first violated rule.
    pub const fn validate(&self) -> Result<(), BootError> {
        let pools = [self.kernel_pool, self.process_pool];
        let mut i = 0;
        while i < pools.len() {
            let count = pools[i].count;
            if count == 0 || count % 4 != 0 || count > MAX_FRAMES_PER_POOL {
                return Err(BootError::InvalidLayout("pool size"));
            }
            i += 1;
        }
        if self.kernel_pool.overlaps(&self.process_pool) {
            return Err(BootError::InvalidLayout("pools overlap"));
        }
        if !self.memory_hole.is_empty() && !self.process_pool.covers(&self.memory_hole) {
            return Err(BootError::InvalidLayout("memory hole outside process pool"));
        }
        if self.kernel_pool.end() * FRAME_SIZE as u64 > IDENTITY_MAPPED_BYTES as u64 {
            return Err(BootError::InvalidLayout(
                "kernel pool above identity-mapped memory",
            ));
        }
        Ok(())
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::standard()
    }
}
