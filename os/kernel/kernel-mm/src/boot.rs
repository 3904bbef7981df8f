use crate::MemoryLayout;
use kernel_alloc::{
    FramePool, FramePoolError, FramePoolRegistry, PhysMapper, management_frames_needed,
};
use kernel_info::memory::{CODE_REGION_BASE, CODE_REGION_SIZE, HEAP_REGION_BASE, HEAP_REGION_SIZE};
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::{AddressSpace, Mmu, PagingError, RegionTracker, RegionTrackerError};
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BootError {
    #[error("invalid memory layout: {0}")]
    InvalidLayout(&'static str),
    #[error("frame pool setup failed: {0}")]
    Frames(#[from] FramePoolError),
    #[error("paging setup failed: {0}")]
    Paging(#[from] PagingError),
    #[error("region setup failed: {0}")]
    Region(#[from] RegionTrackerError),
    #[error("a logger is already installed")]
    LoggerInstalled,
}

/// Build the kernel pool. Its state table lives in its own first frame.
///
/// # Errors
/// Layout violations and pool construction errors.
///
/// # Safety
/// The kernel pool's frames must be unused RAM reachable through `mapper`,
/// and stay reserved for the pool for `'a`.
pub unsafe fn kernel_pool<'a, M>(
    mapper: &M,
    layout: &MemoryLayout,
) -> Result<FramePool<'a>, BootError>
where
    M: PhysMapper + ?Sized,
{
    layout.validate()?;
    let span = layout.kernel_pool;
    let pool = unsafe { FramePool::new(mapper, span.first, span.count, None) }?;
    Ok(pool)
}

/// Build the process pool, taking its state table from `kernel`.
///
/// Every frame of the process pool starts out free; fence off the memory
/// hole with [`register_pools`].
///
/// # Errors
/// Layout violations, an exhausted kernel pool, and pool construction errors.
///
/// # Safety
/// The process pool's frames must be unused RAM, and `kernel` must be the
/// pool built by [`kernel_pool`] over the same `mapper`.
pub unsafe fn process_pool<'a, M>(
    mapper: &M,
    layout: &MemoryLayout,
    kernel: &FramePool<'_>,
) -> Result<FramePool<'a>, BootError>
where
    M: PhysMapper + ?Sized,
{
    layout.validate()?;
    let span = layout.process_pool;
    let info = kernel.allocate(management_frames_needed(span.count))?;
    let pool = unsafe { FramePool::new(mapper, span.first, span.count, Some(info)) }?;
    Ok(pool)
}

/// Make both pools known to `registry` and fence off the memory hole.
///
/// # Errors
/// Overlapping or surplus pools, or a hole that does not fit the process
/// pool.
pub fn register_pools<'a>(
    registry: &FramePoolRegistry<'a>,
    kernel: &'a FramePool<'a>,
    process: &'a FramePool<'a>,
    layout: &MemoryLayout,
) -> Result<(), BootError> {
    registry.register(kernel)?;
    registry.register(process)?;
    reserve_memory_hole(process, layout)?;

    info!(
        "memory: kernel pool {}..+{} ({} free), process pool {}..+{} ({} free)",
        kernel.base(),
        kernel.frame_count(),
        kernel.free_frames(),
        process.base(),
        process.frame_count(),
        process.free_frames()
    );
    Ok(())
}

/// Mark the memory hole allocated in `process` so it is never handed out.
///
/// # Errors
/// [`FramePoolError::OutOfRange`] if the hole lies outside the pool.
pub fn reserve_memory_hole(
    process: &FramePool<'_>,
    layout: &MemoryLayout,
) -> Result<(), BootError> {
    let hole = layout.memory_hole;
    if hole.is_empty() {
        return Ok(());
    }
    process.reserve(hole.first, hole.count, layout.hole_accounting)?;
    info!(
        "memory: hole {}..+{} fenced ({:?})",
        hole.first, hole.count, layout.hole_accounting
    );
    Ok(())
}

/// Load `space` and switch translation on.
///
/// # Errors
/// Propagates [`PagingError`].
pub fn bring_up<M: Mmu>(space: &AddressSpace<'_, M>) -> Result<(), BootError> {
    space.load();
    space.paging().enable()?;
    info!("memory: paging on, directory {}", space.directory_frame());
    Ok(())
}

/// Tracker for the code region at its configured place.
///
/// Register it with [`RegionTracker::register`] once it sits at its final
/// address.
///
/// # Errors
/// Propagates [`RegionTrackerError`].
pub fn code_region<'a, M: Mmu>(
    pool: &'a FramePool<'a>,
    space: &'a AddressSpace<'a, M>,
) -> Result<RegionTracker<'a, M>, BootError> {
    let tracker = RegionTracker::new(
        VirtualAddress::new(CODE_REGION_BASE),
        CODE_REGION_SIZE,
        pool,
        space,
    )?;
    Ok(tracker)
}

/// Tracker for the heap region; see [`code_region`].
///
/// # Errors
/// Propagates [`RegionTrackerError`].
pub fn heap_region<'a, M: Mmu>(
    pool: &'a FramePool<'a>,
    space: &'a AddressSpace<'a, M>,
) -> Result<RegionTracker<'a, M>, BootError> {
    let tracker = RegionTracker::new(
        VirtualAddress::new(HEAP_REGION_BASE),
        HEAP_REGION_SIZE,
        pool,
        space,
    )?;
    Ok(tracker)
}
