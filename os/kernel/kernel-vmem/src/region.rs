//! # Virtual region tracking
//!
//! A [`RegionTracker`] hands out page-granular regions from a fixed virtual
//! range of one address space, for example a heap or a code segment. It
//! never maps anything itself: it records which addresses are in use so the
//! fault handler can tell demand paging from a stray access, and unmaps a
//! region's pages when it is released.
//!
//! The region list lives in the first page of the managed range:
//!
//! ```text
//!  base                                                   base + size
//!   │ list page │ region 1 │ region 2 │ ...      free              │
//!   └───────────┴──────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! Slot 0 always describes the list page. New regions are appended right
//! after the last occupied slot; releasing one shifts the later slots down.
//! Gaps left in the address range are not reused.

use crate::{AddressSpace, Mmu, PagingError, RegionCheck};
use kernel_alloc::FramePool;
use kernel_memory_addresses::{FRAME_SIZE, VirtualAddress, frames_for};
use kernel_sync::SpinMutex;
use log::{debug, info, warn};

/// Capacity of the region list: one page of `(start, size)` pairs.
pub const MAX_REGIONS: usize = FRAME_SIZE as usize / size_of::<Region>();

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Region {
    start: u32,
    size: u32,
}

impl Region {
    const fn is_empty(&self) -> bool {
        self.size == 0
    }

    const fn contains(&self, address: u32) -> bool {
        address >= self.start && address - self.start < self.size
    }

    const fn end(&self) -> u64 {
        self.start as u64 + self.size as u64
    }
}

type RegionList = [Region; MAX_REGIONS];

const _: () = assert!(size_of::<RegionList>() == FRAME_SIZE as usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegionTrackerError {
    #[error("region range {base}..+{size:#x} must be page aligned and hold at least one page")]
    InvalidRange { base: VirtualAddress, size: u32 },
    #[error("region list is full")]
    ListFull,
    #[error("{requested:#x} bytes do not fit in the tracked range")]
    OutOfSpace { requested: u32 },
    #[error("no region starts at {0}")]
    UnknownRegion(VirtualAddress),
    #[error(transparent)]
    Paging(#[from] PagingError),
}

pub struct RegionTracker<'a, M: Mmu> {
    base: VirtualAddress,
    size: u32,
    pool: &'a FramePool<'a>,
    space: &'a AddressSpace<'a, M>,
    lock: SpinMutex<()>,
}

impl<'a, M: Mmu> RegionTracker<'a, M> {
    /// Track `size` bytes of virtual memory starting at `base` in `space`.
    ///
    /// The list page is backed right away with a frame from `pool`, so the
    /// tracker never faults on its own bookkeeping. The tracker takes part in
    /// fault handling once [`register`](Self::register) is called, which
    /// needs the tracker at its final address.
    ///
    /// # Errors
    /// - [`RegionTrackerError::InvalidRange`] for unaligned or sub-page ranges,
    ///   or ranges that wrap past 4 GiB.
    /// - [`RegionTrackerError::Paging`] if `space` isn't live or the list page
    ///   can't be backed.
    pub fn new(
        base: VirtualAddress,
        size: u32,
        pool: &'a FramePool<'a>,
        space: &'a AddressSpace<'a, M>,
    ) -> Result<Self, RegionTrackerError> {
        if !base.is_page_aligned()
            || size % FRAME_SIZE != 0
            || size < FRAME_SIZE
            || u64::from(base.as_u32()) + u64::from(size) > 1 << 32
        {
            return Err(RegionTrackerError::InvalidRange { base, size });
        }

        space.populate(base, pool)?;

        let tracker = Self {
            base,
            size,
            pool,
            space,
            lock: SpinMutex::new(()),
        };
        tracker.with_regions(|regions| {
            regions.fill(Region::default());
            regions[0] = Region {
                start: base.as_u32(),
                size: FRAME_SIZE,
            };
        })?;

        info!("region tracker {base}..+{size:#x}: list page backed");
        Ok(tracker)
    }

    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Register with the tracker's address space so its faults are served.
    ///
    /// # Errors
    /// [`PagingError::TrackerRegistryFull`] past
    /// [`MAX_REGION_TRACKERS`](crate::MAX_REGION_TRACKERS).
    pub fn register(&'a self) -> Result<(), RegionTrackerError> {
        self.space.register_region_tracker(self)?;
        Ok(())
    }

    /// Pool that backs the list page.
    #[must_use]
    pub const fn frame_pool(&self) -> &'a FramePool<'a> {
        self.pool
    }

    /// Reserve a region of at least `size` bytes, rounded up to whole pages
    /// (a zero-byte request takes one page). Returns its start.
    ///
    /// Nothing is mapped; pages are filled in on first touch.
    ///
    /// # Errors
    /// - [`RegionTrackerError::Paging`] unless the tracker's space is live.
    /// - [`RegionTrackerError::ListFull`] when all [`MAX_REGIONS`] slots are
    ///   taken.
    /// - [`RegionTrackerError::OutOfSpace`] when the region would run past
    ///   the end of the tracked range.
    pub fn allocate(&self, size: u32) -> Result<VirtualAddress, RegionTrackerError> {
        let pages = frames_for(size).max(1);
        let bytes = pages
            .checked_mul(FRAME_SIZE)
            .ok_or(RegionTrackerError::OutOfSpace { requested: size })?;
        let limit = u64::from(self.base.as_u32()) + u64::from(self.size);

        let start = self.with_regions(|regions| {
            let Some(slot) = regions.iter().position(Region::is_empty) else {
                warn!("region tracker {}: list full", self.base);
                return Err(RegionTrackerError::ListFull);
            };

            // slot 0 is the list page and never empty
            let previous = regions[slot - 1];
            if previous.end() + u64::from(bytes) > limit {
                warn!(
                    "region tracker {}: {bytes:#x} bytes past {:#x} exceed the range",
                    self.base,
                    previous.end()
                );
                return Err(RegionTrackerError::OutOfSpace { requested: size });
            }

            #[allow(clippy::cast_possible_truncation)]
            let start = previous.end() as u32;
            regions[slot] = Region { start, size: bytes };
            Ok(start)
        })??;

        let start = VirtualAddress::new(start);
        debug!("region tracker {}: allocated {start}..+{bytes:#x}", self.base);
        Ok(start)
    }

    /// Release the region starting at `start`: unmap every page of it and
    /// close the gap in the list.
    ///
    /// # Errors
    /// - [`RegionTrackerError::UnknownRegion`] if no region starts there.
    /// - [`RegionTrackerError::Paging`] unless the tracker's space is live, or
    ///   if a page cannot be freed.
    pub fn release(&self, start: VirtualAddress) -> Result<(), RegionTrackerError> {
        self.with_regions(|regions| {
            let Some(slot) = regions
                .iter()
                .skip(1)
                .position(|r| !r.is_empty() && r.start == start.as_u32())
                .map(|i| i + 1)
            else {
                warn!("region tracker {}: no region at {start}", self.base);
                return Err(RegionTrackerError::UnknownRegion(start));
            };

            let region = regions[slot];
            for offset in (0..region.size).step_by(FRAME_SIZE as usize) {
                self.space.free_page(start + offset)?;
            }

            regions.copy_within(slot + 1.., slot);
            regions[MAX_REGIONS - 1] = Region::default();

            debug!(
                "region tracker {}: released {start}..+{:#x}",
                self.base, region.size
            );
            Ok(())
        })?
    }

    /// Occupied regions as `(start, size)`, list page first.
    ///
    /// # Errors
    /// [`RegionTrackerError::Paging`] unless the tracker's space is live.
    pub fn regions(
        &self,
    ) -> Result<impl Iterator<Item = (VirtualAddress, u32)> + use<'a, M>, RegionTrackerError> {
        let snapshot = self.with_regions(|regions| *regions)?;
        Ok(snapshot
            .into_iter()
            .take_while(|r| !r.is_empty())
            .map(|r| (VirtualAddress::new(r.start), r.size)))
    }

    /// Run `f` on the region list, which is only reachable while the
    /// tracker's space is loaded. Any other space may map a different list,
    /// or nothing, at the same address.
    fn with_regions<R>(
        &self,
        f: impl FnOnce(&mut RegionList) -> R,
    ) -> Result<R, RegionTrackerError> {
        let _guard = self.lock.lock_irq();
        self.space
            .paging()
            .require_live(self.space.directory_frame())?;
        let regions = unsafe { self.space.mmu().virt_to_mut::<RegionList>(self.base) };
        Ok(f(regions))
    }
}

impl<M: Mmu> RegionCheck for RegionTracker<'_, M> {
    /// `address` is the tracker's base or inside an occupied region. Nothing
    /// is legitimate while the tracker's space is not live.
    fn is_legitimate(&self, address: VirtualAddress) -> bool {
        let base = self.base;
        let address = address.as_u32();
        self.with_regions(|regions| {
            address == base.as_u32()
                || regions
                    .iter()
                    .filter(|r| !r.is_empty())
                    .any(|r| r.contains(address))
        })
        .unwrap_or(false)
    }
}
