//! # Address spaces (32-bit, two-level)
//!
//! An [`AddressSpace`] owns one page directory. Construction identity-maps
//! the first 4 MiB through a single page table and installs the recursive
//! self-map; everything above that is filled in lazily by
//! [`AddressSpace::handle_fault`] for addresses some registered
//! [`RegionCheck`] vouches for.
//!
//! Once the directory is loaded and paging is on, entries are only ever
//! reached through the self-map (see [`crate::page_table`]). Before that the
//! directory is built through the physical mapper.
//!
//! ## Safety
//!
//! - Entries are mutated with interrupts masked; a nested fault while a
//!   table is half-built would otherwise observe it.
//! - [`free_page`](AddressSpace::free_page) reloads CR3 afterwards, since the
//!   TLB may still hold the old translation.

use crate::page_table::{
    DirectoryIndex, PageTable, RECURSIVE_SLOT, TableIndex, directory_entry_address,
    table_entry_address, table_window,
};
use crate::{FaultError, FaultOutcome, Mmu, PageEntryBits, PageFault, Paging, PagingError};
use kernel_alloc::{FramePool, PhysMapper, release_frames};
use kernel_memory_addresses::{ENTRIES_PER_TABLE, FrameNumber, PhysicalAddress, VirtualAddress};
use kernel_sync::{IrqGuard, SpinMutex};
use log::{debug, error, info, warn};

/// Upper bound on region trackers per address space.
pub const MAX_REGION_TRACKERS: usize = 16;

/// Decides whether a faulting address belongs to a reserved region.
///
/// Implemented by [`RegionTracker`](crate::RegionTracker); the fault handler
/// only demand-fills addresses that some registered check accepts.
pub trait RegionCheck: Sync {
    fn is_legitimate(&self, address: VirtualAddress) -> bool;
}

pub struct AddressSpace<'a, M: Mmu> {
    paging: &'a Paging<'a, M>,
    directory: FrameNumber,
    trackers: SpinMutex<[Option<&'a dyn RegionCheck>; MAX_REGION_TRACKERS]>,
}

impl<'a, M: Mmu> AddressSpace<'a, M> {
    /// Build a fresh directory.
    ///
    /// Takes two frames from the table pool: the directory and the page
    /// table identity-mapping the first 4 MiB (present, writable,
    /// supervisor). Every other directory slot is not present, except
    /// [`RECURSIVE_SLOT`], which points at the directory itself.
    ///
    /// # Errors
    /// Propagates allocation failures from the table pool. Nothing stays
    /// allocated on failure.
    pub fn new(paging: &'a Paging<'a, M>) -> Result<Self, PagingError> {
        let pool = paging.table_pool();
        let directory = pool.allocate(1)?;
        let identity = match pool.allocate(1) {
            Ok(frame) => frame,
            Err(err) => {
                error!("address space: no frame for the identity table: {err}");
                pool.release_run(directory)?;
                return Err(err.into());
            }
        };

        let mmu = paging.mmu();
        let (dir, table) = unsafe {
            (
                mmu.phys_to_mut::<PageTable>(directory.base()),
                mmu.phys_to_mut::<PageTable>(identity.base()),
            )
        };

        for i in 0..ENTRIES_PER_TABLE {
            #[allow(clippy::cast_possible_truncation)]
            let frame = FrameNumber::new(i as u32);
            table.set(i, PageEntryBits::supervisor_rw(frame));
        }

        dir.fill(PageEntryBits::not_present_rw());
        dir.set(0, PageEntryBits::supervisor_rw(identity));
        dir.set(
            RECURSIVE_SLOT.as_usize(),
            PageEntryBits::supervisor_rw(directory),
        );

        info!("address space: directory {directory}, identity table {identity}");

        Ok(Self {
            paging,
            directory,
            trackers: SpinMutex::new([None; MAX_REGION_TRACKERS]),
        })
    }

    #[must_use]
    pub const fn directory_frame(&self) -> FrameNumber {
        self.directory
    }

    #[must_use]
    pub const fn paging(&self) -> &'a Paging<'a, M> {
        self.paging
    }

    #[must_use]
    pub const fn mmu(&self) -> &'a M {
        self.paging.mmu()
    }

    /// Make this the hardware's translation root.
    pub fn load(&self) {
        self.paging.load(self.directory);
        debug!("address space: loaded directory {}", self.directory);
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.paging.active_directory() == Some(self.directory)
    }

    /// Register a legitimacy check consulted by [`handle_fault`](Self::handle_fault).
    ///
    /// # Errors
    /// [`PagingError::TrackerRegistryFull`] past [`MAX_REGION_TRACKERS`].
    pub fn register_region_tracker(&self, tracker: &'a dyn RegionCheck) -> Result<(), PagingError> {
        let mut trackers = self.trackers.lock_irq();
        let Some(slot) = trackers.iter_mut().find(|slot| slot.is_none()) else {
            error!("address space {}: region tracker registry full", self.directory);
            return Err(PagingError::TrackerRegistryFull);
        };
        *slot = Some(tracker);
        Ok(())
    }

    /// Whether any registered region tracker claims `address`.
    #[must_use]
    pub fn is_legitimate(&self, address: VirtualAddress) -> bool {
        self.trackers
            .lock_irq()
            .iter()
            .flatten()
            .any(|tracker| tracker.is_legitimate(address))
    }

    /// Service a page fault.
    ///
    /// Only addresses inside a registered region are demand-filled: a
    /// missing page table is allocated from the table pool and cleared
    /// through its self-mapped window, a missing page comes from the page
    /// pool. Faults on present pages are reported, not repaired.
    ///
    /// The space must be live before any tracker is asked: the region lists
    /// are read through the self-map.
    ///
    /// # Errors
    /// - [`FaultError::Paging`] if this space isn't live or a pool runs dry.
    /// - [`FaultError::IllegitimateAddress`] if no tracker claims the address.
    /// - [`FaultError::ProtectionViolation`] for faults on present pages.
    pub fn handle_fault(&self, fault: &PageFault) -> Result<FaultOutcome, FaultError> {
        self.paging.require_live(self.directory)?;
        if !self.is_legitimate(fault.address) {
            error!("page fault at {}: no region claims it", fault.address);
            return Err(FaultError::IllegitimateAddress(fault.address));
        }
        if fault.error.present() {
            error!(
                "page fault at {}: {}",
                fault.address,
                fault.error.explain()
            );
            return Err(FaultError::ProtectionViolation {
                address: fault.address,
                error: fault.error,
            });
        }

        let outcome = self.populate(fault.address, self.paging.page_pool())?;
        debug!("page fault at {}: {outcome:?}", fault.address);
        Ok(outcome)
    }

    /// Make sure `address` is backed, taking a missing data frame from `pool`.
    ///
    /// This is the demand-fill step of [`handle_fault`](Self::handle_fault)
    /// without the legitimacy check.
    ///
    /// # Errors
    /// [`PagingError::NotActive`] / [`PagingError::PagingDisabled`] unless
    /// this space is live, and pool exhaustion.
    pub fn populate(
        &self,
        address: VirtualAddress,
        pool: &FramePool<'_>,
    ) -> Result<FaultOutcome, PagingError> {
        self.paging.require_live(self.directory)?;

        let dir = DirectoryIndex::of(address);
        let tbl = TableIndex::of(address);
        let mmu = self.mmu();

        let _irq = IrqGuard::new();

        let pde: &mut PageEntryBits = unsafe { mmu.virt_to_mut(directory_entry_address(dir)) };
        let mut new_table = None;
        if !pde.present() {
            let frame = self.paging.table_pool().allocate(1)?;
            *pde = PageEntryBits::supervisor_rw(frame);
            let table: &mut PageTable = unsafe { mmu.virt_to_mut(table_window(dir)) };
            table.fill(PageEntryBits::new());
            new_table = Some(frame);
        }

        let pte: &mut PageEntryBits =
            unsafe { mmu.virt_to_mut(table_entry_address(dir, tbl)) };
        if pte.present() {
            return Ok(FaultOutcome::AlreadyMapped);
        }

        let page = pool.allocate(1).inspect_err(|err| {
            warn!("no frame for {address}: {err}");
        })?;
        *pte = PageEntryBits::supervisor_rw(page);

        Ok(FaultOutcome::Mapped {
            page,
            table: new_table,
        })
    }

    /// Unmap the page containing `address` and return its frame to the pool
    /// that owns it.
    ///
    /// A page that was never touched has no entry and nothing is freed. CR3
    /// is reloaded in every case.
    ///
    /// # Errors
    /// Fails unless this space is live, or if the frame cannot be released.
    pub fn free_page(&self, address: VirtualAddress) -> Result<Option<FrameNumber>, PagingError> {
        self.paging.require_live(self.directory)?;

        let dir = DirectoryIndex::of(address);
        let tbl = TableIndex::of(address);
        let mmu = self.mmu();

        let freed = {
            let _irq = IrqGuard::new();
            let pde = unsafe { mmu.virt_to_mut::<PageEntryBits>(directory_entry_address(dir)) };
            if pde.present() {
                let pte: &mut PageEntryBits =
                    unsafe { mmu.virt_to_mut(table_entry_address(dir, tbl)) };
                if pte.present() {
                    let frame = pte.frame();
                    release_frames(self.paging.registry(), frame)?;
                    pte.set_present(false);
                    Some(frame)
                } else {
                    None
                }
            } else {
                None
            }
        };

        self.paging.flush();
        if let Some(frame) = freed {
            debug!("freed page {} (frame {frame})", address.page_base());
        }
        Ok(freed)
    }

    /// Resolve `address` through the self-map.
    ///
    /// # Errors
    /// Fails unless this space is live.
    pub fn translate(&self, address: VirtualAddress) -> Result<Option<PhysicalAddress>, PagingError> {
        self.paging.require_live(self.directory)?;

        let dir = DirectoryIndex::of(address);
        let tbl = TableIndex::of(address);
        let mmu = self.mmu();

        let pde = unsafe { mmu.virt_to_mut::<PageEntryBits>(directory_entry_address(dir)) };
        if !pde.present() {
            return Ok(None);
        }
        let pte = unsafe { mmu.virt_to_mut::<PageEntryBits>(table_entry_address(dir, tbl)) };
        if !pte.present() {
            return Ok(None);
        }
        Ok(Some(pte.frame().base() + address.frame_offset()))
    }

    /// Read directory slot `dir` through the physical mapper. Works whether
    /// or not this space is loaded.
    #[must_use]
    pub fn directory_entry(&self, dir: DirectoryIndex) -> PageEntryBits {
        let table = unsafe { self.mmu().phys_to_mut::<PageTable>(self.directory.base()) };
        table.get(dir.as_usize())
    }
}
