use crate::Mmu;
use kernel_alloc::{FramePool, FramePoolError, FramePoolRegistry};
use kernel_memory_addresses::FrameNumber;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use log::{error, info};

const NO_DIRECTORY: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PagingError {
    #[error(transparent)]
    Frames(#[from] FramePoolError),
    #[error("address space with directory {0} is not the loaded one")]
    NotActive(FrameNumber),
    #[error("paging is not enabled")]
    PagingDisabled,
    #[error("no page directory has been loaded")]
    NoDirectory,
    #[error("region tracker registry is full")]
    TrackerRegistryFull,
}

/// Paging state shared by every address space.
///
/// Built once at boot, before the first [`AddressSpace`](crate::AddressSpace).
/// Records which directory the hardware is using and whether translation is
/// on; the address spaces consult it before touching the self-map.
pub struct Paging<'a, M: Mmu> {
    mmu: &'a M,
    registry: &'a FramePoolRegistry<'a>,
    table_pool: &'a FramePool<'a>,
    page_pool: &'a FramePool<'a>,
    active: AtomicU32,
    enabled: AtomicBool,
}

impl<'a, M: Mmu> Paging<'a, M> {
    /// `table_pool` supplies directories and page tables, `page_pool` the
    /// data frames installed on demand. Frames are returned through
    /// `registry`.
    pub fn new(
        mmu: &'a M,
        registry: &'a FramePoolRegistry<'a>,
        table_pool: &'a FramePool<'a>,
        page_pool: &'a FramePool<'a>,
    ) -> Self {
        info!(
            "paging: tables from pool {}, pages from pool {}",
            table_pool.base(),
            page_pool.base()
        );
        Self {
            mmu,
            registry,
            table_pool,
            page_pool,
            active: AtomicU32::new(NO_DIRECTORY),
            enabled: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn mmu(&self) -> &'a M {
        self.mmu
    }

    #[must_use]
    pub const fn registry(&self) -> &'a FramePoolRegistry<'a> {
        self.registry
    }

    #[must_use]
    pub const fn table_pool(&self) -> &'a FramePool<'a> {
        self.table_pool
    }

    #[must_use]
    pub const fn page_pool(&self) -> &'a FramePool<'a> {
        self.page_pool
    }

    /// Directory frame currently loaded into the hardware.
    #[must_use]
    pub fn active_directory(&self) -> Option<FrameNumber> {
        match self.active.load(Ordering::Acquire) {
            NO_DIRECTORY => None,
            frame => Some(FrameNumber::new(frame)),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turn on translation.
    ///
    /// # Errors
    /// [`PagingError::NoDirectory`] if no directory has been loaded yet.
    pub fn enable(&self) -> Result<(), PagingError> {
        let Some(directory) = self.active_directory() else {
            error!("paging: enable requested before any directory was loaded");
            return Err(PagingError::NoDirectory);
        };
        unsafe { self.mmu.enable_paging() };
        self.enabled.store(true, Ordering::Release);
        info!("paging: enabled with directory {directory}");
        Ok(())
    }

    pub(crate) fn load(&self, directory: FrameNumber) {
        unsafe { self.mmu.load_directory(directory) };
        self.active.store(directory.as_u32(), Ordering::Release);
    }

    /// Rewrite CR3 with the active directory, dropping stale translations.
    pub(crate) fn flush(&self) {
        if let Some(directory) = self.active_directory() {
            unsafe { self.mmu.load_directory(directory) };
        }
    }

    /// `Ok` if `directory` is loaded and translation is on, so the self-map
    /// can be used.
    pub(crate) fn require_live(&self, directory: FrameNumber) -> Result<(), PagingError> {
        if self.active_directory() != Some(directory) {
            return Err(PagingError::NotActive(directory));
        }
        if !self.is_enabled() {
            return Err(PagingError::PagingDisabled);
        }
        Ok(())
    }
}
