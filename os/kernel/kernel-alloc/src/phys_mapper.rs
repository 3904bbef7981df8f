//! # Reaching physical frames from code
//!
//! Code can only dereference virtual addresses. Frame pools keep their state
//! tables inside physical frames and the page-table builder writes directories
//! before paging is on, so both need a way to turn a [`PhysicalAddress`] into
//! a pointer. The strategy differs between the running kernel (identity
//! mapping of low memory) and hosted tests (a heap buffer standing in for
//! RAM), hence the trait.

use kernel_memory_addresses::PhysicalAddress;

/// Physical-to-virtual access used for management frames and page tables.
pub trait PhysMapper {
    /// Address at which `pa` is currently reachable.
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8;

    /// Borrow the physical memory at `pa` as a `T`.
    ///
    /// # Safety
    /// `pa` must be reachable through this mapper, suitably aligned for `T`,
    /// and not aliased for `'a`.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *self.phys_to_ptr(pa).cast::<T>() }
    }

    /// Borrow `len` bytes of physical memory starting at `pa`.
    ///
    /// # Safety
    /// Same contract as [`phys_to_mut`](Self::phys_to_mut) for the whole range.
    unsafe fn phys_to_bytes<'a>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.phys_to_ptr(pa), len) }
    }
}

/// Maps physical address `pa` to `offset + pa`.
///
/// With an offset of zero this is the identity mapping the kernel has for its
/// first 4 MiB. Tests point the offset at a frame-aligned host buffer.
///
/// ```
/// use kernel_alloc::{OffsetPhysMapper, PhysMapper};
/// use kernel_memory_addresses::PhysicalAddress;
///
/// let mapper = OffsetPhysMapper::new(0x1000);
/// assert_eq!(mapper.phys_to_ptr(PhysicalAddress::new(0x20)).addr(), 0x1020);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetPhysMapper {
    offset: usize,
}

impl OffsetPhysMapper {
    #[must_use]
    pub const fn new(offset: usize) -> Self {
        Self { offset }
    }

    /// Treat the memory at `base` as physical address zero.
    #[must_use]
    pub fn over(base: *mut u8) -> Self {
        Self::new(base.expose_provenance())
    }
}

impl PhysMapper for OffsetPhysMapper {
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        core::ptr::with_exposed_provenance_mut(self.offset + pa.as_usize())
    }
}
