use kernel_alloc::PhysMapper;
use kernel_memory_addresses::{FrameNumber, VirtualAddress};

/// The paging hardware as seen by the address-space code.
///
/// Physical access ([`PhysMapper`]) is used to build directories before they
/// are live; virtual access goes through whatever translation is currently
/// loaded, which is how the recursive self-map is reached.
pub trait Mmu: PhysMapper + Sync {
    /// Load `directory` as the translation root (CR3). Reloading the current
    /// root flushes the TLB.
    ///
    /// # Safety
    /// The directory must be a valid page directory that keeps the running
    /// code mapped.
    unsafe fn load_directory(&self, directory: FrameNumber);

    /// Turn translation on (CR0.PG).
    ///
    /// # Safety
    /// A valid directory must already be loaded.
    unsafe fn enable_paging(&self);

    /// Faulting address latched by the last page fault (CR2).
    fn fault_address(&self) -> VirtualAddress;

    /// Pointer to `va` under the current translation.
    fn virt_to_ptr(&self, va: VirtualAddress) -> *mut u8;

    /// Borrow the memory at `va` under the current translation.
    ///
    /// # Safety
    /// `va` must be mapped, aligned for `T`, and not aliased for `'a`.
    unsafe fn virt_to_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T {
        unsafe { &mut *self.virt_to_ptr(va).cast::<T>() }
    }
}
