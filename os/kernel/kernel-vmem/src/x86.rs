//! The real MMU on 32-bit x86.

use crate::Mmu;
use kernel_alloc::PhysMapper;
use kernel_memory_addresses::{FrameNumber, PhysicalAddress, VirtualAddress};
use kernel_registers::cr0::Cr0;
use kernel_registers::cr2::Cr2;
use kernel_registers::cr3::Cr3;
use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};

/// Control-register backed [`Mmu`].
///
/// Physical memory is reached through the identity mapping of the first
/// 4 MiB, which is where the kernel pool (and so every directory, page table
/// and management frame) lives.
#[derive(Debug, Default, Clone, Copy)]
pub struct X86Mmu;

impl PhysMapper for X86Mmu {
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        core::ptr::with_exposed_provenance_mut(pa.as_usize())
    }
}

impl Mmu for X86Mmu {
    unsafe fn load_directory(&self, directory: FrameNumber) {
        unsafe { Cr3::from_directory(directory).store_unsafe() }
    }

    unsafe fn enable_paging(&self) {
        unsafe {
            let cr0 = Cr0::load_unsafe().with_pg_paging(true);
            cr0.store_unsafe();
        }
    }

    fn fault_address(&self) -> VirtualAddress {
        unsafe { Cr2::load_unsafe() }.fault_address()
    }

    fn virt_to_ptr(&self, va: VirtualAddress) -> *mut u8 {
        core::ptr::with_exposed_provenance_mut(va.as_usize())
    }
}
