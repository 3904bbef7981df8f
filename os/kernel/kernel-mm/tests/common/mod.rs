//! A machine with `n` frames of host memory and a software page walker.

#![allow(dead_code)]

use kernel_alloc::{OffsetPhysMapper, PhysMapper};
use kernel_memory_addresses::{FRAME_SIZE, FrameNumber, PhysicalAddress, VirtualAddress};
use kernel_vmem::{AddressSpace, Mmu, dispatch_page_fault};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[repr(C, align(4096))]
#[derive(Clone, Copy)]
pub struct Frame([u8; FRAME_SIZE as usize]);

pub struct Ram {
    frames: Vec<Frame>,
}

impl Ram {
    pub fn new(frames: usize) -> Self {
        Self {
            frames: vec![Frame([0xCC; FRAME_SIZE as usize]); frames],
        }
    }
}

pub struct SimMmu {
    ram: OffsetPhysMapper,
    frames: u32,
    cr3: AtomicU32,
    cr2: AtomicU32,
    paging: AtomicBool,
}

impl SimMmu {
    pub fn new(ram: &mut Ram) -> Self {
        Self {
            ram: OffsetPhysMapper::over(ram.frames.as_mut_ptr().cast()),
            frames: u32::try_from(ram.frames.len()).unwrap(),
            cr3: AtomicU32::new(0),
            cr2: AtomicU32::new(0),
            paging: AtomicBool::new(false),
        }
    }

    fn read(&self, pa: PhysicalAddress) -> u32 {
        unsafe { self.phys_to_ptr(pa).cast::<u32>().read() }
    }

    pub fn walk(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let directory = PhysicalAddress::new(self.cr3.load(Ordering::SeqCst) << 12);
        let pde = self.read(directory + (va.directory_index() as u32) * 4);
        if pde & 1 == 0 {
            return None;
        }
        let pte = self.read(PhysicalAddress::new(pde & !0xFFF) + (va.table_index() as u32) * 4);
        if pte & 1 == 0 {
            return None;
        }
        Some(PhysicalAddress::new(pte & !0xFFF) + va.frame_offset())
    }

    pub fn raise(&self, va: VirtualAddress) {
        self.cr2.store(va.as_u32(), Ordering::SeqCst);
    }
}

impl PhysMapper for SimMmu {
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        assert!(
            pa.frame().as_u32() < self.frames,
            "physical access to {pa} beyond simulated RAM"
        );
        self.ram.phys_to_ptr(pa)
    }
}

impl Mmu for SimMmu {
    unsafe fn load_directory(&self, directory: FrameNumber) {
        self.cr3.store(directory.as_u32(), Ordering::SeqCst);
    }

    unsafe fn enable_paging(&self) {
        self.paging.store(true, Ordering::SeqCst);
    }

    fn fault_address(&self) -> VirtualAddress {
        VirtualAddress::new(self.cr2.load(Ordering::SeqCst))
    }

    fn virt_to_ptr(&self, va: VirtualAddress) -> *mut u8 {
        if !self.paging.load(Ordering::SeqCst) {
            return self.phys_to_ptr(PhysicalAddress::new(va.as_u32()));
        }
        match self.walk(va) {
            Some(pa) => self.phys_to_ptr(pa),
            None => panic!("simulated page fault inside the memory manager at {va}"),
        }
    }
}

/// Store like the CPU: take the page fault first if `va` is unmapped.
pub fn write_u32(space: &AddressSpace<'_, SimMmu>, va: VirtualAddress, value: u32) {
    let mmu = space.mmu();
    if mmu.walk(va).is_none() {
        mmu.raise(va);
        dispatch_page_fault(space, 0b10, 0x0010_0000);
    }
    unsafe { mmu.virt_to_ptr(va).cast::<u32>().write(value) }
}

pub fn read_u32(space: &AddressSpace<'_, SimMmu>, va: VirtualAddress) -> u32 {
    unsafe { space.mmu().virt_to_ptr(va).cast::<u32>().read() }
}
