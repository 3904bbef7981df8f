//! Simulated machine for hosted tests: a heap buffer standing in for
//! physical memory and an MMU that walks the page tables in software.

#![allow(dead_code)]

use kernel_alloc::{FramePool, OffsetPhysMapper, PhysMapper};
use kernel_memory_addresses::{FRAME_SIZE, FrameNumber, PhysicalAddress, VirtualAddress};
use kernel_vmem::{AddressSpace, Mmu, RegionCheck, dispatch_page_fault};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// Physical frames backing the simulation.
pub const RAM_FRAMES: usize = 128;

/// Directories and page tables come from here (first frame holds the state table).
pub const TABLE_POOL: (u32, u32) = (8, 32);

/// Data pages come from here.
pub const PAGE_POOL: (u32, u32) = (64, 64);

#[repr(C, align(4096))]
#[derive(Clone, Copy)]
pub struct Frame([u8; FRAME_SIZE as usize]);

pub struct Ram {
    frames: Vec<Frame>,
}

impl Ram {
    /// RAM with every byte set to `fill`, so missing initialization shows.
    pub fn filled(fill: u8) -> Self {
        Self {
            frames: vec![Frame([fill; FRAME_SIZE as usize]); RAM_FRAMES],
        }
    }

    pub fn mapper(&mut self) -> OffsetPhysMapper {
        OffsetPhysMapper::over(self.frames.as_mut_ptr().cast())
    }
}

pub struct SimMmu {
    ram: OffsetPhysMapper,
    cr3: AtomicU32,
    cr2: AtomicU32,
    paging: AtomicBool,
    cr3_loads: AtomicUsize,
}

impl SimMmu {
    pub fn new(ram: &mut Ram) -> Self {
        Self {
            ram: ram.mapper(),
            cr3: AtomicU32::new(0),
            cr2: AtomicU32::new(0),
            paging: AtomicBool::new(false),
            cr3_loads: AtomicUsize::new(0),
        }
    }

    /// Number of CR3 writes so far.
    pub fn cr3_loads(&self) -> usize {
        self.cr3_loads.load(Ordering::SeqCst)
    }

    pub fn cr3(&self) -> FrameNumber {
        FrameNumber::new(self.cr3.load(Ordering::SeqCst))
    }

    pub fn paging_enabled(&self) -> bool {
        self.paging.load(Ordering::SeqCst)
    }

    /// Latch `va` in CR2 as the CPU does before raising `#PF`.
    pub fn raise(&self, va: VirtualAddress) {
        self.cr2.store(va.as_u32(), Ordering::SeqCst);
    }

    pub fn read_phys_u32(&self, pa: PhysicalAddress) -> u32 {
        unsafe { self.ram.phys_to_ptr(pa).cast::<u32>().read() }
    }

    /// Two-level walk from CR3. `None` where the hardware would fault.
    pub fn walk(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let directory = self.cr3().base();
        let pde = self.read_phys_u32(directory + (va.directory_index() as u32) * 4);
        if pde & 1 == 0 {
            return None;
        }
        let table = PhysicalAddress::new(pde & !0xFFF);
        let pte = self.read_phys_u32(table + (va.table_index() as u32) * 4);
        if pte & 1 == 0 {
            return None;
        }
        Some(PhysicalAddress::new(pte & !0xFFF) + va.frame_offset())
    }
}

impl PhysMapper for SimMmu {
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        self.ram.phys_to_ptr(pa)
    }
}

impl Mmu for SimMmu {
    unsafe fn load_directory(&self, directory: FrameNumber) {
        self.cr3.store(directory.as_u32(), Ordering::SeqCst);
        self.cr3_loads.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn enable_paging(&self) {
        self.paging.store(true, Ordering::SeqCst);
    }

    fn fault_address(&self) -> VirtualAddress {
        VirtualAddress::new(self.cr2.load(Ordering::SeqCst))
    }

    fn virt_to_ptr(&self, va: VirtualAddress) -> *mut u8 {
        if !self.paging_enabled() {
            return self.ram.phys_to_ptr(PhysicalAddress::new(va.as_u32()));
        }
        match self.walk(va) {
            Some(pa) => self.ram.phys_to_ptr(pa),
            None => panic!("simulated page fault inside the memory manager at {va}"),
        }
    }
}

/// The two pools of the simulated machine. Not registered yet.
pub fn pools<'a>(mmu: &SimMmu) -> (FramePool<'a>, FramePool<'a>) {
    let tables =
        unsafe { FramePool::new(mmu, FrameNumber::new(TABLE_POOL.0), TABLE_POOL.1, None) }
            .unwrap();
    let pages =
        unsafe { FramePool::new(mmu, FrameNumber::new(PAGE_POOL.0), PAGE_POOL.1, None) }.unwrap();
    (tables, pages)
}

/// Store `value` at `va` like a CPU would: fault first if unmapped.
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

/// Claims every address.
pub struct Everything;

impl RegionCheck for Everything {
    fn is_legitimate(&self, _: VirtualAddress) -> bool {
        true
    }
}

/// Claims one half-open range.
pub struct Range(pub u32, pub u32);

impl RegionCheck for Range {
    fn is_legitimate(&self, address: VirtualAddress) -> bool {
        (self.0..self.1).contains(&address.as_u32())
    }
}
