mod common;

use common::{Ram, SimMmu, pools, read_u32, write_u32};
use kernel_alloc::FramePoolRegistry;
use kernel_memory_addresses::{FRAME_SIZE, VirtualAddress};
use kernel_vmem::{
    AddressSpace, FaultError, FaultOutcome, MAX_REGIONS, PageFault, Paging, PagingError,
    RegionCheck, RegionTracker, RegionTrackerError,
};

const HEAP: VirtualAddress = VirtualAddress::new(0x4000_0000);
const HEAP_SIZE: u32 = 0x40_0000;

/// Wire up the simulated machine and bind `$space` to a live address space.
macro_rules! live_space {
    ($mmu:ident, $tables:ident, $pages:ident, $space:ident) => {
        let mut ram = Ram::filled(0xA5);
        let $mmu = SimMmu::new(&mut ram);
        let ($tables, $pages) = pools(&$mmu);
        let registry = FramePoolRegistry::new();
        registry.register(&$tables).unwrap();
        registry.register(&$pages).unwrap();
        let paging = Paging::new(&$mmu, &registry, &$tables, &$pages);
        let $space = AddressSpace::new(&paging).unwrap();
        $space.load();
        paging.enable().unwrap();
    };
}

#[test]
fn new_tracker_holds_only_its_list_page() {
    live_space!(mmu, tables, pages, space);
    let free = pages.free_frames();

    let heap = RegionTracker::new(HEAP, HEAP_SIZE, &pages, &space).unwrap();
    heap.register().unwrap();

    // list page is backed eagerly
    assert_eq!(pages.free_frames(), free - 1);
    assert!(mmu.walk(HEAP).is_some());

    assert_eq!(
        heap.regions().unwrap().collect::<Vec<_>>(),
        vec![(HEAP, FRAME_SIZE)]
    );
    assert!(space.is_legitimate(HEAP));
    assert!(space.is_legitimate(HEAP + 0xFFF));
    assert!(!space.is_legitimate(HEAP + FRAME_SIZE));
    assert!(!heap.is_legitimate(VirtualAddress::new(HEAP.as_u32() - 1)));
}

#[test]
fn allocation_rounds_up_to_pages() {
    live_space!(mmu, tables, pages, space);
    let heap = RegionTracker::new(HEAP, HEAP_SIZE, &pages, &space).unwrap();

    let first = heap.allocate(10_000).unwrap();
    assert_eq!(first, HEAP + FRAME_SIZE);
    assert_eq!(
        heap.regions().unwrap().collect::<Vec<_>>(),
        vec![(HEAP, FRAME_SIZE), (first, 3 * FRAME_SIZE)]
    );

    // nothing is mapped until touched
    assert!(mmu.walk(first).is_none());

    assert!(heap.is_legitimate(first));
    assert!(heap.is_legitimate(first + (3 * FRAME_SIZE - 1)));
    assert!(!heap.is_legitimate(first + 3 * FRAME_SIZE));

    // a zero-byte request still takes a page, directly after the last region
    let second = heap.allocate(0).unwrap();
    assert_eq!(second, first + 3 * FRAME_SIZE);
    let third = heap.allocate(FRAME_SIZE).unwrap();
    assert_eq!(third, second + FRAME_SIZE);
    assert_eq!(heap.regions().unwrap().count(), 4);
}

#[test]
fn touching_an_allocated_region_demand_fills_it() {
    live_space!(mmu, tables, pages, space);
    let heap = RegionTracker::new(HEAP, HEAP_SIZE, &pages, &space).unwrap();
    heap.register().unwrap();

    let buf = heap.allocate(2 * FRAME_SIZE).unwrap();
    let free = pages.free_frames();

    write_u32(&space, buf, 1);
    write_u32(&space, buf + FRAME_SIZE + 0x10, 2);
    assert_eq!(read_u32(&space, buf), 1);
    assert_eq!(read_u32(&space, buf + FRAME_SIZE + 0x10), 2);
    assert_eq!(pages.free_frames(), free - 2);

    // inside the tracked range but not handed out
    let beyond = buf + 2 * FRAME_SIZE;
    assert_eq!(
        space.handle_fault(&PageFault::not_present_write(beyond)),
        Err(FaultError::IllegitimateAddress(beyond))
    );
    assert_eq!(pages.free_frames(), free - 2);
}

#[test]
fn release_unmaps_every_page_and_compacts() {
    live_space!(mmu, tables, pages, space);
    let heap = RegionTracker::new(HEAP, HEAP_SIZE, &pages, &space).unwrap();
    heap.register().unwrap();

    let a = heap.allocate(10_000).unwrap();
    let b = heap.allocate(FRAME_SIZE).unwrap();

    let free = pages.free_frames();
    for page in 0..3 {
        write_u32(&space, a + page * FRAME_SIZE, page);
    }
    write_u32(&space, b, 0xB);
    assert_eq!(pages.free_frames(), free - 4);

    let loads = mmu.cr3_loads();
    heap.release(a).unwrap();
    assert_eq!(mmu.cr3_loads(), loads + 3);
    assert_eq!(pages.free_frames(), free - 1);
    for page in 0..3 {
        assert!(mmu.walk(a + page * FRAME_SIZE).is_none());
    }

    assert_eq!(
        heap.regions().unwrap().collect::<Vec<_>>(),
        vec![(HEAP, FRAME_SIZE), (b, FRAME_SIZE)]
    );
    assert!(!heap.is_legitimate(a));
    assert_eq!(read_u32(&space, b), 0xB);

    // the hole is not reused
    let c = heap.allocate(1).unwrap();
    assert_eq!(c, b + FRAME_SIZE);
}

#[test]
fn releasing_an_untouched_region_still_flushes_per_page() {
    live_space!(mmu, tables, pages, space);
    let heap = RegionTracker::new(HEAP, HEAP_SIZE, &pages, &space).unwrap();

    let a = heap.allocate(5 * FRAME_SIZE).unwrap();
    let free = pages.free_frames();
    let loads = mmu.cr3_loads();
    heap.release(a).unwrap();
    assert_eq!(mmu.cr3_loads(), loads + 5);
    assert_eq!(pages.free_frames(), free);
    assert_eq!(heap.regions().unwrap().count(), 1);
}

#[test]
fn release_requires_an_exact_region_start() {
    live_space!(mmu, tables, pages, space);
    let heap = RegionTracker::new(HEAP, HEAP_SIZE, &pages, &space).unwrap();
    let a = heap.allocate(2 * FRAME_SIZE).unwrap();

    assert_eq!(
        heap.release(a + FRAME_SIZE),
        Err(RegionTrackerError::UnknownRegion(a + FRAME_SIZE))
    );
    // the list page is not a releasable region
    assert_eq!(
        heap.release(HEAP),
        Err(RegionTrackerError::UnknownRegion(HEAP))
    );
    assert_eq!(heap.regions().unwrap().count(), 2);

    heap.release(a).unwrap();
    assert_eq!(heap.release(a), Err(RegionTrackerError::UnknownRegion(a)));
}

#[test]
fn allocation_stops_at_the_end_of_the_range() {
    live_space!(mmu, tables, pages, space);
    let small = RegionTracker::new(HEAP, 4 * FRAME_SIZE, &pages, &space).unwrap();

    let a = small.allocate(3 * FRAME_SIZE).unwrap();
    assert_eq!(a, HEAP + FRAME_SIZE);
    assert_eq!(
        small.allocate(1),
        Err(RegionTrackerError::OutOfSpace { requested: 1 })
    );
    assert_eq!(
        small.allocate(u32::MAX),
        Err(RegionTrackerError::OutOfSpace {
            requested: u32::MAX
        })
    );

    small.release(a).unwrap();
    assert_eq!(small.allocate(3 * FRAME_SIZE), Ok(a));
}

#[test]
fn list_holds_a_bounded_number_of_regions() {
    live_space!(mmu, tables, pages, space);
    let size = MAX_REGIONS as u32 * FRAME_SIZE;
    let heap = RegionTracker::new(HEAP, size, &pages, &space).unwrap();

    for _ in 1..MAX_REGIONS {
        heap.allocate(0).unwrap();
    }
    assert_eq!(heap.regions().unwrap().count(), MAX_REGIONS);
    assert_eq!(heap.allocate(0), Err(RegionTrackerError::ListFull));

    let last = heap.regions().unwrap().last().unwrap().0;
    assert_eq!(last, HEAP + (size - FRAME_SIZE));
}

#[test]
fn tracked_range_must_be_whole_pages() {
    live_space!(mmu, tables, pages, space);

    for (base, size) in [
        (HEAP + 1, HEAP_SIZE),
        (HEAP, 0),
        (HEAP, FRAME_SIZE + 1),
        (VirtualAddress::new(0xFFFF_F000), 2 * FRAME_SIZE),
    ] {
        assert_eq!(
            RegionTracker::new(base, size, &pages, &space).err(),
            Some(RegionTrackerError::InvalidRange { base, size })
        );
    }
}

#[test]
fn tracker_needs_a_live_space() {
    let mut ram = Ram::filled(0);
    let mmu = SimMmu::new(&mut ram);
    let (tables, pages) = pools(&mmu);
    let registry = FramePoolRegistry::new();
    let paging = Paging::new(&mmu, &registry, &tables, &pages);
    let space = AddressSpace::new(&paging).unwrap();

    assert_eq!(
        RegionTracker::new(HEAP, HEAP_SIZE, &pages, &space).err(),
        Some(RegionTrackerError::Paging(PagingError::NotActive(
            space.directory_frame()
        )))
    );
}

#[test]
fn tracker_of_an_unloaded_space_claims_nothing() {
    let mut ram = Ram::filled(0xA5);
    let mmu = SimMmu::new(&mut ram);
    let (tables, pages) = pools(&mmu);
    let registry = FramePoolRegistry::new();
    registry.register(&tables).unwrap();
    registry.register(&pages).unwrap();
    let paging = Paging::new(&mmu, &registry, &tables, &pages);
    let a = AddressSpace::new(&paging).unwrap();
    let b = AddressSpace::new(&paging).unwrap();

    b.load();
    paging.enable().unwrap();
    let heap = RegionTracker::new(HEAP, HEAP_SIZE, &pages, &b).unwrap();
    heap.register().unwrap();
    let buf = heap.allocate(FRAME_SIZE).unwrap();

    // the list page at HEAP is not mapped in a
    a.load();
    let not_active = PagingError::NotActive(b.directory_frame());
    let free = (tables.free_frames(), pages.free_frames());
    assert_eq!(
        b.handle_fault(&PageFault::not_present_write(buf)),
        Err(FaultError::Paging(not_active))
    );
    assert!(!heap.is_legitimate(HEAP));
    assert!(!heap.is_legitimate(buf));
    assert!(!b.is_legitimate(buf));
    assert_eq!(
        heap.release(buf),
        Err(RegionTrackerError::Paging(not_active))
    );
    assert_eq!((tables.free_frames(), pages.free_frames()), free);

    b.load();
    assert!(heap.is_legitimate(buf));
    assert!(matches!(
        b.handle_fault(&PageFault::not_present_write(buf)),
        Ok(FaultOutcome::Mapped { .. })
    ));
}

#[test]
fn trackers_at_the_same_base_keep_separate_lists() {
    let mut ram = Ram::filled(0xA5);
    let mmu = SimMmu::new(&mut ram);
    let (tables, pages) = pools(&mmu);
    let registry = FramePoolRegistry::new();
    registry.register(&tables).unwrap();
    registry.register(&pages).unwrap();
    let paging = Paging::new(&mmu, &registry, &tables, &pages);
    let a = AddressSpace::new(&paging).unwrap();
    let b = AddressSpace::new(&paging).unwrap();

    a.load();
    paging.enable().unwrap();
    let heap_a = RegionTracker::new(HEAP, HEAP_SIZE, &pages, &a).unwrap();
    b.load();
    let heap_b = RegionTracker::new(HEAP, HEAP_SIZE, &pages, &b).unwrap();
    let in_b = heap_b.allocate(2 * FRAME_SIZE).unwrap();
    assert_eq!(in_b, HEAP + FRAME_SIZE);

    a.load();
    assert_eq!(
        heap_b.allocate(FRAME_SIZE),
        Err(RegionTrackerError::Paging(PagingError::NotActive(
            b.directory_frame()
        )))
    );
    assert!(heap_b.regions().is_err());
    assert_eq!(
        heap_a.regions().unwrap().collect::<Vec<_>>(),
        vec![(HEAP, FRAME_SIZE)]
    );
    assert_eq!(heap_a.allocate(FRAME_SIZE), Ok(HEAP + FRAME_SIZE));

    b.load();
    assert_eq!(
        heap_b.regions().unwrap().collect::<Vec<_>>(),
        vec![(HEAP, FRAME_SIZE), (in_b, 2 * FRAME_SIZE)]
    );
}
