//! # Two-level page tables and the recursive self-map
//!
//! A 32-bit virtual address splits into a [`DirectoryIndex`] (bits 31–22),
//! a [`TableIndex`] (bits 21–12) and a byte offset. Directory and tables
//! share the [`PageTable`] layout: 1024 [`PageEntryBits`], one frame.
//!
//! ## Recursive self-map
//!
//! The last directory slot ([`RECURSIVE_SLOT`]) always points at the
//! directory's own frame. The MMU then treats the directory as a table and
//! every table as a page, so while paging is on:
//!
//! - `0xFFFF_F000` is the directory itself
//!   ([`directory_entry_address`]);
//! - `0xFFC0_0000 | dir << 12` is the page table behind directory slot `dir`
//!   ([`table_window`], [`table_entry_address`]).
//!
//! The fault handler reaches any entry this way without a separate
//! physical-to-virtual lookup, even for tables it has just installed.

use crate::PageEntryBits;
use kernel_memory_addresses::{ENTRIES_PER_TABLE, VirtualAddress};

/// Directory slot holding the self-map.
pub const RECURSIVE_SLOT: DirectoryIndex = DirectoryIndex::new(1023);

/// Index into a page directory (VA bits `[31:22]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DirectoryIndex(u16);

/// Index into a page table (VA bits `[21:12]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u16);

impl DirectoryIndex {
    /// ### Debug assertions
    /// - Asserts `v < 1024` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRIES_PER_TABLE);
        Self(v)
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn of(va: VirtualAddress) -> Self {
        Self::new(va.directory_index() as u16)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }
}

impl TableIndex {
    /// ### Debug assertions
    /// - Asserts `v < 1024` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRIES_PER_TABLE);
        Self(v)
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn of(va: VirtualAddress) -> Self {
        Self::new(va.table_index() as u16)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }
}

/// Virtual address of directory entry `dir` through the self-map.
#[inline]
#[must_use]
pub const fn directory_entry_address(dir: DirectoryIndex) -> VirtualAddress {
    VirtualAddress::new(0xFFFF_F000 | (dir.as_u32() << 2))
}

/// Virtual address at which the page table behind directory slot `dir`
/// appears through the self-map.
#[inline]
#[must_use]
pub const fn table_window(dir: DirectoryIndex) -> VirtualAddress {
    VirtualAddress::new(0xFFC0_0000 | (dir.as_u32() << 12))
}

/// Virtual address of entry `tbl` in the page table behind slot `dir`.
#[inline]
#[must_use]
pub const fn table_entry_address(dir: DirectoryIndex, tbl: TableIndex) -> VirtualAddress {
    VirtualAddress::new(table_window(dir).as_u32() | (tbl.as_u32() << 2))
}

/// A page directory or page table: 1024 entries, 4 KiB aligned.
#[doc(alias = "PD")]
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntryBits; ENTRIES_PER_TABLE],
}

impl PageTable {
    /// Set every entry to `entry`.
    #[inline]
    pub fn fill(&mut self, entry: PageEntryBits) {
        self.entries.fill(entry);
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: usize) -> PageEntryBits {
        self.entries[i]
    }

    #[inline]
    pub const fn set(&mut self, i: usize, entry: PageEntryBits) {
        self.entries[i] = entry;
    }

    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = PageEntryBits> + '_ {
        self.entries.iter().copied()
    }
}
