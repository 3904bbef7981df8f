use bitfield_struct::bitfield;
use kernel_memory_addresses::FrameNumber;

/// A 32-bit page directory or page table entry.
///
/// Both levels share one layout. A directory entry points at a page table,
/// a table entry maps one 4 KiB page.
///
/// ### Bit layout
///
/// | Bits  | Name        | Meaning |
/// |-------|-------------|---------|
/// | 0     | `P`         | Present |
/// | 1     | `RW`        | Writable |
/// | 2     | `US`        | User accessible (clear: supervisor only) |
/// | 3     | `PWT`       | Write-through caching |
/// | 4     | `PCD`       | Cache disable |
/// | 5     | `A`         | Accessed |
/// | 6     | `D`         | Dirty (table entries only) |
/// | 7     | `PS` / `PAT`| 4 MiB page in a directory entry, PAT in a table entry |
/// | 8     | `G`         | Global (table entries only) |
/// | 9–11  | avail       | Free for OS use |
/// | 12–31 | frame       | Frame number of the table or page |
///
/// ### Example
/// ```rust
/// # use kernel_vmem::PageEntryBits;
/// # use kernel_memory_addresses::FrameNumber;
/// let e = PageEntryBits::supervisor_rw(FrameNumber::new(0x123));
/// assert!(e.present() && e.writable() && !e.user_access());
/// assert_eq!(e.into_bits(), 0x0012_3003);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    ///
    /// Clear means every other bit is ignored by the CPU and an access faults.
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on the first write through a table
    /// entry.
    pub dirty: bool,

    /// Page size (PS, bit 7) in a directory entry; PAT in a table entry.
    pub large_page: bool,

    /// Global (G, bit 8).
    pub global_translation: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Frame number (bits 12..=31).
    #[bits(20)]
    frame_bits: u32,
}

impl PageEntryBits {
    /// Present, writable, supervisor-only entry pointing at `frame`.
    #[inline]
    #[must_use]
    pub const fn supervisor_rw(frame: FrameNumber) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(false)
            .with_frame_bits(frame.as_u32())
    }

    /// Writable, supervisor-only, but not present.
    #[inline]
    #[must_use]
    pub const fn not_present_rw() -> Self {
        Self::new().with_writable(true)
    }

    #[inline]
    #[must_use]
    pub const fn frame(&self) -> FrameNumber {
        FrameNumber::new(self.frame_bits())
    }

    #[inline]
    pub const fn set_frame(&mut self, frame: FrameNumber) {
        self.set_frame_bits(frame.as_u32());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_field_is_top_twenty_bits() {
        let mut e = PageEntryBits::new();
        e.set_frame(FrameNumber::new(0xF_FFFF));
        assert_eq!(e.into_bits(), 0xFFFF_F000);
        assert_eq!(e.frame(), FrameNumber::new(0xF_FFFF));
        assert!(!e.present());
    }

    #[test]
    fn not_present_keeps_write_bit() {
        assert_eq!(PageEntryBits::not_present_rw().into_bits(), 0b10);
    }
}
