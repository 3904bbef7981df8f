#[cfg(all(feature = "asm", target_arch = "x86"))]
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use kernel_memory_addresses::FrameNumber;

/// CR3: Page-Directory Base Register (32-bit paging).
///
/// Holds the frame of the active page directory and the cache-control flags
/// for the directory walk. Writing CR3, even with an unchanged value, flushes
/// all non-global TLB entries.
#[bitfield(u32)]
pub struct Cr3 {
    /// Bits 0–2: Ignored.
    #[bits(3)]
    _reserved0: u8,

    /// Bit 3 PWT: Page-level Write-Through for the directory.
    pub pwt: bool,

    /// Bit 4 PCD: Page-level Cache Disable for the directory.
    pub pcd: bool,

    /// Bits 5–11: Ignored.
    #[bits(7)]
    _reserved1: u8,

    /// Bits 12–31: page directory frame number.
    #[bits(20)]
    directory_frame_bits: u32,
}

impl Cr3 {
    /// Build a CR3 image pointing at the directory in `frame` with
    /// write-back caching.
    #[must_use]
    pub const fn from_directory(frame: FrameNumber) -> Self {
        Self::new().with_directory_frame_bits(frame.as_u32())
    }

    /// The frame holding the page directory.
    #[must_use]
    pub const fn directory_frame(&self) -> FrameNumber {
        FrameNumber::new(self.directory_frame_bits())
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let cr3: u32;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}
