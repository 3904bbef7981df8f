//! Packed per-frame state, two bits per frame.

use bitfield_struct::bitfield;

/// Allocation state of one physical frame.
///
/// A run of allocated frames is a `Head` followed by zero or more
/// `Allocated` frames. The run length is not stored anywhere; release
/// recovers it by sweeping forward from the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameState {
    Free = 0b00,
    Allocated = 0b01,
    Head = 0b10,
}

impl FrameState {
    /// Decode a 2-bit field. The unused pattern `0b11` reads as `Allocated`
    /// so a corrupted entry is never handed out.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Free,
            0b10 => Self::Head,
            _ => Self::Allocated,
        }
    }

    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// Four consecutive frame states in one byte, lowest frame in the low bits.
///
/// A zeroed byte is four free frames, so a freshly cleared management frame
/// describes an entirely free pool.
#[bitfield(u8)]
pub struct StateQuad {
    #[bits(2)]
    f0: FrameState,
    #[bits(2)]
    f1: FrameState,
    #[bits(2)]
    f2: FrameState,
    #[bits(2)]
    f3: FrameState,
}

impl StateQuad {
    /// Number of frames described by one byte.
    pub const FRAMES: u32 = 4;

    #[must_use]
    pub const fn get(self, slot: usize) -> FrameState {
        match slot & 3 {
            0 => self.f0(),
            1 => self.f1(),
            2 => self.f2(),
            _ => self.f3(),
        }
    }

    pub fn set(&mut self, slot: usize, state: FrameState) {
        match slot & 3 {
            0 => self.set_f0(state),
            1 => self.set_f1(state),
            2 => self.set_f2(state),
            _ => self.set_f3(state),
        }
    }
}
