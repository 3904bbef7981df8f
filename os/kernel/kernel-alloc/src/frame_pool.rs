//! # Contiguous physical frame pools
//!
//! A [`FramePool`] manages a fixed range of physical frames and hands out
//! contiguous runs of them. Per-frame state is kept in a packed table of
//! [`StateQuad`]s, two bits per frame, stored in one *management frame*:
//!
//! - Without an explicit management frame the table lives in the pool's own
//!   first frame, which is marked [`FrameState::Head`] and never handed out.
//! - With one (typically taken from another pool) every frame of the range is
//!   available.
//!
//! A single management frame describes at most [`MAX_FRAMES_PER_POOL`]
//! frames; larger regions are split into several pools, see
//! [`management_frames_needed`].
//!
//! Runs are released through the pool registry with
//! [`release_frames`](crate::release_frames), since callers don't remember
//! which pool a frame came from.

use crate::frame_state::{FrameState, StateQuad};
use crate::phys_mapper::PhysMapper;
use kernel_memory_addresses::{FRAME_SHIFT, FRAME_SIZE, FrameNumber};
use kernel_sync::SpinMutex;
use log::{debug, error, info, warn};

/// Frames one management frame can describe at two bits per frame.
pub const MAX_FRAMES_PER_POOL: u32 = FRAME_SIZE * StateQuad::FRAMES;

/// Frames in the 32-bit physical address space.
const PHYSICAL_FRAMES: u64 = 1 << (32 - FRAME_SHIFT);

/// Management frames required to describe `frames` frames.
///
/// ```
/// use kernel_alloc::management_frames_needed;
///
/// assert_eq!(management_frames_needed(0), 0);
/// assert_eq!(management_frames_needed(1), 1);
/// assert_eq!(management_frames_needed(16_384), 1);
/// assert_eq!(management_frames_needed(16_385), 2);
/// ```
#[must_use]
pub const fn management_frames_needed(frames: u32) -> u32 {
    frames.div_ceil(MAX_FRAMES_PER_POOL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FramePoolError {
    #[error("a frame pool must contain at least one frame")]
    EmptyPool,
    #[error("frame count {0} is not a multiple of 4")]
    CountNotMultipleOfFour(u32),
    #[error("{count} frames exceed the {max} one management frame can describe", max = MAX_FRAMES_PER_POOL)]
    TooManyFrames { count: u32 },
    #[error("cannot allocate or reserve zero frames")]
    ZeroFrames,
    #[error("pool has no free frames")]
    Exhausted,
    #[error("no run of {0} contiguous free frames")]
    NoContiguousRun(u32),
    #[error("frames {first}..+{count} are outside the pool")]
    OutOfRange { first: FrameNumber, count: u32 },
    #[error("frame {0} is not owned by any registered pool")]
    UnownedFrame(FrameNumber),
    #[error("frame {frame} is {state:?}, not the head of a run")]
    NotHead { frame: FrameNumber, state: FrameState },
    #[error("frame {0} holds the pool's own state table")]
    ManagementFrame(FrameNumber),
    #[error("external state table frame {0} lies inside the pool")]
    ManagementFrameInPool(FrameNumber),
    #[error("pool registry is full")]
    RegistryFull,
    #[error("pool starting at {0} overlaps a registered pool")]
    Overlap(FrameNumber),
}

/// How [`FramePool::reserve`] treats the free-frame counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveAccounting {
    /// Leave the counter untouched. Reserved frames stay counted as free, so
    /// [`FramePool::free_frames`] overstates what `allocate` can deliver.
    KeepFreeCount,
    /// Subtract every frame that was free before the reservation.
    DeductFromFreeCount,
}

/// Frame counts per state, see [`FramePool::census`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCensus {
    pub free: u32,
    pub allocated: u32,
    pub head: u32,
}

impl FrameCensus {
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.free + self.allocated + self.head
    }
}

pub struct FramePool<'a> {
    base: FrameNumber,
    count: u32,
    info_frame: Option<FrameNumber>,
    inner: SpinMutex<PoolState<'a>>,
}

struct PoolState<'a> {
    states: &'a mut [u8],
    free: u32,
}

impl PoolState<'_> {
    fn get(&self, index: u32) -> FrameState {
        StateQuad::from_bits(self.states[quad_index(index)]).get(slot_index(index))
    }

    fn set(&mut self, index: u32, state: FrameState) {
        let byte = &mut self.states[quad_index(index)];
        let mut quad = StateQuad::from_bits(*byte);
        quad.set(slot_index(index), state);
        *byte = quad.into_bits();
    }

    /// Mark `first..first + n` as one run.
    fn mark_run(&mut self, first: u32, n: u32) {
        self.set(first, FrameState::Head);
        for i in first + 1..first + n {
            self.set(i, FrameState::Allocated);
        }
    }
}

const fn quad_index(index: u32) -> usize {
    (index / StateQuad::FRAMES) as usize
}

const fn slot_index(index: u32) -> usize {
    (index % StateQuad::FRAMES) as usize
}

impl<'a> FramePool<'a> {
    /// Build a pool over `count` frames starting at `base`.
    ///
    /// The state table is cleared, so every frame starts out free except the
    /// pool's first frame when it has to host the table itself.
    ///
    /// The pool is not reachable by [`release_frames`](crate::release_frames)
    /// until it is registered with a
    /// [`FramePoolRegistry`](crate::FramePoolRegistry).
    ///
    /// # Errors
    /// - [`FramePoolError::EmptyPool`], [`FramePoolError::CountNotMultipleOfFour`]
    ///   and [`FramePoolError::TooManyFrames`] for bad counts.
    /// - [`FramePoolError::OutOfRange`] if the range runs past the 32-bit
    ///   physical address space.
    /// - [`FramePoolError::ManagementFrameInPool`] if `info_frame` is one of
    ///   the pool's own frames; use `None` for a self-hosted table.
    ///
    /// # Safety
    /// The management frame (`info_frame`, or `base` without one) must be
    /// reachable through `mapper` and must not be used by anything else for
    /// the lifetime `'a`.
    pub unsafe fn new<M>(
        mapper: &M,
        base: FrameNumber,
        count: u32,
        info_frame: Option<FrameNumber>,
    ) -> Result<Self, FramePoolError>
    where
        M: PhysMapper + ?Sized,
    {
        if count == 0 {
            return Err(FramePoolError::EmptyPool);
        }
        if count % StateQuad::FRAMES != 0 {
            return Err(FramePoolError::CountNotMultipleOfFour(count));
        }
        if count > MAX_FRAMES_PER_POOL {
            return Err(FramePoolError::TooManyFrames { count });
        }
        if u64::from(base.as_u32()) + u64::from(count) > PHYSICAL_FRAMES {
            return Err(FramePoolError::OutOfRange { first: base, count });
        }
        if let Some(info) = info_frame
            && info.as_u32().wrapping_sub(base.as_u32()) < count
        {
            return Err(FramePoolError::ManagementFrameInPool(info));
        }

        let table = info_frame.unwrap_or(base);
        let states = unsafe { mapper.phys_to_bytes(table.base(), quad_index(count)) };
        states.fill(0);

        let mut state = PoolState {
            states,
            free: count,
        };
        if info_frame.is_none() {
            state.set(0, FrameState::Head);
            state.free -= 1;
        }

        info!(
            "frame pool {base}..+{count}: state table in frame {table}, {} frames free",
            state.free
        );

        Ok(Self {
            base,
            count,
            info_frame,
            inner: SpinMutex::new(state),
        })
    }

    #[must_use]
    pub const fn base(&self) -> FrameNumber {
        self.base
    }

    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.count
    }

    /// The frame holding the state table.
    #[must_use]
    pub fn management_frame(&self) -> FrameNumber {
        self.info_frame.unwrap_or(self.base)
    }

    #[must_use]
    pub const fn contains(&self, frame: FrameNumber) -> bool {
        frame.as_u32() >= self.base.as_u32() && frame.as_u32() - self.base.as_u32() < self.count
    }

    /// Whether `first..first + n` lies entirely inside the pool.
    #[must_use]
    pub const fn contains_range(&self, first: FrameNumber, n: u32) -> bool {
        if !self.contains(first) {
            return false;
        }
        match (first.as_u32() - self.base.as_u32()).checked_add(n) {
            Some(end) => end <= self.count,
            None => false,
        }
    }

    /// Free-frame counter. See [`ReserveAccounting`] for when this differs
    /// from the census.
    #[must_use]
    pub fn free_frames(&self) -> u32 {
        self.inner.lock_irq().free
    }

    /// State of `frame`, or `None` if the pool doesn't own it.
    #[must_use]
    pub fn state(&self, frame: FrameNumber) -> Option<FrameState> {
        if !self.contains(frame) {
            return None;
        }
        Some(self.inner.lock_irq().get(frame - self.base))
    }

    /// Count frames per state by walking the table.
    #[must_use]
    pub fn census(&self) -> FrameCensus {
        let st = self.inner.lock_irq();
        let mut census = FrameCensus::default();
        for i in 0..self.count {
            match st.get(i) {
                FrameState::Free => census.free += 1,
                FrameState::Allocated => census.allocated += 1,
                FrameState::Head => census.head += 1,
            }
        }
        census
    }

    /// Allocate `n` contiguous frames and return the first.
    ///
    /// First fit in frame order. While scanning, a free frame extends the
    /// current run, a head frame resets it and an allocated frame leaves it
    /// unchanged.
    ///
    /// # Errors
    /// - [`FramePoolError::ZeroFrames`] for `n == 0`.
    /// - [`FramePoolError::Exhausted`] when the free counter is zero.
    /// - [`FramePoolError::NoContiguousRun`] when no run of `n` free frames
    ///   exists.
    pub fn allocate(&self, n: u32) -> Result<FrameNumber, FramePoolError> {
        if n == 0 {
            return Err(FramePoolError::ZeroFrames);
        }

        let mut st = self.inner.lock_irq();
        if st.free == 0 {
            warn!("frame pool {}: exhausted", self.base);
            return Err(FramePoolError::Exhausted);
        }

        let mut run = 0;
        let mut last = None;
        for i in 0..self.count {
            match st.get(i) {
                FrameState::Free => run += 1,
                FrameState::Head => run = 0,
                FrameState::Allocated => {}
            }
            if run == n {
                last = Some(i);
                break;
            }
        }

        let Some(last) = last else {
            warn!(
                "frame pool {}: no run of {n} frames ({} free)",
                self.base, st.free
            );
            return Err(FramePoolError::NoContiguousRun(n));
        };

        let first = last + 1 - n;
        st.mark_run(first, n);
        st.free = st.free.saturating_sub(n);

        let frame = self.base + first;
        debug!("frame pool {}: allocated {frame}..+{n}", self.base);
        Ok(frame)
    }

    /// Mark `first..first + n` as one allocated run without searching.
    ///
    /// Used for frames consumed outside the pool's bookkeeping, such as the
    /// memory hole or boot-time structures.
    ///
    /// # Errors
    /// Rejects empty and out-of-pool ranges.
    pub fn reserve(
        &self,
        first: FrameNumber,
        n: u32,
        accounting: ReserveAccounting,
    ) -> Result<(), FramePoolError> {
        if n == 0 {
            return Err(FramePoolError::ZeroFrames);
        }
        if !self.contains_range(first, n) {
            warn!("frame pool {}: cannot reserve {first}..+{n}", self.base);
            return Err(FramePoolError::OutOfRange { first, count: n });
        }

        let start = first - self.base;
        let mut st = self.inner.lock_irq();
        let was_free = (start..start + n)
            .filter(|&i| st.get(i) == FrameState::Free)
            .count();
        st.mark_run(start, n);

        if accounting == ReserveAccounting::DeductFromFreeCount {
            #[allow(clippy::cast_possible_truncation)]
            let was_free = was_free as u32;
            st.free = st.free.saturating_sub(was_free);
        }

        debug!(
            "frame pool {}: reserved {first}..+{n} ({accounting:?})",
            self.base
        );
        Ok(())
    }

    /// Free the run headed by `frame` in this pool. Returns the number of
    /// frames freed.
    ///
    /// Callers that don't know the owning pool go through
    /// [`release_frames`](crate::release_frames).
    ///
    /// # Errors
    /// - [`FramePoolError::UnownedFrame`] if `frame` is outside the pool.
    /// - [`FramePoolError::ManagementFrame`] for a self-hosted state table.
    /// - [`FramePoolError::NotHead`] if `frame` does not start a run.
    pub fn release_run(&self, frame: FrameNumber) -> Result<u32, FramePoolError> {
        if !self.contains(frame) {
            return Err(FramePoolError::UnownedFrame(frame));
        }
        if self.info_frame.is_none() && frame == self.base {
            error!("frame pool {}: refusing to release its state table", self.base);
            return Err(FramePoolError::ManagementFrame(frame));
        }

        let head = frame - self.base;
        let mut st = self.inner.lock_irq();

        let state = st.get(head);
        if state != FrameState::Head {
            error!("frame pool {}: release of {frame} in state {state:?}", self.base);
            return Err(FramePoolError::NotHead { frame, state });
        }

        st.set(head, FrameState::Free);
        let mut freed = 1;
        let mut i = head + 1;
        while i < self.count && st.get(i) == FrameState::Allocated {
            st.set(i, FrameState::Free);
            freed += 1;
            i += 1;
        }
        st.free += freed;

        debug!("frame pool {}: released {frame}..+{freed}", self.base);
        Ok(freed)
    }
}
