use crate::frame_pool::{FramePool, FramePoolError};
use kernel_memory_addresses::FrameNumber;
use kernel_sync::SpinMutex;
use log::{error, info};

/// Upper bound on simultaneously registered pools.
pub const MAX_POOLS: usize = 8;

/// The set of live frame pools, consulted when a frame is released.
///
/// Pools are registered by reference after construction, so a pool has to
/// be at its final address (usually a `static` or a long-lived local in the
/// boot path) before it becomes reachable here.
pub struct FramePoolRegistry<'a> {
    pools: SpinMutex<[Option<&'a FramePool<'a>>; MAX_POOLS]>,
}

impl Default for FramePoolRegistry<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> FramePoolRegistry<'a> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pools: SpinMutex::new([None; MAX_POOLS]),
        }
    }

    /// Make `pool` reachable for [`release_frames`].
    ///
    /// # Errors
    /// - [`FramePoolError::Overlap`] if the pool's range intersects an already
    ///   registered pool.
    /// - [`FramePoolError::RegistryFull`] once [`MAX_POOLS`] are registered.
    pub fn register(&self, pool: &'a FramePool<'a>) -> Result<(), FramePoolError> {
        let start = u64::from(pool.base().as_u32());
        let end = start + u64::from(pool.frame_count());

        let mut pools = self.pools.lock_irq();
        for other in pools.iter().flatten() {
            let other_start = u64::from(other.base().as_u32());
            let other_end = other_start + u64::from(other.frame_count());
            if start < other_end && other_start < end {
                error!(
                    "frame pool {}..+{} overlaps {}..+{}",
                    pool.base(),
                    pool.frame_count(),
                    other.base(),
                    other.frame_count()
                );
                return Err(FramePoolError::Overlap(pool.base()));
            }
        }

        let slot = pools
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(FramePoolError::RegistryFull)?;
        *slot = Some(pool);

        info!(
            "registered frame pool {}..+{}",
            pool.base(),
            pool.frame_count()
        );
        Ok(())
    }

    /// The first registered pool whose range contains `frame`.
    #[must_use]
    pub fn owner(&self, frame: FrameNumber) -> Option<&'a FramePool<'a>> {
        self.pools
            .lock_irq()
            .iter()
            .flatten()
            .copied()
            .find(|pool| pool.contains(frame))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.lock_irq().iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Release the run headed by `frame`, whichever pool owns it.
///
/// Returns the number of frames freed.
///
/// # Errors
/// - [`FramePoolError::UnownedFrame`] if no registered pool contains `frame`.
/// - [`FramePoolError::NotHead`] if `frame` does not start a run.
pub fn release_frames(
    registry: &FramePoolRegistry<'_>,
    frame: FrameNumber,
) -> Result<u32, FramePoolError> {
    let Some(pool) = registry.owner(frame) else {
        error!("release of {frame}: no pool owns it");
        return Err(FramePoolError::UnownedFrame(frame));
    };
    pool.release_run(frame)
}
