use crate::BootError;
use kernel_qemu::QemuLogger;
use log::LevelFilter;

static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Debug);

/// Route `log` records to the QEMU debug console, up to `level`.
///
/// Call once, before the pools are built, so their setup is traced.
///
/// # Errors
/// [`BootError::LoggerInstalled`] if some logger is already in place.
pub fn init_logging(level: LevelFilter) -> Result<(), BootError> {
    LOGGER.install().map_err(|_| BootError::LoggerInstalled)?;
    log::set_max_level(level.min(LOGGER.max_level()));
    Ok(())
}
