use crate::qemu_trace;
use core::fmt::{self, Write};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing to the QEMU debug console.
///
/// Install from a `static`, there is no allocator to leak a box into:
///
/// ```
/// use kernel_qemu::QemuLogger;
/// use log::LevelFilter;
///
/// static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Debug);
/// LOGGER.install().ok();
/// log::info!("memory manager up");
/// ```
pub struct QemuLogger {
    max_level: LevelFilter,
}

impl QemuLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// Register as the global logger.
    ///
    /// # Errors
    /// Fails if another logger was installed first.
    pub fn install(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        qemu_trace!("{}", Line(record.level(), record.target(), record.args()));
    }

    fn flush(&self) {}
}

struct Line<'a>(Level, &'a str, &'a fmt::Arguments<'a>);

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_record(f, self.0, self.1, self.2)
    }
}

/// Format one log line as `[LEVEL] target: message\n`.
///
/// # Errors
/// Propagates errors from the underlying writer.
pub fn write_record(
    w: &mut impl Write,
    level: Level,
    target: &str,
    args: &fmt::Arguments<'_>,
) -> fmt::Result {
    writeln!(w, "[{level}] {target}: {args}")
}
