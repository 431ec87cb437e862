//! `log` backend printing to a claimed UART, plus the debug-only logging macro.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, set_logger, set_max_level};
use spin::relax::RelaxStrategy;

use crate::{handle::DeviceHandle, regs::RegisterFile};

/// Prints every enabled record as one ANSI-coloured line on `uart`.
///
/// Records are written under the device lock, so nothing may log while holding
/// [DeviceHandle::lock] on the same device.
pub struct UartLogger<R: RegisterFile + 'static, S: RelaxStrategy + 'static> {
    uart: &'static DeviceHandle<R, S>,
    level: LevelFilter,
}

impl<R: RegisterFile + 'static, S: RelaxStrategy + 'static> UartLogger<R, S> {
    pub const fn new(uart: &'static DeviceHandle<R, S>, level: LevelFilter) -> Self {
        UartLogger { uart, level }
    }
}

fn color(level: Level) -> u8 {
    match level {
        Level::Error => 31, // Red
        Level::Warn => 93,  // BrightYellow
        Level::Info => 20,  // White
        Level::Debug => 32, // Green
        Level::Trace => 90, // BrightBlack
    }
}

impl<R: RegisterFile + 'static, S: RelaxStrategy + 'static> Log for UartLogger<R, S> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.uart.print(format_args!(
            "\u{1B}[{}m[{:}] {}\u{1B}[0m\n",
            color(record.level()),
            record.level(),
            record.args(),
        ));
    }

    fn flush(&self) {
        self.uart.flush();
    }
}

/// Install `logger` as the global logger and raise the global filter to `level`.
///
/// The logger keeps filtering by its own level as well. Fails if a global logger is
/// already installed.
pub fn init<R: RegisterFile + 'static, S: RelaxStrategy + 'static>(
    logger: &'static UartLogger<R, S>,
    level: LevelFilter,
) -> Result<(), SetLoggerError> {
    set_logger(logger)?;
    set_max_level(level);
    Ok(())
}

/// Improved debug macro,
/// only compiled in debug mode.
#[macro_export]
macro_rules! debug_ex {
    // debug_ex!(target: "my_target", "a {} event", "log")
    (target: $target:expr, $($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            ::log::log!(target: $target, ::log::Level::Debug, $($arg)+)
        }
    };

    // debug_ex!("a {} event", "log")
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            ::log::log!(::log::Level::Debug, $($arg)+)
        }
    }
}
