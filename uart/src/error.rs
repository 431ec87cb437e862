//! Error types surfaced by the driver.
//!
//! Hardware conditions (overrun, parity, framing, break) are never errors here: they
//! stay [crate::LineStatus] bits for the caller to interpret.

use core::fmt::{Debug, Display, Write};

pub use mmio::MmioError;

/// An error that can be printed to a string device
pub trait MessageError: Debug {
    /// Print the error message to a writer
    fn print_to_writer(&self, f: &mut dyn Write) {
        if f.write_fmt(format_args!("{:?}", self)).is_err() {
            let _ = f.write_str("<unprintable error>");
        }
    }
}

impl Display for dyn MessageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.print_to_writer(f);
        Ok(())
    }
}

impl MessageError for MmioError {}

/// Failure to take ownership of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    /// Another [crate::DeviceHandle] already owns this base address.
    AddressInUse { base: usize },
}

impl MessageError for ClaimError {}

impl Display for ClaimError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ClaimError::AddressInUse { base } => {
                write!(f, "uart at {:#x} is already claimed", base)
            }
        }
    }
}

/// Baud divisor derivation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivisorError {
    ZeroBaudRate,
    ZeroClock,
    /// The nearest divisor does not fit the 16-bit latch or is zero.
    OutOfRange { divisor: u32 },
}

impl MessageError for DivisorError {}

impl Display for DivisorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DivisorError::ZeroBaudRate => f.write_str("baud rate must be non-zero"),
            DivisorError::ZeroClock => f.write_str("input clock must be non-zero"),
            DivisorError::OutOfRange { divisor } => {
                write!(f, "divisor {} does not fit in 1..=65535", divisor)
            }
        }
    }
}

/// Data-path outcomes other than success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// The device is not ready and the call was non-blocking.
    WouldBlock,
    /// The poll deadline expired before the device became ready.
    TimedOut,
}

impl MessageError for IoError {}

impl Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IoError::WouldBlock => f.write_str("operation would block"),
            IoError::TimedOut => f.write_str("device did not become ready before the deadline"),
        }
    }
}
