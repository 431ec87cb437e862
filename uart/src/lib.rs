//! Driver for 16450/16550-class UARTs behind a memory-mapped register window.
//!
//! The crate is split in two layers:
//! - [regs]: the [RegisterFile] capability. [MmioRegisterFile] is the only place that
//!   touches hardware memory; everything above it also runs against [sim::SimRegisterFile].
//! - [driver]: divisor-latch sequencing, FIFO/line/interrupt configuration and the
//!   polled transmit/receive primitives.
//!
//! [DeviceHandle] owns exactly one driver per base address and serializes every
//! register sequence issued through it.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod logging;
#[macro_use]
pub mod console;
pub mod config;
pub mod driver;
pub mod error;
pub mod flags;
pub mod handle;
pub mod regs;
pub mod serial;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use config::{
    BaudDivisor, FifoConfig, LineControlConfig, Parity, StopBits, TriggerLevel, UartConfig,
    WordLength,
};
pub use driver::{AccessMode, Deadline, PollBudget, Uart16550};
pub use error::{ClaimError, DivisorError, IoError, MessageError};
pub use flags::{InterruptEnable, InterruptId, LineStatus, ModemControl, ModemStatus};
pub use handle::DeviceHandle;
pub use regs::{MmioRegisterFile, RegisterFile, RegisterOffset};
pub use serial::Uart;
