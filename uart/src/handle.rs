//! Single-owner, lock-protected access to one UART.
//!
//! Responsibilities:
//! - Guarantee at most one [DeviceHandle] per base address. Claimed bases live in
//!   [CLAIMED] until the owning handle is dropped.
//! - Give each device one mutual-exclusion domain. Every operation takes the lock for
//!   exactly one register sequence, so a data-path access can never interleave with a
//!   half-finished divisor-latch sequence.
//!
//! Logging happens outside the lock: a [crate::logging::UartLogger] may print through
//! the same handle.

use alloc::collections::BTreeSet;
use core::fmt::Arguments;

use log::{debug, info};
use spin::{
    RwLock,
    mutex::{Mutex, MutexGuard},
    relax::{RelaxStrategy, Spin},
};

use crate::{
    config::{BaudDivisor, UartConfig},
    driver::{Deadline, Uart16550},
    error::{ClaimError, IoError},
    flags::{InterruptId, LineStatus},
    regs::RegisterFile,
};

/// Base addresses currently owned by a live handle.
static CLAIMED: RwLock<BTreeSet<usize>> = RwLock::new(BTreeSet::new());

/// Exclusive owner of one UART.
pub struct DeviceHandle<R: RegisterFile, S: RelaxStrategy = Spin> {
    base: usize,
    uart: Mutex<Uart16550<R, S>, S>,
}

impl<R: RegisterFile, S: RelaxStrategy> DeviceHandle<R, S> {
    /// Take ownership of the device behind `regs`.
    ///
    /// Fails if another live handle already covers the same base address.
    pub fn claim(regs: R) -> Result<DeviceHandle<R, S>, ClaimError> {
        let base = regs.base();
        if !CLAIMED.write().insert(base) {
            return Err(ClaimError::AddressInUse { base });
        }
        debug_ex!("uart16550: claimed device at {:#x}", base);
        Ok(DeviceHandle {
            base,
            uart: Mutex::new(Uart16550::new(regs)),
        })
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Whether some live handle owns `base`.
    pub fn is_claimed(base: usize) -> bool {
        CLAIMED.read().contains(&base)
    }

    /// Hold the device for a caller-defined multi-step sequence.
    ///
    /// Do not log through a logger targeting this device while the guard is alive.
    pub fn lock(&self) -> MutexGuard<'_, Uart16550<R, S>> {
        self.uart.lock()
    }

    pub fn configure(&self, config: &UartConfig) {
        self.uart.lock().configure(config);
        info!(
            "uart16550 {:#x}: configured (divisor {}, {:?}, fifo {:?}, ier {:#04x})",
            self.base,
            config.divisor.value(),
            config.line,
            config.fifo.trigger,
            config.interrupts.bits()
        );
    }

    pub fn set_baud_divisor(&self, divisor: BaudDivisor) {
        self.uart.lock().set_baud_divisor(divisor);
        debug!("uart16550 {:#x}: divisor set to {}", self.base, divisor.value());
    }

    pub fn send_byte(&self, byte: u8) {
        self.uart.lock().send_byte(byte)
    }

    pub fn try_send_byte(&self, byte: u8) -> Result<(), IoError> {
        self.uart.lock().try_send_byte(byte)
    }

    pub fn send_byte_until<D: Deadline>(&self, byte: u8, deadline: D) -> Result<(), IoError> {
        self.uart.lock().send_byte_until(byte, deadline)
    }

    /// Send a whole buffer under one lock acquisition.
    pub fn write_bytes(&self, bytes: &[u8]) {
        self.uart.lock().send_bytes(bytes)
    }

    /// Format and send under one lock acquisition.
    pub fn print(&self, args: Arguments) {
        use core::fmt::Write;
        // Writing to the UART itself never fails.
        let _ = self.uart.lock().write_fmt(args);
    }

    pub fn try_receive_byte(&self) -> Option<u8> {
        self.uart.lock().try_receive_byte()
    }

    pub fn receive_byte(&self) -> u8 {
        self.uart.lock().receive_byte()
    }

    pub fn receive_byte_until<D: Deadline>(&self, deadline: D) -> Result<u8, IoError> {
        self.uart.lock().receive_byte_until(deadline)
    }

    pub fn line_status(&self) -> LineStatus {
        self.uart.lock().line_status()
    }

    pub fn interrupt_id(&self) -> Option<InterruptId> {
        self.uart.lock().interrupt_id()
    }

    pub fn flush(&self) {
        self.uart.lock().flush()
    }
}

impl<R: RegisterFile, S: RelaxStrategy> Drop for DeviceHandle<R, S> {
    fn drop(&mut self) {
        CLAIMED.write().remove(&self.base);
        debug_ex!("uart16550: released device at {:#x}", self.base);
    }
}
