//! Software model of the 16550 register file.
//!
//! Offsets 0 and 1 alias DLL/DLH exactly when the simulated LCR has DLAB set, the same
//! way the silicon decodes them. Every access is appended to an event log tagged with
//! the [AccessMode] in force at the time, so tests can check sequencing after the fact.
//!
//! Clones share state: hand one clone to the driver and keep another as the harness.

use alloc::{collections::VecDeque, sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use crate::{
    config::BaudDivisor,
    driver::AccessMode,
    flags::{FifoControl, IIR_FIFO_ENABLED, LineControlBits, LineStatus},
    regs::{RegisterFile, RegisterOffset},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// One register access as seen by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimEvent {
    pub access: Access,
    /// Register the caller asked for.
    pub reg: RegisterOffset,
    pub value: u8,
    /// Decode of offsets 0/1 at access time, from the simulated LCR.
    pub mode: AccessMode,
}

#[derive(Debug)]
struct SimState {
    dll: u8,
    dlh: u8,
    ier: u8,
    iir: u8,
    fcr: u8,
    fcr_writes: Vec<u8>,
    lcr: u8,
    mcr: u8,
    msr: u8,
    scratch: u8,
    thr: u8,
    tx_empty: bool,
    line_errors: LineStatus,
    rx: VecDeque<u8>,
    transmitted: Vec<u8>,
    events: Vec<SimEvent>,
}

impl SimState {
    fn mode(&self) -> AccessMode {
        AccessMode::from_lcr(self.lcr)
    }

    fn dlab(&self) -> bool {
        self.mode() == AccessMode::DivisorAccess
    }

    fn lsr(&self) -> u8 {
        let mut lsr = self.line_errors;
        if !self.rx.is_empty() {
            lsr |= LineStatus::DATA_READY;
        }
        if self.tx_empty {
            lsr |= LineStatus::TX_EMPTY | LineStatus::TRANSMITTER_IDLE;
        }
        lsr.bits()
    }

    fn read(&mut self, reg: RegisterOffset) -> u8 {
        let dlab = self.dlab();
        match reg.offset() {
            0 if dlab => self.dll,
            0 => self.rx.pop_front().unwrap_or(0),
            1 if dlab => self.dlh,
            1 => self.ier,
            2 => {
                if self.fcr & FifoControl::ENABLE.bits() != 0 {
                    self.iir | IIR_FIFO_ENABLED
                } else {
                    self.iir
                }
            }
            3 => self.lcr,
            4 => self.mcr,
            5 => {
                let lsr = self.lsr();
                self.line_errors = LineStatus::empty();
                lsr
            }
            6 => self.msr,
            _ => self.scratch,
        }
    }

    fn write(&mut self, reg: RegisterOffset, value: u8) {
        let dlab = self.dlab();
        match reg.offset() {
            0 if dlab => self.dll = value,
            0 => {
                self.thr = value;
                self.transmitted.push(value);
            }
            1 if dlab => self.dlh = value,
            1 => self.ier = value & 0x0F,
            2 => {
                let fcr = FifoControl::from_bits_truncate(value);
                self.fcr_writes.push(value);
                if fcr.contains(FifoControl::CLEAR_RX) {
                    self.rx.clear();
                }
                self.fcr = (fcr - FifoControl::CLEAR_RX - FifoControl::CLEAR_TX).bits();
            }
            3 => self.lcr = value,
            4 => self.mcr = value & 0x1F,
            // LSR and MSR are read-only on this model.
            5 | 6 => {}
            _ => self.scratch = value,
        }
    }
}

/// Fake bases are handed out downwards from the last 256-byte slot of the address
/// space, where no device window can be mapped, so they never collide with a real
/// [crate::MmioRegisterFile] in the claim registry.
const SIM_BASE_TOP: usize = usize::MAX & !0xFF;

static NEXT_BASE: AtomicUsize = AtomicUsize::new(SIM_BASE_TOP);

/// A [RegisterFile] backed by memory instead of a device.
#[derive(Clone)]
pub struct SimRegisterFile {
    base: usize,
    state: Arc<Mutex<SimState>>,
}

impl Default for SimRegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRegisterFile {
    /// A powered-up device with an idle transmitter and no received data.
    ///
    /// Each instance gets a distinct fake base address.
    pub fn new() -> SimRegisterFile {
        let base = NEXT_BASE.fetch_sub(0x100, Ordering::Relaxed);
        SimRegisterFile {
            base,
            state: Arc::new(Mutex::new(SimState {
                dll: 0,
                dlh: 0,
                ier: 0,
                iir: 0x01,
                fcr: 0,
                fcr_writes: Vec::new(),
                lcr: 0,
                mcr: 0,
                msr: 0,
                scratch: 0,
                thr: 0,
                tx_empty: true,
                line_errors: LineStatus::empty(),
                rx: VecDeque::new(),
                transmitted: Vec::new(),
                events: Vec::new(),
            })),
        }
    }

    /// Queue bytes as if they arrived on the line; LSR data-ready follows the queue.
    pub fn inject_rx(&self, bytes: &[u8]) {
        self.state.lock().rx.extend(bytes.iter().copied());
    }

    pub fn set_tx_empty(&self, empty: bool) {
        self.state.lock().tx_empty = empty;
    }

    /// Latch LSR error bits until the next LSR read.
    pub fn inject_line_errors(&self, errors: LineStatus) {
        self.state.lock().line_errors |= errors.errors();
    }

    /// IIR identification bits; the FIFO-enabled bits are added from FCR state.
    pub fn set_iir(&self, iir: u8) {
        self.state.lock().iir = iir & 0x0F;
    }

    pub fn set_msr(&self, msr: u8) {
        self.state.lock().msr = msr;
    }

    pub fn lcr(&self) -> u8 {
        self.state.lock().lcr
    }

    /// Persistent FCR bits; clear pulses never stick.
    pub fn fcr(&self) -> u8 {
        self.state.lock().fcr
    }

    /// Every raw value written to FCR, in order.
    pub fn fcr_writes(&self) -> Vec<u8> {
        self.state.lock().fcr_writes.clone()
    }

    pub fn ier(&self) -> u8 {
        self.state.lock().ier
    }

    /// Last byte written to THR.
    pub fn thr(&self) -> u8 {
        self.state.lock().thr
    }

    pub fn divisor(&self) -> BaudDivisor {
        let state = self.state.lock();
        BaudDivisor::from_bytes(state.dlh, state.dll)
    }

    pub fn mode(&self) -> AccessMode {
        self.state.lock().mode()
    }

    /// All bytes written to THR since creation.
    pub fn transmitted(&self) -> Vec<u8> {
        self.state.lock().transmitted.clone()
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.state.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }
}

impl RegisterFile for SimRegisterFile {
    fn read(&self, reg: RegisterOffset) -> u8 {
        let mut state = self.state.lock();
        let mode = state.mode();
        let value = state.read(reg);
        state.events.push(SimEvent {
            access: Access::Read,
            reg,
            value,
            mode,
        });
        value
    }

    fn write(&self, reg: RegisterOffset, value: u8) {
        let mut state = self.state.lock();
        let mode = state.mode();
        state.write(reg, value);
        state.events.push(SimEvent {
            access: Access::Write,
            reg,
            value,
            mode,
        });
    }

    fn base(&self) -> usize {
        self.base
    }
}
