//! Register file abstraction over the eight byte-wide UART offsets.

use mmio::{IoRange, IoRangeValidationType, MmioError, Register};

/// A logical register of the 16550 register file.
///
/// [RegisterOffset::DivisorLow] and [RegisterOffset::DivisorHigh] alias offsets 0 and 1
/// and are only meaningful while the divisor latch is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterOffset {
    /// RBR(R) & THR(W)
    Data,
    /// IER(RW)
    InterruptEnable,
    /// IIR(R) & FCR(W)
    InterruptIdFifoControl,
    /// LCR(RW)
    LineControl,
    /// MCR(RW)
    ModemControl,
    /// LSR(R)
    LineStatus,
    /// MSR(R)
    ModemStatus,
    /// SCR(RW)
    Scratch,
    /// DLL(RW), DLAB=1
    DivisorLow,
    /// DLH(RW), DLAB=1
    DivisorHigh,
}

impl RegisterOffset {
    /// Byte offset from the device base address.
    pub const fn offset(self) -> usize {
        match self {
            RegisterOffset::Data | RegisterOffset::DivisorLow => 0,
            RegisterOffset::InterruptEnable | RegisterOffset::DivisorHigh => 1,
            RegisterOffset::InterruptIdFifoControl => 2,
            RegisterOffset::LineControl => 3,
            RegisterOffset::ModemControl => 4,
            RegisterOffset::LineStatus => 5,
            RegisterOffset::ModemStatus => 6,
            RegisterOffset::Scratch => 7,
        }
    }

    pub const fn is_divisor_latch(self) -> bool {
        matches!(self, RegisterOffset::DivisorLow | RegisterOffset::DivisorHigh)
    }
}

/// Ordered, side-effecting byte access to one UART's registers.
///
/// Implementations must perform every call as exactly one device access, in program
/// order. Reads may be destructive (reading [RegisterOffset::Data] consumes a received
/// byte) and must never be cached.
pub trait RegisterFile: Send {
    fn read(&self, reg: RegisterOffset) -> u8;
    fn write(&self, reg: RegisterOffset, value: u8);
    /// Base address identifying the device; at most one owner may exist per base.
    fn base(&self) -> usize;
}

#[repr(C)]
pub struct Uart16550Registers {
    /// RBR(R) & THR(W) & DLL :0x00
    buffer: Register<u8>,
    /// IER(RW) & DLH         :0x01
    intr_en: Register<u8>,
    /// IIR(R) & FCR(W)       :0x02
    iid_fifo: Register<u8>,
    /// LCR(RW)               :0x03
    line_ctl: Register<u8>,
    /// MCR(RW)               :0x04
    modem_ctl: Register<u8>,
    /// LSR(R)                :0x05
    line_stat: Register<u8>,
    /// MSR(R)                :0x06
    modem_stat: Register<u8>,
    /// SCR(RW)               :0x07
    scratch: Register<u8>,
}

impl Uart16550Registers {
    fn get(&self, reg: RegisterOffset) -> &Register<u8> {
        match reg.offset() {
            0 => &self.buffer,
            1 => &self.intr_en,
            2 => &self.iid_fifo,
            3 => &self.line_ctl,
            4 => &self.modem_ctl,
            5 => &self.line_stat,
            6 => &self.modem_stat,
            _ => &self.scratch,
        }
    }
}

/// Register file backed by real device memory.
pub struct MmioRegisterFile {
    mmio: &'static Uart16550Registers,
}

// The window is exclusively owned by this value; `DeviceHandle` serializes access.
unsafe impl Send for MmioRegisterFile {}

impl MmioRegisterFile {
    /// Map the register block over `range`.
    ///
    /// # Safety
    ///
    /// `range` must be a mapped 16550 register window that stays valid for the rest of
    /// the program, and no other live `MmioRegisterFile` may cover the same base.
    pub unsafe fn new(range: IoRange) -> Result<MmioRegisterFile, MmioError> {
        let base = range.base_for::<Uart16550Registers>(IoRangeValidationType::Compatible)?;
        Ok(MmioRegisterFile {
            mmio: unsafe { &*(base as *const Uart16550Registers) },
        })
    }
}

impl RegisterFile for MmioRegisterFile {
    #[inline]
    fn read(&self, reg: RegisterOffset) -> u8 {
        self.mmio.get(reg).read()
    }

    #[inline]
    fn write(&self, reg: RegisterOffset, value: u8) {
        self.mmio.get(reg).write(value)
    }

    fn base(&self) -> usize {
        self.mmio as *const Uart16550Registers as usize
    }
}
