//! Bit layouts of the 16550 registers.

use bitflags::bitflags;
use num_enum::TryFromPrimitive;

bitflags! {
    /// IER(RW), offset 1 while DLAB=0.
    pub struct InterruptEnable: u8 {
        /// Received data available.
        const RX_AVAILABLE  = 1 << 0;
        /// Transmitter holding register empty.
        const TX_EMPTY      = 1 << 1;
        /// Receiver line status change.
        const LINE_STATUS   = 1 << 2;
        /// Modem status change.
        const MODEM_STATUS  = 1 << 3;
    }
}

bitflags! {
    /// FCR(W), offset 2.
    pub struct FifoControl: u8 {
        const ENABLE        = 1 << 0;
        /// Self-clearing: flush the receive FIFO.
        const CLEAR_RX      = 1 << 1;
        /// Self-clearing: flush the transmit FIFO.
        const CLEAR_TX      = 1 << 2;
        const DMA_MODE      = 1 << 3;
        const TRIGGER_LO    = 1 << 6;
        const TRIGGER_HI    = 1 << 7;
        /// Receive trigger level selector, bits 6-7.
        const TRIGGER_MASK  = Self::TRIGGER_LO.bits | Self::TRIGGER_HI.bits;
    }
}

bitflags! {
    /// LCR(RW), offset 3.
    pub struct LineControlBits: u8 {
        const WORD_LENGTH_LO    = 1 << 0;
        const WORD_LENGTH_HI    = 1 << 1;
        /// Word length selector, bits 0-1; `0b11` is 8 bits.
        const WORD_LENGTH_MASK  = Self::WORD_LENGTH_LO.bits | Self::WORD_LENGTH_HI.bits;
        /// Two stop bits (1.5 for 5-bit words).
        const STOP_BITS         = 1 << 2;
        const PARITY_ENABLE     = 1 << 3;
        const EVEN_PARITY       = 1 << 4;
        const STICK_PARITY      = 1 << 5;
        const BREAK             = 1 << 6;
        /// Divisor latch access: offsets 0 and 1 become DLL and DLH.
        const DLAB              = 1 << 7;
    }
}

bitflags! {
    /// LSR(R), offset 5.
    pub struct LineStatus: u8 {
        /// At least one received byte is waiting.
        const DATA_READY        = 1 << 0;
        const OVERRUN_ERROR     = 1 << 1;
        const PARITY_ERROR      = 1 << 2;
        const FRAMING_ERROR     = 1 << 3;
        const BREAK_INTERRUPT   = 1 << 4;
        /// Transmit holding register (or FIFO) is empty.
        const TX_EMPTY          = 1 << 5;
        /// Holding and shift registers are both empty.
        const TRANSMITTER_IDLE  = 1 << 6;
        /// At least one parity, framing or break condition is inside the FIFO.
        const FIFO_ERROR        = 1 << 7;

        const ERRORS = Self::OVERRUN_ERROR.bits
            | Self::PARITY_ERROR.bits
            | Self::FRAMING_ERROR.bits
            | Self::BREAK_INTERRUPT.bits
            | Self::FIFO_ERROR.bits;
    }
}

impl LineStatus {
    pub fn data_ready(self) -> bool {
        self.contains(LineStatus::DATA_READY)
    }

    pub fn tx_empty(self) -> bool {
        self.contains(LineStatus::TX_EMPTY)
    }

    /// Error conditions reported alongside the data path.
    pub fn errors(self) -> LineStatus {
        self & LineStatus::ERRORS
    }
}

bitflags! {
    /// MCR(RW), offset 4.
    pub struct ModemControl: u8 {
        const DTR       = 1 << 0;
        const RTS       = 1 << 1;
        const OUT1      = 1 << 2;
        /// Gates the interrupt line on PC-compatible boards.
        const OUT2      = 1 << 3;
        const LOOPBACK  = 1 << 4;
    }
}

bitflags! {
    /// MSR(R), offset 6.
    pub struct ModemStatus: u8 {
        const DELTA_CTS     = 1 << 0;
        const DELTA_DSR     = 1 << 1;
        const TRAILING_RI   = 1 << 2;
        const DELTA_DCD     = 1 << 3;
        const CTS           = 1 << 4;
        const DSR           = 1 << 5;
        const RI            = 1 << 6;
        const DCD           = 1 << 7;
    }
}

/// Pending interrupt source reported by IIR bits 0-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum InterruptId {
    ModemStatus = 0b0000,
    TxEmpty = 0b0010,
    RxAvailable = 0b0100,
    LineStatus = 0b0110,
    CharacterTimeout = 0b1100,
}

/// IIR bits 6-7 read `0b11` when the FIFOs are enabled.
pub const IIR_FIFO_ENABLED: u8 = 0b1100_0000;

impl InterruptId {
    /// Decode the identification bits of an IIR value.
    ///
    /// Returns `None` when bit 0 reports no pending interrupt, and for reserved encodings.
    pub fn decode(iir: u8) -> Option<InterruptId> {
        if iir & 0b0001 != 0 {
            return None;
        }
        InterruptId::try_from(iir & 0b1111).ok()
    }
}
