//! Line, FIFO and baud-rate configuration values.
//!
//! Every type here is a plain value; nothing touches hardware until it is handed to
//! [crate::Uart16550::configure] or one of the individual setters.

use num_enum::TryFromPrimitive;

use crate::{
    error::DivisorError,
    flags::{FifoControl, InterruptEnable, LineControlBits, ModemControl},
};

/// Base address of the first UART on the QEMU `virt` RISC-V machine.
pub const QEMU_VIRT_UART_BASE: usize = 0x1000_0000;
/// Input clock of the QEMU `virt` ns16550a.
pub const QEMU_VIRT_CLOCK_HZ: u32 = 3_686_400;
/// Reference 16550 crystal frequency.
pub const CLK_FREQUENCY_HZ: u32 = 1_843_200;
/// Size of the register window.
pub const REGISTER_WINDOW_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum WordLength {
    Five = 0b00,
    Six = 0b01,
    Seven = 0b10,
    Eight = 0b11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    /// Two stop bits, or 1.5 with five-bit words.
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
    /// Parity bit always 1.
    Mark,
    /// Parity bit always 0.
    Space,
}

/// Frame format written to LCR.
///
/// The divisor-latch bit is not part of this value: it is owned by the driver and
/// reported as [crate::AccessMode].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineControlConfig {
    pub word_length: WordLength,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

impl Default for LineControlConfig {
    /// 8N1
    fn default() -> Self {
        LineControlConfig {
            word_length: WordLength::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }
}

impl LineControlConfig {
    pub fn bits(&self) -> LineControlBits {
        let mut bits = LineControlBits::from_bits_truncate(self.word_length as u8);
        if self.stop_bits == StopBits::Two {
            bits |= LineControlBits::STOP_BITS;
        }
        bits |= match self.parity {
            Parity::None => LineControlBits::empty(),
            Parity::Odd => LineControlBits::PARITY_ENABLE,
            Parity::Even => LineControlBits::PARITY_ENABLE | LineControlBits::EVEN_PARITY,
            Parity::Mark => LineControlBits::PARITY_ENABLE | LineControlBits::STICK_PARITY,
            Parity::Space => {
                LineControlBits::PARITY_ENABLE
                    | LineControlBits::EVEN_PARITY
                    | LineControlBits::STICK_PARITY
            }
        };
        bits
    }

    /// Decode an LCR readback. DLAB and BREAK are ignored.
    pub fn from_lcr(lcr: u8) -> LineControlConfig {
        let bits = LineControlBits::from_bits_truncate(lcr);
        // All four encodings are valid, the fallback is unreachable.
        let word_length = WordLength::try_from(lcr & LineControlBits::WORD_LENGTH_MASK.bits())
            .unwrap_or(WordLength::Eight);
        let stop_bits = if bits.contains(LineControlBits::STOP_BITS) {
            StopBits::Two
        } else {
            StopBits::One
        };
        let parity = if !bits.contains(LineControlBits::PARITY_ENABLE) {
            Parity::None
        } else {
            match (
                bits.contains(LineControlBits::EVEN_PARITY),
                bits.contains(LineControlBits::STICK_PARITY),
            ) {
                (false, false) => Parity::Odd,
                (true, false) => Parity::Even,
                (false, true) => Parity::Mark,
                (true, true) => Parity::Space,
            }
        };
        LineControlConfig {
            word_length,
            stop_bits,
            parity,
        }
    }
}

/// Receive FIFO fill level at which the device signals receive readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum TriggerLevel {
    One = 0b0000_0000,
    Four = 0b0100_0000,
    Eight = 0b1000_0000,
    Fourteen = 0b1100_0000,
}

/// FCR programming. `clear_rx` and `clear_tx` are one-shot pulses the hardware clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoConfig {
    pub enabled: bool,
    pub clear_rx: bool,
    pub clear_tx: bool,
    pub trigger: TriggerLevel,
}

impl Default for FifoConfig {
    fn default() -> Self {
        FifoConfig {
            enabled: true,
            clear_rx: true,
            clear_tx: true,
            trigger: TriggerLevel::Fourteen,
        }
    }
}

impl FifoConfig {
    /// 16450-compatible operation: no FIFOs.
    pub const fn disabled() -> FifoConfig {
        FifoConfig {
            enabled: false,
            clear_rx: false,
            clear_tx: false,
            trigger: TriggerLevel::One,
        }
    }

    pub fn bits(&self) -> FifoControl {
        if !self.enabled {
            return FifoControl::empty();
        }
        let mut bits = FifoControl::ENABLE | FifoControl::from_bits_truncate(self.trigger as u8);
        if self.clear_rx {
            bits |= FifoControl::CLEAR_RX;
        }
        if self.clear_tx {
            bits |= FifoControl::CLEAR_TX;
        }
        bits
    }
}

/// 16-bit baud-rate divisor: `baud = clock / (16 * divisor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BaudDivisor(u16);

impl BaudDivisor {
    pub const fn new(value: u16) -> BaudDivisor {
        BaudDivisor(value)
    }

    pub const fn from_bytes(high: u8, low: u8) -> BaudDivisor {
        BaudDivisor(((high as u16) << 8) | low as u16)
    }

    /// Nearest divisor producing `baud` from an input clock of `clock_hz`.
    pub fn from_baud(clock_hz: u32, baud: u32) -> Result<BaudDivisor, DivisorError> {
        if clock_hz == 0 {
            return Err(DivisorError::ZeroClock);
        }
        if baud == 0 {
            return Err(DivisorError::ZeroBaudRate);
        }
        let denom = 16 * baud as u64;
        let divisor = (clock_hz as u64 + denom / 2) / denom;
        if divisor == 0 || divisor > u16::MAX as u64 {
            return Err(DivisorError::OutOfRange {
                divisor: divisor.min(u32::MAX as u64) as u32,
            });
        }
        Ok(BaudDivisor(divisor as u16))
    }

    /// Baud rate this divisor yields at `clock_hz`, or `None` for a zero divisor.
    pub fn baud_rate(self, clock_hz: u32) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        Some(clock_hz / (16 * self.0 as u32))
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    /// DLH byte.
    pub const fn high(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// DLL byte.
    pub const fn low(self) -> u8 {
        self.0 as u8
    }
}

/// Complete one-shot device configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    pub line: LineControlConfig,
    pub divisor: BaudDivisor,
    pub fifo: FifoConfig,
    /// IER value; empty means polling mode.
    pub interrupts: InterruptEnable,
    /// MCR value, left untouched when `None`.
    pub modem: Option<ModemControl>,
}

impl Default for UartConfig {
    /// 8N1 at 38400 baud (1.8432 MHz clock), 14-byte FIFO trigger, interrupts off.
    fn default() -> Self {
        UartConfig {
            line: LineControlConfig::default(),
            divisor: BaudDivisor::new(3),
            fifo: FifoConfig::default(),
            interrupts: InterruptEnable::empty(),
            modem: None,
        }
    }
}

impl UartConfig {
    pub fn with_divisor(mut self, divisor: BaudDivisor) -> Self {
        self.divisor = divisor;
        self
    }

    pub fn with_baud(self, clock_hz: u32, baud: u32) -> Result<Self, DivisorError> {
        Ok(self.with_divisor(BaudDivisor::from_baud(clock_hz, baud)?))
    }

    pub fn with_line(mut self, line: LineControlConfig) -> Self {
        self.line = line;
        self
    }

    pub fn with_fifo(mut self, fifo: FifoConfig) -> Self {
        self.fifo = fifo;
        self
    }

    pub fn with_interrupts(mut self, interrupts: InterruptEnable) -> Self {
        self.interrupts = interrupts;
        self
    }

    pub fn with_modem(mut self, modem: ModemControl) -> Self {
        self.modem = Some(modem);
        self
    }
}
