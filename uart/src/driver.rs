//! 16550 protocol logic on top of a [RegisterFile].
//!
//! Access mode discipline:
//! - In [AccessMode::Normal] offsets 0/1 are RBR/THR and IER.
//! - In [AccessMode::DivisorAccess] they are DLL and DLH.
//!
//! The only way into [AccessMode::DivisorAccess] is the private [DivisorLatch] guard.
//! It is created only inside `&mut self` methods and dropped before they return, so no
//! data-path or IER access can be issued while the latch is open, and dropping it
//! restores [AccessMode::Normal].
//!
//! Busy-poll loops call `S::relax()` once per iteration; pick a [RelaxStrategy] that
//! yields when the caller runs under a cooperative scheduler.

use core::marker::PhantomData;

use spin::relax::{RelaxStrategy, Spin};

use crate::{
    config::{BaudDivisor, FifoConfig, LineControlConfig, UartConfig},
    error::IoError,
    flags::{
        IIR_FIFO_ENABLED, InterruptEnable, InterruptId, LineControlBits, LineStatus, ModemControl,
        ModemStatus,
    },
    regs::{RegisterFile, RegisterOffset},
};

/// Meaning of offsets 0 and 1, selected by LCR bit 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Normal,
    DivisorAccess,
}

impl AccessMode {
    pub fn from_lcr(lcr: u8) -> AccessMode {
        if lcr & LineControlBits::DLAB.bits() != 0 {
            AccessMode::DivisorAccess
        } else {
            AccessMode::Normal
        }
    }
}

/// Stop condition for a bounded poll loop.
pub trait Deadline {
    /// Checked once per poll iteration, after the device was found not ready.
    fn expired(&mut self) -> bool;
}

impl<F: FnMut() -> bool> Deadline for F {
    fn expired(&mut self) -> bool {
        self()
    }
}

/// Deadline measured in poll iterations.
#[derive(Debug, Clone, Copy)]
pub struct PollBudget {
    remaining: usize,
}

impl PollBudget {
    pub const fn new(polls: usize) -> PollBudget {
        PollBudget { remaining: polls }
    }
}

impl Deadline for PollBudget {
    fn expired(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        self.remaining -= 1;
        false
    }
}

/// Scoped divisor-latch access.
///
/// Opening sets DLAB, dropping clears it again; both are read-modify-writes of LCR so
/// the frame format bits survive.
struct DivisorLatch<'a, R: RegisterFile> {
    regs: &'a R,
}

impl<'a, R: RegisterFile> DivisorLatch<'a, R> {
    fn open(regs: &'a R) -> DivisorLatch<'a, R> {
        let lcr = regs.read(RegisterOffset::LineControl);
        regs.write(
            RegisterOffset::LineControl,
            lcr | LineControlBits::DLAB.bits(),
        );
        DivisorLatch { regs }
    }

    /// Open the latch while programming a new frame format in the same LCR write.
    fn open_with(regs: &'a R, line: LineControlConfig) -> DivisorLatch<'a, R> {
        regs.write(
            RegisterOffset::LineControl,
            (line.bits() | LineControlBits::DLAB).bits(),
        );
        DivisorLatch { regs }
    }

    /// Writing DLL applies the divisor immediately, so DLH goes first.
    fn write(&mut self, divisor: BaudDivisor) {
        self.regs.write(RegisterOffset::DivisorHigh, divisor.high());
        self.regs.write(RegisterOffset::DivisorLow, divisor.low());
    }

    fn read(&self) -> BaudDivisor {
        let high = self.regs.read(RegisterOffset::DivisorHigh);
        let low = self.regs.read(RegisterOffset::DivisorLow);
        BaudDivisor::from_bytes(high, low)
    }
}

impl<R: RegisterFile> Drop for DivisorLatch<'_, R> {
    fn drop(&mut self) {
        let lcr = self.regs.read(RegisterOffset::LineControl);
        self.regs.write(
            RegisterOffset::LineControl,
            lcr & !LineControlBits::DLAB.bits(),
        );
    }
}

/// A 16550 UART driven through a [RegisterFile].
///
/// Every method issues its register accesses in a fixed order and returns with the
/// device in [AccessMode::Normal]. Share it between threads through
/// [crate::DeviceHandle], which serializes whole sequences.
pub struct Uart16550<R: RegisterFile, S: RelaxStrategy = Spin> {
    regs: R,
    _relax: PhantomData<fn() -> S>,
}

impl<R: RegisterFile, S: RelaxStrategy> Uart16550<R, S> {
    /// Wrap a register file without touching the device.
    pub fn new(regs: R) -> Uart16550<R, S> {
        Uart16550 {
            regs,
            _relax: PhantomData,
        }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn into_registers(self) -> R {
        self.regs
    }

    /// Program the device from scratch.
    ///
    /// Order: LCR (frame format + DLAB), DLH, DLL, LCR (DLAB cleared), FCR, MCR if
    /// requested, IER.
    pub fn configure(&mut self, config: &UartConfig) {
        {
            let mut latch = DivisorLatch::open_with(&self.regs, config.line);
            latch.write(config.divisor);
        }
        self.set_fifo(config.fifo);
        if let Some(modem) = config.modem {
            self.set_modem_control(modem);
        }
        self.set_interrupts(config.interrupts);
    }

    /// Change the baud rate, leaving frame format and IER untouched.
    pub fn set_baud_divisor(&mut self, divisor: BaudDivisor) {
        let mut latch = DivisorLatch::open(&self.regs);
        latch.write(divisor);
    }

    /// Read the divisor currently held in DLH:DLL.
    pub fn baud_divisor(&mut self) -> BaudDivisor {
        let latch = DivisorLatch::open(&self.regs);
        latch.read()
    }

    /// Rewrite the frame format. Any open divisor latch or break condition is cleared.
    pub fn set_line_control(&mut self, line: LineControlConfig) {
        self.regs
            .write(RegisterOffset::LineControl, line.bits().bits());
    }

    pub fn line_control(&self) -> LineControlConfig {
        LineControlConfig::from_lcr(self.regs.read(RegisterOffset::LineControl))
    }

    pub fn access_mode(&self) -> AccessMode {
        AccessMode::from_lcr(self.regs.read(RegisterOffset::LineControl))
    }

    /// Hold the line in the spacing state (`true`) or release it.
    pub fn set_break(&mut self, enabled: bool) {
        let lcr = self.regs.read(RegisterOffset::LineControl);
        let lcr = if enabled {
            lcr | LineControlBits::BREAK.bits()
        } else {
            lcr & !LineControlBits::BREAK.bits()
        };
        self.regs.write(RegisterOffset::LineControl, lcr);
    }

    pub fn set_fifo(&mut self, fifo: FifoConfig) {
        self.regs
            .write(RegisterOffset::InterruptIdFifoControl, fifo.bits().bits());
    }

    /// Whether IIR reports enabled FIFOs.
    pub fn fifos_enabled(&self) -> bool {
        self.regs.read(RegisterOffset::InterruptIdFifoControl) & IIR_FIFO_ENABLED
            == IIR_FIFO_ENABLED
    }

    pub fn set_interrupts(&mut self, interrupts: InterruptEnable) {
        self.regs
            .write(RegisterOffset::InterruptEnable, interrupts.bits());
    }

    pub fn interrupts(&self) -> InterruptEnable {
        InterruptEnable::from_bits_truncate(self.regs.read(RegisterOffset::InterruptEnable))
    }

    /// Read IIR. Reading may acknowledge a pending TX-empty interrupt.
    pub fn interrupt_id(&self) -> Option<InterruptId> {
        InterruptId::decode(self.regs.read(RegisterOffset::InterruptIdFifoControl))
    }

    pub fn set_modem_control(&mut self, modem: ModemControl) {
        self.regs.write(RegisterOffset::ModemControl, modem.bits());
    }

    pub fn modem_control(&self) -> ModemControl {
        ModemControl::from_bits_truncate(self.regs.read(RegisterOffset::ModemControl))
    }

    /// Read MSR. The delta bits clear on read.
    pub fn modem_status(&self) -> ModemStatus {
        ModemStatus::from_bits_truncate(self.regs.read(RegisterOffset::ModemStatus))
    }

    /// Sample LSR. Error bits clear on read, so every call is a fresh observation.
    pub fn line_status(&self) -> LineStatus {
        LineStatus::from_bits_truncate(self.regs.read(RegisterOffset::LineStatus))
    }

    pub fn set_scratch(&mut self, value: u8) {
        self.regs.write(RegisterOffset::Scratch, value);
    }

    pub fn scratch(&self) -> u8 {
        self.regs.read(RegisterOffset::Scratch)
    }

    /// Poll LSR until `ready` holds or `deadline` expires.
    fn poll_until<D: Deadline>(
        &self,
        ready: LineStatus,
        deadline: &mut D,
    ) -> Result<(), IoError> {
        loop {
            if self.line_status().contains(ready) {
                return Ok(());
            }
            if deadline.expired() {
                return Err(IoError::TimedOut);
            }
            S::relax();
        }
    }

    /// Block until the transmit holding register is empty, then write `byte`.
    pub fn send_byte(&mut self, byte: u8) {
        while !self.line_status().tx_empty() {
            S::relax();
        }
        self.regs.write(RegisterOffset::Data, byte);
    }

    /// Write `byte` only if the transmitter can take it right now.
    pub fn try_send_byte(&mut self, byte: u8) -> Result<(), IoError> {
        if !self.line_status().tx_empty() {
            return Err(IoError::WouldBlock);
        }
        self.regs.write(RegisterOffset::Data, byte);
        Ok(())
    }

    pub fn send_byte_until<D: Deadline>(&mut self, byte: u8, mut deadline: D) -> Result<(), IoError> {
        self.poll_until(LineStatus::TX_EMPTY, &mut deadline)?;
        self.regs.write(RegisterOffset::Data, byte);
        Ok(())
    }

    pub fn send_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.send_byte(byte);
        }
    }

    /// Consume one received byte if LSR reports data ready.
    pub fn try_receive_byte(&mut self) -> Option<u8> {
        if self.line_status().data_ready() {
            Some(self.regs.read(RegisterOffset::Data))
        } else {
            None
        }
    }

    /// Block until a byte is available, then consume it.
    pub fn receive_byte(&mut self) -> u8 {
        while !self.line_status().data_ready() {
            S::relax();
        }
        self.regs.read(RegisterOffset::Data)
    }

    pub fn receive_byte_until<D: Deadline>(&mut self, mut deadline: D) -> Result<u8, IoError> {
        self.poll_until(LineStatus::DATA_READY, &mut deadline)?;
        Ok(self.regs.read(RegisterOffset::Data))
    }

    /// Block until the transmitter has shifted out every queued byte.
    pub fn flush(&mut self) {
        while !self.line_status().contains(LineStatus::TRANSMITTER_IDLE) {
            S::relax();
        }
    }
}

impl<R: RegisterFile, S: RelaxStrategy> core::fmt::Write for Uart16550<R, S> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.send_bytes(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Parity, StopBits, TriggerLevel, WordLength},
        flags::FifoControl,
        sim::{Access, SimEvent, SimRegisterFile},
    };
    use alloc::vec::Vec;
    use std::{thread, time::Duration};

    fn driver() -> (Uart16550<SimRegisterFile>, SimRegisterFile) {
        let sim = SimRegisterFile::new();
        (Uart16550::new(sim.clone()), sim)
    }

    fn writes(events: &[SimEvent]) -> Vec<(RegisterOffset, u8)> {
        events
            .iter()
            .filter(|e| e.access == Access::Write)
            .map(|e| (e.reg, e.value))
            .collect()
    }

    #[test]
    fn configure_writes_registers_in_order() {
        let (mut uart, sim) = driver();
        uart.configure(&UartConfig::default().with_divisor(BaudDivisor::new(0x0102)));
        assert_eq!(
            writes(&sim.events()),
            [
                (RegisterOffset::LineControl, 0x83),
                (RegisterOffset::DivisorHigh, 0x01),
                (RegisterOffset::DivisorLow, 0x02),
                (RegisterOffset::LineControl, 0x03),
                (RegisterOffset::InterruptIdFifoControl, 0xC7),
                (RegisterOffset::InterruptEnable, 0x00),
            ]
        );
    }

    #[test]
    fn configure_always_ends_in_normal_mode() {
        let lines = [
            LineControlConfig::default(),
            LineControlConfig {
                word_length: WordLength::Seven,
                stop_bits: StopBits::Two,
                parity: Parity::Odd,
            },
            LineControlConfig {
                word_length: WordLength::Five,
                stop_bits: StopBits::One,
                parity: Parity::Mark,
            },
        ];
        for line in lines {
            for divisor in [0u16, 1, 3, 0x00FF, 0x0100, 0x1234, 0xFFFF] {
                let (mut uart, sim) = driver();
                let config = UartConfig::default()
                    .with_line(line)
                    .with_divisor(BaudDivisor::new(divisor));
                uart.configure(&config);
                assert_eq!(sim.lcr() & LineControlBits::DLAB.bits(), 0);
                assert_eq!(uart.access_mode(), AccessMode::Normal);
                assert_eq!(uart.line_control(), line);
                assert_eq!(sim.divisor(), BaudDivisor::new(divisor));
            }
        }
    }

    #[test]
    fn divisor_high_byte_written_before_low_byte() {
        for divisor in (0..=u16::MAX).step_by(257) {
            let (mut uart, sim) = driver();
            uart.set_baud_divisor(BaudDivisor::new(divisor));
            let order: Vec<RegisterOffset> = writes(&sim.events())
                .into_iter()
                .map(|(reg, _)| reg)
                .filter(|reg| reg.is_divisor_latch())
                .collect();
            assert_eq!(order, [RegisterOffset::DivisorHigh, RegisterOffset::DivisorLow]);
        }
    }

    #[test]
    fn divisor_accesses_happen_only_with_latch_open() {
        let (mut uart, sim) = driver();
        uart.configure(&UartConfig::default());
        uart.set_baud_divisor(BaudDivisor::new(12));
        assert_eq!(uart.baud_divisor(), BaudDivisor::new(12));
        uart.send_byte(b'x');
        for event in sim.events() {
            match event.reg {
                RegisterOffset::DivisorLow | RegisterOffset::DivisorHigh => {
                    assert_eq!(event.mode, AccessMode::DivisorAccess, "{:?}", event)
                }
                RegisterOffset::Data | RegisterOffset::InterruptEnable => {
                    assert_eq!(event.mode, AccessMode::Normal, "{:?}", event)
                }
                _ => {}
            }
        }
    }

    #[test]
    fn set_baud_divisor_preserves_line_control_and_ier() {
        let (mut uart, sim) = driver();
        let line = LineControlConfig {
            word_length: WordLength::Six,
            stop_bits: StopBits::Two,
            parity: Parity::Even,
        };
        uart.configure(
            &UartConfig::default()
                .with_line(line)
                .with_interrupts(InterruptEnable::RX_AVAILABLE | InterruptEnable::LINE_STATUS),
        );
        sim.clear_events();
        uart.set_baud_divisor(BaudDivisor::new(0x0180));
        let sequence: Vec<(Access, RegisterOffset)> =
            sim.events().iter().map(|e| (e.access, e.reg)).collect();
        assert_eq!(
            sequence,
            [
                (Access::Read, RegisterOffset::LineControl),
                (Access::Write, RegisterOffset::LineControl),
                (Access::Write, RegisterOffset::DivisorHigh),
                (Access::Write, RegisterOffset::DivisorLow),
                (Access::Read, RegisterOffset::LineControl),
                (Access::Write, RegisterOffset::LineControl),
            ]
        );
        assert_eq!(uart.line_control(), line);
        assert_eq!(
            uart.interrupts(),
            InterruptEnable::RX_AVAILABLE | InterruptEnable::LINE_STATUS
        );
        assert_eq!(sim.divisor(), BaudDivisor::new(0x0180));
    }

    #[test]
    fn configure_programs_fifo_exactly_once_with_self_clearing_pulses() {
        let (mut uart, sim) = driver();
        uart.configure(&UartConfig::default());
        assert_eq!(sim.fcr_writes(), [0xC7]);
        let fcr = FifoControl::from_bits_truncate(sim.fcr());
        assert!(fcr.contains(FifoControl::ENABLE));
        assert!(!fcr.intersects(FifoControl::CLEAR_RX | FifoControl::CLEAR_TX));
        assert_eq!(fcr & FifoControl::TRIGGER_MASK, FifoControl::TRIGGER_MASK);
        assert!(uart.fifos_enabled());
    }

    #[test]
    fn fifo_clear_flushes_pending_receive_bytes() {
        let (mut uart, sim) = driver();
        sim.inject_rx(b"stale");
        uart.configure(&UartConfig::default());
        assert_eq!(uart.try_receive_byte(), None);
    }

    #[test]
    fn configure_writes_modem_control_before_interrupts() {
        let (mut uart, sim) = driver();
        uart.configure(
            &UartConfig::default()
                .with_fifo(FifoConfig {
                    trigger: TriggerLevel::Eight,
                    ..FifoConfig::default()
                })
                .with_modem(ModemControl::DTR | ModemControl::RTS | ModemControl::OUT2)
                .with_interrupts(InterruptEnable::RX_AVAILABLE),
        );
        let tail: Vec<_> = writes(&sim.events()).into_iter().skip(4).collect();
        assert_eq!(
            tail,
            [
                (RegisterOffset::InterruptIdFifoControl, 0x87),
                (RegisterOffset::ModemControl, 0x0B),
                (RegisterOffset::InterruptEnable, 0x01),
            ]
        );
        assert_eq!(
            uart.modem_control(),
            ModemControl::DTR | ModemControl::RTS | ModemControl::OUT2
        );
    }

    #[test]
    fn send_byte_waits_for_tx_empty() {
        let (mut uart, sim) = driver();
        sim.set_tx_empty(false);
        let harness = sim.clone();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            assert!(harness.transmitted().is_empty());
            harness.set_tx_empty(true);
        });
        uart.send_byte(b'x');
        releaser.join().unwrap();
        assert_eq!(sim.transmitted(), b"x");
        assert_eq!(sim.thr(), b'x');
    }

    #[test]
    fn try_send_byte_would_block_when_busy() {
        let (mut uart, sim) = driver();
        sim.set_tx_empty(false);
        assert_eq!(uart.try_send_byte(b'a'), Err(IoError::WouldBlock));
        assert!(sim.transmitted().is_empty());
        sim.set_tx_empty(true);
        assert_eq!(uart.try_send_byte(b'a'), Ok(()));
        assert_eq!(sim.transmitted(), b"a");
    }

    #[test]
    fn send_byte_until_times_out() {
        let (mut uart, sim) = driver();
        sim.set_tx_empty(false);
        assert_eq!(
            uart.send_byte_until(b'a', PollBudget::new(16)),
            Err(IoError::TimedOut)
        );
        let polls = sim
            .events()
            .iter()
            .filter(|e| e.reg == RegisterOffset::LineStatus)
            .count();
        assert_eq!(polls, 17);
        assert!(sim.transmitted().is_empty());

        let mut checks = 0;
        let res = uart.send_byte_until(b'a', || {
            checks += 1;
            checks > 3
        });
        assert_eq!(res, Err(IoError::TimedOut));
        assert_eq!(checks, 4);
    }

    #[test]
    fn try_receive_byte_is_destructive() {
        let (mut uart, sim) = driver();
        assert_eq!(uart.try_receive_byte(), None);
        sim.inject_rx(&[0x42]);
        assert_eq!(uart.try_receive_byte(), Some(0x42));
        assert_eq!(uart.try_receive_byte(), None);
    }

    #[test]
    fn receive_byte_waits_for_data_ready() {
        let (mut uart, sim) = driver();
        let harness = sim.clone();
        let feeder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            harness.inject_rx(b"ok");
        });
        assert_eq!(uart.receive_byte(), b'o');
        feeder.join().unwrap();
        assert_eq!(uart.receive_byte_until(PollBudget::new(0)), Ok(b'k'));
        assert_eq!(
            uart.receive_byte_until(PollBudget::new(8)),
            Err(IoError::TimedOut)
        );
    }

    #[test]
    fn line_status_surfaces_errors_without_failing_receive() {
        let (mut uart, sim) = driver();
        sim.inject_rx(&[0x7F]);
        sim.inject_line_errors(LineStatus::OVERRUN_ERROR | LineStatus::FRAMING_ERROR);
        let status = uart.line_status();
        assert!(status.data_ready());
        assert_eq!(
            status.errors(),
            LineStatus::OVERRUN_ERROR | LineStatus::FRAMING_ERROR
        );
        assert!(uart.line_status().errors().is_empty());
        assert_eq!(uart.try_receive_byte(), Some(0x7F));
    }

    #[test]
    fn flush_waits_for_transmitter_idle() {
        let (mut uart, sim) = driver();
        sim.set_tx_empty(false);
        let harness = sim.clone();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            harness.set_tx_empty(true);
        });
        uart.flush();
        releaser.join().unwrap();
        assert!(uart.line_status().contains(LineStatus::TRANSMITTER_IDLE));
    }

    #[test]
    fn break_and_line_control_round_trip() {
        let (mut uart, sim) = driver();
        uart.configure(&UartConfig::default());
        uart.set_break(true);
        assert_ne!(sim.lcr() & LineControlBits::BREAK.bits(), 0);
        assert_eq!(uart.line_control(), LineControlConfig::default());
        uart.set_break(false);
        assert_eq!(sim.lcr(), 0x03);
    }

    #[test]
    fn interrupt_identification_and_modem_status() {
        let (mut uart, sim) = driver();
        assert_eq!(uart.interrupt_id(), None);
        sim.set_iir(0x04);
        assert_eq!(uart.interrupt_id(), Some(InterruptId::RxAvailable));
        sim.set_msr(0b1011_0001);
        assert_eq!(
            uart.modem_status(),
            ModemStatus::DCD | ModemStatus::CTS | ModemStatus::DSR | ModemStatus::DELTA_CTS
        );
        uart.set_scratch(0x5A);
        assert_eq!(uart.scratch(), 0x5A);
    }

    #[test]
    fn fmt_write_sends_raw_bytes() {
        use core::fmt::Write;
        let (mut uart, sim) = driver();
        writeln!(uart, "a={}", 1).unwrap();
        assert_eq!(sim.transmitted(), b"a=1\n");
    }
}
