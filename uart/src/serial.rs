//! Byte-device view of a UART, for consumers that should not care about the chip.

use spin::relax::RelaxStrategy;

use crate::{driver::Uart16550, handle::DeviceHandle, regs::RegisterFile};

pub trait Uart: Send {
    /// Non-blocking receive.
    fn read(&mut self) -> Option<u8>;
    /// Blocking transmit.
    fn write(&mut self, word: u8);
    /// Wait until everything written has left the transmitter.
    fn flush(&mut self);
}

impl<R: RegisterFile, S: RelaxStrategy> Uart for Uart16550<R, S> {
    fn read(&mut self) -> Option<u8> {
        self.try_receive_byte()
    }

    fn write(&mut self, word: u8) {
        self.send_byte(word)
    }

    fn flush(&mut self) {
        Uart16550::flush(self)
    }
}

impl<R: RegisterFile, S: RelaxStrategy> Uart for &DeviceHandle<R, S> {
    fn read(&mut self) -> Option<u8> {
        self.try_receive_byte()
    }

    fn write(&mut self, word: u8) {
        self.send_byte(word)
    }

    fn flush(&mut self) {
        DeviceHandle::flush(*self)
    }
}
