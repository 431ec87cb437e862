//! Formatted output to a [crate::DeviceHandle].
//!
//! Bytes go out unchanged: no CR insertion, echo or buffering.

/// print to a uart handle
#[macro_export]
macro_rules! uart_print {
    ($uart: expr, $fmt: literal $(, $($arg: tt)+)?) => {
        $uart.print(format_args!($fmt $(, $($arg)+)?))
    }
}

#[macro_export]
macro_rules! uart_println {
    ($uart: expr, $fmt: literal $(, $($arg: tt)+)?) => {
        $uart.print(format_args!(concat!($fmt, "\n") $(, $($arg)+)?))   // Use LF instead of CR-LF
    }
}
