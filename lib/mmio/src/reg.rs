use core::{
    cell::UnsafeCell,
    ptr::{read_volatile, write_volatile},
};

/// A single hardware register.
///
/// Only ever obtained by reference into a device window; every access is volatile
/// so the compiler never caches, hoists or merges it.
#[repr(transparent)]
pub struct Register<T: Sized + Copy> {
    inner: UnsafeCell<T>,
}

impl<T: Sized + Copy> Register<T> {
    #[inline(always)]
    pub fn read(&self) -> T {
        unsafe { read_volatile(self.inner.get()) }
    }
    #[inline(always)]
    pub fn write(&self, value: T) {
        unsafe {
            write_volatile(self.inner.get(), value);
        }
    }
}
