//! 32-bit register access.
//!
//! Every driver in this crate touches hardware only through [`RegisterBus`].
//! On target that is [`Mmio`], a thin volatile wrapper over physical
//! addresses; host tests substitute a simulated bus.

use volatile::Volatile;

/// Read/write 32-bit memory-mapped registers.
///
/// Accesses are never cached or merged: two consecutive reads of a status
/// register reach the device twice.
pub trait RegisterBus {
    fn read32(&self, addr: usize) -> u32;

    fn write32(&self, addr: usize, value: u32);

    /// Read-modify-write.
    fn modify32<F: FnOnce(u32) -> u32>(&self, addr: usize, f: F) {
        let value = self.read32(addr);
        self.write32(addr, f(value));
    }

    fn set_bits32(&self, addr: usize, bits: u32) {
        self.modify32(addr, |v| v | bits);
    }

    fn clear_bits32(&self, addr: usize, bits: u32) {
        self.modify32(addr, |v| v & !bits);
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &T {
    fn read32(&self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    fn write32(&self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }
}

/// Physical memory-mapped I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mmio;

impl RegisterBus for Mmio {
    fn read32(&self, addr: usize) -> u32 {
        // SAFETY: Callers only pass addresses from the register maps in
        // `EtherConfig`, which are aligned peripheral registers.
        unsafe {
            let reg = addr as *const Volatile<u32>;
            (*reg).read()
        }
    }

    fn write32(&self, addr: usize, value: u32) {
        // SAFETY: See `read32`.
        unsafe {
            let reg = addr as *mut Volatile<u32>;
            (*reg).write(value);
        }
    }
}
