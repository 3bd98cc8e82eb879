//! Interrupt controllers.
//!
//! The Ethernet driver only needs to switch its own sources on and off;
//! vector installation belongs to the platform.

pub mod icu;

use spin::Mutex;

/// Enable or disable one numbered interrupt source.
pub trait InterruptController {
    /// Unmask `source` at `priority` (0 disables on the RX ICU, so callers
    /// pass 1..=15).
    fn enable(&self, source: u32, priority: u8);

    fn disable(&self, source: u32);
}

impl<T: InterruptController + ?Sized> InterruptController for &T {
    fn enable(&self, source: u32, priority: u8) {
        (**self).enable(source, priority)
    }

    fn disable(&self, source: u32) {
        (**self).disable(source)
    }
}

impl<T: InterruptController> InterruptController for Mutex<T> {
    fn enable(&self, source: u32, priority: u8) {
        self.lock().enable(source, priority)
    }

    fn disable(&self, source: u32) {
        self.lock().disable(source)
    }
}
