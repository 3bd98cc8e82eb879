//! RX interrupt control unit (ICU) driver.
//!
//! Covers the two kinds of sources the Ethernet driver uses:
//! - ordinary vectors (PMGI completion), enabled through IER and given a
//!   priority through IPR
//! - group AL1 members (EDMAC status, EINTn), which share vector 113 and are
//!   individually gated by GENAL1
//!
//! Register layout is normalized to 32-bit words; the driver never relies
//! on byte lanes.
//!
//! Reference: RX72N Group User's Manual: Hardware, Section 15 (ICUB)

use crate::drivers::bus::{Mmio, RegisterBus};
use lazy_static::lazy_static;
use spin::Mutex;

/// ICU base address.
///
/// Source: RX72N User's Manual, Table 15.3
const ICU_BASE: usize = 0x0008_7000;

/// ICU register offsets.
mod icu_offsets {
    pub const IER: usize = 0x200; // Interrupt request enable, 32 vectors per word
    pub const IPR: usize = 0x300; // Interrupt source priority, one word per vector
    pub const GENAL1: usize = 0x874; // Group AL1 request enable
}

/// Flag marking a source number as a member of group AL1.
const GROUP_AL1_FLAG: u32 = 0x8000_0000;

/// Source number for bit `bit` of group AL1.
pub const fn group_al1(bit: u32) -> u32 {
    GROUP_AL1_FLAG | bit
}

/// Interrupt sources used by the Ethernet driver.
///
/// Source: RX72N User's Manual, Table 15.4 (vector table) and
/// Table 15.6 (group AL1 sources)
pub mod irq {
    use super::group_al1;

    /// Group AL1 shared vector.
    pub const GROUP_AL1: u32 = 113;

    /// EDMAC0 status interrupt (GENAL1 bit 4).
    pub const EINT0: u32 = group_al1(4);

    /// EDMAC1 status interrupt (GENAL1 bit 5).
    pub const EINT1: u32 = group_al1(5);

    /// PMGI0 completion. Selectable peripheral interrupt A, vector 208.
    pub const PMGI0I: u32 = 208;

    /// PMGI1 completion. Selectable peripheral interrupt A, vector 209.
    pub const PMGI1I: u32 = 209;
}

lazy_static! {
    pub static ref ICU: Mutex<Icu<Mmio>> = Mutex::new(Icu::new(Mmio, ICU_BASE));
}

/// ICU driver instance.
pub struct Icu<B: RegisterBus> {
    bus: B,
    base: usize,
}

impl<B: RegisterBus> Icu<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Icu { bus, base }
    }

    fn ier_addr(&self, vector: u32) -> (usize, u32) {
        let word = (vector / 32) as usize;
        (self.base + icu_offsets::IER + word * 4, 1 << (vector % 32))
    }

    fn enable_vector(&self, vector: u32, priority: u8) {
        self.bus.write32(
            self.base + icu_offsets::IPR + vector as usize * 4,
            u32::from(priority & 0x0F),
        );
        let (addr, bit) = self.ier_addr(vector);
        self.bus.set_bits32(addr, bit);
    }

    fn disable_vector(&self, vector: u32) {
        let (addr, bit) = self.ier_addr(vector);
        self.bus.clear_bits32(addr, bit);
    }
}

impl<B: RegisterBus> super::InterruptController for Icu<B> {
    fn enable(&self, source: u32, priority: u8) {
        if source & GROUP_AL1_FLAG != 0 {
            let bit = source & !GROUP_AL1_FLAG;
            self.bus
                .set_bits32(self.base + icu_offsets::GENAL1, 1 << bit);
            self.enable_vector(irq::GROUP_AL1, priority);
        } else {
            self.enable_vector(source, priority);
        }
    }

    fn disable(&self, source: u32) {
        if source & GROUP_AL1_FLAG != 0 {
            let bit = source & !GROUP_AL1_FLAG;
            let genal1 = self.base + icu_offsets::GENAL1;
            self.bus.clear_bits32(genal1, 1 << bit);
            // The shared vector stays live while other members need it.
            if self.bus.read32(genal1) == 0 {
                self.disable_vector(irq::GROUP_AL1);
            }
        } else {
            self.disable_vector(source);
        }
    }
}
