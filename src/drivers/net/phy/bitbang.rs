//! Bit-banged MII management on the ETHERC PIR register.
//!
//! Frame format (IEEE 802.3 clause 22.2.4.5), MSB first:
//!
//! ```text
//! read:  PRE(32x1) ST(01) OP(10) PHYAD(5) REGAD(5) TA(Z0) DATA(16 from PHY) IDLE(Z0)
//! write: PRE(32x1) ST(01) OP(01) PHYAD(5) REGAD(5) TA(10) DATA(16)          IDLE(Z0)
//! ```
//!
//! Every bit takes four PIR writes (clock low, clock high, clock high,
//! clock low) and each write is repeated `wait` times to stretch MDC. The
//! repeat count is calibrated against the bus clock; do not replace it with
//! a timer.

use super::MiiTransport;
use crate::drivers::bus::RegisterBus;

/// PIR register bits.
pub mod pir {
    /// MII management clock
    pub const MDC: u32 = 1 << 0;
    /// Management data direction: 1 = MAC drives MDIO
    pub const MMD: u32 = 1 << 1;
    /// Management data out
    pub const MDO: u32 = 1 << 2;
    /// Management data in
    pub const MDI: u32 = 1 << 3;
}

const PREAMBLE_BITS: u32 = 32;
const START_OF_FRAME: u16 = 0b01;
const OP_READ: u16 = 0b10;
const OP_WRITE: u16 = 0b01;

/// Synchronous MII master on one PIR register.
pub struct BitBangMii<B: RegisterBus> {
    bus: B,
    pir: usize,
    wait: u32,
}

impl<B: RegisterBus> BitBangMii<B> {
    /// `pir` is the address of the PIR register of the ETHERC that owns the
    /// management pins.
    pub fn new(bus: B, pir: usize, wait: u32) -> Self {
        BitBangMii { bus, pir, wait }
    }

    fn hold(&self, value: u32) {
        for _ in 0..self.wait {
            self.bus.write32(self.pir, value);
        }
    }

    fn write_bit(&self, one: bool) {
        let data = if one { pir::MMD | pir::MDO } else { pir::MMD };
        self.hold(data);
        self.hold(data | pir::MDC);
        self.hold(data | pir::MDC);
        self.hold(data);
    }

    /// One clock with MDIO released.
    fn release_cycle(&self) {
        self.hold(0);
        self.hold(pir::MDC);
        self.hold(pir::MDC);
        self.hold(0);
    }

    fn read_bit(&self) -> u16 {
        self.hold(0);
        self.hold(pir::MDC);
        let bit = (self.bus.read32(self.pir) & pir::MDI) >> 3;
        self.hold(pir::MDC);
        self.hold(0);
        bit as u16
    }

    fn preamble(&self) {
        for _ in 0..PREAMBLE_BITS {
            self.write_bit(true);
        }
    }

    fn header(&self, op: u16, phy: u8, reg: u8) {
        let word = (START_OF_FRAME << 12)
            | (op << 10)
            | ((u16::from(phy) & 0x1F) << 5)
            | (u16::from(reg) & 0x1F);
        for i in (0..14).rev() {
            self.write_bit(word & (1 << i) != 0);
        }
    }

    /// Release the bus for two clocks (read turnaround and idle).
    fn release_z0(&self) {
        self.release_cycle();
        self.release_cycle();
    }
}

impl<B: RegisterBus> MiiTransport for BitBangMii<B> {
    fn read(&mut self, phy: u8, reg: u8) -> u16 {
        self.preamble();
        self.header(OP_READ, phy, reg);
        self.release_z0();

        let mut value = 0u16;
        for _ in 0..16 {
            value = (value << 1) | self.read_bit();
        }

        self.release_z0();
        value
    }

    fn write(&mut self, phy: u8, reg: u8, value: u16) {
        self.preamble();
        self.header(OP_WRITE, phy, reg);
        self.write_bit(true);
        self.write_bit(false);

        for i in (0..16).rev() {
            self.write_bit(value & (1 << i) != 0);
        }

        self.release_z0();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimBus;

    const PIR: usize = 0x000C_0120;

    #[test]
    fn test_write_then_read_through_sim_phy() {
        let bus = SimBus::new();
        bus.attach_mdio(PIR);
        let mut mii = BitBangMii::new(&bus, PIR, 1);

        mii.write(0, super::super::reg::AN_ADVERTISEMENT, 0x0DE1);
        assert_eq!(bus.phy(0).regs[4], 0x0DE1);
        assert_eq!(mii.read(0, super::super::reg::AN_ADVERTISEMENT), 0x0DE1);
    }

    #[test]
    fn test_frames_addressed_per_phy() {
        let bus = SimBus::new();
        bus.attach_mdio(PIR);
        bus.phy_mut(1, |phy| phy.regs[2] = 0x0022);
        let mut mii = BitBangMii::new(&bus, PIR, 2);

        assert_eq!(mii.read(1, 2), 0x0022);
        assert_eq!(mii.read(0, 2), 0x0000);
    }

    #[test]
    fn test_each_bit_is_four_held_writes() {
        let bus = SimBus::new();
        let mii = BitBangMii::new(&bus, PIR, 8);
        mii.write_bit(true);
        assert_eq!(bus.write_count(PIR), 32);
    }
}
