//! PMGI (PHY management interface) register transport.
//!
//! A PMGI channel performs one MDIO frame per command and raises its
//! completion interrupt when done. These helpers only start accesses; the
//! result of a read is collected from PMGDR in the interrupt handler.

use super::regs::{pmgar, pmgcmd, pmgcr, pmgi};
use super::Ether;
use crate::drivers::bus::RegisterBus;
use crate::drivers::irqchip::InterruptController;
use crate::drivers::net::netdev::EtherError;
use crate::sync::HardwareLock;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PmgiOp {
    Read,
    Write,
}

impl<B: RegisterBus, I: InterruptController, L: HardwareLock> Ether<B, I, L> {
    fn pmgi_base(&self, pmgi_channel: usize) -> usize {
        self.config.pmgi[pmgi_channel].base
    }

    /// Program PMGI timing and unmask its completion interrupt.
    ///
    /// # Errors
    ///
    /// - `Other` - the timing register did not accept the configuration
    pub(crate) fn pmgi_initial(&self, pmgi_channel: usize) -> Result<(), EtherError> {
        let cfg = &self.config.pmgi[pmgi_channel];
        let value = ((u32::from(cfg.clock_select) & pmgcr::CLOCK_MASK) << pmgcr::CLOCK_SHIFT)
            | ((u32::from(cfg.hold_time) & pmgcr::HOLD_MASK) << pmgcr::HOLD_SHIFT)
            | ((u32::from(cfg.capture_time) & pmgcr::CAPTURE_MASK) << pmgcr::CAPTURE_SHIFT);

        let base = self.pmgi_base(pmgi_channel);
        self.bus.write32(base + pmgi::PMGCR, value);
        if self.bus.read32(base + pmgi::PMGCR) != value {
            warn!("[PMGI] ch{}: timing not accepted", pmgi_channel);
            return Err(EtherError::Other);
        }

        self.icu
            .enable(cfg.interrupt, self.config.pmgi_interrupt_priority);
        Ok(())
    }

    /// Start one register access to the PHY of the channel `pmgi_channel`
    /// is serving.
    pub(crate) fn pmgi_access(&self, pmgi_channel: usize, reg: u8, data: u16, op: PmgiOp) {
        let channel = self.sessions[pmgi_channel].channel;
        let base = self.pmgi_base(pmgi_channel);
        let phy = u32::from(self.config.channels[channel].phy_address & 0x1F);

        self.bus
            .write32(base + pmgi::PMGAR, (phy << pmgar::PHY_SHIFT) | u32::from(reg & 0x1F));
        let command = match op {
            PmgiOp::Read => pmgcmd::READ,
            PmgiOp::Write => {
                self.bus.write32(base + pmgi::PMGDR, u32::from(data));
                pmgcmd::WRITE
            }
        };
        self.bus.write32(base + pmgi::PMGCMD, command);
    }

    /// Data of the last completed read.
    pub(crate) fn pmgi_read_data(&self, pmgi_channel: usize) -> u16 {
        (self.bus.read32(self.pmgi_base(pmgi_channel) + pmgi::PMGDR) & 0xFFFF) as u16
    }

    /// Mask the completion interrupt.
    pub(crate) fn pmgi_close(&self, pmgi_channel: usize) {
        self.icu.disable(self.config.pmgi[pmgi_channel].interrupt);
    }
}
