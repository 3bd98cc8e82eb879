//! MAC/DMA configuration and link bring-up.

use super::regs::{self, Ecmr, Ecsipr, Ecsr, Eesipr, edmac, etherc};
use super::{Ether, LinkChange};
use crate::config::RECEIVE_FRAME_LIMIT;
use crate::drivers::bus::RegisterBus;
use crate::drivers::irqchip::InterruptController;
use crate::drivers::net::netdev::EtherError;
use crate::drivers::net::phy::bitbang::BitBangMii;
use crate::drivers::net::phy::pause::resolve;
use crate::drivers::net::phy::{DuplexMode, LinkParams, LinkSpeed, Phy};
use crate::sync::HardwareLock;
use log::{debug, info};

/// What the MAC is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MacMode {
    /// Normal transmit and receive.
    Normal,
    /// Receive only, waiting for a magic packet.
    MagicPacket,
}

impl<B: RegisterBus, I: InterruptController, L: HardwareLock> Ether<B, I, L> {
    /// Blocking PHY handle for `channel`, bit-banging the PIR register of
    /// the ETHERC that owns its management pins.
    pub(crate) fn phy(&self, channel: usize) -> Phy<BitBangMii<&B>> {
        let cfg = &self.config.channels[channel];
        let bus_owner = self
            .config
            .channels
            .get(cfg.phy_access)
            .map_or(cfg.etherc_base, |owner| owner.etherc_base);

        Phy::new(
            BitBangMii::new(&self.bus, bus_owner + etherc::PIR, self.config.mii_wait),
            cfg.phy_address,
            self.config.phy_quirk,
            self.config.phy_reset_retries,
        )
    }

    /// Software reset ETHERC and EDMAC.
    pub(crate) fn reset_mac(&self, channel: usize) {
        self.edmac_modify(channel, edmac::EDMR, |v| v | regs::EDMR_SWR);
        // SWR self-clears after 64 bus cycles.
        for _ in 0..self.config.mac_reset_wait {
            core::hint::spin_loop();
        }
    }

    pub(crate) fn init_descriptors(&mut self, channel: usize) {
        let ch = &mut self.channels[channel];
        ch.rx.init_rx();
        ch.tx.init_tx();
    }

    fn config_ethernet(&self, channel: usize, mode: MacMode) {
        let ch = &self.channels[channel];
        let link_pin = self.config.use_link_status_pin;

        match mode {
            MacMode::Normal => {
                if link_pin {
                    self.etherc_write(channel, etherc::ECSR, Ecsr::LCHNG.bits());
                    self.etherc_modify(channel, etherc::ECSIPR, |v| {
                        v | Ecsipr::LCHNGIP.bits()
                    });
                }
                self.edmac_modify(channel, edmac::EESIPR, |v| {
                    v | (Eesipr::ECIIP | Eesipr::FRIP | Eesipr::TCIP).bits()
                });
            }
            MacMode::MagicPacket => {
                let ecsipr = if link_pin {
                    Ecsipr::MPDIP | Ecsipr::LCHNGIP
                } else {
                    Ecsipr::MPDIP
                };
                self.etherc_write(channel, etherc::ECSIPR, ecsipr.bits());
                self.edmac_write(channel, edmac::EESIPR, regs::EESIPR_MAGIC);
            }
        }

        self.etherc_write(channel, etherc::RFLR, RECEIVE_FRAME_LIMIT);
        self.etherc_write(channel, etherc::IPGR, regs::IPGR_96_BIT);
        self.etherc_write(channel, etherc::BCFRR, ch.broadcast_filter);

        self.edmac_modify(channel, edmac::EDMR, |v| v | regs::EDMR_DE);
        self.edmac_write(channel, edmac::RDLAR, ch.rx.base_address() as u32);
        self.edmac_write(channel, edmac::TDLAR, ch.tx.base_address() as u32);
        let trscer = if ch.multicast_filter {
            0
        } else {
            regs::TRSCER_RMAF_MASKED
        };
        self.edmac_write(channel, edmac::TRSCER, trscer);
        self.edmac_write(channel, edmac::TFTR, 0);
        self.edmac_write(channel, edmac::FDR, regs::FDR_2048);
        self.edmac_write(channel, edmac::RMCR, regs::RMCR_RNR);
        self.edmac_write(
            channel,
            edmac::RPADIR,
            (u32::from(ch.padding_size) << 16) | u32::from(ch.padding_position),
        );
    }

    /// Reset the MAC, program its address and rings, and configure it for
    /// `mode`. Transmit and receive stay disabled.
    pub(crate) fn configure_mac(&mut self, channel: usize, mode: MacMode) {
        self.reset_mac(channel);

        let mac = self.channels[channel].mac.as_bytes();
        let high = u32::from_be_bytes([mac[0], mac[1], mac[2], mac[3]]);
        let low = (u32::from(mac[4]) << 8) | u32::from(mac[5]);
        self.etherc_write(channel, etherc::MAHR, high);
        self.etherc_write(channel, etherc::MALR, low);

        self.init_descriptors(channel);
        self.config_ethernet(channel, mode);
    }

    /// Start over with empty rings and a freshly configured MAC after the
    /// link came up. Transmit and receive stay off until negotiation is
    /// collected.
    pub(crate) fn prepare_link_up(&mut self, channel: usize) {
        let ch = &mut self.channels[channel];
        ch.link_change = LinkChange::None;
        ch.rx.clear();
        ch.tx.clear();
        ch.transfer_enabled = true;
        self.configure_mac(channel, MacMode::Normal);
    }

    /// Clear stale status and unmask the channel's status interrupt.
    pub(crate) fn arm_status_interrupts(&self, channel: usize) {
        self.etherc_write(channel, etherc::ECSR, regs::ECSR_CLEAR_ALL);
        self.edmac_write(channel, edmac::EESR, regs::EESR_CLEAR_ALL);
        if self.config.use_link_status_pin {
            self.etherc_modify(channel, etherc::ECSIPR, |v| v | Ecsipr::LCHNGIP.bits());
        }
        self.edmac_modify(channel, edmac::EESIPR, |v| v | Eesipr::ECIIP.bits());
        self.icu.enable(
            self.config.channels[channel].interrupt,
            self.config.interrupt_priority,
        );
    }

    pub(crate) fn apply_link_params(&self, channel: usize, link: LinkParams) {
        match link.duplex {
            DuplexMode::Full => self.ecmr_set(channel, Ecmr::DM),
            DuplexMode::Half => self.ecmr_clear(channel, Ecmr::DM),
        }
        match link.speed {
            LinkSpeed::Speed100 => self.ecmr_set(channel, Ecmr::RTM),
            LinkSpeed::Speed10 => self.ecmr_clear(channel, Ecmr::RTM),
        }
    }

    /// Program flow control and enable transmit and receive.
    pub(crate) fn start_transfer(&self, channel: usize, link: LinkParams) {
        let ch = &self.channels[channel];

        if link.duplex == DuplexMode::Full && ch.pause {
            self.etherc_write(channel, etherc::APR, regs::APR_MAX);
            self.etherc_write(channel, etherc::TPAUSER, 0);
            self.edmac_write(channel, edmac::FCFTR, 0);
            self.ecmr_set(channel, Ecmr::ZPF);

            let pause = resolve(ch.local_pause, ch.partner_pause);
            debug!(
                "[ETHERC] ch{}: pause tx={} rx={}",
                channel, pause.transmit, pause.receive
            );
            if pause.transmit {
                self.ecmr_set(channel, Ecmr::TXF);
            } else {
                self.ecmr_clear(channel, Ecmr::TXF);
            }
            if pause.receive {
                self.ecmr_set(channel, Ecmr::RXF);
            } else {
                self.ecmr_clear(channel, Ecmr::RXF);
            }
        } else {
            self.ecmr_clear(channel, Ecmr::TXF | Ecmr::RXF);
        }

        if ch.promiscuous {
            self.ecmr_set(channel, Ecmr::PRM);
        } else {
            self.ecmr_clear(channel, Ecmr::PRM);
        }

        self.ecmr_set(channel, Ecmr::RE | Ecmr::TE);
        self.edmac_write(channel, edmac::EDRRR, regs::EDRRR_RR);

        info!(
            "[ETHERC] ch{}: link up {:?} {:?}",
            channel, link.speed, link.duplex
        );
    }

    /// Enable magic packet detection with the receiver only.
    pub(crate) fn start_magic_detection(&self, channel: usize) {
        self.ecmr_set(channel, Ecmr::MPDE);
        self.ecmr_set(channel, Ecmr::RE);
        info!("[ETHERC] ch{}: waiting for magic packet", channel);
    }

    /// Stop transmit and receive after the link went down.
    pub(crate) fn stop_transfer(&mut self, channel: usize) {
        self.ecmr_clear(channel, Ecmr::RE | Ecmr::TE);
        self.channels[channel].transfer_enabled = false;
        info!("[ETHERC] ch{}: link down", channel);
    }

    /// Collect auto-negotiation over the blocking PHY path and start the MAC
    /// in `mode`.
    ///
    /// # Errors
    ///
    /// - `Other` - negotiation incomplete or no usable speed/duplex
    pub(crate) fn do_link(&mut self, channel: usize, mode: MacMode) -> Result<(), EtherError> {
        let advertisement = self.channels[channel].local_advertisement;
        let negotiation = self
            .phy(channel)
            .set_autonegotiate(advertisement)
            .map_err(|_| EtherError::Other)?;

        let ch = &mut self.channels[channel];
        ch.local_pause = negotiation.local_pause;
        ch.partner_pause = negotiation.partner_pause;

        self.apply_link_params(channel, negotiation.link);
        match mode {
            MacMode::Normal => self.start_transfer(channel, negotiation.link),
            MacMode::MagicPacket => self.start_magic_detection(channel),
        }
        Ok(())
    }
}
