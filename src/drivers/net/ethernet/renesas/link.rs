//! Channel lifecycle and link management.
//!
//! `open` resets the PHY and starts auto-negotiation; the link itself is
//! brought up later by `process_link`, which the application calls
//! periodically. `process_link` consumes the link change and magic packet
//! flags set by the status interrupt (or, without a LINKSTA pin, polls the
//! PHY itself) and fires the link callbacks.
//!
//! With `PhyAccess::NonBlocking` every call here only starts a PHY session
//! and returns; the outcome arrives through the PMGI callback.

use super::fsm::PmgiMode;
use super::mac::MacMode;
use super::pmgi::PmgiOp;
use super::regs::{Ecsipr, Eesipr, edmac, etherc};
use super::{CallbackEvent, Ether, LinkChange, LinkState};
use crate::config::PhyAccess;
use crate::drivers::bus::RegisterBus;
use crate::drivers::irqchip::InterruptController;
use crate::drivers::net::netdev::EtherError;
use crate::drivers::net::phy::{control, reg};
use crate::net::ethernet::MacAddress;
use crate::sync::HardwareLock;
use log::{debug, info, warn};

impl<B: RegisterBus, I: InterruptController, L: HardwareLock> Ether<B, I, L> {
    fn nonblocking(&self) -> bool {
        self.config.phy_access == PhyAccess::NonBlocking
    }

    /// Claim and program the management bus when PHY access is
    /// non-blocking. `report` names the mode to report a programming
    /// failure for.
    fn phy_session(
        &mut self,
        channel: usize,
        report: Option<PmgiMode>,
    ) -> Result<Option<usize>, EtherError> {
        if !self.nonblocking() {
            return Ok(None);
        }
        let pmgi = self.pmgi_acquire(channel)?;
        self.pmgi_prepare(pmgi, report)
            .map_err(|_| EtherError::Other)?;
        Ok(Some(pmgi))
    }

    // ========================================================================
    // Open / Close
    // ========================================================================

    /// Reset the MAC and PHY of `channel` and start auto-negotiation.
    ///
    /// Frames cannot be moved until `process_link` has seen the link come
    /// up. `mac` and `pause` are kept for the re-open after a magic packet.
    ///
    /// # Errors
    ///
    /// - `InvalidChannel` - no such channel
    /// - `PhyResetTimeout` - PHY stayed in reset (blocking access)
    /// - `Locked` - another PHY operation is in flight (non-blocking access)
    /// - `Other` - no PMGI callback, or the PMGI rejected its setup
    pub fn open(&mut self, channel: usize, mac: MacAddress, pause: bool) -> Result<(), EtherError> {
        Self::check_channel(channel)?;
        let pmgi = if self.nonblocking() {
            Some(self.pmgi_acquire(channel)?)
        } else {
            None
        };

        let ch = &mut self.channels[channel];
        ch.clear_flags();
        ch.mac = mac;
        ch.pause = pause;
        self.reset_mac(channel);

        match pmgi {
            None => {
                let advertisement = {
                    let mut phy = self.phy(channel);
                    phy.init()?;
                    phy.start_autonegotiate(pause)
                };
                self.channels[channel].local_advertisement = advertisement;
                self.arm_status_interrupts(channel);
            }
            Some(pmgi) => {
                self.pmgi_prepare(pmgi, Some(PmgiMode::Open))
                    .map_err(|_| EtherError::Other)?;
                self.pmgi_start(pmgi, PmgiMode::Open, reg::CONTROL, control::RESET, PmgiOp::Write);
            }
        }

        info!("[ETHERC] ch{}: open, mac {} pause {}", channel, mac, pause);
        Ok(())
    }

    /// Stop `channel`: mask its status interrupt and disable the MAC.
    pub fn close(&mut self, channel: usize) -> Result<(), EtherError> {
        Self::check_channel(channel)?;

        self.icu.disable(self.config.channels[channel].interrupt);
        self.etherc_modify(channel, etherc::ECSIPR, |v| v & !Ecsipr::LCHNGIP.bits());
        self.edmac_modify(channel, edmac::EESIPR, |v| v & !Eesipr::ECIIP.bits());
        self.etherc_write(channel, etherc::ECMR, 0);

        let ch = &mut self.channels[channel];
        ch.clear_flags();
        if !self.config.use_link_status_pin {
            ch.previous_link = LinkState::Down;
        }

        info!("[ETHERC] ch{}: closed", channel);
        Ok(())
    }

    // ========================================================================
    // Link
    // ========================================================================

    /// Check the PHY link of `channel`.
    ///
    /// With non-blocking access `Ok` only means the check was started; the
    /// PMGI callback reports `Complete` for link up, `Error` for link down.
    ///
    /// # Errors
    ///
    /// - `Other` - link is down (blocking access)
    /// - `Locked` - another PHY operation is in flight
    pub fn check_link(&mut self, channel: usize) -> Result<(), EtherError> {
        Self::check_channel(channel)?;
        match self.phy_session(channel, Some(PmgiMode::CheckLink))? {
            Some(pmgi) => {
                self.pmgi_start(pmgi, PmgiMode::CheckLink, reg::STATUS, 0, PmgiOp::Read);
                Ok(())
            }
            None => self.phy(channel).link_status(),
        }
    }

    /// Act on pending link events of `channel`. Call periodically.
    ///
    /// Handles, in order: a detected magic packet (report it and re-open
    /// the channel), a link change (start the MAC with the negotiated
    /// parameters, or stop it). Without a LINKSTA pin the PHY is polled to
    /// detect link changes.
    pub fn process_link(&mut self, channel: usize) {
        if Self::check_channel(channel).is_err() {
            return;
        }
        let pmgi = match self.phy_session(channel, Some(PmgiMode::LinkProcess)) {
            Ok(pmgi) => pmgi,
            Err(err) => {
                debug!("[ETHERC] ch{}: link process skipped: {}", channel, err);
                return;
            }
        };

        if self.channels[channel].magic_packet_detected {
            self.channels[channel].magic_packet_detected = false;
            info!("[ETHERC] ch{}: magic packet received", channel);
            self.notify(channel, CallbackEvent::WakeOnLan);
            if let Err(err) = self.close(channel) {
                warn!("[ETHERC] ch{}: close after magic packet failed: {}", channel, err);
            }

            match pmgi {
                Some(pmgi) => {
                    self.channels[channel].clear_flags();
                    self.reset_mac(channel);
                    self.pmgi_start(
                        pmgi,
                        PmgiMode::LinkProcessOpen,
                        reg::CONTROL,
                        control::RESET,
                        PmgiOp::Write,
                    );
                    return;
                }
                None => {
                    let (mac, pause) = (self.channels[channel].mac, self.channels[channel].pause);
                    if let Err(err) = self.open(channel, mac, pause) {
                        warn!("[ETHERC] ch{}: re-open failed: {}", channel, err);
                    }
                }
            }
        }

        let link_pin = self.config.use_link_status_pin;
        if !link_pin {
            if let Some(pmgi) = pmgi {
                self.pmgi_start(
                    pmgi,
                    PmgiMode::LinkProcessCheckLinkPoll,
                    reg::STATUS,
                    0,
                    PmgiOp::Read,
                );
                return;
            }
            self.poll_link(channel);
        }

        match self.channels[channel].link_change {
            LinkChange::LinkOn => {
                if link_pin {
                    if let Some(pmgi) = pmgi {
                        self.pmgi_start(
                            pmgi,
                            PmgiMode::LinkProcessCheckLinkUp,
                            reg::STATUS,
                            0,
                            PmgiOp::Read,
                        );
                        return;
                    }
                    if self.phy(channel).link_status().is_err() {
                        return;
                    }
                }
                self.link_up(channel);
            }
            LinkChange::LinkOff => {
                self.channels[channel].link_change = LinkChange::None;
                if link_pin {
                    if let Some(pmgi) = pmgi {
                        self.pmgi_start(
                            pmgi,
                            PmgiMode::LinkProcessCheckLinkDown,
                            reg::STATUS,
                            0,
                            PmgiOp::Read,
                        );
                        return;
                    }
                    if self.phy(channel).link_status().is_ok() {
                        return;
                    }
                }
                self.stop_transfer(channel);
                self.notify(channel, CallbackEvent::LinkOff);
            }
            LinkChange::None => {}
        }

        if let Some(pmgi) = pmgi {
            self.pmgi_finish_idle(pmgi, PmgiMode::LinkProcess);
        }
    }

    /// Compare the PHY link with the last polled state and flag changes.
    fn poll_link(&mut self, channel: usize) {
        let now = if self.phy(channel).link_status().is_ok() {
            LinkState::Up
        } else {
            LinkState::Down
        };

        let ch = &mut self.channels[channel];
        if now != ch.previous_link {
            ch.link_change = match now {
                LinkState::Up => LinkChange::LinkOn,
                LinkState::Down => LinkChange::LinkOff,
            };
            ch.previous_link = now;
        }
    }

    /// Blocking link bring-up after a confirmed link on.
    fn link_up(&mut self, channel: usize) {
        self.prepare_link_up(channel);
        match self.do_link(channel, MacMode::Normal) {
            Ok(()) => self.notify(channel, CallbackEvent::LinkOn),
            Err(err) => {
                debug!("[ETHERC] ch{}: link not ready: {}", channel, err);
                let ch = &mut self.channels[channel];
                ch.transfer_enabled = false;
                ch.link_change = LinkChange::LinkOn;
            }
        }
    }

    // ========================================================================
    // Wake-on-LAN
    // ========================================================================

    /// Switch `channel` to magic packet detection.
    ///
    /// The MAC is reconfigured to receive only; normal frame transfer on
    /// every channel is refused until a magic packet arrives and
    /// `process_link` re-opens the channel.
    ///
    /// # Errors
    ///
    /// - `LinkNotReady` - the link is not up; nothing is touched
    /// - `Locked` - another PHY operation is in flight
    /// - `Other` - negotiation or the final link check failed
    pub fn wake_on_lan(&mut self, channel: usize) -> Result<(), EtherError> {
        Self::check_channel(channel)?;
        if !self.channels[channel].transfer_enabled {
            return Err(EtherError::LinkNotReady);
        }
        let pmgi = self.phy_session(channel, Some(PmgiMode::WakeOnLan))?;

        self.configure_mac(channel, MacMode::MagicPacket);

        if let Some(pmgi) = pmgi {
            self.pmgi_start(pmgi, PmgiMode::WakeOnLan, reg::STATUS, 0, PmgiOp::Read);
            return Ok(());
        }

        self.do_link(channel, MacMode::MagicPacket)?;
        let linked = if self.config.use_link_status_pin {
            self.link_pin_present(channel)
        } else {
            self.phy(channel).link_status().is_ok()
        };
        if linked {
            Ok(())
        } else {
            warn!("[ETHERC] ch{}: link lost arming magic packet detection", channel);
            Err(EtherError::Other)
        }
    }

    // ========================================================================
    // PHY Registers
    // ========================================================================

    /// Write a PHY register of `channel`.
    pub fn write_phy_register(
        &mut self,
        channel: usize,
        register: u8,
        value: u16,
    ) -> Result<(), EtherError> {
        Self::check_channel(channel)?;
        match self.phy_session(channel, None)? {
            Some(pmgi) => self.pmgi_start(pmgi, PmgiMode::WritePhy, register, value, PmgiOp::Write),
            None => self.phy(channel).write(register, value),
        }
        Ok(())
    }

    /// Read a PHY register of `channel`.
    ///
    /// With non-blocking access the value is delivered by the PMGI callback
    /// and `Ok(None)` is returned.
    pub fn read_phy_register(
        &mut self,
        channel: usize,
        register: u8,
    ) -> Result<Option<u16>, EtherError> {
        Self::check_channel(channel)?;
        match self.phy_session(channel, None)? {
            Some(pmgi) => {
                self.pmgi_start(pmgi, PmgiMode::ReadPhy, register, 0, PmgiOp::Read);
                Ok(None)
            }
            None => Ok(Some(self.phy(channel).read(register))),
        }
    }
}
