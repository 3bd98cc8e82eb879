//! Non-blocking PHY operations.
//!
//! With `PhyAccess::NonBlocking` every PHY operation becomes a session on
//! the PMGI channel serving the PHY. The foreground call takes the
//! session's lock, issues the first register access and returns. Each PMGI
//! completion interrupt then runs exactly one step, which either issues the
//! next access or finishes the session. Finishing releases the lock,
//! masks the PMGI interrupt and reports the outcome through the PMGI
//! callback.
//!
//! A session can move between modes without finishing: `process_link`
//! starts in one of the link check modes and continues in `LinkProcess`
//! once the link is confirmed, and a magic packet wake-up re-runs the open
//! sequence (`LinkProcessOpen`) before checking the link.
//!
//! # Steps
//!
//! ```text
//! Open / LinkProcessOpen
//!   0 read CONTROL                 4 write CONTROL = AN enable | restart
//!   1 reset bit clear?             5 read AN advertisement
//!   2 read vendor reg (quirk)      6 arm status interrupts; finish, or
//!   3 write vendor reg (quirk)       continue into a link check
//!
//! link check modes                 LinkProcess / WakeOnLan
//!   0 read STATUS                    0 read STATUS
//!   1 read STATUS, act on link       1 link up and AN complete?
//!                                    2 read partner ability, start MAC
//! ```
//!
//! STATUS is always read twice: the link bit latches low, so only the
//! second read shows the current state.

use super::pmgi::PmgiOp;
use super::{CallbackEvent, Ether, LinkChange, LinkState, PmgiCallbackArgs};
use crate::config::PhyQuirk;
use crate::drivers::bus::RegisterBus;
use crate::drivers::irqchip::InterruptController;
use crate::drivers::net::netdev::EtherError;
use crate::drivers::net::phy::pause::PauseCaps;
use crate::drivers::net::phy::{
    KSZ8041NL_CLEAR, KSZ8041NL_SET, LinkParams, control, local_advertisement, reg, status,
};
use crate::sync::{HardwareLock, SoftwareLock};
use log::{debug, trace, warn};

/// Operation a PHY session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmgiMode {
    Open,
    CheckLink,
    LinkProcess,
    WakeOnLan,
    /// Re-open after a magic packet, then check the link.
    LinkProcessOpen,
    /// Link check without LINKSTA: compare with the last polled state.
    LinkProcessCheckLinkPoll,
    /// LINKSTA reported link on: confirm before starting the MAC.
    LinkProcessCheckLinkUp,
    /// LINKSTA reported link off: confirm before stopping the MAC.
    LinkProcessCheckLinkDown,
    /// Final link check of a Wake-on-LAN setup without LINKSTA.
    WakeOnLanCheckLink,
    WritePhy,
    ReadPhy,
}

/// State of a PHY session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmgiEvent {
    Idle,
    Running,
    Complete,
    Error,
}

/// One PMGI channel's in-flight operation.
#[derive(Debug)]
pub(crate) struct PhySession {
    pub(crate) lock: SoftwareLock,
    pub(crate) mode: PmgiMode,
    pub(crate) step: u8,
    pub(crate) event: PmgiEvent,
    pub(crate) read_data: u16,
    pub(crate) reset_counter: u32,
    /// MAC channel the session works for.
    pub(crate) channel: usize,
}

impl PhySession {
    pub(crate) const fn new() -> Self {
        PhySession {
            lock: SoftwareLock::new(),
            mode: PmgiMode::Open,
            step: 0,
            event: PmgiEvent::Idle,
            read_data: 0,
            reset_counter: 0,
            channel: 0,
        }
    }

    /// Back to idle. The lock is left alone.
    pub(crate) fn reset(&mut self) {
        self.mode = PmgiMode::Open;
        self.step = 0;
        self.event = PmgiEvent::Idle;
        self.read_data = 0;
        self.reset_counter = 0;
    }

    pub(crate) fn begin(&mut self, mode: PmgiMode) {
        self.mode = mode;
        self.step = 0;
        self.event = PmgiEvent::Running;
        self.reset_counter = 0;
    }
}

impl<B: RegisterBus, I: InterruptController, L: HardwareLock> Ether<B, I, L> {
    // ========================================================================
    // Session Entry and Exit
    // ========================================================================

    /// Take the management bus of `channel` for a non-blocking operation.
    ///
    /// Nothing is changed unless the lock is obtained.
    ///
    /// # Errors
    ///
    /// - `Other` - no PMGI callback to report completion to
    /// - `Locked` - another operation is in flight on the bus
    /// - `InvalidArgument` - the channel is wired to a bus that does not exist
    pub(crate) fn pmgi_acquire(&mut self, channel: usize) -> Result<usize, EtherError> {
        if self.callbacks.pmgi.is_none() {
            return Err(EtherError::Other);
        }
        let pmgi = self.phy_bus(channel)?;
        let session = &mut self.sessions[pmgi];
        if !session.lock.try_lock() {
            debug!("[PMGI] ch{}: busy, rejecting ch{} request", pmgi, channel);
            return Err(EtherError::Locked);
        }
        session.channel = channel;
        Ok(pmgi)
    }

    /// Program the bus of an acquired session. On failure the lock is
    /// released and, when `report` names a mode, an error is reported for it.
    pub(crate) fn pmgi_prepare(
        &mut self,
        pmgi: usize,
        report: Option<PmgiMode>,
    ) -> Result<(), EtherError> {
        if let Err(err) = self.pmgi_initial(pmgi) {
            let channel = self.sessions[pmgi].channel;
            self.sessions[pmgi].lock.unlock();
            if let Some(mode) = report {
                self.pmgi_report(channel, PmgiEvent::Error, mode, 0);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Start `mode` on an acquired session with its first access.
    pub(crate) fn pmgi_start(
        &mut self,
        pmgi: usize,
        mode: PmgiMode,
        reg: u8,
        data: u16,
        op: PmgiOp,
    ) {
        self.sessions[pmgi].begin(mode);
        self.pmgi_access(pmgi, reg, data, op);
    }

    /// End a session that had nothing to do.
    pub(crate) fn pmgi_finish_idle(&mut self, pmgi: usize, mode: PmgiMode) {
        let channel = self.sessions[pmgi].channel;
        self.pmgi_close(pmgi);
        self.sessions[pmgi].lock.unlock();
        self.sessions[pmgi].reset();
        self.pmgi_report(channel, PmgiEvent::Idle, mode, 0);
    }

    fn pmgi_report(&self, channel: usize, event: PmgiEvent, mode: PmgiMode, reg_data: u16) {
        if let Some(callback) = self.callbacks.pmgi {
            callback(PmgiCallbackArgs {
                channel,
                event,
                mode,
                reg_data,
            });
        }
    }

    /// PMGI completion interrupt for PMGI channel `pmgi`.
    pub fn pmgi_interrupt(&mut self, pmgi: usize) {
        let Some(session) = self.sessions.get(pmgi) else {
            return;
        };
        if session.event != PmgiEvent::Running {
            trace!("[PMGI] ch{}: spurious completion", pmgi);
            return;
        }

        if let Err(err) = self.pmgi_step(pmgi) {
            let session = &self.sessions[pmgi];
            debug!(
                "[PMGI] ch{}: {:?} step {} failed: {}",
                pmgi, session.mode, session.step, err
            );
            self.sessions[pmgi].event = PmgiEvent::Error;
        }

        let session = &mut self.sessions[pmgi];
        if matches!(session.event, PmgiEvent::Complete | PmgiEvent::Error) {
            let (channel, event, mode, reg_data) =
                (session.channel, session.event, session.mode, session.read_data);
            session.lock.unlock();
            session.reset();
            self.pmgi_close(pmgi);
            debug!("[PMGI] ch{}: {:?} finished {:?}", channel, mode, event);
            self.pmgi_report(channel, event, mode, reg_data);
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn pmgi_step(&mut self, pmgi: usize) -> Result<(), EtherError> {
        use PmgiMode::*;

        let session = &self.sessions[pmgi];
        let channel = session.channel;
        trace!("[PMGI] ch{}: {:?} step {}", pmgi, session.mode, session.step);

        match (session.mode, session.step) {
            (Open | LinkProcessOpen, 0) => {
                self.sessions[pmgi].reset_counter = 0;
                self.pmgi_next(pmgi, 1, reg::CONTROL, 0, PmgiOp::Read);
                Ok(())
            }
            (Open | LinkProcessOpen, 1) => self.open_wait_reset(pmgi, channel),
            (Open | LinkProcessOpen, 2) => self.open_quirk_write(pmgi),
            (Open | LinkProcessOpen, 3) => {
                self.quirk_enabled()?;
                self.open_advertise(pmgi, channel);
                Ok(())
            }
            (Open | LinkProcessOpen, 4) => {
                self.pmgi_next(
                    pmgi,
                    5,
                    reg::CONTROL,
                    control::AN_ENABLE | control::AN_RESTART,
                    PmgiOp::Write,
                );
                Ok(())
            }
            (Open | LinkProcessOpen, 5) => {
                self.pmgi_next(pmgi, 6, reg::AN_ADVERTISEMENT, 0, PmgiOp::Read);
                Ok(())
            }
            (Open | LinkProcessOpen, 6) => self.open_finish(pmgi, channel),

            (
                CheckLink
                | LinkProcessCheckLinkPoll
                | LinkProcessCheckLinkUp
                | LinkProcessCheckLinkDown
                | WakeOnLanCheckLink,
                0,
            ) => {
                self.pmgi_next(pmgi, 1, reg::STATUS, 0, PmgiOp::Read);
                Ok(())
            }
            (CheckLink, 1) => {
                let bmsr = self.pmgi_read_data(pmgi);
                let session = &mut self.sessions[pmgi];
                session.read_data = bmsr;
                session.event = if bmsr & status::LINK_UP != 0 {
                    PmgiEvent::Complete
                } else {
                    PmgiEvent::Error
                };
                Ok(())
            }
            (LinkProcessCheckLinkPoll, 1) => self.check_link_poll(pmgi, channel),
            (LinkProcessCheckLinkUp, 1) => self.check_link_up(pmgi, channel),
            (LinkProcessCheckLinkDown, 1) => self.check_link_down(pmgi, channel),
            (WakeOnLanCheckLink, 1) => {
                let bmsr = self.pmgi_read_data(pmgi);
                let session = &mut self.sessions[pmgi];
                session.read_data = bmsr;
                session.mode = WakeOnLan;
                session.event = if bmsr & status::LINK_UP != 0 {
                    PmgiEvent::Complete
                } else {
                    PmgiEvent::Error
                };
                Ok(())
            }

            (LinkProcess | WakeOnLan, 0) => {
                self.pmgi_next(pmgi, 1, reg::STATUS, 0, PmgiOp::Read);
                Ok(())
            }
            (LinkProcess, 1) => self.negotiation_status(pmgi, channel, true),
            (WakeOnLan, 1) => self.negotiation_status(pmgi, channel, false),
            (LinkProcess, 2) => self.link_process_start(pmgi, channel),
            (WakeOnLan, 2) => self.wake_on_lan_start(pmgi, channel),

            (WritePhy, 0) => {
                self.sessions[pmgi].event = PmgiEvent::Complete;
                Ok(())
            }
            (ReadPhy, 0) => {
                let value = self.pmgi_read_data(pmgi);
                let session = &mut self.sessions[pmgi];
                session.read_data = value;
                session.event = PmgiEvent::Complete;
                Ok(())
            }

            (mode, step) => {
                warn!("[PMGI] ch{}: no step {} in {:?}", pmgi, step, mode);
                Err(EtherError::InvalidArgument)
            }
        }
    }

    /// Move to `step` and issue its access.
    fn pmgi_next(&mut self, pmgi: usize, step: u8, reg: u8, data: u16, op: PmgiOp) {
        let session = &mut self.sessions[pmgi];
        session.step = step;
        session.event = PmgiEvent::Running;
        self.pmgi_access(pmgi, reg, data, op);
    }

    /// Continue in `mode` from step 0 with a STATUS read.
    fn pmgi_switch(&mut self, pmgi: usize, mode: PmgiMode) {
        let session = &mut self.sessions[pmgi];
        session.mode = mode;
        self.pmgi_next(pmgi, 0, reg::STATUS, 0, PmgiOp::Read);
    }

    fn pmgi_complete_as(&mut self, pmgi: usize, mode: PmgiMode) {
        let session = &mut self.sessions[pmgi];
        session.mode = mode;
        session.event = PmgiEvent::Complete;
    }

    fn quirk_enabled(&self) -> Result<(), EtherError> {
        if self.config.phy_quirk == PhyQuirk::Ksz8041nl {
            Ok(())
        } else {
            Err(EtherError::Other)
        }
    }

    // ========================================================================
    // Open
    // ========================================================================

    fn open_wait_reset(&mut self, pmgi: usize, channel: usize) -> Result<(), EtherError> {
        let value = self.pmgi_read_data(pmgi);
        if value & control::RESET != 0 {
            let session = &mut self.sessions[pmgi];
            session.reset_counter += 1;
            if session.reset_counter >= self.config.phy_reset_retries {
                warn!("[PHY] ch{}: reset did not complete", channel);
                return Err(EtherError::PhyResetTimeout);
            }
            self.pmgi_access(pmgi, reg::CONTROL, 0, PmgiOp::Read);
            return Ok(());
        }

        if self.config.phy_quirk == PhyQuirk::Ksz8041nl {
            self.pmgi_next(pmgi, 2, reg::PHY_CONTROL_1, 0, PmgiOp::Read);
        } else {
            self.open_advertise(pmgi, channel);
        }
        Ok(())
    }

    fn open_quirk_write(&mut self, pmgi: usize) -> Result<(), EtherError> {
        self.quirk_enabled()?;
        let value = (self.pmgi_read_data(pmgi) & !KSZ8041NL_CLEAR) | KSZ8041NL_SET;
        self.pmgi_next(pmgi, 3, reg::PHY_CONTROL_1, value, PmgiOp::Write);
        Ok(())
    }

    fn open_advertise(&mut self, pmgi: usize, channel: usize) {
        let advertisement = local_advertisement(self.channels[channel].pause);
        self.channels[channel].local_advertisement = advertisement;
        self.pmgi_next(
            pmgi,
            4,
            reg::AN_ADVERTISEMENT,
            advertisement,
            PmgiOp::Write,
        );
    }

    fn open_finish(&mut self, pmgi: usize, channel: usize) -> Result<(), EtherError> {
        let advertisement = self.pmgi_read_data(pmgi);
        self.arm_status_interrupts(channel);

        if self.sessions[pmgi].mode != PmgiMode::LinkProcessOpen {
            let session = &mut self.sessions[pmgi];
            session.read_data = advertisement;
            session.event = PmgiEvent::Complete;
            return Ok(());
        }

        if !self.config.use_link_status_pin {
            self.pmgi_switch(pmgi, PmgiMode::LinkProcessCheckLinkPoll);
            return Ok(());
        }
        match self.channels[channel].link_change {
            LinkChange::LinkOn => self.pmgi_switch(pmgi, PmgiMode::LinkProcessCheckLinkUp),
            LinkChange::LinkOff => {
                self.channels[channel].link_change = LinkChange::None;
                self.pmgi_switch(pmgi, PmgiMode::LinkProcessCheckLinkDown);
            }
            LinkChange::None => self.pmgi_complete_as(pmgi, PmgiMode::LinkProcess),
        }
        Ok(())
    }

    // ========================================================================
    // Link Checks
    // ========================================================================

    fn check_link_poll(&mut self, pmgi: usize, channel: usize) -> Result<(), EtherError> {
        let up = self.pmgi_read_data(pmgi) & status::LINK_UP != 0;
        let now = if up { LinkState::Up } else { LinkState::Down };

        let ch = &mut self.channels[channel];
        if now != ch.previous_link {
            ch.link_change = if up {
                LinkChange::LinkOn
            } else {
                LinkChange::LinkOff
            };
            ch.previous_link = now;
        }

        let change = ch.link_change;
        match change {
            LinkChange::LinkOn => {
                self.prepare_link_up(channel);
                self.pmgi_switch(pmgi, PmgiMode::LinkProcess);
            }
            LinkChange::LinkOff => {
                self.channels[channel].link_change = LinkChange::None;
                self.stop_transfer(channel);
                self.notify(channel, CallbackEvent::LinkOff);
                self.pmgi_complete_as(pmgi, PmgiMode::LinkProcess);
            }
            LinkChange::None => self.pmgi_complete_as(pmgi, PmgiMode::LinkProcess),
        }
        Ok(())
    }

    fn check_link_up(&mut self, pmgi: usize, channel: usize) -> Result<(), EtherError> {
        if !self.config.use_link_status_pin
            || self.pmgi_read_data(pmgi) & status::LINK_UP == 0
        {
            self.sessions[pmgi].mode = PmgiMode::LinkProcess;
            return Err(EtherError::Other);
        }
        self.prepare_link_up(channel);
        self.pmgi_switch(pmgi, PmgiMode::LinkProcess);
        Ok(())
    }

    fn check_link_down(&mut self, pmgi: usize, channel: usize) -> Result<(), EtherError> {
        if !self.config.use_link_status_pin {
            self.sessions[pmgi].mode = PmgiMode::LinkProcess;
            return Err(EtherError::Other);
        }
        if self.pmgi_read_data(pmgi) & status::LINK_UP == 0 {
            self.stop_transfer(channel);
            self.notify(channel, CallbackEvent::LinkOff);
        }
        self.pmgi_complete_as(pmgi, PmgiMode::LinkProcess);
        Ok(())
    }

    // ========================================================================
    // Link Process and Wake-on-LAN
    // ========================================================================

    /// Step 1 of `LinkProcess` and `WakeOnLan`: link up and negotiation
    /// complete, then fetch the partner's abilities.
    fn negotiation_status(
        &mut self,
        pmgi: usize,
        channel: usize,
        retry_on_incomplete: bool,
    ) -> Result<(), EtherError> {
        let bmsr = self.pmgi_read_data(pmgi);
        if bmsr & status::LINK_UP == 0 {
            return Err(EtherError::Other);
        }

        let ch = &mut self.channels[channel];
        ch.local_pause = PauseCaps::from_ability(ch.local_advertisement);
        if bmsr & status::AN_COMPLETE == 0 {
            if retry_on_incomplete {
                ch.transfer_enabled = false;
                ch.link_change = LinkChange::LinkOn;
            }
            debug!("[PHY] ch{}: auto-negotiation incomplete", channel);
            return Err(EtherError::Other);
        }

        self.pmgi_next(pmgi, 2, reg::AN_LINK_PARTNER, 0, PmgiOp::Read);
        Ok(())
    }

    fn link_process_start(&mut self, pmgi: usize, channel: usize) -> Result<(), EtherError> {
        let partner = self.pmgi_read_data(pmgi);
        self.sessions[pmgi].read_data = partner;

        let ch = &mut self.channels[channel];
        ch.partner_pause = PauseCaps::from_ability(partner);
        let Some(link) = LinkParams::from_partner_ability(partner) else {
            ch.transfer_enabled = false;
            ch.link_change = LinkChange::LinkOn;
            return Err(EtherError::Other);
        };

        self.apply_link_params(channel, link);
        self.start_transfer(channel, link);
        self.notify(channel, CallbackEvent::LinkOn);
        self.sessions[pmgi].event = PmgiEvent::Complete;
        Ok(())
    }

    fn wake_on_lan_start(&mut self, pmgi: usize, channel: usize) -> Result<(), EtherError> {
        let partner = self.pmgi_read_data(pmgi);
        self.sessions[pmgi].read_data = partner;
        let link = LinkParams::from_partner_ability(partner).ok_or(EtherError::Other)?;

        self.apply_link_params(channel, link);
        self.start_magic_detection(channel);

        if !self.config.use_link_status_pin {
            self.pmgi_switch(pmgi, PmgiMode::WakeOnLanCheckLink);
            return Ok(());
        }
        if self.link_pin_present(channel) {
            self.sessions[pmgi].event = PmgiEvent::Complete;
            Ok(())
        } else {
            Err(EtherError::Other)
        }
    }
}
