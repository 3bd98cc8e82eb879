//! PHY management.
//!
//! IEEE 802.3 clause 22 register definitions and the blocking PHY
//! operations (reset, auto-negotiation, link status) used when the PHY is
//! reached through a synchronous [`MiiTransport`]. The non-blocking path
//! issues the same register sequence one access per PMGI interrupt; see
//! `ethernet::renesas::fsm`.
//!
//! # References
//!
//! - IEEE 802.3-2008, Clause 22.2.4 (management registers)
//! - IEEE 802.3-2008, Clause 28.2.1.2 (link code word encoding)

pub mod bitbang;
pub mod pause;

use crate::config::PhyQuirk;
use crate::drivers::net::netdev::EtherError;
use log::{debug, warn};
use pause::PauseCaps;

/// Clause 22 register addresses.
pub mod reg {
    pub const CONTROL: u8 = 0x00;
    pub const STATUS: u8 = 0x01;
    pub const AN_ADVERTISEMENT: u8 = 0x04;
    pub const AN_LINK_PARTNER: u8 = 0x05;
    /// Vendor register (KSZ8041NL "PHY Control 1").
    pub const PHY_CONTROL_1: u8 = 0x1E;
}

/// Control register (0) bits.
pub mod control {
    pub const RESET: u16 = 1 << 15;
    pub const AN_ENABLE: u16 = 1 << 12;
    pub const AN_RESTART: u16 = 1 << 9;
}

/// Status register (1) bits.
pub mod status {
    pub const AN_COMPLETE: u16 = 1 << 5;
    pub const LINK_UP: u16 = 1 << 2;
}

/// Advertisement (4) and link partner ability (5) bits.
pub mod advertise {
    pub const SELECTOR: u16 = 0x0001;
    pub const HALF_10: u16 = 1 << 5;
    pub const FULL_10: u16 = 1 << 6;
    pub const HALF_100: u16 = 1 << 7;
    pub const FULL_100: u16 = 1 << 8;
    pub const PAUSE: u16 = 1 << 10;
    pub const ASM_DIR: u16 = 1 << 11;
}

/// KSZ8041NL PHY Control 1 adjustments applied after reset.
pub(crate) const KSZ8041NL_CLEAR: u16 = 0x8000;
pub(crate) const KSZ8041NL_SET: u16 = 0x4000;

/// Synchronous access to one management bus.
pub trait MiiTransport {
    fn read(&mut self, phy: u8, reg: u8) -> u16;

    fn write(&mut self, phy: u8, reg: u8, value: u16);
}

impl<T: MiiTransport + ?Sized> MiiTransport for &mut T {
    fn read(&mut self, phy: u8, reg: u8) -> u16 {
        (**self).read(phy, reg)
    }

    fn write(&mut self, phy: u8, reg: u8, value: u16) {
        (**self).write(phy, reg, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSpeed {
    Speed10,
    Speed100,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplexMode {
    Half,
    Full,
}

/// Speed and duplex agreed with the link partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParams {
    pub speed: LinkSpeed,
    pub duplex: DuplexMode,
}

impl LinkParams {
    /// Highest common mode from a link partner ability word.
    ///
    /// Checked from lowest to highest so a faster mode overrides a slower
    /// one: 10 half < 10 full < 100 half < 100 full.
    pub fn from_partner_ability(word: u16) -> Option<Self> {
        let modes = [
            (advertise::HALF_10, LinkSpeed::Speed10, DuplexMode::Half),
            (advertise::FULL_10, LinkSpeed::Speed10, DuplexMode::Full),
            (advertise::HALF_100, LinkSpeed::Speed100, DuplexMode::Half),
            (advertise::FULL_100, LinkSpeed::Speed100, DuplexMode::Full),
        ];

        let mut params = None;
        for (bit, speed, duplex) in modes {
            if word & bit != 0 {
                params = Some(LinkParams { speed, duplex });
            }
        }
        params
    }
}

/// Advertisement word: all 10/100 modes, plus PAUSE and ASM_DIR when flow
/// control is wanted.
pub fn local_advertisement(pause: bool) -> u16 {
    let mut word = advertise::SELECTOR
        | advertise::HALF_10
        | advertise::FULL_10
        | advertise::HALF_100
        | advertise::FULL_100;
    if pause {
        word |= advertise::PAUSE | advertise::ASM_DIR;
    }
    word
}

/// Result of a completed auto-negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiation {
    pub link: LinkParams,
    pub local_pause: PauseCaps,
    pub partner_pause: PauseCaps,
}

/// One PHY reached through a synchronous management bus.
pub struct Phy<M: MiiTransport> {
    mii: M,
    address: u8,
    quirk: PhyQuirk,
    reset_polls: u32,
}

impl<M: MiiTransport> Phy<M> {
    pub fn new(mii: M, address: u8, quirk: PhyQuirk, reset_polls: u32) -> Self {
        Phy {
            mii,
            address,
            quirk,
            reset_polls,
        }
    }

    pub fn read(&mut self, reg: u8) -> u16 {
        self.mii.read(self.address, reg)
    }

    pub fn write(&mut self, reg: u8, value: u16) {
        self.mii.write(self.address, reg, value)
    }

    /// Software reset the PHY and wait for the reset bit to clear.
    ///
    /// # Errors
    ///
    /// - `PhyResetTimeout` - reset bit still set after the configured polls
    pub fn init(&mut self) -> Result<(), EtherError> {
        self.write(reg::CONTROL, control::RESET);

        let mut cleared = false;
        for _ in 0..self.reset_polls {
            if self.read(reg::CONTROL) & control::RESET == 0 {
                cleared = true;
                break;
            }
        }
        if !cleared {
            warn!("[PHY] addr {}: reset did not complete", self.address);
            return Err(EtherError::PhyResetTimeout);
        }

        if self.quirk == PhyQuirk::Ksz8041nl {
            let value = self.read(reg::PHY_CONTROL_1);
            self.write(
                reg::PHY_CONTROL_1,
                (value & !KSZ8041NL_CLEAR) | KSZ8041NL_SET,
            );
        }

        debug!("[PHY] addr {}: reset complete", self.address);
        Ok(())
    }

    /// Advertise local abilities and restart auto-negotiation.
    ///
    /// Returns the advertisement word written, which later feeds PAUSE
    /// resolution.
    pub fn start_autonegotiate(&mut self, pause: bool) -> u16 {
        let advertisement = local_advertisement(pause);
        self.write(reg::AN_ADVERTISEMENT, advertisement);
        self.write(reg::CONTROL, control::AN_ENABLE | control::AN_RESTART);
        // Read back so the write has reached the PHY before returning.
        let _ = self.read(reg::AN_ADVERTISEMENT);
        advertisement
    }

    /// Collect the result of auto-negotiation.
    ///
    /// # Errors
    ///
    /// - `LinkNotReady` - auto-negotiation has not completed
    /// - `Other` - partner advertised no 10/100 mode
    pub fn set_autonegotiate(&mut self, advertisement: u16) -> Result<Negotiation, EtherError> {
        // The first read returns latched state.
        let _ = self.read(reg::STATUS);
        let bmsr = self.read(reg::STATUS);
        if bmsr & status::AN_COMPLETE == 0 {
            return Err(EtherError::LinkNotReady);
        }

        let local_pause = PauseCaps::from_ability(advertisement);
        let partner = self.read(reg::AN_LINK_PARTNER);
        let link = LinkParams::from_partner_ability(partner).ok_or(EtherError::Other)?;

        Ok(Negotiation {
            link,
            local_pause,
            partner_pause: PauseCaps::from_ability(partner),
        })
    }

    /// Current link state from the status register.
    ///
    /// # Errors
    ///
    /// - `Other` - link is down
    pub fn link_status(&mut self) -> Result<(), EtherError> {
        // The link bit latches low; the second read shows the current state.
        let _ = self.read(reg::STATUS);
        let bmsr = self.read(reg::STATUS);
        if bmsr & status::LINK_UP != 0 {
            Ok(())
        } else {
            Err(EtherError::Other)
        }
    }
}
