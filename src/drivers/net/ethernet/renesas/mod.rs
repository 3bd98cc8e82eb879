//! Renesas RX ETHERC/EDMAC Ethernet driver.
//!
//! One [`Ether`] value drives every MAC channel on the chip together with
//! the PHY management buses they share. It owns the descriptor rings and
//! frame buffers, so it must be placed in static storage (or otherwise
//! pinned) before the first `open`; the DMA engine keeps their addresses.
//!
//! # Layout
//!
//! - `descriptor` - receive/transmit descriptor rings
//! - `mac` - MAC/DMA reset and configuration, link bring-up
//! - `frame_io` - zero-copy and copying frame API
//! - `link` - open/close, link checking, the periodic link process,
//!   Wake-on-LAN and raw PHY register access
//! - `fsm` - non-blocking PHY access sessions driven by PMGI interrupts
//! - `pmgi` - PMGI register transport
//! - `interrupt` - EDMAC/ETHERC status interrupt decoding
//! - `control` - control commands and channel power bookkeeping
//!
//! # Execution Contexts
//!
//! Foreground code calls the public API; [`Ether::ether_interrupt`] and
//! [`Ether::pmgi_interrupt`] run from the platform's interrupt vectors.
//! Both take `&mut self`, so the platform keeps the driver in a
//! `spin::Mutex` and masks the Ethernet interrupts while foreground code
//! holds it.
//!
//! # References
//!
//! - RX72N Group User's Manual: Hardware, Sections 32-34
//! - IEEE 802.3-2008, Clause 22 and Annex 28B

pub mod control;
pub mod descriptor;
pub mod frame_io;
pub mod fsm;
pub mod interrupt;
pub mod link;
pub mod mac;
pub mod pmgi;
pub mod regs;

use crate::config::{
    CHANNEL_MAX, EtherConfig, PHY_ACCESS_CHANNEL_MAX, RX_DESCRIPTORS, TX_DESCRIPTORS,
};
use crate::drivers::bus::RegisterBus;
use crate::drivers::irqchip::InterruptController;
use crate::drivers::net::netdev::EtherError;
use crate::drivers::net::phy::pause::PauseCaps;
use crate::net::ethernet::MacAddress;
use crate::sync::HardwareLock;
use descriptor::DescriptorRing;
use log::warn;

pub use control::ControlCommand;
pub use fsm::{PmgiEvent, PmgiMode};

/// Link change reported by the interrupt handler or the link poll, not yet
/// acted on by `process_link`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    None,
    LinkOn,
    LinkOff,
}

/// Link state last seen by the polling link process (no LINKSTA pin).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkState {
    Up,
    Down,
}

/// Event reported to the frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackEvent {
    LinkOn,
    LinkOff,
    WakeOnLan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackArgs {
    pub channel: usize,
    pub event: CallbackEvent,
}

/// Raw status snapshot passed to the interrupt callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptArgs {
    pub channel: usize,
    pub ecsr: u32,
    pub eesr: u32,
}

/// Outcome of a non-blocking PHY operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmgiCallbackArgs {
    pub channel: usize,
    pub event: PmgiEvent,
    pub mode: PmgiMode,
    /// Last PHY register value read by the operation.
    pub reg_data: u16,
}

/// User callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Callbacks {
    /// Link up/down and magic packet events, fired from `process_link`.
    pub event: Option<fn(CallbackArgs)>,
    /// Every EDMAC status interrupt, before the driver decodes it.
    pub interrupt: Option<fn(InterruptArgs)>,
    /// Completion of a non-blocking PHY operation.
    pub pmgi: Option<fn(PmgiCallbackArgs)>,
}

/// Per-channel driver state.
pub(crate) struct Channel {
    pub(crate) rx: DescriptorRing<RX_DESCRIPTORS>,
    pub(crate) tx: DescriptorRing<TX_DESCRIPTORS>,
    pub(crate) mac: MacAddress,
    pub(crate) pause: bool,
    pub(crate) transfer_enabled: bool,
    pub(crate) link_change: LinkChange,
    pub(crate) magic_packet_detected: bool,
    pub(crate) previous_link: LinkState,
    pub(crate) promiscuous: bool,
    pub(crate) multicast_filter: bool,
    pub(crate) broadcast_filter: u32,
    pub(crate) padding_position: u8,
    pub(crate) padding_size: u8,
    /// Advertisement word written at open; source of the local PAUSE bits.
    pub(crate) local_advertisement: u16,
    pub(crate) local_pause: PauseCaps,
    pub(crate) partner_pause: PauseCaps,
}

impl Channel {
    fn new() -> Self {
        Channel {
            rx: DescriptorRing::new(),
            tx: DescriptorRing::new(),
            mac: MacAddress::zero(),
            pause: false,
            transfer_enabled: false,
            link_change: LinkChange::None,
            magic_packet_detected: false,
            previous_link: LinkState::Down,
            promiscuous: false,
            multicast_filter: false,
            broadcast_filter: 0,
            padding_position: 0,
            padding_size: 0,
            local_advertisement: 0,
            local_pause: PauseCaps::empty(),
            partner_pause: PauseCaps::empty(),
        }
    }

    fn clear_flags(&mut self) {
        self.transfer_enabled = false;
        self.magic_packet_detected = false;
        self.link_change = LinkChange::None;
    }
}

/// Ethernet driver for every ETHERC/EDMAC channel and PHY management bus.
pub struct Ether<B: RegisterBus, I: InterruptController, L: HardwareLock> {
    pub(crate) bus: B,
    pub(crate) icu: I,
    pub(crate) locks: L,
    pub(crate) config: EtherConfig,
    pub(crate) channels: [Channel; CHANNEL_MAX],
    pub(crate) sessions: [fsm::PhySession; PHY_ACCESS_CHANNEL_MAX],
    pub(crate) callbacks: Callbacks,
    /// `[phy access channel][mac channel]`: MAC channels powered on that
    /// use (or are) this management bus.
    pub(crate) power: [[bool; CHANNEL_MAX]; PHY_ACCESS_CHANNEL_MAX],
}

impl<B: RegisterBus, I: InterruptController, L: HardwareLock> Ether<B, I, L> {
    pub fn new(bus: B, icu: I, locks: L, config: EtherConfig) -> Self {
        Ether {
            bus,
            icu,
            locks,
            config,
            channels: core::array::from_fn(|_| Channel::new()),
            sessions: core::array::from_fn(|_| fsm::PhySession::new()),
            callbacks: Callbacks::default(),
            power: [[false; CHANNEL_MAX]; PHY_ACCESS_CHANNEL_MAX],
        }
    }

    pub fn config(&self) -> &EtherConfig {
        &self.config
    }

    /// Whether frames may currently be moved on `channel`.
    pub fn is_transfer_enabled(&self, channel: usize) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|ch| ch.transfer_enabled)
    }

    /// Pending link change flag of `channel`.
    pub fn link_change(&self, channel: usize) -> Option<LinkChange> {
        self.channels.get(channel).map(|ch| ch.link_change)
    }

    /// MAC address `channel` was last opened with.
    pub fn mac_address(&self, channel: usize) -> Option<MacAddress> {
        self.channels.get(channel).map(|ch| ch.mac)
    }

    pub(crate) fn check_channel(channel: usize) -> Result<(), EtherError> {
        if channel < CHANNEL_MAX {
            Ok(())
        } else {
            Err(EtherError::InvalidChannel)
        }
    }

    /// Management bus serving `channel`'s PHY.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` - configured bus index is out of range
    pub(crate) fn phy_bus(&self, channel: usize) -> Result<usize, EtherError> {
        let bus = self.config.channels[channel].phy_access;
        if bus < PHY_ACCESS_CHANNEL_MAX {
            Ok(bus)
        } else {
            warn!("[ETHERC] ch{}: no management bus {}", channel, bus);
            Err(EtherError::InvalidArgument)
        }
    }

    // ========================================================================
    // Register Access
    // ========================================================================

    pub(crate) fn edmac_read(&self, channel: usize, offset: usize) -> u32 {
        self.bus
            .read32(self.config.channels[channel].edmac_base + offset)
    }

    pub(crate) fn edmac_write(&self, channel: usize, offset: usize, value: u32) {
        self.bus
            .write32(self.config.channels[channel].edmac_base + offset, value)
    }

    pub(crate) fn edmac_modify<F: FnOnce(u32) -> u32>(&self, channel: usize, offset: usize, f: F) {
        self.bus
            .modify32(self.config.channels[channel].edmac_base + offset, f)
    }

    pub(crate) fn etherc_read(&self, channel: usize, offset: usize) -> u32 {
        self.bus
            .read32(self.config.channels[channel].etherc_base + offset)
    }

    pub(crate) fn etherc_write(&self, channel: usize, offset: usize, value: u32) {
        self.bus
            .write32(self.config.channels[channel].etherc_base + offset, value)
    }

    pub(crate) fn etherc_modify<F: FnOnce(u32) -> u32>(
        &self,
        channel: usize,
        offset: usize,
        f: F,
    ) {
        self.bus
            .modify32(self.config.channels[channel].etherc_base + offset, f)
    }

    pub(crate) fn ecmr(&self, channel: usize) -> regs::Ecmr {
        regs::Ecmr::from_bits_retain(self.etherc_read(channel, regs::etherc::ECMR))
    }

    pub(crate) fn ecmr_set(&self, channel: usize, bits: regs::Ecmr) {
        self.etherc_modify(channel, regs::etherc::ECMR, |v| v | bits.bits());
    }

    pub(crate) fn ecmr_clear(&self, channel: usize, bits: regs::Ecmr) {
        self.etherc_modify(channel, regs::etherc::ECMR, |v| v & !bits.bits());
    }

    /// LINKSTA reports a link partner.
    pub(crate) fn link_pin_present(&self, channel: usize) -> bool {
        self.etherc_read(channel, regs::etherc::PSR) & regs::PSR_LMON
            == self.config.link_present_level
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    pub(crate) fn notify(&self, channel: usize, event: CallbackEvent) {
        if let Some(callback) = self.callbacks.event {
            callback(CallbackArgs { channel, event });
        }
    }
}
