//! Ethernet MAC/DMA and PHY driver core.
//!
//! Drives an on-chip Ethernet controller (ETHERC MAC + EDMAC DMA engine) and
//! the PHY transceiver attached to it:
//! - descriptor rings handing frame buffers to the DMA engine without copying
//! - PHY management over a bit-banged MII bus (blocking) or over the PMGI
//!   register interface, one register access per completion interrupt
//!   (non-blocking)
//! - IEEE 802.3 Annex 28B PAUSE resolution
//! - interrupt status decoding feeding the periodic link process
//!
//! The crate is `no_std` and allocation free. All hardware access goes
//! through the [`drivers::bus::RegisterBus`] trait, interrupt routing through
//! [`drivers::irqchip::InterruptController`], and channel ownership through
//! [`sync::HardwareLock`], so the same code runs against MMIO on target and
//! against a simulated bus in host tests.
//!
//! ## Example
//!
//! ```ignore
//! use etherc::config::EtherConfig;
//! use etherc::drivers::bus::Mmio;
//! use etherc::drivers::irqchip::icu::ICU;
//! use etherc::sync::HARDWARE_LOCKS;
//! use etherc::{ControlCommand, Ether};
//!
//! static ETHER: spin::Mutex<Option<Ether<Mmio, &'static _, &'static _>>> = ...;
//!
//! let mut ether = Ether::new(Mmio, &*ICU, &HARDWARE_LOCKS, EtherConfig::default());
//! ether.control(ControlCommand::PowerOn(0))?;
//! ether.open(0, mac, false)?;
//! loop {
//!     ether.process_link(0);
//!     if let Ok(Some(frame)) = ether.read_zero_copy(0) { /* ... */ }
//! }
//! ```

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod drivers;
pub mod net;
pub mod sync;

#[cfg(test)]
mod testing;

pub use drivers::net::ethernet::renesas::{
    CallbackArgs, CallbackEvent, Callbacks, ControlCommand, Ether, InterruptArgs, LinkChange,
    PmgiCallbackArgs, PmgiEvent, PmgiMode,
};
pub use drivers::net::netdev::{EtherError, NetworkDevice};
pub use net::ethernet::MacAddress;
pub use net::{Port, SmoltcpDevice};
