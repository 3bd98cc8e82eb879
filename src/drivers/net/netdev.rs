//! Network Device Abstraction
//!
//! Error type shared by every Ethernet driver operation, and the
//! `NetworkDevice` trait a TCP/IP stack adapter is written against.
//!
//! ## Design Philosophy
//!
//! `NetworkDevice` is the copying, single-frame view of one MAC channel.
//! Drivers keep their zero-copy API for callers that want it; the trait is
//! what `net::device::SmoltcpDevice` needs and nothing more.
//!
//! ## Example Usage
//!
//! ```ignore
//! use etherc::drivers::net::netdev::NetworkDevice;
//!
//! let mut port = ether.port(0)?;
//! if port.is_link_up() {
//!     port.transmit(&frame)?;
//!     let mut buf = [0u8; 1514];
//!     let len = port.receive(&mut buf)?;
//! }
//! ```

use crate::net::ethernet::MacAddress;
use core::fmt;

/// Errors returned by the Ethernet driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherError {
    /// Channel number outside the configured channels
    InvalidChannel,

    /// Missing or empty buffer
    InvalidPointer,

    /// Length or value outside the accepted range
    InvalidData,

    /// Parameter rejected (bad channel in a control command, unknown FSM state)
    InvalidArgument,

    /// The channel's MAC or DMA block is owned by someone else
    ChannelOpen,

    /// Link is down or auto-negotiation has not completed
    LinkNotReady,

    /// Channel is waiting for a magic packet
    MagicPacketActive,

    /// Transmit descriptor still owned by the DMA engine
    TransmitBufferFull,

    /// Filter change attempted while the receiver is enabled
    ReceiveEnabled,

    /// Frame dropped by the multicast filter; the slot was recycled
    MulticastFiltered,

    /// Another PHY operation holds the management bus
    Locked,

    /// PHY did not leave software reset in time
    PhyResetTimeout,

    /// Auto-negotiation failure or any other unclassified error
    Other,
}

impl fmt::Display for EtherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherError::InvalidChannel => write!(f, "Invalid channel"),
            EtherError::InvalidPointer => write!(f, "Invalid buffer"),
            EtherError::InvalidData => write!(f, "Invalid data length"),
            EtherError::InvalidArgument => write!(f, "Invalid argument"),
            EtherError::ChannelOpen => write!(f, "Channel already in use"),
            EtherError::LinkNotReady => write!(f, "Link not ready"),
            EtherError::MagicPacketActive => write!(f, "Magic packet detection active"),
            EtherError::TransmitBufferFull => write!(f, "Transmit buffer full"),
            EtherError::ReceiveEnabled => write!(f, "Receiver enabled"),
            EtherError::MulticastFiltered => write!(f, "Multicast frame filtered"),
            EtherError::Locked => write!(f, "PHY access locked"),
            EtherError::PhyResetTimeout => write!(f, "PHY reset timeout"),
            EtherError::Other => write!(f, "Ethernet error"),
        }
    }
}

/// Copying frame interface of one network channel.
///
/// # Thread Safety
///
/// Implementations are not required to be thread-safe. The Ethernet driver
/// is normally held in a `spin::Mutex` shared with its interrupt handlers;
/// callers lock it around each use of the device.
pub trait NetworkDevice {
    /// MAC address the channel was opened with.
    fn mac_address(&self) -> MacAddress;

    /// Whether the channel may currently move frames.
    fn is_link_up(&self) -> bool;

    /// Whether a transmit slot is free right now.
    fn can_transmit(&self) -> bool;

    /// Transmit one complete Ethernet frame (header + payload, no FCS).
    ///
    /// # Errors
    ///
    /// - `InvalidData` - frame shorter than 60 or longer than 1514 bytes
    /// - `TransmitBufferFull` - no free descriptor, try again
    /// - `LinkNotReady` - link is down
    fn transmit(&mut self, frame: &[u8]) -> Result<(), EtherError>;

    /// Copy the next received frame into `buffer`.
    ///
    /// Returns `Ok(0)` when nothing is pending.
    ///
    /// # Errors
    ///
    /// - `InvalidData` - `buffer` is smaller than the pending frame
    /// - `MulticastFiltered` - a filtered frame was dropped, call again
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, EtherError>;
}
