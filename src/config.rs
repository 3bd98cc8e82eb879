//! Driver configuration.
//!
//! Sizes that shape static storage (ring depth, buffer size, channel count)
//! are compile-time constants. Everything a board port changes without
//! touching storage layout lives in [`EtherConfig`].

use crate::drivers::irqchip::icu::irq;

/// Number of ETHERC/EDMAC channel pairs.
pub const CHANNEL_MAX: usize = 2;

/// Number of PHY management interfaces (PMGI channels / MDIO buses).
pub const PHY_ACCESS_CHANNEL_MAX: usize = 2;

/// Receive descriptors per channel.
pub const RX_DESCRIPTORS: usize = 4;

/// Transmit descriptors per channel.
pub const TX_DESCRIPTORS: usize = 4;

/// Size of each frame buffer. Must be a multiple of 32 for the DMA engine.
pub const BUFSIZE: usize = 1536;

/// Shortest frame accepted for transmission (without FCS).
pub const FRAME_LEN_MIN: usize = 60;

/// Longest frame accepted for transmission (without FCS).
pub const FRAME_LEN_MAX: usize = 1514;

/// Receive frame length limit programmed into RFLR (with FCS).
pub const RECEIVE_FRAME_LIMIT: u32 = 1518;

/// MII clock hold count: every PIR write is repeated this many times.
pub const MII_WAIT: u32 = 8;

/// PHY software reset completion bound, in polls of the control register.
pub const PHY_DELAY_RESET: u32 = 0x0002_0000;

/// Spin count after EDMR.SWR before the MAC is usable again.
pub const MAC_RESET_WAIT: u32 = 0x0000_0180;

/// Largest value accepted for the receive padding insert position.
pub const PADDING_POSITION_MAX: u8 = 0x3F;

/// Largest value accepted for the receive padding insert size.
pub const PADDING_SIZE_MAX: u8 = 3;

/// Largest consecutive broadcast frame count accepted by BCFRR.
pub const BROADCAST_FILTER_MAX: u32 = 0xFFFF;

/// How PHY registers are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyAccess {
    /// Bit-banged MII on the ETHERC PIR register; every call completes
    /// before returning.
    Blocking,
    /// PMGI register interface; PHY work runs as a state machine advanced
    /// from the PMGI completion interrupt.
    NonBlocking,
}

/// Vendor specific PHY setup applied after reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyQuirk {
    None,
    /// Micrel KSZ8041NL: PHY control register 0x1E bit 15 cleared, bit 14 set
    /// so the LED pins report link.
    Ksz8041nl,
}

/// Register bases and wiring of one MAC channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    pub edmac_base: usize,
    pub etherc_base: usize,
    /// Address of this channel's PHY on its management bus.
    pub phy_address: u8,
    /// Management bus (PMGI channel, or the ETHERC whose PIR is bit-banged)
    /// used to reach the PHY.
    pub phy_access: usize,
    /// Interrupt controller source for the EDMAC status interrupt.
    pub interrupt: u32,
}

/// Register base, interrupt and timing of one PMGI channel.
#[derive(Debug, Clone, Copy)]
pub struct PmgiConfig {
    pub base: usize,
    pub interrupt: u32,
    /// MDC clock divider (PMGCR.PSMCS, 6 bits).
    pub clock_select: u8,
    /// MDIO hold time (PMGCR.PSMHT, 3 bits).
    pub hold_time: u8,
    /// MDIO capture time (PMGCR.PSMCT, 3 bits).
    pub capture_time: u8,
}

/// Board level driver configuration.
#[derive(Debug, Clone, Copy)]
pub struct EtherConfig {
    pub channels: [ChannelConfig; CHANNEL_MAX],
    pub pmgi: [PmgiConfig; PHY_ACCESS_CHANNEL_MAX],
    pub phy_access: PhyAccess,
    /// The PHY link signal is wired to ET_LINKSTA and raises ECSR.LCHNG.
    pub use_link_status_pin: bool,
    /// PSR.LMON level meaning "link present" (0 or 1).
    pub link_present_level: u32,
    pub phy_quirk: PhyQuirk,
    pub mii_wait: u32,
    /// Control register polls allowed while the PHY is in reset.
    pub phy_reset_retries: u32,
    pub mac_reset_wait: u32,
    /// Polls of EDTRR after a copying write before giving up.
    pub transmit_poll_limit: u32,
    pub interrupt_priority: u8,
    pub pmgi_interrupt_priority: u8,
}

impl Default for EtherConfig {
    fn default() -> Self {
        EtherConfig {
            channels: [
                ChannelConfig {
                    edmac_base: 0x000C_0000,
                    etherc_base: 0x000C_0100,
                    phy_address: 0,
                    phy_access: 0,
                    interrupt: irq::EINT0,
                },
                ChannelConfig {
                    edmac_base: 0x000C_0200,
                    etherc_base: 0x000C_0300,
                    phy_address: 1,
                    phy_access: 0,
                    interrupt: irq::EINT1,
                },
            ],
            pmgi: [
                PmgiConfig {
                    base: 0x000C_5880,
                    interrupt: irq::PMGI0I,
                    clock_select: 0x13,
                    hold_time: 0,
                    capture_time: 1,
                },
                PmgiConfig {
                    base: 0x000C_5900,
                    interrupt: irq::PMGI1I,
                    clock_select: 0x13,
                    hold_time: 0,
                    capture_time: 1,
                },
            ],
            phy_access: PhyAccess::Blocking,
            use_link_status_pin: false,
            link_present_level: 0,
            phy_quirk: PhyQuirk::None,
            mii_wait: MII_WAIT,
            phy_reset_retries: PHY_DELAY_RESET,
            mac_reset_wait: MAC_RESET_WAIT,
            transmit_poll_limit: 0x0010_0000,
            interrupt_priority: 2,
            pmgi_interrupt_priority: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_is_dma_aligned() {
        assert_eq!(BUFSIZE % 32, 0);
        assert!(BUFSIZE >= FRAME_LEN_MAX);
    }

    #[test]
    fn test_default_channels_share_first_bus() {
        let cfg = EtherConfig::default();
        assert_eq!(cfg.channels[0].phy_access, 0);
        assert_eq!(cfg.channels[1].phy_access, 0);
        assert_ne!(cfg.channels[0].phy_address, cfg.channels[1].phy_address);
    }
}
