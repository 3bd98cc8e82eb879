//! ETHERC, EDMAC and PMGI register maps.
//!
//! Offsets follow the RX72N layout normalized to 32-bit registers. Only the
//! registers and bits the driver programs are listed.
//!
//! Reference: RX72N Group User's Manual: Hardware, Sections 32 (ETHERC),
//! 33 (EDMAC) and 34 (PMGI)

use bitflags::bitflags;

/// EDMAC register offsets from `ChannelConfig::edmac_base`.
pub mod edmac {
    pub const EDMR: usize = 0x00; // EDMAC mode
    pub const EDTRR: usize = 0x08; // Transmit request
    pub const EDRRR: usize = 0x10; // Receive request
    pub const TDLAR: usize = 0x18; // Transmit descriptor list start address
    pub const RDLAR: usize = 0x20; // Receive descriptor list start address
    pub const EESR: usize = 0x28; // ETHERC/EDMAC status
    pub const EESIPR: usize = 0x30; // ETHERC/EDMAC status interrupt enable
    pub const TRSCER: usize = 0x38; // Transmit/receive status copy enable
    pub const TFTR: usize = 0x48; // Transmit FIFO threshold
    pub const FDR: usize = 0x50; // FIFO depth
    pub const RMCR: usize = 0x58; // Receive method control
    pub const FCFTR: usize = 0x70; // Flow control start FIFO threshold
    pub const RPADIR: usize = 0x78; // Receive data padding insert
}

/// ETHERC register offsets from `ChannelConfig::etherc_base`.
pub mod etherc {
    pub const ECMR: usize = 0x00; // ETHERC mode
    pub const RFLR: usize = 0x08; // Receive frame maximum length
    pub const ECSR: usize = 0x10; // ETHERC status
    pub const ECSIPR: usize = 0x18; // ETHERC interrupt enable
    pub const PIR: usize = 0x20; // PHY interface (bit-banged MII)
    pub const PSR: usize = 0x28; // PHY status (LINKSTA level)
    pub const IPGR: usize = 0x50; // Inter-packet gap
    pub const APR: usize = 0x54; // Automatic PAUSE frame
    pub const TPAUSER: usize = 0x64; // PAUSE frame retransmit count
    pub const BCFRR: usize = 0x6C; // Broadcast frame receive count
    pub const MAHR: usize = 0xC0; // MAC address high
    pub const MALR: usize = 0xC8; // MAC address low
}

/// PMGI register offsets from `PmgiConfig::base`.
pub mod pmgi {
    pub const PMGCR: usize = 0x00; // Control: timing
    pub const PMGAR: usize = 0x04; // Address: PHY and register
    pub const PMGDR: usize = 0x08; // Data
    pub const PMGCMD: usize = 0x10; // Command: start read/write
}

bitflags! {
    /// ECMR bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ecmr: u32 {
        /// Promiscuous mode
        const PRM = 1 << 0;
        /// Full duplex
        const DM = 1 << 1;
        /// 100 Mbps
        const RTM = 1 << 2;
        const TE = 1 << 5;
        const RE = 1 << 6;
        /// Magic packet detection
        const MPDE = 1 << 9;
        /// Transmit PAUSE frames
        const TXF = 1 << 16;
        /// Honor received PAUSE frames
        const RXF = 1 << 17;
        /// Accept zero-time PAUSE frames
        const ZPF = 1 << 19;
    }
}

bitflags! {
    /// ECSR status bits (write 1 to clear).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ecsr: u32 {
        /// Illegal carrier detected
        const ICD = 1 << 0;
        /// Magic packet detected
        const MPD = 1 << 1;
        /// LINKSTA level changed
        const LCHNG = 1 << 2;
        /// PAUSE retransmit limit reached
        const PSRTO = 1 << 4;
        /// Continuous broadcast frames received
        const BFR = 1 << 5;
    }
}

bitflags! {
    /// ECSIPR interrupt enables, matching `Ecsr`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ecsipr: u32 {
        const ICDIP = 1 << 0;
        const MPDIP = 1 << 1;
        const LCHNGIP = 1 << 2;
        const PSRTOIP = 1 << 4;
        const BFSIPR = 1 << 5;
    }
}

bitflags! {
    /// EESIPR interrupt enables.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Eesipr: u32 {
        /// Frame received
        const FRIP = 1 << 18;
        /// Frame transfer complete
        const TCIP = 1 << 21;
        /// ETHERC status interrupt
        const ECIIP = 1 << 22;
    }
}

/// EESR.ECI: an ECSR bit is pending.
pub const EESR_ECI: u32 = 1 << 22;

/// Every clearable ECSR bit.
pub const ECSR_CLEAR_ALL: u32 = 0x0000_0037;

/// Every clearable EESR bit.
pub const EESR_CLEAR_ALL: u32 = 0x47FF_0F9F;

/// EDMR: software reset.
pub const EDMR_SWR: u32 = 1 << 0;

/// EDMR: little-endian descriptors.
pub const EDMR_DE: u32 = 1 << 6;

/// EDTRR: transmit request.
pub const EDTRR_TR: u32 = 1;

/// EDRRR: receive request.
pub const EDRRR_RR: u32 = 1;

/// PSR: LINKSTA pin level.
pub const PSR_LMON: u32 = 1;

/// EESIPR in magic packet mode: only the ETHERC status interrupt.
pub const EESIPR_MAGIC: u32 = Eesipr::ECIIP.bits();

/// TRSCER: mask RMAF write-back so multicast frames are not flagged.
pub const TRSCER_RMAF_MASKED: u32 = 0x0000_0080;

/// FIFO depth: 2048 bytes each way.
pub const FDR_2048: u32 = 0x0000_0707;

/// RMCR: keep receiving after each frame.
pub const RMCR_RNR: u32 = 1;

/// Inter-packet gap of 96 bit times.
pub const IPGR_96_BIT: u32 = 0x14;

/// Automatic PAUSE time for TXF.
pub const APR_MAX: u32 = 0xFFFF;

/// PMGCR field positions.
pub mod pmgcr {
    pub const CLOCK_SHIFT: u32 = 8;
    pub const CLOCK_MASK: u32 = 0x3F;
    pub const HOLD_SHIFT: u32 = 16;
    pub const HOLD_MASK: u32 = 0x07;
    pub const CAPTURE_SHIFT: u32 = 20;
    pub const CAPTURE_MASK: u32 = 0x07;
}

/// PMGAR field positions.
pub mod pmgar {
    pub const PHY_SHIFT: u32 = 8;
}

/// PMGCMD values.
pub mod pmgcmd {
    pub const READ: u32 = 1;
    pub const WRITE: u32 = 2;
}
