//! PAUSE capability resolution.
//!
//! Reference: IEEE 802.3-2008, Annex 28B.3, Table 28B-3
//!
//! Local and partner capabilities are packed into a 4-bit key
//! `(local << 2) | partner` and matched against an ordered table of
//! (mask, value) rows. The first match decides both directions.

use bitflags::bitflags;

use super::advertise;

bitflags! {
    /// PAUSE bits of an auto-negotiation ability word, in Annex 28B order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PauseCaps: u8 {
        /// Asymmetric PAUSE direction (ability bit 11)
        const ASYM_DIR = 1 << 0;
        /// Symmetric PAUSE (ability bit 10)
        const PAUSE = 1 << 1;
    }
}

impl PauseCaps {
    /// Extract the PAUSE bits from an advertisement or link partner word.
    pub fn from_ability(word: u16) -> Self {
        let mut caps = PauseCaps::empty();
        if word & advertise::PAUSE != 0 {
            caps |= PauseCaps::PAUSE;
        }
        if word & advertise::ASM_DIR != 0 {
            caps |= PauseCaps::ASYM_DIR;
        }
        caps
    }
}

/// Which directions of PAUSE flow control to enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PauseResolution {
    /// Send PAUSE frames (ECMR.TXF)
    pub transmit: bool,
    /// Honor received PAUSE frames (ECMR.RXF)
    pub receive: bool,
}

struct Row {
    mask: u8,
    value: u8,
    resolution: PauseResolution,
}

const fn row(mask: u8, value: u8, transmit: bool, receive: bool) -> Row {
    Row {
        mask,
        value,
        resolution: PauseResolution { transmit, receive },
    }
}

/// Table 28B-3 as ordered (mask, value) rows. Key bits:
/// 3 = local PAUSE, 2 = local ASM_DIR, 1 = partner PAUSE, 0 = partner ASM_DIR.
const RESOLUTION_TABLE: [Row; 8] = [
    row(0b1100, 0b0000, false, false),
    row(0b1110, 0b0100, false, false),
    row(0b1111, 0b0110, false, false),
    row(0b1111, 0b0111, true, false),
    row(0b1110, 0b1000, false, false),
    row(0b1010, 0b1010, true, true),
    row(0b1111, 0b1100, false, false),
    row(0b1111, 0b1101, false, true),
];

/// Resolve PAUSE enables from local and partner capabilities.
pub fn resolve(local: PauseCaps, partner: PauseCaps) -> PauseResolution {
    let key = ((local.bits() & 0b11) << 2) | (partner.bits() & 0b11);

    RESOLUTION_TABLE
        .iter()
        .find(|row| key & row.mask == row.value)
        .map(|row| row.resolution)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: PauseCaps = PauseCaps::empty();
    const ASYM: PauseCaps = PauseCaps::ASYM_DIR;
    const SYM: PauseCaps = PauseCaps::PAUSE;
    const BOTH: PauseCaps = PauseCaps::all();

    fn res(transmit: bool, receive: bool) -> PauseResolution {
        PauseResolution { transmit, receive }
    }

    #[test]
    fn test_resolution_covers_all_pairs() {
        // (local, partner, expected) for every combination.
        let expected = [
            (NONE, NONE, res(false, false)),
            (NONE, ASYM, res(false, false)),
            (NONE, SYM, res(false, false)),
            (NONE, BOTH, res(false, false)),
            (ASYM, NONE, res(false, false)),
            (ASYM, ASYM, res(false, false)),
            (ASYM, SYM, res(false, false)),
            (ASYM, BOTH, res(true, false)),
            (SYM, NONE, res(false, false)),
            (SYM, ASYM, res(false, false)),
            (SYM, SYM, res(true, true)),
            (SYM, BOTH, res(true, true)),
            (BOTH, NONE, res(false, false)),
            (BOTH, ASYM, res(false, true)),
            (BOTH, SYM, res(true, true)),
            (BOTH, BOTH, res(true, true)),
        ];

        for (local, partner, want) in expected {
            assert_eq!(resolve(local, partner), want, "local={local:?} partner={partner:?}");
        }
    }

    #[test]
    fn test_asymmetric_rows_differ_from_naive_logic() {
        // Local asymmetric only, partner both: we may send, never honor.
        assert_eq!(resolve(ASYM, BOTH), res(true, false));
        // Local both, partner asymmetric only: we honor, never send.
        assert_eq!(resolve(BOTH, ASYM), res(false, true));
        // Local asymmetric only, partner symmetric only: nothing.
        assert_eq!(resolve(ASYM, SYM), res(false, false));
    }

    #[test]
    fn test_caps_from_ability_word() {
        assert_eq!(PauseCaps::from_ability(0x0C01), BOTH);
        assert_eq!(PauseCaps::from_ability(0x0401), SYM);
        assert_eq!(PauseCaps::from_ability(0x0801), ASYM);
        assert_eq!(PauseCaps::from_ability(0x01E1), NONE);
    }
}
