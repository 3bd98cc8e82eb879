//! Host-side simulation of the Ethernet peripheral block for unit tests.
//!
//! [`SimBus`] is a sparse register file with just enough device behavior to
//! drive the driver end to end: self-clearing and write-one-to-clear bits,
//! an MDIO slave decoding bit-banged PIR frames, and PMGI channels that
//! execute commands against the same set of simulated PHYs.

use crate::config::EtherConfig;
use crate::drivers::bus::RegisterBus;
use crate::drivers::irqchip::InterruptController;
use crate::drivers::net::ethernet::renesas::regs::{self, edmac, etherc, pmgi};
use crate::drivers::net::phy::bitbang::pir;
use crate::drivers::net::phy::{control, reg, status};
use crate::{CallbackArgs, Callbacks, InterruptArgs, PmgiCallbackArgs};
use std::cell::RefCell;
use std::collections::HashMap;

// ============================================================================
// PHY model
// ============================================================================

/// Clause 22 PHY with a reset sequence and auto-negotiation.
///
/// STATUS.LINK_UP latches low: after [`PhyModel::set_link`] drops the link,
/// the next STATUS read reports link down even if it has come back since.
#[derive(Debug, Clone)]
pub struct PhyModel {
    pub regs: [u16; 32],
    /// Control register reads that still show RESET after a reset write.
    pub reset_polls: u32,
    /// Reset never completes.
    pub reset_stuck: bool,
    link_up: bool,
    /// Link partner ability word.
    pub partner: u16,
    resetting: Option<u32>,
    an_restarted: bool,
    link_latched_low: bool,
}

impl PhyModel {
    pub fn new() -> Self {
        PhyModel {
            regs: [0; 32],
            reset_polls: 0,
            reset_stuck: false,
            link_up: false,
            partner: 0,
            resetting: None,
            an_restarted: false,
            link_latched_low: false,
        }
    }

    pub fn read(&mut self, r: u8) -> u16 {
        match r {
            reg::CONTROL => {
                if let Some(remaining) = self.resetting {
                    if self.reset_stuck || remaining > 0 {
                        self.resetting = Some(remaining.saturating_sub(1));
                        return self.regs[0] | control::RESET;
                    }
                    self.resetting = None;
                }
                self.regs[0]
            }
            reg::STATUS => {
                let mut value = self.regs[1];
                let latched = core::mem::take(&mut self.link_latched_low);
                if self.link_up && !latched {
                    value |= status::LINK_UP;
                    if self.an_restarted {
                        value |= status::AN_COMPLETE;
                    }
                }
                value
            }
            reg::AN_LINK_PARTNER => self.partner,
            _ => self.regs[usize::from(r & 0x1F)],
        }
    }

    /// Change the link level as the wire would.
    pub fn set_link(&mut self, up: bool) {
        if self.link_up && !up {
            self.link_latched_low = true;
        }
        self.link_up = up;
    }

    pub fn write(&mut self, r: u8, value: u16) {
        if r == reg::CONTROL {
            if value & control::RESET != 0 {
                self.resetting = Some(self.reset_polls);
                self.an_restarted = false;
            }
            if value & control::AN_RESTART != 0 {
                self.an_restarted = true;
            }
            self.regs[0] = value & !(control::RESET | control::AN_RESTART);
        } else {
            self.regs[usize::from(r & 0x1F)] = value;
        }
    }
}

impl Default for PhyModel {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MDIO slave
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Mdio {
    Preamble { ones: u32 },
    Header { bits: u32, word: u16 },
    ReadData { skip: u32, left: u32, value: u16 },
    WriteData { phy: u8, reg: u8, bits: u32, word: u32 },
}

#[derive(Debug, Clone, Copy)]
struct MdioSlave {
    state: Mdio,
    mdc: bool,
    mdi: bool,
}

impl MdioSlave {
    fn new() -> Self {
        MdioSlave {
            state: Mdio::Preamble { ones: 0 },
            mdc: false,
            mdi: false,
        }
    }
}

// ============================================================================
// Simulated bus
// ============================================================================

#[derive(Default)]
struct SimState {
    regs: HashMap<usize, u32>,
    log: Vec<(usize, u32)>,
    self_clearing: HashMap<usize, u32>,
    write_one_to_clear: Vec<usize>,
    /// Trigger register -> (bits, registers zeroed when they are written).
    resets: HashMap<usize, (u32, Vec<usize>)>,
    mdio: HashMap<usize, MdioSlave>,
    /// PMGI base -> completion pending.
    pmgi: HashMap<usize, bool>,
    phys: Vec<PhyModel>,
}

/// Simulated register space.
pub struct SimBus {
    state: RefCell<SimState>,
}

impl SimBus {
    pub fn new() -> Self {
        SimBus {
            state: RefCell::new(SimState {
                phys: vec![PhyModel::new(); 32],
                ..SimState::default()
            }),
        }
    }

    /// Bus with every channel and PMGI block of `config` modelled.
    pub fn for_config(config: &EtherConfig) -> Self {
        let bus = Self::new();
        for ch in config.channels.iter() {
            bus.self_clearing(ch.edmac_base + edmac::EDMR, regs::EDMR_SWR);
            bus.reset_on(
                ch.edmac_base + edmac::EDMR,
                regs::EDMR_SWR,
                vec![
                    ch.etherc_base + etherc::ECMR,
                    ch.etherc_base + etherc::ECSIPR,
                    ch.edmac_base + edmac::EESIPR,
                    ch.edmac_base + edmac::EDRRR,
                ],
            );
            bus.self_clearing(ch.edmac_base + edmac::EDTRR, regs::EDTRR_TR);
            bus.write_one_to_clear(ch.edmac_base + edmac::EESR);
            bus.write_one_to_clear(ch.etherc_base + etherc::ECSR);
            bus.attach_mdio(ch.etherc_base + etherc::PIR);
        }
        for p in config.pmgi.iter() {
            bus.attach_pmgi(p.base);
        }
        bus
    }

    /// Bits of `addr` that read back as zero right after being written.
    pub fn self_clearing(&self, addr: usize, mask: u32) {
        self.state.borrow_mut().self_clearing.insert(addr, mask);
    }

    /// Writing any of `mask` to `trigger` zeroes `targets`.
    pub fn reset_on(&self, trigger: usize, mask: u32, targets: Vec<usize>) {
        self.state
            .borrow_mut()
            .resets
            .insert(trigger, (mask, targets));
    }

    /// Make `addr` hold written bits (undo `self_clearing`).
    pub fn stall(&self, addr: usize) {
        self.state.borrow_mut().self_clearing.remove(&addr);
    }

    pub fn write_one_to_clear(&self, addr: usize) {
        self.state.borrow_mut().write_one_to_clear.push(addr);
    }

    /// Decode MDIO frames bit-banged on the PIR register at `pir_addr`.
    pub fn attach_mdio(&self, pir_addr: usize) {
        self.state
            .borrow_mut()
            .mdio
            .insert(pir_addr, MdioSlave::new());
    }

    pub fn attach_pmgi(&self, base: usize) {
        self.state.borrow_mut().pmgi.insert(base, false);
    }

    /// Consume the completion of the last PMGI command on `base`.
    pub fn take_pmgi_pending(&self, base: usize) -> bool {
        self.state
            .borrow_mut()
            .pmgi
            .get_mut(&base)
            .is_some_and(|pending| core::mem::replace(pending, false))
    }

    pub fn peek(&self, addr: usize) -> u32 {
        self.state.borrow().regs.get(&addr).copied().unwrap_or(0)
    }

    /// Set a register as the device would, without logging a write.
    pub fn poke(&self, addr: usize, value: u32) {
        self.state.borrow_mut().regs.insert(addr, value);
    }

    pub fn write_count(&self, addr: usize) -> usize {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|(a, _)| *a == addr)
            .count()
    }

    pub fn total_writes(&self) -> usize {
        self.state.borrow().log.len()
    }

    /// Every value written to `addr`, oldest first.
    pub fn writes(&self, addr: usize) -> Vec<u32> {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn phy(&self, addr: u8) -> PhyModel {
        self.state.borrow().phys[usize::from(addr & 0x1F)].clone()
    }

    pub fn phy_mut<F: FnOnce(&mut PhyModel)>(&self, addr: u8, f: F) {
        f(&mut self.state.borrow_mut().phys[usize::from(addr & 0x1F)])
    }
}

impl SimState {
    fn mdio_clock(&mut self, addr: usize, value: u32) {
        let Some(mut slave) = self.mdio.get(&addr).copied() else {
            return;
        };
        let mdc = value & pir::MDC != 0;
        let rising = mdc && !slave.mdc;
        slave.mdc = mdc;

        if rising {
            if value & pir::MMD != 0 {
                self.mdio_driven(&mut slave, value & pir::MDO != 0);
            } else {
                self.mdio_released(&mut slave);
            }
        }
        self.mdio.insert(addr, slave);
    }

    fn mdio_driven(&mut self, slave: &mut MdioSlave, bit: bool) {
        slave.state = match slave.state {
            Mdio::Preamble { ones } if bit => Mdio::Preamble { ones: ones + 1 },
            Mdio::Preamble { ones } if ones >= 32 => Mdio::Header { bits: 1, word: 0 },
            Mdio::Preamble { .. } => Mdio::Preamble { ones: 0 },
            Mdio::Header { bits, word } => {
                let word = (word << 1) | u16::from(bit);
                if bits + 1 < 14 {
                    Mdio::Header {
                        bits: bits + 1,
                        word,
                    }
                } else {
                    let op = (word >> 10) & 0b11;
                    let phy = ((word >> 5) & 0x1F) as u8;
                    let r = (word & 0x1F) as u8;
                    if op == 0b10 {
                        let value = self.phys[usize::from(phy)].read(r);
                        Mdio::ReadData {
                            skip: 2,
                            left: 16,
                            value,
                        }
                    } else {
                        Mdio::WriteData {
                            phy,
                            reg: r,
                            bits: 0,
                            word: 0,
                        }
                    }
                }
            }
            Mdio::WriteData {
                phy,
                reg: r,
                bits,
                word,
            } => {
                let word = (word << 1) | u32::from(bit);
                if bits + 1 < 18 {
                    Mdio::WriteData {
                        phy,
                        reg: r,
                        bits: bits + 1,
                        word,
                    }
                } else {
                    self.phys[usize::from(phy)].write(r, (word & 0xFFFF) as u16);
                    Mdio::Preamble { ones: 0 }
                }
            }
            other => other,
        };
    }

    fn mdio_released(&mut self, slave: &mut MdioSlave) {
        if let Mdio::ReadData { skip, left, value } = slave.state {
            if skip > 0 {
                slave.mdi = false;
                slave.state = Mdio::ReadData {
                    skip: skip - 1,
                    left,
                    value,
                };
            } else if left > 0 {
                slave.mdi = value & (1 << (left - 1)) != 0;
                slave.state = if left == 1 {
                    Mdio::Preamble { ones: 0 }
                } else {
                    Mdio::ReadData {
                        skip: 0,
                        left: left - 1,
                        value,
                    }
                };
            }
        } else {
            slave.mdi = false;
        }
    }

    fn pmgi_command(&mut self, base: usize, command: u32) {
        let address = self.regs.get(&(base + pmgi::PMGAR)).copied().unwrap_or(0);
        let phy = ((address >> regs::pmgar::PHY_SHIFT) & 0x1F) as usize;
        let r = (address & 0x1F) as u8;
        if command == regs::pmgcmd::READ {
            let value = self.phys[phy].read(r);
            self.regs.insert(base + pmgi::PMGDR, u32::from(value));
        } else if command == regs::pmgcmd::WRITE {
            let value = self.regs.get(&(base + pmgi::PMGDR)).copied().unwrap_or(0);
            self.phys[phy].write(r, (value & 0xFFFF) as u16);
        }
        self.pmgi.insert(base, true);
    }
}

impl RegisterBus for SimBus {
    fn read32(&self, addr: usize) -> u32 {
        let state = self.state.borrow();
        let value = state.regs.get(&addr).copied().unwrap_or(0);
        match state.mdio.get(&addr) {
            Some(slave) if slave.mdi => value | pir::MDI,
            _ => value,
        }
    }

    fn write32(&self, addr: usize, value: u32) {
        let mut state = self.state.borrow_mut();
        state.log.push((addr, value));

        let stored = if state.write_one_to_clear.contains(&addr) {
            state.regs.get(&addr).copied().unwrap_or(0) & !value
        } else if let Some(mask) = state.self_clearing.get(&addr) {
            value & !mask
        } else {
            value
        };
        state.regs.insert(addr, stored);

        let targets = match state.resets.get(&addr) {
            Some((mask, targets)) if value & mask != 0 => targets.clone(),
            _ => Vec::new(),
        };
        for target in targets {
            state.regs.insert(target, 0);
        }

        state.mdio_clock(addr, value);
        let base = addr.wrapping_sub(pmgi::PMGCMD);
        if state.pmgi.contains_key(&base) {
            state.pmgi_command(base, value);
        }
    }
}

// ============================================================================
// Interrupt controller
// ============================================================================

/// Records which sources are unmasked.
#[derive(Default)]
pub struct SimIcu {
    enabled: RefCell<HashMap<u32, u8>>,
}

impl SimIcu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, source: u32) -> bool {
        self.enabled.borrow().contains_key(&source)
    }
}

impl InterruptController for SimIcu {
    fn enable(&self, source: u32, priority: u8) {
        self.enabled.borrow_mut().insert(source, priority);
    }

    fn disable(&self, source: u32) {
        self.enabled.borrow_mut().remove(&source);
    }
}

// ============================================================================
// Callback recording
// ============================================================================

thread_local! {
    static EVENTS: RefCell<Vec<CallbackArgs>> = const { RefCell::new(Vec::new()) };
    static INTERRUPTS: RefCell<Vec<InterruptArgs>> = const { RefCell::new(Vec::new()) };
    static PMGI_EVENTS: RefCell<Vec<PmgiCallbackArgs>> = const { RefCell::new(Vec::new()) };
}

fn record_event(args: CallbackArgs) {
    EVENTS.with(|events| events.borrow_mut().push(args));
}

fn record_interrupt(args: InterruptArgs) {
    INTERRUPTS.with(|events| events.borrow_mut().push(args));
}

fn record_pmgi(args: PmgiCallbackArgs) {
    PMGI_EVENTS.with(|events| events.borrow_mut().push(args));
}

/// Callbacks that append to this thread's recorders.
pub fn recording_callbacks() -> Callbacks {
    Callbacks {
        event: Some(record_event),
        interrupt: Some(record_interrupt),
        pmgi: Some(record_pmgi),
    }
}

pub fn take_events() -> Vec<CallbackArgs> {
    EVENTS.with(|events| core::mem::take(&mut *events.borrow_mut()))
}

pub fn take_interrupts() -> Vec<InterruptArgs> {
    INTERRUPTS.with(|events| core::mem::take(&mut *events.borrow_mut()))
}

pub fn take_pmgi_events() -> Vec<PmgiCallbackArgs> {
    PMGI_EVENTS.with(|events| core::mem::take(&mut *events.borrow_mut()))
}
