//! EDMAC status interrupt.
//!
//! Only ETHERC events are decoded here: a LINKSTA level change and a
//! received magic packet. Both are recorded as flags for `process_link`;
//! nothing else is done in interrupt context. The raw status is offered to
//! the interrupt callback first.

use super::regs::{Ecsr, edmac, etherc};
use super::{Ether, InterruptArgs, LinkChange, regs};
use crate::drivers::bus::RegisterBus;
use crate::drivers::irqchip::InterruptController;
use crate::sync::HardwareLock;
use log::trace;

impl<B: RegisterBus, I: InterruptController, L: HardwareLock> Ether<B, I, L> {
    /// EDMAC status interrupt (EINTn) for `channel`.
    pub fn ether_interrupt(&mut self, channel: usize) {
        if Self::check_channel(channel).is_err() {
            return;
        }

        let ecsr = self.etherc_read(channel, etherc::ECSR);
        let eesr = self.edmac_read(channel, edmac::EESR);
        trace!(
            "[ETHERC] ch{}: irq ecsr={:#x} eesr={:#x}",
            channel, ecsr, eesr
        );

        if let Some(callback) = self.callbacks.interrupt {
            callback(InterruptArgs {
                channel,
                ecsr,
                eesr,
            });
        }

        if eesr & regs::EESR_ECI != 0 {
            let status = Ecsr::from_bits_truncate(ecsr);

            if self.config.use_link_status_pin && status.contains(Ecsr::LCHNG) {
                let change = if self.link_pin_present(channel) {
                    LinkChange::LinkOn
                } else {
                    LinkChange::LinkOff
                };
                trace!("[ETHERC] ch{}: LINKSTA {:?}", channel, change);
                self.channels[channel].link_change = change;
            }
            if status.contains(Ecsr::MPD) {
                self.channels[channel].magic_packet_detected = true;
            }

            // Clear exactly the bits handled above.
            self.etherc_write(channel, etherc::ECSR, ecsr);
        }

        self.edmac_write(channel, edmac::EESR, eesr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EtherConfig;
    use crate::sync::HardwareLocks;
    use crate::testing::{self, SimBus, SimIcu};

    const FRAME_RECEIVED: u32 = 1 << 18;

    fn pin_config() -> EtherConfig {
        EtherConfig {
            use_link_status_pin: true,
            ..EtherConfig::default()
        }
    }

    fn raise(bus: &SimBus, config: &EtherConfig, channel: usize, ecsr: Ecsr, eesr: u32) {
        bus.poke(config.channels[channel].etherc_base + etherc::ECSR, ecsr.bits());
        bus.poke(config.channels[channel].edmac_base + edmac::EESR, eesr);
    }

    #[test]
    fn test_status_written_back_to_clear() {
        let config = pin_config();
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);

        raise(&bus, &config, 1, Ecsr::LCHNG | Ecsr::PSRTO, regs::EESR_ECI | FRAME_RECEIVED);
        ether.ether_interrupt(1);

        let ecsr = config.channels[1].etherc_base + etherc::ECSR;
        let eesr = config.channels[1].edmac_base + edmac::EESR;
        assert_eq!(bus.writes(ecsr), vec![(Ecsr::LCHNG | Ecsr::PSRTO).bits()]);
        assert_eq!(bus.writes(eesr), vec![regs::EESR_ECI | FRAME_RECEIVED]);
        assert_eq!(bus.peek(ecsr), 0);
        assert_eq!(bus.peek(eesr), 0);
    }

    #[test]
    fn test_ecsr_untouched_without_eci() {
        let config = pin_config();
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);

        raise(&bus, &config, 0, Ecsr::LCHNG, FRAME_RECEIVED);
        ether.ether_interrupt(0);

        assert_eq!(bus.write_count(config.channels[0].etherc_base + etherc::ECSR), 0);
        assert_eq!(ether.link_change(0), Some(LinkChange::None));
    }

    #[test]
    fn test_link_change_follows_pin_level() {
        let config = pin_config();
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);

        raise(&bus, &config, 0, Ecsr::LCHNG, regs::EESR_ECI);
        ether.ether_interrupt(0);
        assert_eq!(ether.link_change(0), Some(LinkChange::LinkOn));

        bus.poke(config.channels[0].etherc_base + etherc::PSR, regs::PSR_LMON);
        raise(&bus, &config, 0, Ecsr::LCHNG, regs::EESR_ECI);
        ether.ether_interrupt(0);
        assert_eq!(ether.link_change(0), Some(LinkChange::LinkOff));
    }

    #[test]
    fn test_lchng_ignored_without_pin() {
        let config = EtherConfig::default();
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);

        raise(&bus, &config, 0, Ecsr::LCHNG | Ecsr::MPD, regs::EESR_ECI);
        ether.ether_interrupt(0);

        assert_eq!(ether.link_change(0), Some(LinkChange::None));
        assert!(ether.channels[0].magic_packet_detected);
    }

    #[test]
    fn test_callback_sees_raw_status() {
        let config = EtherConfig::default();
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);
        ether.callbacks = testing::recording_callbacks();

        raise(&bus, &config, 1, Ecsr::ICD, regs::EESR_ECI | FRAME_RECEIVED);
        ether.ether_interrupt(1);
        ether.ether_interrupt(5);

        assert_eq!(
            testing::take_interrupts(),
            vec![InterruptArgs {
                channel: 1,
                ecsr: Ecsr::ICD.bits(),
                eesr: regs::EESR_ECI | FRAME_RECEIVED,
            }]
        );
    }
}
