//! Control commands and channel power bookkeeping.
//!
//! A MAC channel must be powered on before it is opened. Powering on takes
//! the hardware locks of its ETHERC and EDMAC blocks; when the channel
//! reaches its PHY through another channel's management pins, that
//! channel's blocks are claimed as well for as long as any user of the bus
//! remains powered.

use super::{Callbacks, Ether, InterruptArgs, PmgiCallbackArgs};
use super::regs::Ecmr;
use crate::config::{BROADCAST_FILTER_MAX, CHANNEL_MAX, PADDING_POSITION_MAX, PADDING_SIZE_MAX};
use crate::drivers::bus::RegisterBus;
use crate::drivers::irqchip::InterruptController;
use crate::drivers::net::netdev::EtherError;
use crate::sync::{HardwareLock, LockResource};
use log::{debug, info};

/// Driver settings changed through [`Ether::control`].
#[derive(Debug, Clone, Copy)]
pub enum ControlCommand {
    /// Install callbacks. Fields left `None` keep their current value.
    SetCallback(Callbacks),
    /// Accept every frame; takes effect at the next link up.
    SetPromiscuous { channel: usize, on: bool },
    /// Raw status interrupt hook. `None` is rejected.
    SetInterruptHandler(Option<fn(InterruptArgs)>),
    PowerOn(usize),
    PowerOff(usize),
    /// Drop received multicast frames. Receive must be disabled.
    MulticastFilter { channel: usize, on: bool },
    /// Consecutive broadcast frames accepted before the rest are dropped
    /// (0 disables the filter). Receive must be disabled.
    BroadcastFilter { channel: usize, count: u32 },
    /// Insert `size` bytes of padding at byte `position` of each received
    /// frame.
    ReceivePadding { channel: usize, position: u8, size: u8 },
    /// Completion hook for non-blocking PHY access. `None` is ignored.
    SetPmgiCallback(Option<fn(PmgiCallbackArgs)>),
}

impl<B: RegisterBus, I: InterruptController, L: HardwareLock> Ether<B, I, L> {
    /// Apply a control command.
    ///
    /// # Errors
    ///
    /// - `InvalidChannel` - bad channel for `SetPromiscuous`
    /// - `InvalidArgument` - bad channel or value for the other commands
    /// - `ChannelOpen` - the channel's MAC or DMA block is owned elsewhere
    /// - `ReceiveEnabled` - filter change while the receiver is running
    pub fn control(&mut self, command: ControlCommand) -> Result<(), EtherError> {
        match command {
            ControlCommand::SetCallback(callbacks) => {
                let current = &mut self.callbacks;
                current.event = callbacks.event.or(current.event);
                current.interrupt = callbacks.interrupt.or(current.interrupt);
                current.pmgi = callbacks.pmgi.or(current.pmgi);
                Ok(())
            }
            ControlCommand::SetPromiscuous { channel, on } => {
                Self::check_channel(channel)?;
                self.channels[channel].promiscuous = on;
                Ok(())
            }
            ControlCommand::SetInterruptHandler(handler) => {
                let handler = handler.ok_or(EtherError::InvalidArgument)?;
                self.callbacks.interrupt = Some(handler);
                Ok(())
            }
            ControlCommand::PowerOn(channel) => self.power_on(Self::control_channel(channel)?),
            ControlCommand::PowerOff(channel) => {
                self.power_off(Self::control_channel(channel)?);
                Ok(())
            }
            ControlCommand::MulticastFilter { channel, on } => {
                let channel = Self::control_channel(channel)?;
                self.check_receive_disabled(channel)?;
                self.channels[channel].multicast_filter = on;
                Ok(())
            }
            ControlCommand::BroadcastFilter { channel, count } => {
                let channel = Self::control_channel(channel)?;
                if count > BROADCAST_FILTER_MAX {
                    return Err(EtherError::InvalidArgument);
                }
                self.check_receive_disabled(channel)?;
                self.channels[channel].broadcast_filter = count;
                Ok(())
            }
            ControlCommand::ReceivePadding {
                channel,
                position,
                size,
            } => {
                let channel = Self::control_channel(channel)?;
                if position > PADDING_POSITION_MAX || size > PADDING_SIZE_MAX {
                    return Err(EtherError::InvalidArgument);
                }
                let ch = &mut self.channels[channel];
                ch.padding_position = position;
                ch.padding_size = size;
                Ok(())
            }
            ControlCommand::SetPmgiCallback(callback) => {
                if callback.is_some() {
                    self.callbacks.pmgi = callback;
                }
                Ok(())
            }
        }
    }

    fn control_channel(channel: usize) -> Result<usize, EtherError> {
        Self::check_channel(channel)
            .map(|()| channel)
            .map_err(|_| EtherError::InvalidArgument)
    }

    fn check_receive_disabled(&self, channel: usize) -> Result<(), EtherError> {
        if self.ecmr(channel).contains(Ecmr::RE) {
            Err(EtherError::ReceiveEnabled)
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Power
    // ========================================================================

    /// Whether `channel` has been powered on.
    pub(crate) fn is_powered(&self, channel: usize) -> bool {
        let bus = self.config.channels[channel].phy_access;
        self.power
            .get(bus)
            .is_some_and(|users| users[channel])
    }

    fn bus_users(&self, bus: usize) -> usize {
        self.power
            .get(bus)
            .map_or(0, |users| users.iter().filter(|&&on| on).count())
    }

    /// Claim the ETHERC and EDMAC blocks of `channel`.
    fn claim_blocks(&self, channel: usize) -> Result<(), EtherError> {
        if !self.locks.try_acquire(LockResource::Etherc(channel)) {
            return Err(EtherError::ChannelOpen);
        }
        if !self.locks.try_acquire(LockResource::Edmac(channel)) {
            self.locks.release(LockResource::Etherc(channel));
            return Err(EtherError::ChannelOpen);
        }
        Ok(())
    }

    fn release_blocks(&self, channel: usize) {
        self.locks.release(LockResource::Edmac(channel));
        self.locks.release(LockResource::Etherc(channel));
    }

    fn power_on(&mut self, channel: usize) -> Result<(), EtherError> {
        if self.is_powered(channel) {
            return Err(EtherError::ChannelOpen);
        }
        let bus = self.phy_bus(channel)?;
        // The bus owner is claimed by its first user.
        let first_user = self.bus_users(bus) == 0;

        if channel != bus {
            self.claim_blocks(channel)?;
        }
        if first_user && bus < CHANNEL_MAX {
            if let Err(err) = self.claim_blocks(bus) {
                if channel != bus {
                    self.release_blocks(channel);
                }
                return Err(err);
            }
        }

        if let Some(users) = self.power.get_mut(bus) {
            users[channel] = true;
        }
        info!("[ETHERC] ch{}: power on (bus {})", channel, bus);
        Ok(())
    }

    fn power_off(&mut self, channel: usize) {
        if !self.is_powered(channel) {
            debug!("[ETHERC] ch{}: already powered off", channel);
            return;
        }
        let bus = self.config.channels[channel].phy_access;
        if let Some(users) = self.power.get_mut(bus) {
            users[channel] = false;
        }

        if channel != bus {
            self.release_blocks(channel);
        }
        if self.bus_users(bus) == 0 && bus < CHANNEL_MAX {
            self.release_blocks(bus);
        }
        info!("[ETHERC] ch{}: power off", channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EtherConfig, PhyAccess};
    use crate::drivers::net::ethernet::renesas::regs::etherc;
    use crate::sync::HardwareLocks;
    use crate::testing::{self, SimBus, SimIcu};

    fn held(locks: &HardwareLocks, channel: usize) -> bool {
        // A held block refuses a second owner.
        let free = locks.try_acquire(LockResource::Etherc(channel));
        if free {
            locks.release(LockResource::Etherc(channel));
        }
        !free
    }

    #[test]
    fn test_power_claims_bus_owner_until_last_user_leaves() {
        let config = EtherConfig::default();
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);

        // Channel 1 reaches its PHY through channel 0's pins.
        ether.control(ControlCommand::PowerOn(1)).unwrap();
        assert!(held(&locks, 0) && held(&locks, 1));
        assert!(ether.is_powered(1) && !ether.is_powered(0));

        ether.control(ControlCommand::PowerOn(0)).unwrap();
        assert!(ether.is_powered(0));

        ether.control(ControlCommand::PowerOff(0)).unwrap();
        assert!(held(&locks, 0), "bus owner kept for channel 1");
        ether.control(ControlCommand::PowerOff(1)).unwrap();
        assert!(!held(&locks, 0) && !held(&locks, 1));
    }

    #[test]
    fn test_power_on_fails_when_block_owned_elsewhere() {
        let config = EtherConfig::default();
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);

        assert!(locks.try_acquire(LockResource::Edmac(0)));
        assert_eq!(ether.control(ControlCommand::PowerOn(1)), Err(EtherError::ChannelOpen));
        assert!(!ether.is_powered(1));
        assert!(!held(&locks, 0) && !held(&locks, 1), "partial claims undone");

        locks.release(LockResource::Edmac(0));
        ether.control(ControlCommand::PowerOn(1)).unwrap();
        assert_eq!(ether.control(ControlCommand::PowerOn(1)), Err(EtherError::ChannelOpen));
        assert_eq!(ether.control(ControlCommand::PowerOn(2)), Err(EtherError::InvalidArgument));
        assert_eq!(ether.control(ControlCommand::PowerOff(2)), Err(EtherError::InvalidArgument));
    }

    #[test]
    fn test_power_on_rejects_missing_management_bus() {
        let mut config = EtherConfig::default();
        config.channels[1].phy_access = 7;
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);

        assert_eq!(ether.control(ControlCommand::PowerOn(1)), Err(EtherError::InvalidArgument));
        assert!(!held(&locks, 0) && !held(&locks, 1));
        ether.control(ControlCommand::PowerOff(1)).unwrap();
        ether.control(ControlCommand::PowerOn(0)).unwrap();
    }

    #[test]
    fn test_filters_rejected_while_receiving() {
        let config = EtherConfig::default();
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);

        ether
            .control(ControlCommand::MulticastFilter { channel: 1, on: true })
            .unwrap();
        ether
            .control(ControlCommand::BroadcastFilter { channel: 1, count: 0xFFFF })
            .unwrap();
        assert!(ether.channels[1].multicast_filter);
        assert_eq!(ether.channels[1].broadcast_filter, 0xFFFF);

        assert_eq!(
            ether.control(ControlCommand::BroadcastFilter { channel: 1, count: 0x1_0000 }),
            Err(EtherError::InvalidArgument)
        );

        bus.poke(config.channels[1].etherc_base + etherc::ECMR, Ecmr::RE.bits());
        assert_eq!(
            ether.control(ControlCommand::MulticastFilter { channel: 1, on: false }),
            Err(EtherError::ReceiveEnabled)
        );
        assert_eq!(
            ether.control(ControlCommand::BroadcastFilter { channel: 1, count: 4 }),
            Err(EtherError::ReceiveEnabled)
        );
        assert!(ether.channels[1].multicast_filter);
        assert_eq!(ether.channels[1].broadcast_filter, 0xFFFF);
    }

    #[test]
    fn test_channel_and_range_checks() {
        let config = EtherConfig::default();
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);

        assert_eq!(
            ether.control(ControlCommand::SetPromiscuous { channel: 2, on: true }),
            Err(EtherError::InvalidChannel)
        );
        assert_eq!(
            ether.control(ControlCommand::MulticastFilter { channel: 2, on: true }),
            Err(EtherError::InvalidArgument)
        );
        assert_eq!(
            ether.control(ControlCommand::ReceivePadding { channel: 0, position: 0x40, size: 0 }),
            Err(EtherError::InvalidArgument)
        );
        assert_eq!(
            ether.control(ControlCommand::ReceivePadding { channel: 0, position: 0, size: 4 }),
            Err(EtherError::InvalidArgument)
        );

        ether
            .control(ControlCommand::ReceivePadding { channel: 0, position: 14, size: 2 })
            .unwrap();
        ether
            .control(ControlCommand::SetPromiscuous { channel: 0, on: true })
            .unwrap();
        assert_eq!(ether.channels[0].padding_position, 14);
        assert_eq!(ether.channels[0].padding_size, 2);
        assert!(ether.channels[0].promiscuous);
    }

    #[test]
    fn test_callback_commands() {
        let config = EtherConfig {
            phy_access: PhyAccess::NonBlocking,
            ..EtherConfig::default()
        };
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);

        assert_eq!(
            ether.control(ControlCommand::SetInterruptHandler(None)),
            Err(EtherError::InvalidArgument)
        );
        ether.control(ControlCommand::SetPmgiCallback(None)).unwrap();
        assert!(ether.callbacks.pmgi.is_none());

        let recording = testing::recording_callbacks();
        ether.control(ControlCommand::SetPmgiCallback(recording.pmgi)).unwrap();
        ether.control(ControlCommand::SetInterruptHandler(recording.interrupt)).unwrap();
        assert!(ether.callbacks.pmgi.is_some());
        assert!(ether.callbacks.interrupt.is_some());

        // Missing fields keep what is installed.
        ether
            .control(ControlCommand::SetCallback(Callbacks {
                event: recording.event,
                ..Callbacks::default()
            }))
            .unwrap();
        assert!(ether.callbacks.event.is_some());
        assert!(ether.callbacks.pmgi.is_some());
        assert!(ether.callbacks.interrupt.is_some());
    }
}
