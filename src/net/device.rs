//! Network stack glue.
//!
//! [`Port`] exposes one channel of an [`Ether`] through the copying
//! [`NetworkDevice`] interface, and [`SmoltcpDevice`] adapts any
//! `NetworkDevice` to `smoltcp::phy::Device` so an `Interface` can be polled
//! on top of it.

use crate::config::{FRAME_LEN_MAX, FRAME_LEN_MIN};
use crate::drivers::bus::RegisterBus;
use crate::drivers::irqchip::InterruptController;
use crate::drivers::net::ethernet::renesas::Ether;
use crate::drivers::net::ethernet::renesas::descriptor::Ownership;
use crate::drivers::net::netdev::{EtherError, NetworkDevice};
use crate::net::ethernet::MacAddress;
use crate::sync::HardwareLock;
use log::{trace, warn};
use smoltcp::phy::{self, DeviceCapabilities, Medium};
use smoltcp::time::Instant;

/// One channel of an [`Ether`], borrowed as a [`NetworkDevice`].
pub struct Port<'a, B: RegisterBus, I: InterruptController, L: HardwareLock> {
    ether: &'a mut Ether<B, I, L>,
    channel: usize,
}

impl<B: RegisterBus, I: InterruptController, L: HardwareLock> Ether<B, I, L> {
    /// Borrow `channel` as a [`NetworkDevice`].
    pub fn port(&mut self, channel: usize) -> Result<Port<'_, B, I, L>, EtherError> {
        Self::check_channel(channel)?;
        Ok(Port {
            ether: self,
            channel,
        })
    }
}

impl<B: RegisterBus, I: InterruptController, L: HardwareLock> NetworkDevice for Port<'_, B, I, L> {
    fn mac_address(&self) -> MacAddress {
        self.ether
            .mac_address(self.channel)
            .unwrap_or(MacAddress::zero())
    }

    fn is_link_up(&self) -> bool {
        self.ether.is_transfer_enabled(self.channel)
    }

    fn can_transmit(&self) -> bool {
        let tx = &self.ether.channels[self.channel].tx;
        self.is_link_up() && tx.descriptor(tx.current()).ownership() == Ownership::Software
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), EtherError> {
        self.ether.write(self.channel, frame)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, EtherError> {
        self.ether.read(self.channel, buffer)
    }
}

/// `smoltcp` device over a [`NetworkDevice`].
///
/// Frames are copied through a receive buffer owned by the adapter and a
/// transmit buffer on the stack; short frames built by the stack are zero
/// padded to the Ethernet minimum before transmission.
pub struct SmoltcpDevice<D: NetworkDevice> {
    device: D,
    rx_buffer: [u8; FRAME_LEN_MAX],
}

impl<D: NetworkDevice> SmoltcpDevice<D> {
    pub fn new(device: D) -> Self {
        SmoltcpDevice {
            device,
            rx_buffer: [0; FRAME_LEN_MAX],
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }
}

pub struct RxToken<'a> {
    frame: &'a mut [u8],
}

impl phy::RxToken for RxToken<'_> {
    fn consume<R, F>(self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(self.frame)
    }
}

pub struct TxToken<'a, D: NetworkDevice> {
    device: &'a mut D,
}

impl<D: NetworkDevice> phy::TxToken for TxToken<'_, D> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut buffer = [0u8; FRAME_LEN_MAX];
        let len = len.min(FRAME_LEN_MAX);
        let result = f(&mut buffer[..len]);

        if let Err(err) = self.device.transmit(&buffer[..len.max(FRAME_LEN_MIN)]) {
            warn!("[ETHERC] transmit of {} bytes dropped: {}", len, err);
        }
        result
    }
}

impl<D: NetworkDevice> phy::Device for SmoltcpDevice<D> {
    type RxToken<'a>
        = RxToken<'a>
    where
        Self: 'a;
    type TxToken<'a>
        = TxToken<'a, D>
    where
        Self: 'a;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        // A filtered multicast frame frees its slot; the next one may be real.
        let len = match self.device.receive(&mut self.rx_buffer) {
            Err(EtherError::MulticastFiltered) => self.device.receive(&mut self.rx_buffer),
            other => other,
        };

        match len {
            Ok(0) => None,
            Ok(len) => Some((
                RxToken {
                    frame: &mut self.rx_buffer[..len],
                },
                TxToken {
                    device: &mut self.device,
                },
            )),
            Err(err) => {
                trace!("[ETHERC] receive: {}", err);
                None
            }
        }
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        if self.device.can_transmit() {
            Some(TxToken {
                device: &mut self.device,
            })
        } else {
            None
        }
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.medium = Medium::Ethernet;
        caps.max_transmission_unit = FRAME_LEN_MAX;
        caps.max_burst_size = Some(1);
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EtherConfig;
    use crate::drivers::net::ethernet::renesas::descriptor::DescStatus;
    use crate::sync::HardwareLocks;
    use crate::testing::{SimBus, SimIcu};
    use smoltcp::phy::{Device, RxToken as _, TxToken as _};

    /// In-memory device with one pending frame and a transmit log.
    struct Loopback {
        pending: Vec<Vec<u8>>,
        sent: Vec<Vec<u8>>,
        busy: bool,
    }

    impl NetworkDevice for Loopback {
        fn mac_address(&self) -> MacAddress {
            MacAddress::new([0x02, 0, 0, 0, 0, 1])
        }

        fn is_link_up(&self) -> bool {
            true
        }

        fn can_transmit(&self) -> bool {
            !self.busy
        }

        fn transmit(&mut self, frame: &[u8]) -> Result<(), EtherError> {
            self.sent.push(frame.to_vec());
            Ok(())
        }

        fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, EtherError> {
            match self.pending.pop() {
                Some(frame) if frame.is_empty() => Err(EtherError::MulticastFiltered),
                Some(frame) => {
                    buffer[..frame.len()].copy_from_slice(&frame);
                    Ok(frame.len())
                }
                None => Ok(0),
            }
        }
    }

    fn loopback(pending: Vec<Vec<u8>>) -> SmoltcpDevice<Loopback> {
        SmoltcpDevice::new(Loopback {
            pending,
            sent: Vec::new(),
            busy: false,
        })
    }

    #[test]
    fn test_short_frames_padded_to_minimum() {
        let mut dev = loopback(Vec::new());
        let token = dev.transmit(Instant::from_millis(0)).unwrap();
        token.consume(42, |buf| buf.fill(0xAB));

        let sent = &dev.device().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), FRAME_LEN_MIN);
        assert!(sent[0][..42].iter().all(|&b| b == 0xAB));
        assert!(sent[0][42..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_receive_skips_filtered_frame() {
        let mut dev = loopback(vec![vec![0x11; 64], Vec::new()]);
        let (rx, _tx) = dev.receive(Instant::from_millis(0)).unwrap();
        let len = rx.consume(|frame| {
            assert!(frame.iter().all(|&b| b == 0x11));
            frame.len()
        });
        assert_eq!(len, 64);
        assert!(dev.receive(Instant::from_millis(1)).is_none());
    }

    #[test]
    fn test_busy_device_refuses_transmit() {
        let mut dev = loopback(Vec::new());
        dev.device.busy = true;
        assert!(dev.transmit(Instant::from_millis(0)).is_none());
        assert_eq!(dev.capabilities().max_transmission_unit, 1514);
        assert_eq!(dev.capabilities().medium, Medium::Ethernet);
    }

    #[test]
    fn test_port_moves_frames_through_channel() {
        let config = EtherConfig::default();
        let bus = SimBus::for_config(&config);
        let (icu, locks) = (SimIcu::new(), HardwareLocks::new());
        let mut ether = Ether::new(&bus, &icu, &locks, config);
        assert!(ether.port(2).is_err());

        ether.init_descriptors(1);
        {
            let port = ether.port(1).unwrap();
            assert!(!port.is_link_up());
            assert!(!port.can_transmit());
        }
        ether.channels[1].transfer_enabled = true;
        ether.channels[1]
            .rx
            .dma_receive(0, &[0x33; 70], DescStatus::empty());

        let mut dev = SmoltcpDevice::new(ether.port(1).unwrap());
        assert_eq!(dev.device().mac_address(), MacAddress::zero());
        let (rx, tx) = dev.receive(Instant::from_millis(0)).unwrap();
        assert_eq!(rx.consume(|frame| frame.len()), 70);
        tx.consume(60, |buf| buf.fill(0x44));
        drop(dev);

        let sent = ether.channels[1].tx.dma_transmit(0).unwrap();
        assert_eq!(sent, vec![0x44; 60]);
    }
}
