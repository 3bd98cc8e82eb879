//! Frame transfer API.
//!
//! The zero-copy calls hand out the DMA buffers themselves: a received
//! frame is read in place and then released, a frame to send is built in
//! place and then committed. `read` and `write` are copying wrappers over
//! the same calls.
//!
//! Every call requires the channel's link to be up (transfer enabled) and
//! no channel to be waiting for a magic packet; otherwise the rings are not
//! touched.

use super::Ether;
use super::descriptor::{Ownership, RxPoll};
use super::regs::{self, Ecmr, edmac};
use crate::config::{CHANNEL_MAX, FRAME_LEN_MAX, FRAME_LEN_MIN};
use crate::drivers::bus::RegisterBus;
use crate::drivers::irqchip::InterruptController;
use crate::drivers::net::netdev::EtherError;
use crate::sync::HardwareLock;
use log::trace;

/// Write `value` to a DMA request register unless the engine is already
/// running.
fn restart_if_idle<B: RegisterBus>(bus: &B, addr: usize, value: u32) {
    if bus.read32(addr) == 0 {
        bus.write32(addr, value);
    }
}

impl<B: RegisterBus, I: InterruptController, L: HardwareLock> Ether<B, I, L> {
    /// Whether any powered channel has magic packet detection enabled.
    pub(crate) fn magic_packet_armed(&self) -> bool {
        (0..CHANNEL_MAX).any(|ch| self.is_powered(ch) && self.ecmr(ch).contains(Ecmr::MPDE))
    }

    fn check_transfer(&self, channel: usize) -> Result<(), EtherError> {
        Self::check_channel(channel)?;
        if !self.channels[channel].transfer_enabled {
            return Err(EtherError::LinkNotReady);
        }
        if self.magic_packet_armed() {
            return Err(EtherError::MagicPacketActive);
        }
        Ok(())
    }

    /// Next received frame, read in place.
    ///
    /// Frames received with an error are recycled without being reported.
    /// The returned frame stays owned by software until [`Ether::release`].
    ///
    /// # Returns
    ///
    /// `Ok(None)` when nothing has been received.
    ///
    /// # Errors
    ///
    /// - `MulticastFiltered` - a multicast frame was dropped by the filter
    pub fn read_zero_copy(&mut self, channel: usize) -> Result<Option<&[u8]>, EtherError> {
        self.check_transfer(channel)?;

        let edrrr = self.config.channels[channel].edmac_base + edmac::EDRRR;
        let ch = &mut self.channels[channel];
        match ch.rx.poll_rx(ch.multicast_filter) {
            RxPoll::Frame(frame) => Ok(Some(frame)),
            RxPoll::Empty => {
                restart_if_idle(&self.bus, edrrr, regs::EDRRR_RR);
                Ok(None)
            }
            RxPoll::Filtered => {
                restart_if_idle(&self.bus, edrrr, regs::EDRRR_RR);
                Err(EtherError::MulticastFiltered)
            }
        }
    }

    /// Hand the frame returned by `read_zero_copy` back to the DMA engine.
    pub fn release(&mut self, channel: usize) -> Result<(), EtherError> {
        self.check_transfer(channel)?;

        if !self.channels[channel].rx.release_rx() {
            trace!("[ETHERC] ch{}: release with no frame held", channel);
        }
        restart_if_idle(
            &self.bus,
            self.config.channels[channel].edmac_base + edmac::EDRRR,
            regs::EDRRR_RR,
        );
        Ok(())
    }

    /// Buffer of the next free transmit slot, to be filled in place and then
    /// passed to [`Ether::write_commit`].
    ///
    /// # Errors
    ///
    /// - `TransmitBufferFull` - every slot is still queued for transmission
    pub fn write_get_buffer(&mut self, channel: usize) -> Result<&mut [u8], EtherError> {
        self.check_transfer(channel)?;
        self.channels[channel]
            .tx
            .tx_buffer()
            .ok_or(EtherError::TransmitBufferFull)
    }

    /// Queue the first `len` bytes of the buffer from `write_get_buffer`.
    ///
    /// # Errors
    ///
    /// - `InvalidData` - `len` outside 60..=1514
    /// - `TransmitBufferFull` - the slot was not obtained first
    pub fn write_commit(&mut self, channel: usize, len: usize) -> Result<(), EtherError> {
        Self::check_channel(channel)?;
        if !(FRAME_LEN_MIN..=FRAME_LEN_MAX).contains(&len) {
            return Err(EtherError::InvalidData);
        }
        self.check_transfer(channel)?;

        let tx = &mut self.channels[channel].tx;
        if tx.descriptor(tx.current()).ownership() == Ownership::Hardware {
            return Err(EtherError::TransmitBufferFull);
        }
        tx.commit_tx(len as u16);

        restart_if_idle(
            &self.bus,
            self.config.channels[channel].edmac_base + edmac::EDTRR,
            regs::EDTRR_TR,
        );
        Ok(())
    }

    /// Copy the next received frame into `buf` and release its slot.
    ///
    /// Returns the frame length, or 0 when nothing has been received.
    ///
    /// # Errors
    ///
    /// - `InvalidPointer` - `buf` is empty
    /// - `InvalidData` - the frame does not fit; it stays queued
    pub fn read(&mut self, channel: usize, buf: &mut [u8]) -> Result<usize, EtherError> {
        Self::check_channel(channel)?;
        if buf.is_empty() {
            return Err(EtherError::InvalidPointer);
        }

        let len = match self.read_zero_copy(channel)? {
            None => return Ok(0),
            Some(frame) if frame.len() > buf.len() => return Err(EtherError::InvalidData),
            Some(frame) => {
                buf[..frame.len()].copy_from_slice(frame);
                frame.len()
            }
        };

        self.release(channel)?;
        Ok(len)
    }

    /// Copy `frame` into a transmit slot, queue it and wait until the DMA
    /// engine has picked it up.
    ///
    /// # Errors
    ///
    /// - `InvalidPointer` - `frame` is empty
    /// - `InvalidData` - length outside 60..=1514
    /// - `TransmitBufferFull` - no free slot
    /// - `Other` - transmission did not start
    pub fn write(&mut self, channel: usize, frame: &[u8]) -> Result<(), EtherError> {
        Self::check_channel(channel)?;
        if frame.is_empty() {
            return Err(EtherError::InvalidPointer);
        }
        if !(FRAME_LEN_MIN..=FRAME_LEN_MAX).contains(&frame.len()) {
            return Err(EtherError::InvalidData);
        }

        let buf = self.write_get_buffer(channel)?;
        buf[..frame.len()].copy_from_slice(frame);
        self.write_commit(channel, frame.len())?;
        self.check_write(channel)
    }

    /// Wait for the transmitter of `channel` to go idle.
    ///
    /// Pairs with `write_commit` for callers that need to know the frame
    /// has left the ring. Polls at most `transmit_poll_limit` times.
    ///
    /// # Errors
    ///
    /// - `InvalidChannel` - no such channel
    /// - `Other` - transmission still running after the poll limit
    pub fn check_write(&self, channel: usize) -> Result<(), EtherError> {
        Self::check_channel(channel)?;
        let edtrr = self.config.channels[channel].edmac_base + edmac::EDTRR;
        for _ in 0..self.config.transmit_poll_limit {
            if self.bus.read32(edtrr) & regs::EDTRR_TR == 0 {
                return Ok(());
            }
        }
        Err(EtherError::Other)
    }
}
