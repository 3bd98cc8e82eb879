//! EDMAC descriptor rings.
//!
//! Each channel owns one receive and one transmit ring. A ring is a fixed
//! array of descriptors, each pointing at its own frame buffer, with the
//! last descriptor flagged DLE so the DMA engine wraps to the first.
//!
//! # Ownership
//!
//! The ACT bit of a descriptor's status word says who owns the slot:
//! set = DMA engine, clear = software. Software only touches a slot's
//! length and buffer while ACT is clear, and hands it back by setting ACT
//! last with `Release` ordering; the DMA engine does the reverse. `current`
//! is the only cursor software keeps and it advances strictly in ring order,
//! the same order the DMA engine walks.
//!
//! # Implementation Notes
//!
//! - The ring stores descriptor and buffer addresses as plain integers for
//!   the DMA engine. Once a channel is configured the ring must not move.
//! - Frame buffers are 32-byte aligned as required by EDMAC.

use crate::config::BUFSIZE;
use bitflags::bitflags;
use core::sync::atomic::{AtomicU32, Ordering};
use volatile::Volatile;

bitflags! {
    /// Descriptor status word (TD0/RD0).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescStatus: u32 {
        /// Owned by the DMA engine
        const ACT = 1 << 31;
        /// Last descriptor in the ring
        const DLE = 1 << 30;
        /// Frame position: frame ends in this buffer
        const FP1 = 1 << 29;
        /// Frame position: frame starts in this buffer
        const FP0 = 1 << 28;
        /// Frame error (any RFS bit)
        const FE = 1 << 27;
        /// Transmit write-back interrupt
        const TWBI = 1 << 26;
        /// Receive FIFO overflow
        const RFOVER = 1 << 9;
        /// Receive abort
        const RAD = 1 << 8;
        /// Multicast address frame received
        const RMAF = 1 << 7;
        /// Residual bit frame
        const RRF = 1 << 4;
        /// Frame too long
        const RTLF = 1 << 3;
        /// Frame too short
        const RTSF = 1 << 2;
        /// PHY-LSI receive error
        const PRE = 1 << 1;
        /// CRC error
        const CERF = 1 << 0;
    }
}

impl DescStatus {
    /// Bits cleared when a receive slot is handed back to the DMA engine.
    pub const RX_RELEASE_MASK: DescStatus = DescStatus::FP1
        .union(DescStatus::FP0)
        .union(DescStatus::FE)
        .union(DescStatus::RFOVER)
        .union(DescStatus::RAD)
        .union(DescStatus::RMAF)
        .union(DescStatus::RRF)
        .union(DescStatus::RTLF)
        .union(DescStatus::RTSF)
        .union(DescStatus::PRE)
        .union(DescStatus::CERF);
}

/// Who may touch a descriptor right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Software,
    Hardware,
}

/// One EDMAC descriptor, laid out as the DMA engine reads it.
#[repr(C, align(16))]
pub struct Descriptor {
    status: AtomicU32,
    /// RX: received frame length written by the DMA engine.
    size: Volatile<u16>,
    /// RX: buffer capacity. TX: frame length to send.
    bufsize: Volatile<u16>,
    buf_p: Volatile<usize>,
    next: Volatile<usize>,
}

impl Descriptor {
    fn new() -> Self {
        Descriptor {
            status: AtomicU32::new(0),
            size: Volatile::new(0),
            bufsize: Volatile::new(0),
            buf_p: Volatile::new(0),
            next: Volatile::new(0),
        }
    }

    pub fn status(&self) -> DescStatus {
        DescStatus::from_bits_retain(self.status.load(Ordering::Acquire))
    }

    pub fn ownership(&self) -> Ownership {
        if self.status().contains(DescStatus::ACT) {
            Ownership::Hardware
        } else {
            Ownership::Software
        }
    }

    pub fn next(&self) -> usize {
        self.next.read()
    }

    pub fn buffer_address(&self) -> usize {
        self.buf_p.read()
    }

    pub fn bufsize(&self) -> u16 {
        self.bufsize.read()
    }

    /// Clear `clear`, then set `set` (which may include ACT) in one store.
    fn update_status(&self, clear: DescStatus, set: DescStatus) {
        let value = (self.status.load(Ordering::Relaxed) & !clear.bits()) | set.bits();
        self.status.store(value, Ordering::Release);
    }
}

/// One DMA frame buffer.
#[derive(Clone, Copy)]
#[repr(C, align(32))]
pub struct FrameBuffer(pub [u8; BUFSIZE]);

/// Result of scanning the receive ring.
#[derive(Debug, PartialEq, Eq)]
pub enum RxPoll<'a> {
    /// Head slot still owned by the DMA engine.
    Empty,
    /// A good frame; the slot stays software-owned until released.
    Frame(&'a [u8]),
    /// A multicast frame hit the filter and was recycled.
    Filtered,
}

/// Fixed-size circular descriptor ring with its buffers.
pub struct DescriptorRing<const N: usize> {
    descriptors: [Descriptor; N],
    buffers: [FrameBuffer; N],
    current: usize,
}

impl<const N: usize> DescriptorRing<N> {
    pub fn new() -> Self {
        DescriptorRing {
            descriptors: core::array::from_fn(|_| Descriptor::new()),
            buffers: [FrameBuffer([0; BUFSIZE]); N],
            current: 0,
        }
    }

    /// Address of the first descriptor, for RDLAR/TDLAR.
    pub fn base_address(&self) -> usize {
        self.descriptors.as_ptr() as usize
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn descriptor(&self, index: usize) -> &Descriptor {
        &self.descriptors[index]
    }

    fn link(&mut self) {
        let base = self.base_address();
        let stride = core::mem::size_of::<Descriptor>();
        for i in 0..N {
            let buffer = self.buffers[i].0.as_ptr() as usize;
            let next = if i + 1 == N { base } else { base + (i + 1) * stride };
            let desc = &mut self.descriptors[i];
            desc.buf_p.write(buffer);
            desc.next.write(next);
            desc.size.write(0);
        }
        self.current = 0;
    }

    /// Zero all buffers and descriptors.
    pub fn clear(&mut self) {
        for buffer in self.buffers.iter_mut() {
            buffer.0.fill(0);
        }
        for desc in self.descriptors.iter_mut() {
            *desc = Descriptor::new();
        }
        self.current = 0;
    }

    /// Lay out the ring for reception: every slot owned by the DMA engine
    /// with a full-size buffer.
    pub fn init_rx(&mut self) {
        self.link();
        for desc in self.descriptors.iter_mut() {
            desc.bufsize.write(BUFSIZE as u16);
            desc.status.store(DescStatus::ACT.bits(), Ordering::Release);
        }
        if let Some(last) = self.descriptors.last() {
            last.update_status(DescStatus::empty(), DescStatus::DLE);
        }
    }

    /// Lay out the ring for transmission: every slot owned by software.
    pub fn init_tx(&mut self) {
        self.link();
        for desc in self.descriptors.iter_mut() {
            desc.bufsize.write(1);
            desc.status.store(0, Ordering::Release);
        }
        if let Some(last) = self.descriptors.last() {
            last.update_status(DescStatus::empty(), DescStatus::DLE);
        }
    }

    fn advance(&mut self) {
        self.current = (self.current + 1) % N;
    }

    /// Scan from `current` for the next deliverable frame.
    ///
    /// Error frames are recycled and the scan continues; it stops at the
    /// first DMA-owned slot, so it visits at most `N` slots.
    pub fn poll_rx(&mut self, multicast_filter: bool) -> RxPoll<'_> {
        for _ in 0..N {
            let desc = &self.descriptors[self.current];
            if desc.ownership() == Ownership::Hardware {
                return RxPoll::Empty;
            }

            let status = desc.status();
            if multicast_filter && status.contains(DescStatus::RMAF) {
                self.release_rx();
                return RxPoll::Filtered;
            }
            if status.contains(DescStatus::FE) {
                self.release_rx();
                continue;
            }

            let len = usize::from(desc.size.read()).min(BUFSIZE);
            return RxPoll::Frame(&self.buffers[self.current].0[..len]);
        }
        RxPoll::Empty
    }

    /// Return the head receive slot to the DMA engine.
    ///
    /// Returns `false` (and does nothing) if the head slot is not
    /// software-owned.
    pub fn release_rx(&mut self) -> bool {
        let desc = &self.descriptors[self.current];
        if desc.ownership() == Ownership::Hardware {
            return false;
        }
        desc.update_status(DescStatus::RX_RELEASE_MASK, DescStatus::ACT);
        self.advance();
        true
    }

    /// Buffer of the head transmit slot, if software owns it.
    pub fn tx_buffer(&mut self) -> Option<&mut [u8]> {
        if self.descriptors[self.current].ownership() == Ownership::Hardware {
            return None;
        }
        Some(&mut self.buffers[self.current].0[..])
    }

    /// Hand the head transmit slot to the DMA engine with `len` bytes.
    pub fn commit_tx(&mut self, len: u16) {
        let desc = &mut self.descriptors[self.current];
        desc.bufsize.write(len);
        let frame = DescStatus::FP1 | DescStatus::FP0;
        desc.update_status(frame, frame | DescStatus::ACT);
        self.advance();
    }
}

impl<const N: usize> Default for DescriptorRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// DMA engine side of a ring, for host tests.
#[cfg(test)]
impl<const N: usize> DescriptorRing<N> {
    /// Complete reception into slot `index`: copy `frame`, set length and
    /// `flags`, and hand the slot to software.
    pub fn dma_receive(&mut self, index: usize, frame: &[u8], flags: DescStatus) {
        self.buffers[index].0[..frame.len()].copy_from_slice(frame);
        let desc = &mut self.descriptors[index];
        desc.size.write(frame.len() as u16);
        let keep = desc.status() & DescStatus::DLE;
        desc.status.store(
            (keep | DescStatus::FP1 | DescStatus::FP0 | flags).bits(),
            Ordering::Release,
        );
    }

    /// Complete transmission from slot `index` if it was handed over,
    /// returning the frame sent.
    pub fn dma_transmit(&mut self, index: usize) -> Option<Vec<u8>> {
        let desc = &self.descriptors[index];
        if desc.ownership() == Ownership::Software {
            return None;
        }
        let len = usize::from(desc.bufsize());
        let frame = self.buffers[index].0[..len].to_vec();
        desc.update_status(DescStatus::ACT, DescStatus::empty());
        Some(frame)
    }
}
