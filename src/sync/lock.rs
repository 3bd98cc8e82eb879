//! Try-locks for PHY access sessions and hardware channel ownership.
//!
//! Nothing in the driver ever waits for a lock. A PHY operation that finds
//! its management bus busy is rejected with `EtherError::Locked`, and a
//! channel whose MAC or DMA block is owned elsewhere fails to power on.
//!
//! ## Implementation
//!
//! Both locks are a single `AtomicBool` taken with
//! `compare_exchange(false, true, Acquire, Relaxed)` and released with a
//! `Release` store, so the owner's writes are visible to the next holder
//! even when release happens in interrupt context.

use crate::config::CHANNEL_MAX;
use core::sync::atomic::{AtomicBool, Ordering};

/// Non-blocking mutual exclusion flag.
///
/// Unlike a spinlock there is no guard: the lock may be taken in a
/// foreground call and released much later from an interrupt handler.
#[derive(Debug)]
pub struct SoftwareLock {
    locked: AtomicBool,
}

impl SoftwareLock {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Take the lock if it is free. Returns `false` without side effects
    /// if it is already held.
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

impl Default for SoftwareLock {
    fn default() -> Self {
        Self::new()
    }
}

/// A hardware block whose exclusive ownership is arbitrated system wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockResource {
    /// ETHERC (MAC) channel
    Etherc(usize),
    /// EDMAC (DMA) channel
    Edmac(usize),
}

/// Acquire/release exclusive ownership of a hardware block.
pub trait HardwareLock {
    /// Returns `true` if the caller now owns `resource`.
    fn try_acquire(&self, resource: LockResource) -> bool;

    fn release(&self, resource: LockResource);
}

impl<T: HardwareLock + ?Sized> HardwareLock for &T {
    fn try_acquire(&self, resource: LockResource) -> bool {
        (**self).try_acquire(resource)
    }

    fn release(&self, resource: LockResource) {
        (**self).release(resource)
    }
}

/// Ownership table for every ETHERC and EDMAC channel on the chip.
pub struct HardwareLocks {
    etherc: [SoftwareLock; CHANNEL_MAX],
    edmac: [SoftwareLock; CHANNEL_MAX],
}

impl HardwareLocks {
    pub const fn new() -> Self {
        HardwareLocks {
            etherc: [const { SoftwareLock::new() }; CHANNEL_MAX],
            edmac: [const { SoftwareLock::new() }; CHANNEL_MAX],
        }
    }

    fn slot(&self, resource: LockResource) -> Option<&SoftwareLock> {
        match resource {
            LockResource::Etherc(ch) => self.etherc.get(ch),
            LockResource::Edmac(ch) => self.edmac.get(ch),
        }
    }
}

impl Default for HardwareLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareLock for HardwareLocks {
    fn try_acquire(&self, resource: LockResource) -> bool {
        self.slot(resource).is_some_and(SoftwareLock::try_lock)
    }

    fn release(&self, resource: LockResource) {
        if let Some(lock) = self.slot(resource) {
            lock.unlock();
        }
    }
}

/// System wide ETHERC/EDMAC ownership table.
pub static HARDWARE_LOCKS: HardwareLocks = HardwareLocks::new();
