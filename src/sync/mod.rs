//! Synchronization primitives for the driver.
//!
//! Only try-locks: interrupt handlers and foreground calls never wait on
//! each other.

pub mod lock;

pub use lock::{HARDWARE_LOCKS, HardwareLock, HardwareLocks, LockResource, SoftwareLock};
