//! Network layer support
//!
//! MAC addressing and the glue that lets a network stack drive a driver
//! channel.

pub mod device;
pub mod ethernet;

pub use device::{Port, SmoltcpDevice};
pub use ethernet::MacAddress;
