//! Device drivers
//!
//! Organized by device class:
//! - `bus`: register access abstraction
//! - `irqchip`: interrupt controllers
//! - `net`: network device drivers and PHY management

pub mod bus;
pub mod irqchip;
pub mod net;
