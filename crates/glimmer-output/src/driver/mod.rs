//! Device drivers
//!
//! The two wire protocols - a framed serial protocol and an OPC-style TCP
//! protocol - plus the fan-out aggregator that spreads one logical pixel
//! space over several serial links. Each driver optionally runs its own
//! drain thread; buffers are partitioned per device, so producers and the
//! single consumer never share locks across devices.

pub mod aggregate;
pub mod opc;
pub mod serial;
pub mod state;

pub use aggregate::SerialFanout;
pub use opc::{OpcAddress, OpcConfig, OpcDriver};
pub use serial::{SerialConfig, SerialDriver};
pub use state::DriverState;
