//! Glimmer Output - Wire Drivers and Structure Adapters
//!
//! The hardware half of the output pipeline:
//! - **Serial**: framed pixel streaming to one microcontroller per port
//! - **OPC**: channel-oriented pixel streaming over TCP
//! - **Fan-out**: several serial links presented as one logical space
//! - **Structures**: the board/bar/panel grids, the stage truss, the
//!   polyhedral shapes, and the dome, each translating its own coordinate
//!   system to physical indices and exposing the uniform
//!   [`glimmer_core::Output`] contract
//!
//! Transient write errors are swallowed and logged - a live show never
//! halts over a dropped frame - while lifecycle and invariant violations
//! propagate.

pub mod driver;
pub mod error;
pub mod structures;

pub use driver::{
    DriverState, OpcAddress, OpcConfig, OpcDriver, SerialConfig, SerialDriver, SerialFanout,
};
pub use error::{OutputError, Result};
pub use structures::{
    DomeAddressMap, DomeOutput, GridOutput, PolyOutput, SerpentineMap, ShapeMap, StageOutput,
    TrussMap,
};
