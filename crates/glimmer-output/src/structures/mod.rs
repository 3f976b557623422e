//! Structure output adapters
//!
//! Each physical structure owns at most one active driver at a time -
//! framed serial or OPC network, mutually exclusive, selected by its
//! settings - translates structure-specific coordinates to linear physical
//! indices, and exposes the uniform [`glimmer_core::Output`] contract.
//! Any hardware-relevant settings change tears the old driver down
//! (reaching `Uninitialized`, drain thread joined) before the new one is
//! built, so no orphaned threads or torn frames survive a reconfiguration.

pub mod dome;
pub mod grid;
pub mod poly;
pub mod stage;

pub use dome::{DomeAddressMap, DomeOutput};
pub use grid::{GridOutput, SerpentineMap};
pub use poly::{PolyOutput, ShapeMap};
pub use stage::{StageOutput, TrussMap};

use glimmer_core::{Color, DeviceSettings, LinkConfig};

use crate::driver::{OpcConfig, OpcDriver, SerialConfig, SerialDriver};
use crate::Result;

/// The one driver a structure currently owns.
pub(crate) enum Backend {
    Serial(SerialDriver),
    Network(OpcDriver),
}

impl Backend {
    pub(crate) fn from_settings(device: &DeviceSettings) -> Backend {
        match &device.link {
            LinkConfig::Serial { port, baud } => Backend::Serial(SerialDriver::new(SerialConfig {
                port: port.clone(),
                baud: *baud,
                threaded: device.threaded,
            })),
            LinkConfig::Network { address } => Backend::Network(OpcDriver::new(OpcConfig {
                address: address.clone(),
                threaded: device.threaded,
            })),
        }
    }

    pub(crate) fn is_serial(&self) -> bool {
        matches!(self, Backend::Serial(_))
    }

    pub(crate) fn active(&self) -> bool {
        match self {
            Backend::Serial(driver) => driver.active(),
            Backend::Network(driver) => driver.active(),
        }
    }

    pub(crate) fn set_active(&self, active: bool) -> Result<()> {
        match self {
            Backend::Serial(driver) => driver.set_active(active),
            Backend::Network(driver) => driver.set_active(active),
        }
    }

    pub(crate) fn operator_update(&self) {
        match self {
            Backend::Serial(driver) => driver.operator_update(),
            Backend::Network(driver) => driver.operator_update(),
        }
    }

    pub(crate) fn flush(&self) {
        match self {
            Backend::Serial(driver) => driver.flush(),
            Backend::Network(driver) => driver.flush(),
        }
    }

    /// Queue a pixel by linear index - on the serial frame stream, or on
    /// the network driver's default channel.
    pub(crate) fn set_linear(&self, index: usize, color: Color) {
        match self {
            Backend::Serial(driver) => driver.set_pixel(index, color),
            Backend::Network(driver) => driver.set_pixel(index, color),
        }
    }
}
