//! Serial fan-out aggregator
//!
//! Presents several serial links as one logical pixel space. The indexed
//! `(device, local index)` API is always available; the flat global-index
//! API exists only when the aggregator was built with a uniform per-device
//! length, and using it without that invariant fails loudly.

use parking_lot::Mutex;
use tracing::info;

use glimmer_core::Color;

use crate::driver::SerialDriver;
use crate::Result;

/// One logical pixel space fanned out over several serial drivers.
pub struct SerialFanout {
    devices: Vec<SerialDriver>,
    device_length: Option<usize>,
    activation: Mutex<()>,
}

impl SerialFanout {
    /// Fan-out with per-device addressing only.
    pub fn new(devices: Vec<SerialDriver>) -> Self {
        Self {
            devices,
            device_length: None,
            activation: Mutex::new(()),
        }
    }

    /// Fan-out whose devices all hold `device_length` pixels, enabling
    /// flat global addressing via integer division.
    pub fn with_uniform_length(devices: Vec<SerialDriver>, device_length: usize) -> Self {
        Self {
            devices,
            device_length: Some(device_length),
            activation: Mutex::new(()),
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Total pixel count, when uniform per-device lengths are known.
    pub fn total_length(&self) -> Option<usize> {
        self.device_length.map(|len| len * self.devices.len())
    }

    /// Queue a pixel by explicit device and local index.
    pub fn set_pixel_at(&self, device: usize, local_index: usize, color: Color) {
        self.devices[device].set_pixel(local_index, color);
    }

    /// Queue a pixel by flat global index.
    ///
    /// # Panics
    ///
    /// Panics when the aggregator was built without a uniform per-device
    /// length: flat addressing is meaningless then, and silently guessing
    /// would scatter pixels across the wrong devices.
    pub fn set_pixel(&self, global_index: usize, color: Color) {
        let Some(length) = self.device_length else {
            panic!("flat addressing on a fan-out without a uniform device length");
        };
        self.devices[global_index / length].set_pixel(global_index % length, color);
    }

    /// Queue an end-of-frame sentinel on every device.
    pub fn flush(&self) {
        for device in &self.devices {
            device.flush();
        }
    }

    /// Cooperative drain of every device not running its own thread.
    pub fn operator_update(&self) {
        for device in &self.devices {
            device.operator_update();
        }
    }

    /// Toggle every underlying driver as one atomic unit.
    pub fn set_active(&self, active: bool) -> Result<()> {
        let _guard = self.activation.lock();
        for device in &self.devices {
            device.set_active(active)?;
        }
        info!(devices = self.devices.len(), active, "fan-out toggled");
        Ok(())
    }

    /// Active only when every underlying driver is.
    pub fn active(&self) -> bool {
        !self.devices.is_empty() && self.devices.iter().all(|d| d.active())
    }

    #[cfg(test)]
    pub(crate) fn devices_for_test(&self) -> &[SerialDriver] {
        &self.devices
    }
}
