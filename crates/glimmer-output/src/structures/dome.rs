//! The geodesic dome
//!
//! The dome is one logical pixel space fanned out over several serial
//! control boxes. Painting addresses logical `(strut, led)` coordinates;
//! those go to the simulator queue as-is, while the physical path runs
//! through an opaque strut lookup - the control-box wiring table lives
//! outside this core - and then the serial fan-out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::info;

use glimmer_core::{
    Color, ColorTransform, CommandSink, CoreError, DomeSettings, Output, PixelAddress,
    PixelCommand, Visualizer, VisualizerRegistry,
};

use crate::driver::{SerialConfig, SerialDriver, SerialFanout};
use crate::Result;

/// Opaque lookup from a logical `(strut, led)` coordinate to a physical
/// `(control box, local index)` pair. The concrete wiring table is an
/// external collaborator; a strut it does not know stays simulator-only.
pub trait DomeAddressMap: Send + Sync {
    fn locate(&self, strut: usize, led: usize) -> Option<(usize, usize)>;
}

/// The dome adapter.
pub struct DomeOutput {
    settings: Mutex<DomeSettings>,
    enabled: AtomicBool,
    fanout: RwLock<SerialFanout>,
    address_map: Box<dyn DomeAddressMap>,
    registry: VisualizerRegistry,
    transform: Mutex<ColorTransform>,
    sink: CommandSink,
}

fn build_fanout(settings: &DomeSettings) -> SerialFanout {
    let devices = settings
        .ports
        .iter()
        .map(|port| {
            SerialDriver::new(SerialConfig {
                port: port.clone(),
                baud: settings.baud,
                threaded: settings.threaded,
            })
        })
        .collect();
    SerialFanout::with_uniform_length(devices, settings.device_length)
}

impl DomeOutput {
    pub fn new(
        settings: DomeSettings,
        address_map: Box<dyn DomeAddressMap>,
        transform: ColorTransform,
        sink: CommandSink,
    ) -> Self {
        let fanout = build_fanout(&settings);
        Self {
            enabled: AtomicBool::new(settings.enabled),
            fanout: RwLock::new(fanout),
            settings: Mutex::new(settings),
            address_map,
            registry: VisualizerRegistry::new(),
            transform: Mutex::new(transform),
            sink,
        }
    }

    /// Set a pixel by logical strut coordinate. The simulator queue gets
    /// the logical coordinate either way; hardware is written only when
    /// the lookup knows the strut.
    pub fn set_pixel_strut(&self, strut: usize, led: usize, color: Color) {
        self.sink
            .send(PixelCommand::set(PixelAddress::Strut { strut, led }, color));
        if let Some((device, local_index)) = self.address_map.locate(strut, led) {
            let corrected = self.transform.lock().apply(color);
            self.fanout.read().set_pixel_at(device, local_index, corrected);
        }
    }

    /// Swap the output color correction.
    pub fn set_transform(&self, transform: ColorTransform) {
        *self.transform.lock() = transform;
    }

    /// Apply new settings; any hardware-relevant change tears the whole
    /// fan-out down before the replacement exists.
    pub fn apply_settings(&self, new: &DomeSettings) -> Result<()> {
        let rebuild = {
            let current = self.settings.lock();
            current.ports != new.ports
                || current.baud != new.baud
                || current.threaded != new.threaded
                || current.device_length != new.device_length
        };
        if rebuild {
            let mut fanout = self.fanout.write();
            fanout.set_active(false)?;
            *fanout = build_fanout(new);
            info!(boxes = new.ports.len(), "dome fan-out rebuilt");
        }
        self.enabled.store(new.enabled, Ordering::SeqCst);
        *self.settings.lock() = new.clone();
        Ok(())
    }
}

impl Output for DomeOutput {
    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn active(&self) -> bool {
        self.fanout.read().active()
    }

    fn set_active(&self, active: bool) -> glimmer_core::Result<()> {
        self.fanout.read().set_active(active).map_err(CoreError::from)
    }

    fn register_visualizer(&self, visualizer: Arc<dyn Visualizer>) {
        self.registry.register(visualizer);
    }

    fn visualizers(&self) -> Vec<Arc<dyn Visualizer>> {
        self.registry.list()
    }

    fn operator_update(&self) -> glimmer_core::Result<()> {
        self.fanout.read().operator_update();
        Ok(())
    }

    fn flush(&self) {
        self.fanout.read().flush();
        self.sink.send(PixelCommand::end_of_frame());
    }

    /// Flat addressing over the whole fan-out; the dome always carries a
    /// uniform per-box length.
    fn set_pixel(&self, index: usize, color: Color) {
        self.sink
            .send(PixelCommand::set(PixelAddress::Linear(index), color));
        let corrected = self.transform.lock().apply(color);
        self.fanout.read().set_pixel(index, corrected);
    }
}
