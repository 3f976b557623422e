//! Polyhedral shapes
//!
//! A polyhedron is wired as many short strips hanging off a handful of
//! controller channels; which strip sits on which channel comes from a
//! per-shape table. Addressing translates a strip-local LED index to an
//! absolute position on the strip's channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::info;

use glimmer_core::{
    Color, ColorTransform, CommandSink, CoreError, Output, PixelAddress, PixelCommand,
    PolySettings, StripSpec, Visualizer, VisualizerRegistry,
};

use crate::structures::Backend;
use crate::Result;

/// Pure strip translation over a per-shape channel table.
#[derive(Debug, Clone)]
pub struct ShapeMap {
    strips: Vec<StripSpec>,
}

impl ShapeMap {
    pub fn new(strips: Vec<StripSpec>) -> Self {
        Self { strips }
    }

    pub fn strip_count(&self) -> usize {
        self.strips.len()
    }

    /// Absolute `(channel, index within channel)` of a strip-local LED:
    /// the LED counts of every same-channel strip preceding the target
    /// strip, plus the local index.
    pub fn channel_index(&self, strip: usize, led: usize) -> (u8, usize) {
        let target = self.strips[strip];
        let preceding: usize = self.strips[..strip]
            .iter()
            .filter(|s| s.channel == target.channel)
            .map(|s| s.length)
            .sum();
        (target.channel, preceding + led)
    }

    /// Flat channel-major index, for serial backends with no channel
    /// notion.
    pub fn linear_index(&self, strip: usize, led: usize) -> usize {
        let (channel, index) = self.channel_index(strip, led);
        let preceding_channels: usize = self
            .strips
            .iter()
            .filter(|s| s.channel < channel)
            .map(|s| s.length)
            .sum();
        preceding_channels + index
    }
}

/// A polyhedral shape adapter.
pub struct PolyOutput {
    settings: Mutex<PolySettings>,
    enabled: AtomicBool,
    map: Mutex<ShapeMap>,
    backend: RwLock<Backend>,
    registry: VisualizerRegistry,
    transform: Mutex<ColorTransform>,
    sink: CommandSink,
}

impl PolyOutput {
    pub fn new(settings: PolySettings, transform: ColorTransform, sink: CommandSink) -> Self {
        let backend = Backend::from_settings(&settings.device);
        let map = ShapeMap::new(settings.strips.clone());
        Self {
            enabled: AtomicBool::new(settings.device.enabled),
            map: Mutex::new(map),
            backend: RwLock::new(backend),
            settings: Mutex::new(settings),
            registry: VisualizerRegistry::new(),
            transform: Mutex::new(transform),
            sink,
        }
    }

    /// Set a pixel by strip coordinate. Network backends address the
    /// strip's channel directly; serial backends flatten channel-major.
    pub fn set_pixel_strip(&self, strip: usize, led: usize, color: Color) {
        self.sink
            .send(PixelCommand::set(PixelAddress::Strip { strip, led }, color));
        let corrected = self.transform.lock().apply(color);
        let map = self.map.lock();
        match &*self.backend.read() {
            Backend::Serial(driver) => driver.set_pixel(map.linear_index(strip, led), corrected),
            Backend::Network(driver) => {
                let (channel, index) = map.channel_index(strip, led);
                driver.set_channel_pixel(channel, index, corrected);
            }
        }
    }

    /// Swap the output color correction.
    pub fn set_transform(&self, transform: ColorTransform) {
        *self.transform.lock() = transform;
    }

    /// Apply new settings; a changed link or threading flag tears the old
    /// driver down before the replacement exists.
    pub fn apply_settings(&self, new: &PolySettings) -> Result<()> {
        let rebuild = {
            let current = self.settings.lock();
            current.device.link != new.device.link || current.device.threaded != new.device.threaded
        };
        if rebuild {
            let mut backend = self.backend.write();
            backend.set_active(false)?;
            *backend = Backend::from_settings(&new.device);
            info!("poly driver rebuilt");
        }
        self.enabled.store(new.device.enabled, Ordering::SeqCst);
        *self.map.lock() = ShapeMap::new(new.strips.clone());
        *self.settings.lock() = new.clone();
        Ok(())
    }
}

impl Output for PolyOutput {
    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn active(&self) -> bool {
        self.backend.read().active()
    }

    fn set_active(&self, active: bool) -> glimmer_core::Result<()> {
        self.backend.read().set_active(active).map_err(CoreError::from)
    }

    fn register_visualizer(&self, visualizer: Arc<dyn Visualizer>) {
        self.registry.register(visualizer);
    }

    fn visualizers(&self) -> Vec<Arc<dyn Visualizer>> {
        self.registry.list()
    }

    fn operator_update(&self) -> glimmer_core::Result<()> {
        self.backend.read().operator_update();
        Ok(())
    }

    fn flush(&self) {
        self.backend.read().flush();
        self.sink.send(PixelCommand::end_of_frame());
    }

    fn set_pixel(&self, index: usize, color: Color) {
        self.sink
            .send(PixelCommand::set(PixelAddress::Linear(index), color));
        let corrected = self.transform.lock().apply(color);
        self.backend.read().set_linear(index, corrected);
    }
}
