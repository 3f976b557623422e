//! Serpentine grid structures
//!
//! The board, the bar, and the flat panel are all serpentine-wired LED
//! surfaces: strips snake across the structure, so odd rows within a strip
//! run backwards. They share this one adapter, instantiated with their own
//! dimensions and link settings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use glimmer_core::{
    Color, ColorTransform, CommandSink, CoreError, GridSettings, Output, PixelAddress,
    PixelCommand, Visualizer, VisualizerRegistry,
};

use crate::structures::Backend;
use crate::Result;

/// Pure serpentine coordinate translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerpentineMap {
    row_length: usize,
    rows_per_strip: usize,
}

impl SerpentineMap {
    pub fn new(row_length: usize, rows_per_strip: usize) -> Self {
        let rows_per_strip = if rows_per_strip == 0 {
            debug!("rows_per_strip defaulted to 1");
            1
        } else {
            rows_per_strip
        };
        Self {
            row_length,
            rows_per_strip,
        }
    }

    /// Linear physical index of `(x, row)`. A row is reversed when its
    /// position within its strip is odd.
    pub fn index(&self, x: usize, row: usize) -> usize {
        let reversed = (row % self.rows_per_strip) % 2 == 1;
        let offset = if reversed {
            self.row_length - 1 - x
        } else {
            x
        };
        row * self.row_length + offset
    }
}

/// A serpentine-wired LED surface exposing the uniform output contract.
pub struct GridOutput {
    name: String,
    settings: Mutex<GridSettings>,
    enabled: AtomicBool,
    map: Mutex<SerpentineMap>,
    backend: RwLock<Backend>,
    registry: VisualizerRegistry,
    transform: Mutex<ColorTransform>,
    sink: CommandSink,
}

impl GridOutput {
    pub fn new(
        name: impl Into<String>,
        settings: GridSettings,
        transform: ColorTransform,
        sink: CommandSink,
    ) -> Self {
        let backend = Backend::from_settings(&settings.device);
        let map = SerpentineMap::new(settings.row_length, settings.rows_per_strip);
        Self {
            name: name.into(),
            enabled: AtomicBool::new(settings.device.enabled),
            map: Mutex::new(map),
            backend: RwLock::new(backend),
            settings: Mutex::new(settings),
            registry: VisualizerRegistry::new(),
            transform: Mutex::new(transform),
            sink,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set a pixel by grid coordinate.
    pub fn set_pixel_xy(&self, x: usize, y: usize, color: Color) {
        self.sink
            .send(PixelCommand::set(PixelAddress::Grid { x, y }, color));
        let index = self.map.lock().index(x, y);
        let corrected = self.transform.lock().apply(color);
        self.backend.read().set_linear(index, corrected);
    }

    /// Swap the output color correction.
    pub fn set_transform(&self, transform: ColorTransform) {
        *self.transform.lock() = transform;
    }

    /// Apply new settings. A changed link or threading flag tears the old
    /// driver down - it reaches `Uninitialized` with its drain thread
    /// joined - before the replacement is constructed.
    pub fn apply_settings(&self, new: &GridSettings) -> Result<()> {
        let rebuild = {
            let current = self.settings.lock();
            current.device.link != new.device.link || current.device.threaded != new.device.threaded
        };
        if rebuild {
            let mut backend = self.backend.write();
            backend.set_active(false)?;
            *backend = Backend::from_settings(&new.device);
            info!(name = %self.name, "grid driver rebuilt");
        }
        self.enabled.store(new.device.enabled, Ordering::SeqCst);
        *self.map.lock() = SerpentineMap::new(new.row_length, new.rows_per_strip);
        *self.settings.lock() = new.clone();
        Ok(())
    }
}

impl Output for GridOutput {
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
