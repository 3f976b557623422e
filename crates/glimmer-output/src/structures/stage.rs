//! The triangular stage truss
//!
//! Trusses are chains of triangles, each triangle carrying several
//! parallel LED layers along its three sides. Side lengths differ between
//! triangles, which forces a dual addressing scheme: the serial backend
//! packs LEDs back to back using true per-side lengths, while the network
//! backend must use fixed-size slots (network channels are fixed-length),
//! sized by the longest side anywhere on the truss.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use glimmer_core::{
    Color, ColorTransform, CommandSink, CoreError, Output, PixelAddress, PixelCommand,
    StageSettings, Visualizer, VisualizerRegistry,
};

use crate::structures::Backend;
use crate::Result;

const SIDES_PER_TRIANGLE: usize = 3;

/// Pure truss coordinate translation: `(side, led, layer)` to a linear
/// physical index, in both addressing schemes.
///
/// `side` counts globally across the truss; triangle and side-in-triangle
/// fall out by division. The linear index sums, in order: complete
/// preceding triangles, complete preceding layers within the target
/// triangle, complete preceding sides within the target layer, then the
/// LED offset.
#[derive(Debug, Clone)]
pub struct TrussMap {
    triangles: Vec<[usize; 3]>,
    layers: usize,
    /// Cumulative true triangle lengths (all layers), for the serial
    /// scheme.
    triangle_offsets: Vec<usize>,
    max_side_length: usize,
    max_triangle_length: usize,
}

impl TrussMap {
    pub fn new(triangles: Vec<[usize; 3]>, layers: usize) -> Self {
        let max_side_length = triangles
            .iter()
            .flat_map(|sides| sides.iter().copied())
            .max()
            .unwrap_or(0);
        let max_triangle_length = layers * SIDES_PER_TRIANGLE * max_side_length;

        let mut triangle_offsets = Vec::with_capacity(triangles.len());
        let mut total = 0;
        for sides in &triangles {
            triangle_offsets.push(total);
            total += layers * sides.iter().sum::<usize>();
        }

        Self {
            triangles,
            layers,
            triangle_offsets,
            max_side_length,
            max_triangle_length,
        }
    }

    pub fn layers(&self) -> usize {
        self.layers
    }

    /// The uniform fixed slot one triangle occupies in the network scheme.
    pub fn max_triangle_length(&self) -> usize {
        self.max_triangle_length
    }

    fn split(&self, side: usize) -> (usize, usize) {
        (side / SIDES_PER_TRIANGLE, side % SIDES_PER_TRIANGLE)
    }

    /// True-length addressing for the serial backend.
    pub fn serial_index(&self, side: usize, led: usize, layer: usize) -> usize {
        let (triangle, side_in_triangle) = self.split(side);
        let sides = &self.triangles[triangle];
        let layer_length: usize = sides.iter().sum();
        self.triangle_offsets[triangle]
            + layer * layer_length
            + sides[..side_in_triangle].iter().sum::<usize>()
            + led
    }

    /// Fixed-slot addressing for the network backend. Every component is
    /// a multiple of the maximum side length, so the same relative
    /// coordinate on consecutive triangles always differs by exactly one
    /// max-triangle-length, whatever the triangles' true side lengths.
    pub fn network_index(&self, side: usize, led: usize, layer: usize) -> usize {
        let (triangle, side_in_triangle) = self.split(side);
        triangle * self.max_triangle_length
            + layer * SIDES_PER_TRIANGLE * self.max_side_length
            + side_in_triangle * self.max_side_length
            + led
    }
}

/// The stage truss adapter.
pub struct StageOutput {
    settings: Mutex<StageSettings>,
    enabled: AtomicBool,
    map: Mutex<TrussMap>,
    backend: RwLock<Backend>,
    registry: VisualizerRegistry,
    transform: Mutex<ColorTransform>,
    sink: CommandSink,
}

impl StageOutput {
    pub fn new(settings: StageSettings, transform: ColorTransform, sink: CommandSink) -> Self {
        let backend = Backend::from_settings(&settings.device);
        let map = TrussMap::new(settings.triangles.clone(), settings.layers);
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

    /// Set a pixel by truss coordinate. The addressing scheme follows the
    /// backend the structure currently owns.
    pub fn set_pixel_side(&self, side: usize, led: usize, layer: usize, color: Color) {
        self.sink.send(PixelCommand::set(
            PixelAddress::Truss { side, led, layer },
            color,
        ));
        let backend = self.backend.read();
        let index = {
            let map = self.map.lock();
            if backend.is_serial() {
                map.serial_index(side, led, layer)
            } else {
                map.network_index(side, led, layer)
            }
        };
        let corrected = self.transform.lock().apply(color);
        backend.set_linear(index, corrected);
    }

    /// Swap the output color correction.
    pub fn set_transform(&self, transform: ColorTransform) {
        *self.transform.lock() = transform;
    }

    /// Apply new settings; a changed link or threading flag tears the old
    /// driver down before the replacement exists.
    pub fn apply_settings(&self, new: &StageSettings) -> Result<()> {
        let rebuild = {
            let current = self.settings.lock();
            current.device.link != new.device.link || current.device.threaded != new.device.threaded
        };
        if rebuild {
            let mut backend = self.backend.write();
            backend.set_active(false)?;
            *backend = Backend::from_settings(&new.device);
            info!("stage driver rebuilt");
        } else {
            debug!("stage settings updated in place");
        }
        self.enabled.store(new.device.enabled, Ordering::SeqCst);
        *self.map.lock() = TrussMap::new(new.triangles.clone(), new.layers);
        *self.settings.lock() = new.clone();
        Ok(())
    }
}

impl Output for StageOutput {
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

#[cfg(test)]
mod tests {
    use super::*;
    use glimmer_core::{DeviceSettings, LinkConfig};

    fn uneven_map() -> TrussMap {
        TrussMap::new(vec![[10, 12, 11], [8, 8, 8], [12, 9, 7]], 2)
    }

    #[test]
    fn test_serial_uses_true_lengths() {
        let map = uneven_map();
        // Triangle 0 holds 2 layers of 33 LEDs.
        assert_eq!(map.serial_index(0, 0, 0), 0);
        assert_eq!(map.serial_index(1, 2, 0), 12);
        assert_eq!(map.serial_index(1, 2, 1), 45);
        // Triangle 1 starts right after triangle 0's 66 LEDs.
        assert_eq!(map.serial_index(3, 0, 0), 66);
        // Triangle 2 starts after 66 + 48.
        assert_eq!(map.serial_index(6, 0, 0), 114);
    }

    #[test]
    fn test_network_slots_are_uniform() {
        let map = uneven_map();
        assert_eq!(map.max_triangle_length(), 72);

        // The same relative coordinate on consecutive triangles differs by
        // exactly one max-triangle-length, regardless of the triangles'
        // true (shorter) side lengths.
        for (side_in_triangle, led, layer) in [(0, 0, 0), (1, 3, 1), (2, 6, 0)] {
            for triangle in 0..2 {
                let here = map.network_index(triangle * 3 + side_in_triangle, led, layer);
                let next = map.network_index((triangle + 1) * 3 + side_in_triangle, led, layer);
                assert_eq!(next - here, 72);
            }
        }
    }

    #[test]
    fn test_network_layer_and_side_slots() {
        let map = uneven_map();
        // Slots inside a triangle are multiples of the max side length.
        assert_eq!(map.network_index(0, 0, 0), 0);
        assert_eq!(map.network_index(1, 0, 0), 12);
        assert_eq!(map.network_index(2, 5, 0), 29);
        assert_eq!(map.network_index(0, 0, 1), 36);
    }

    fn network_settings() -> StageSettings {
        StageSettings {
            device: DeviceSettings {
                enabled: true,
                link: LinkConfig::Network {
                    address: "127.0.0.1:7890".into(),
                },
                threaded: false,
            },
            triangles: vec![[10, 12, 11], [8, 8, 8]],
            layers: 2,
        }
    }

    #[test]
    fn test_backend_selects_addressing_scheme() {
        let output = StageOutput::new(
            network_settings(),
            ColorTransform::identity(),
            CommandSink::disconnected(),
        );
        output.set_pixel_side(3, 0, 0, Color::WHITE);

        // Network scheme: triangle 1 lands exactly one fixed slot in on
        // the default channel, so the high-water mark is 72 + 1 pixels.
        match &*output.backend.read() {
            Backend::Network(driver) => {
                let frames = driver.frames_for_test();
                assert_eq!(frames[0], 0);
                let byte_len = u16::from_be_bytes([frames[2], frames[3]]) as usize;
                assert_eq!(byte_len / 3, 73);
            }
            Backend::Serial(_) => panic!("expected a network backend"),
        };
    }

    #[test]
    fn test_stage_settings_rebuild_on_link_change() {
        let output = StageOutput::new(
            network_settings(),
            ColorTransform::identity(),
            CommandSink::disconnected(),
        );

        let mut changed = network_settings();
        changed.device.link = LinkConfig::Serial {
            port: "truss".into(),
            baud: 115_200,
        };
        output.apply_settings(&changed).unwrap();

        assert!(output.backend.read().is_serial());
        // The serial scheme now packs true lengths.
        output.set_pixel_side(3, 0, 0, Color::WHITE);
        match &*output.backend.read() {
            Backend::Serial(driver) => {
                let bytes = driver.drain_queued();
                let word = u16::from_le_bytes([bytes[0], bytes[1]]);
                assert_eq!(word as usize - 1, 66);
            }
            Backend::Network(_) => panic!("expected a serial backend"),
        };
    }
}
