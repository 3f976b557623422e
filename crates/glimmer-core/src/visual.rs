//! Capability contracts: outputs, visualizers, inputs
//!
//! Every physical structure exposes [`Output`]; every painting algorithm
//! implements [`Visualizer`]; every sensor source implements [`Input`].
//! The scheduler arbitrates between them each tick. All methods take
//! `&self`: producers run on the scheduler thread while drain threads
//! consume, so implementations rely on interior mutability.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Color, Result};

/// A pluggable painting algorithm that writes pixels into the outputs it
/// holds, driven by sensor input.
pub trait Visualizer: Send + Sync {
    /// Arbitration priority; the highest registered priority wins an
    /// output, ties share it.
    fn priority(&self) -> i32;

    /// Whether the scheduler selected this visualizer last tick.
    fn enabled(&self) -> bool;

    /// Set by the scheduler every tick; implementations may do expensive
    /// work only on the rising or falling edge.
    fn set_enabled(&self, enabled: bool);

    /// The inputs this visualizer wants active while it is winning.
    fn inputs(&self) -> Vec<Arc<dyn Input>>;

    /// Paint one tick's worth of pixels.
    fn visualize(&self) -> Result<()>;
}

/// A sensor source (audio buffers, controller state) pulled once per tick
/// while some winning visualizer wants it.
pub trait Input: Send + Sync {
    fn enabled(&self) -> bool;

    /// Whether the input currently owns its capture resources.
    fn active(&self) -> bool;

    fn set_active(&self, active: bool) -> Result<()>;

    /// Pull buffered sensor data; called once per tick while active.
    fn operator_update(&self) -> Result<()>;
}

/// The uniform output contract every structure adapter exposes.
///
/// Colors set between two [`flush`](Output::flush) calls accumulate
/// last-write-wins per physical index; nothing reaches hardware until a
/// drain occurs. The LEDs themselves are stateful and retain the last
/// color indefinitely.
pub trait Output: Send + Sync {
    /// Configuration-derived intent to use the device.
    fn enabled(&self) -> bool;

    /// Hardware-resource-owning state: port open, socket connected,
    /// drain thread running.
    fn active(&self) -> bool;

    /// Start or stop the device. Stopping a self-threaded device joins
    /// its drain thread before returning: afterwards no further hardware
    /// writes happen.
    fn set_active(&self, active: bool) -> Result<()>;

    /// Priority bookkeeping only; registration implies nothing about
    /// activation.
    fn register_visualizer(&self, visualizer: Arc<dyn Visualizer>);

    /// The visualizers registered against this output.
    fn visualizers(&self) -> Vec<Arc<dyn Visualizer>>;

    /// Cooperative drain, called by the scheduler after painting; a no-op
    /// when the device runs its own drain thread.
    fn operator_update(&self) -> Result<()>;

    /// End-of-frame marker.
    fn flush(&self);

    /// Set one pixel by linear physical index. Structure adapters also
    /// expose coordinate-specific inherent overloads.
    fn set_pixel(&self, index: usize, color: Color);
}

/// Priority bookkeeping shared by the output adapters.
#[derive(Default)]
pub struct VisualizerRegistry {
    entries: Mutex<Vec<Arc<dyn Visualizer>>>,
}

impl VisualizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, visualizer: Arc<dyn Visualizer>) {
        self.entries.lock().push(visualizer);
    }

    pub fn list(&self) -> Vec<Arc<dyn Visualizer>> {
        self.entries.lock().clone()
    }
}
