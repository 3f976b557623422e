//! Frames-per-second telemetry for the drivers

use std::time::{Duration, Instant};

/// Callback receiving frames-per-second reports.
pub type FpsCallback = Box<dyn Fn(f32) + Send>;

/// Counts drained frames and reports the rate through a caller-supplied
/// callback once the current one-second window closes.
///
/// The callback runs inline on the drain path and must stay cheap - a
/// channel send or an atomic store, never blocking I/O.
pub struct FrameRateCounter {
    frames: u32,
    window_start: Instant,
    callback: FpsCallback,
}

impl FrameRateCounter {
    const REPORT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(callback: FpsCallback) -> Self {
        Self {
            frames: 0,
            window_start: Instant::now(),
            callback,
        }
    }

    /// Record one completed frame.
    pub fn frame(&mut self) {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Self::REPORT_INTERVAL {
            (self.callback)(self.frames as f32 / elapsed.as_secs_f32());
            self.frames = 0;
            self.window_start = Instant::now();
        }
    }
}
