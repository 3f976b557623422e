//! Framed serial protocol driver
//!
//! Streams pixel frames to one microcontroller over a byte-stream link.
//! Wire format:
//! - pixel frame: 5 bytes `[u16 LE (index + 1)][R][G][B]`
//! - flush: the reserved all-zero index word (2 bytes); real index words
//!   are always offset by one, so zero never collides
//! - enable handshake: a single `0x01` byte once, right after port open
//! - exit frame: the all-zero word written synchronously before close
//!
//! Producers enqueue encoded frames from the scheduler thread; the single
//! consumer - a dedicated drain thread, or the scheduler cooperatively -
//! dequeues everything currently present, concatenates it, and performs
//! exactly one blocking write. That amortizes syscalls and guarantees
//! frames are never torn or interleaved. Write errors are swallowed: a
//! live show never halts over a dropped frame, the next drain repaints.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use glimmer_core::{Color, FpsCallback, FrameRateCounter};

use crate::driver::DriverState;
use crate::Result;

/// Offset added to every pixel index on the wire, keeping the zero word
/// reserved for the flush sentinel.
pub const INDEX_OFFSET: u16 = 1;

/// The reserved all-zero word: end-of-frame on the wire, and the exit
/// frame written before close.
pub const FLUSH_SENTINEL: [u8; 2] = [0x00, 0x00];

/// Single byte written once when the port opens.
pub const ENABLE_HANDSHAKE: u8 = 0x01;

/// Encode one pixel update as a 5-byte wire frame.
pub fn encode_pixel(index: usize, color: Color) -> [u8; 5] {
    let word = index as u16 + INDEX_OFFSET;
    let [lo, hi] = word.to_le_bytes();
    [lo, hi, color.r(), color.g(), color.b()]
}

/// A frame decoded back from the byte stream, for simulators and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFrame {
    Pixel { index: usize, color: Color },
    Flush,
}

/// Decode a drained byte stream back into frames.
pub fn decode_frames(bytes: &[u8]) -> Vec<WireFrame> {
    let mut frames = Vec::new();
    let mut cursor = 0;
    while cursor + 2 <= bytes.len() {
        let word = u16::from_le_bytes([bytes[cursor], bytes[cursor + 1]]);
        if word == 0 {
            frames.push(WireFrame::Flush);
            cursor += 2;
            continue;
        }
        if cursor + 5 > bytes.len() {
            break;
        }
        frames.push(WireFrame::Pixel {
            index: (word - INDEX_OFFSET) as usize,
            color: Color::from_rgb(bytes[cursor + 2], bytes[cursor + 3], bytes[cursor + 4]),
        });
        cursor += 5;
    }
    frames
}

/// Serial driver configuration. The driver is rebuilt, not mutated, when
/// any of this changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
    /// Run a dedicated drain thread; otherwise `operator_update` drains
    /// cooperatively on the caller's thread.
    pub threaded: bool,
}

/// Framed serial protocol driver for one microcontroller.
pub struct SerialDriver {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    config: SerialConfig,
    state: Mutex<DriverState>,
    sink: Mutex<Option<Box<dyn Write + Send>>>,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    drain_lock: Mutex<()>,
    stop: AtomicBool,
    fps: Mutex<Option<FrameRateCounter>>,
}

impl SerialDriver {
    pub fn new(config: SerialConfig) -> Self {
        let (tx, rx) = unbounded();
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(DriverState::Uninitialized),
                sink: Mutex::new(None),
                tx,
                rx,
                drain_lock: Mutex::new(()),
                stop: AtomicBool::new(false),
                fps: Mutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.inner.config
    }

    pub fn state(&self) -> DriverState {
        *self.inner.state.lock()
    }

    pub fn active(&self) -> bool {
        self.state().is_active()
    }

    /// Report frames-per-second through `callback` once per second. The
    /// callback runs on the drain path and must not block.
    pub fn set_fps_callback(&self, callback: FpsCallback) {
        *self.inner.fps.lock() = Some(FrameRateCounter::new(callback));
    }

    /// Queue one pixel update. Many producers may call this concurrently;
    /// nothing reaches the wire until a drain.
    pub fn set_pixel(&self, index: usize, color: Color) {
        let _ = self.inner.tx.send(encode_pixel(index, color).to_vec());
    }

    /// Queue an end-of-frame sentinel.
    pub fn flush(&self) {
        let _ = self.inner.tx.send(FLUSH_SENTINEL.to_vec());
    }

    /// Cooperative drain on the caller's thread; a no-op when the driver
    /// runs its own drain thread.
    pub fn operator_update(&self) {
        if self.inner.config.threaded {
            return;
        }
        if self.active() {
            self.inner.drain_once();
        }
    }

    /// Start or stop the driver. Starting opens the port, writes the
    /// enable handshake and, when configured, spawns the drain thread.
    /// Stopping joins that thread, writes the exit frame and closes the
    /// port; once it returns no further hardware writes happen.
    pub fn set_active(&self, active: bool) -> Result<()> {
        if active {
            self.start()
        } else {
            self.stop();
            Ok(())
        }
    }

    fn start(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != DriverState::Uninitialized {
                debug!(port = %self.inner.config.port, state = ?*state, "serial start ignored");
                return Ok(());
            }
            *state = DriverState::Starting;
        }

        if let Err(e) = self.open_port() {
            *self.inner.state.lock() = DriverState::Uninitialized;
            return Err(e);
        }

        if self.inner.config.threaded {
            if let Err(e) = self.spawn_worker() {
                *self.inner.sink.lock() = None;
                *self.inner.state.lock() = DriverState::Uninitialized;
                return Err(e.into());
            }
        }

        *self.inner.state.lock() = DriverState::Active;
        info!(
            port = %self.inner.config.port,
            threaded = self.inner.config.threaded,
            "serial driver active"
        );
        Ok(())
    }

    fn open_port(&self) -> Result<()> {
        let mut port = serialport::new(self.inner.config.port.as_str(), self.inner.config.baud)
            .open()?;
        port.write_all(&[ENABLE_HANDSHAKE])?;
        *self.inner.sink.lock() = Some(Box::new(port));
        Ok(())
    }

    fn spawn_worker(&self) -> std::io::Result<()> {
        self.inner.stop.store(false, Ordering::SeqCst);
        let inner = self.inner.clone();
        let handle = std::thread::Builder::new()
            .name(format!("glimmer-serial-{}", self.inner.config.port))
            .spawn(move || {
                while !inner.stop.load(Ordering::SeqCst) {
                    inner.drain_once();
                }
            })?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state != DriverState::Active {
                debug!(port = %self.inner.config.port, state = ?*state, "serial stop ignored");
                return;
            }
            *state = DriverState::Stopping;
        }

        // An in-flight write is allowed to finish; only the next loop
        // iteration is prevented.
        self.inner.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }

        // The exit frame is written synchronously outside the loop, after
        // the join, so it cannot race the last queued bytes.
        {
            let mut sink = self.inner.sink.lock();
            if let Some(writer) = sink.as_mut() {
                if let Err(e) = writer.write_all(&FLUSH_SENTINEL) {
                    warn!(port = %self.inner.config.port, error = %e, "exit frame dropped");
                }
            }
            *sink = None;
        }

        *self.inner.state.lock() = DriverState::Uninitialized;
        info!(port = %self.inner.config.port, "serial driver stopped");
    }

    #[cfg(test)]
    pub(crate) fn drain_queued(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        for frame in self.inner.rx.try_iter() {
            buffer.extend_from_slice(&frame);
        }
        buffer
    }
}

impl Inner {
    /// Dequeue everything currently present and perform exactly one
    /// blocking write. Draining an empty queue is a no-op.
    fn drain_once(&self) {
        // A second concurrent drain would interleave frames: that is an
        // invariant violation, not a recoverable error.
        let Some(_guard) = self.drain_lock.try_lock() else {
            panic!("concurrent serial drain on {}", self.config.port);
        };

        let mut buffer = Vec::new();
        for frame in self.rx.try_iter() {
            buffer.extend_from_slice(&frame);
        }
        if buffer.is_empty() {
            return;
        }

        {
            let mut sink = self.sink.lock();
            if let Some(writer) = sink.as_mut() {
                if let Err(e) = writer.write_all(&buffer) {
                    warn!(port = %self.config.port, error = %e, "serial write dropped");
                }
            }
        }
        trace!(port = %self.config.port, bytes = buffer.len(), "serial drain");

        if let Some(counter) = self.fps.lock().as_mut() {
            counter.frame();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::RecvTimeoutError;
    use std::time::Duration;

    /// Collects everything written, so tests can decode the byte stream.
    #[derive(Clone, Default)]
    struct CaptureWriter {
        bytes: Arc<Mutex<Vec<u8>>>,
        writes: Arc<Mutex<usize>>,
    }

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.lock().extend_from_slice(buf);
            *self.writes.lock() += 1;
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Blocks inside the first write until released; passes through after.
    struct BlockingWriter {
        entered: Sender<()>,
        release: Receiver<()>,
        released: bool,
    }

    impl Write for BlockingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.released {
                let _ = self.entered.send(());
                let _ = self.release.recv();
                self.released = true;
            }
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn cooperative_driver() -> (SerialDriver, CaptureWriter) {
        let driver = SerialDriver::new(SerialConfig {
            port: "test".into(),
            baud: 115_200,
            threaded: false,
        });
        let writer = CaptureWriter::default();
        *driver.inner.sink.lock() = Some(Box::new(writer.clone()));
        *driver.inner.state.lock() = DriverState::Active;
        (driver, writer)
    }

    #[test]
    fn test_pixel_frame_layout() {
        let frame = encode_pixel(2, Color::from_packed(0xAABBCC));
        // Index word is little-endian and offset by one.
        assert_eq!(frame, [0x03, 0x00, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_index_zero_never_collides_with_flush() {
        let frame = encode_pixel(0, Color::BLACK);
        assert_ne!([frame[0], frame[1]], FLUSH_SENTINEL);
    }

    #[test]
    fn test_set_pixel_flush_drain_round_trip() {
        let (driver, writer) = cooperative_driver();

        let color = Color::from_packed(0xAABBCC);
        driver.set_pixel(7, color);
        driver.flush();
        driver.operator_update();

        let frames = decode_frames(&writer.bytes.lock());
        assert_eq!(
            frames,
            vec![WireFrame::Pixel { index: 7, color }, WireFrame::Flush]
        );
    }

    #[test]
    fn test_double_flush_yields_two_flush_frames() {
        let (driver, writer) = cooperative_driver();

        driver.flush();
        driver.flush();
        driver.operator_update();

        let frames = decode_frames(&writer.bytes.lock());
        assert_eq!(frames, vec![WireFrame::Flush, WireFrame::Flush]);
    }

    #[test]
    fn test_empty_drain_is_noop() {
        let (driver, writer) = cooperative_driver();
        driver.operator_update();
        assert!(writer.bytes.lock().is_empty());
        assert_eq!(*writer.writes.lock(), 0);
    }

    #[test]
    fn test_drain_performs_one_blocking_write() {
        let (driver, writer) = cooperative_driver();

        for i in 0..50 {
            driver.set_pixel(i, Color::from_rgb(1, 2, 3));
        }
        driver.flush();
        driver.operator_update();

        assert_eq!(*writer.writes.lock(), 1);
        assert_eq!(writer.bytes.lock().len(), 50 * 5 + 2);
    }

    #[test]
    fn test_threaded_operator_update_is_noop() {
        let driver = SerialDriver::new(SerialConfig {
            port: "test".into(),
            baud: 115_200,
            threaded: true,
        });
        let writer = CaptureWriter::default();
        *driver.inner.sink.lock() = Some(Box::new(writer.clone()));
        *driver.inner.state.lock() = DriverState::Active;

        driver.set_pixel(0, Color::WHITE);
        driver.operator_update();

        // Self-threaded: the cooperative path must not touch the queue.
        assert!(writer.bytes.lock().is_empty());
        assert_eq!(driver.drain_queued().len(), 5);
    }

    #[test]
    fn test_stop_when_not_active_is_ignored() {
        let driver = SerialDriver::new(SerialConfig {
            port: "test".into(),
            baud: 115_200,
            threaded: false,
        });
        driver.set_active(false).unwrap();
        assert_eq!(driver.state(), DriverState::Uninitialized);
    }

    #[test]
    fn test_deactivate_joins_blocked_drain_thread() {
        let (entered_tx, entered_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();

        let driver = Arc::new(SerialDriver::new(SerialConfig {
            port: "test".into(),
            baud: 115_200,
            threaded: true,
        }));
        *driver.inner.sink.lock() = Some(Box::new(BlockingWriter {
            entered: entered_tx,
            release: release_rx,
            released: false,
        }));
        *driver.inner.state.lock() = DriverState::Active;
        driver.spawn_worker().unwrap();

        // Get the drain thread stuck inside a write.
        driver.set_pixel(1, Color::WHITE);
        entered_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("drain thread entered write");

        let (done_tx, done_rx) = unbounded();
        let deactivator = driver.clone();
        std::thread::spawn(move || {
            deactivator.set_active(false).unwrap();
            let _ = done_tx.send(());
        });

        // The caller must stay blocked while the write is in flight.
        assert_eq!(
            done_rx.recv_timeout(Duration::from_millis(150)),
            Err(RecvTimeoutError::Timeout)
        );

        release_tx.send(()).unwrap();
        done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("deactivation returned after the thread exited");
        assert_eq!(driver.state(), DriverState::Uninitialized);
    }
}
