//! OPC-style network protocol driver
//!
//! Channel-oriented pixel streaming over a TCP socket. The driver keeps,
//! per channel, the last known color for every pixel index ever set and
//! the highest index seen; that high-water mark defines the channel's
//! transmitted length - not the true device length, which the driver
//! never learns. A drain serializes each channel as
//! `[channel][command=0][u16 BE byte length][R,G,B]*` and concatenates
//! every channel frame into one send.
//!
//! There is no reconnect logic: a broken link silently drops frames until
//! the driver is externally toggled.

use std::collections::HashMap;
use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use glimmer_core::{Color, FpsCallback, FrameRateCounter};

use crate::driver::DriverState;
use crate::Result;

const DEFAULT_PORT: u16 = 7890;
const COMMAND_SET_PIXELS: u8 = 0x00;

/// Parsed `"host:port[:channel]"` address.
///
/// Malformed trailing parts default silently: a missing or unparseable
/// port becomes 7890, a missing channel becomes 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcAddress {
    pub host: String,
    pub port: u16,
    pub channel: u8,
}

impl OpcAddress {
    pub fn parse(address: &str) -> Self {
        let mut parts = address.split(':');
        let host = parts.next().unwrap_or_default().to_string();
        let port = match parts.next().map(str::parse) {
            Some(Ok(port)) => port,
            _ => {
                debug!(%address, port = DEFAULT_PORT, "OPC port defaulted");
                DEFAULT_PORT
            }
        };
        let channel = match parts.next().map(str::parse) {
            Some(Ok(channel)) => channel,
            _ => 0,
        };
        Self {
            host,
            port,
            channel,
        }
    }
}

/// Network driver configuration. The driver is rebuilt, not mutated, when
/// any of this changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcConfig {
    /// Address string, `"host:port[:channel]"`.
    pub address: String,
    /// Run a dedicated drain thread; otherwise `operator_update` drains
    /// cooperatively on the caller's thread.
    pub threaded: bool,
}

#[derive(Default)]
struct ChannelBuffer {
    pixels: HashMap<u16, Color>,
    /// Highest index + 1 ever set: the transmitted length.
    length: u16,
}

/// OPC-style network protocol driver.
pub struct OpcDriver {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    config: OpcConfig,
    address: OpcAddress,
    state: Mutex<DriverState>,
    sink: Mutex<Option<Box<dyn Write + Send>>>,
    channels: Mutex<HashMap<u8, ChannelBuffer>>,
    stop: AtomicBool,
    fps: Mutex<Option<FrameRateCounter>>,
}

impl OpcDriver {
    pub fn new(config: OpcConfig) -> Self {
        let address = OpcAddress::parse(&config.address);
        Self {
            inner: Arc::new(Inner {
                config,
                address,
                state: Mutex::new(DriverState::Uninitialized),
                sink: Mutex::new(None),
                channels: Mutex::new(HashMap::new()),
                stop: AtomicBool::new(false),
                fps: Mutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OpcConfig {
        &self.inner.config
    }

    pub fn address(&self) -> &OpcAddress {
        &self.inner.address
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

    /// Set a pixel on the channel named by the configured address.
    pub fn set_pixel(&self, index: usize, color: Color) {
        self.set_channel_pixel(self.inner.address.channel, index, color);
    }

    /// Record `color` as the last known value of `(channel, index)` and
    /// grow that channel's transmitted length if the index is new
    /// territory.
    pub fn set_channel_pixel(&self, channel: u8, index: usize, color: Color) {
        let mut channels = self.inner.channels.lock();
        let buffer = channels.entry(channel).or_default();
        let index = index as u16;
        buffer.pixels.insert(index, color);
        buffer.length = buffer.length.max(index + 1);
    }

    /// End-of-frame marker. OPC messages are self-delimiting, so nothing
    /// extra goes on the wire; the next drain snapshots current state.
    pub fn flush(&self) {}

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

    /// Start or stop the driver. Stopping clears the color map and the
    /// length tracker, so reactivation starts clean rather than replaying
    /// stale state.
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
                debug!(address = %self.inner.config.address, state = ?*state, "OPC start ignored");
                return Ok(());
            }
            *state = DriverState::Starting;
        }

        let connected = TcpStream::connect((self.inner.address.host.as_str(), self.inner.address.port));
        let stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                *self.inner.state.lock() = DriverState::Uninitialized;
                return Err(e.into());
            }
        };
        *self.inner.sink.lock() = Some(Box::new(stream));

        if self.inner.config.threaded {
            if let Err(e) = self.spawn_worker() {
                *self.inner.sink.lock() = None;
                *self.inner.state.lock() = DriverState::Uninitialized;
                return Err(e.into());
            }
        }

        *self.inner.state.lock() = DriverState::Active;
        info!(
            address = %self.inner.config.address,
            threaded = self.inner.config.threaded,
            "OPC driver active"
        );
        Ok(())
    }

    fn spawn_worker(&self) -> std::io::Result<()> {
        self.inner.stop.store(false, Ordering::SeqCst);
        let inner = self.inner.clone();
        let handle = std::thread::Builder::new()
            .name(format!("glimmer-opc-{}", self.inner.config.address))
            .spawn(move || {
                while !inner.stop.load(Ordering::SeqCst) {
                    inner.drain_once();
                }
            })?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn frames_for_test(&self) -> Vec<u8> {
        self.inner.build_frames()
    }

    fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state != DriverState::Active {
                debug!(address = %self.inner.config.address, state = ?*state, "OPC stop ignored");
                return;
            }
            *state = DriverState::Stopping;
        }

        self.inner.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }

        *self.inner.sink.lock() = None;
        self.inner.channels.lock().clear();
        *self.inner.state.lock() = DriverState::Uninitialized;
        info!(address = %self.inner.config.address, "OPC driver stopped");
    }
}

impl Inner {
    /// Serialize every channel's current state and perform one blocking
    /// send. Draining with no channel data is a no-op.
    fn drain_once(&self) {
        let frames = self.build_frames();
        if frames.is_empty() {
            return;
        }

        {
            let mut sink = self.sink.lock();
            if let Some(writer) = sink.as_mut() {
                if let Err(e) = writer.write_all(&frames) {
                    warn!(address = %self.config.address, error = %e, "OPC send dropped");
                }
            }
        }
        trace!(address = %self.config.address, bytes = frames.len(), "OPC drain");

        if let Some(counter) = self.fps.lock().as_mut() {
            counter.frame();
        }
    }

    /// Build the concatenated channel frames, ascending channel order.
    /// Pixels never set within a channel's transmitted length serialize
    /// as off.
    fn build_frames(&self) -> Vec<u8> {
        let channels = self.channels.lock();
        let mut ids: Vec<u8> = channels.keys().copied().collect();
        ids.sort_unstable();

        let mut out = Vec::new();
        for id in ids {
            let buffer = &channels[&id];
            if buffer.length == 0 {
                continue;
            }
            let byte_len = buffer.length as usize * 3;
            out.push(id);
            out.push(COMMAND_SET_PIXELS);
            out.extend_from_slice(&(byte_len as u16).to_be_bytes());

            let mut data = vec![0u8; byte_len];
            for (&index, &color) in &buffer.pixels {
                let at = index as usize * 3;
                data[at] = color.r();
                data[at + 1] = color.g();
                data[at + 2] = color.b();
            }
            out.extend_from_slice(&data);
        }
        out
    }
}
