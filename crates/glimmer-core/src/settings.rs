//! Installation settings - an observable property bag
//!
//! One flat bag holds every port, address, threading flag, and dimension
//! the pipeline needs. The GUI (outside this core) mutates it through
//! [`SettingsHandle::update`]; structure adapters subscribe to typed
//! change notifications and rebuild their drivers when a hardware-relevant
//! section changes.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hardware link selection for one device: a framed serial port or an
/// OPC-style network socket, mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkConfig {
    /// Framed serial protocol to one microcontroller.
    Serial { port: String, baud: u32 },
    /// OPC-style TCP socket, address form `"host:port[:channel]"`.
    Network { address: String },
}

/// Driver settings shared by every structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Configuration-derived intent to use the device at all.
    pub enabled: bool,
    pub link: LinkConfig,
    /// Run a dedicated drain thread for this device; otherwise the
    /// scheduler thread drains it cooperatively each tick.
    pub threaded: bool,
}

impl DeviceSettings {
    /// A disabled serial device on `port`.
    pub fn serial(port: &str, baud: u32) -> Self {
        Self {
            enabled: false,
            link: LinkConfig::Serial {
                port: port.to_string(),
                baud,
            },
            threaded: true,
        }
    }

    /// A disabled network device at `address`.
    pub fn network(address: &str) -> Self {
        Self {
            enabled: false,
            link: LinkConfig::Network {
                address: address.to_string(),
            },
            threaded: true,
        }
    }
}

/// Serpentine grid structures (board, bar, flat panel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSettings {
    pub device: DeviceSettings,
    /// LEDs per row.
    pub row_length: usize,
    /// Total rows.
    pub rows: usize,
    /// Rows wired from one strip; odd rows within a strip run backwards.
    pub rows_per_strip: usize,
}

/// The triangular stage truss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSettings {
    pub device: DeviceSettings,
    /// Per-triangle side lengths in LEDs, one layer deep.
    pub triangles: Vec<[usize; 3]>,
    /// Parallel LED layers per triangle.
    pub layers: usize,
}

/// One strip of a polyhedral shape and the OPC channel it hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripSpec {
    pub channel: u8,
    pub length: usize,
}

/// Polyhedral shapes: strips grouped onto channels by a per-shape table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolySettings {
    pub device: DeviceSettings,
    pub strips: Vec<StripSpec>,
}

/// The dome: one logical pixel space fanned out over several serial
/// control boxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomeSettings {
    pub enabled: bool,
    /// One serial port per control box.
    pub ports: Vec<String>,
    pub baud: u32,
    pub threaded: bool,
    /// Uniform pixel count per control box.
    pub device_length: usize,
}

/// Output color correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSettings {
    /// Global brightness scale, 0.0..=1.0.
    pub brightness: f32,
    /// Apply gamma 2.2 correction at encode time.
    pub gamma_enabled: bool,
}

/// The whole installation bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub board: GridSettings,
    pub bar: GridSettings,
    pub panel: GridSettings,
    pub stage: StageSettings,
    pub poly: PolySettings,
    pub dome: DomeSettings,
    pub color: ColorSettings,
    /// LEDs trimmed off every strut length in the topology.
    pub strut_trim: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            board: GridSettings {
                device: DeviceSettings::serial("/dev/ttyACM0", 115_200),
                row_length: 30,
                rows: 18,
                rows_per_strip: 3,
            },
            bar: GridSettings {
                device: DeviceSettings::serial("/dev/ttyACM1", 115_200),
                row_length: 60,
                rows: 2,
                rows_per_strip: 2,
            },
            panel: GridSettings {
                device: DeviceSettings::serial("/dev/ttyACM2", 115_200),
                row_length: 32,
                rows: 8,
                rows_per_strip: 1,
            },
            stage: StageSettings {
                device: DeviceSettings::network("127.0.0.1:7890"),
                triangles: vec![[29, 29, 29]; 4],
                layers: 2,
            },
            poly: PolySettings {
                device: DeviceSettings::network("127.0.0.1:7890:1"),
                strips: Vec::new(),
            },
            dome: DomeSettings {
                enabled: false,
                ports: Vec::new(),
                baud: 115_200,
                threaded: true,
                device_length: 512,
            },
            color: ColorSettings {
                brightness: 1.0,
                gamma_enabled: false,
            },
            strut_trim: 0,
        }
    }
}

/// Which section of the bag changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsEvent {
    Board,
    Bar,
    Panel,
    Stage,
    Poly,
    Dome,
    Color,
    Trim,
}

/// Shared, observable settings. Cloning the handle shares the same bag.
#[derive(Clone)]
pub struct SettingsHandle {
    shared: Arc<Shared>,
}

struct Shared {
    settings: RwLock<Settings>,
    subscribers: Mutex<Vec<Sender<SettingsEvent>>>,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            shared: Arc::new(Shared {
                settings: RwLock::new(settings),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Copy of the current bag.
    pub fn snapshot(&self) -> Settings {
        self.shared.settings.read().clone()
    }

    /// Subscribe to change notifications. Every mutation broadcasts one
    /// event per changed section to every live subscriber.
    pub fn subscribe(&self) -> Receiver<SettingsEvent> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Mutate the bag and notify subscribers of the sections that changed.
    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) {
        let events = {
            let mut guard = self.shared.settings.write();
            let before = guard.clone();
            mutate(&mut guard);
            diff(&before, &guard)
        };
        if events.is_empty() {
            return;
        }
        debug!(?events, "settings changed");
        let mut subscribers = self.shared.subscribers.lock();
        subscribers.retain(|tx| events.iter().all(|&e| tx.send(e).is_ok()));
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

fn diff(before: &Settings, after: &Settings) -> Vec<SettingsEvent> {
    let mut events = Vec::new();
    if before.board != after.board {
        events.push(SettingsEvent::Board);
    }
    if before.bar != after.bar {
        events.push(SettingsEvent::Bar);
    }
    if before.panel != after.panel {
        events.push(SettingsEvent::Panel);
    }
    if before.stage != after.stage {
        events.push(SettingsEvent::Stage);
    }
    if before.poly != after.poly {
        events.push(SettingsEvent::Poly);
    }
    if before.dome != after.dome {
        events.push(SettingsEvent::Dome);
    }
    if before.color != after.color {
        events.push(SettingsEvent::Color);
    }
    if before.strut_trim != after.strut_trim {
        events.push(SettingsEvent::Trim);
    }
    events
}
