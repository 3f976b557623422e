//! Glimmer Core - Output Pipeline Contracts and Scheduling
//!
//! This crate contains the device-independent half of the output pipeline:
//! - The capability contracts every structure output, painting algorithm,
//!   and sensor input implements ([`visual`])
//! - Packed colors and encode-time output correction ([`color`])
//! - The one-way pixel command queue external simulators read ([`command`])
//! - The observable installation settings bag ([`settings`])
//! - Frames-per-second telemetry for the drivers ([`telemetry`])
//! - The tick scheduler that arbitrates visualizers over outputs
//!   ([`scheduler`])
//!
//! The wire-protocol drivers and structure adapters live in
//! `glimmer-output`; the frame graph lives in `glimmer-topology`.

use thiserror::Error;

pub mod color;
pub mod command;
pub mod scheduler;
pub mod settings;
pub mod telemetry;
pub mod visual;

pub use color::{Color, ColorTransform};
pub use command::{CommandSink, PixelAddress, PixelCommand};
pub use scheduler::Scheduler;
pub use settings::{
    ColorSettings, DeviceSettings, DomeSettings, GridSettings, LinkConfig, PolySettings, Settings,
    SettingsEvent, SettingsHandle, StageSettings, StripSpec,
};
pub use telemetry::{FpsCallback, FrameRateCounter};
pub use visual::{Input, Output, Visualizer, VisualizerRegistry};

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Device driver failure surfaced through a capability trait
    #[error("Device error: {0}")]
    Device(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, CoreError>;
