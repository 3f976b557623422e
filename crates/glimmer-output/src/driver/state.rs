//! Driver lifecycle state

/// Explicit lifecycle of a hardware driver.
///
/// `Active` owns hardware resources: an open port, a connected socket, a
/// running drain thread. Transitions happen only under the owning driver's
/// lock, so start and stop are atomic per driver; a start or stop issued
/// from any other state is ignored rather than re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No hardware resources owned.
    Uninitialized,
    /// Resources being acquired.
    Starting,
    /// Port open / socket connected / drain thread running.
    Active,
    /// Orderly shutdown in progress.
    Stopping,
}

impl DriverState {
    /// Whether the driver currently owns hardware resources.
    pub fn is_active(self) -> bool {
        matches!(self, DriverState::Active)
    }
}
