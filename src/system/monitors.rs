use serde::Serialize;
use tracing::{info, warn};

use super::backend::DisplayControl;

pub const DEFAULT_MONITOR_ID: &str = "default";
pub const DEFAULT_MONITOR_NAME: &str = "Default Monitor";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Monitor {
    pub id: String,
    pub display_name: String,
    /// Backend handle, e.g. the ddcutil display number. `None` for xrandr outputs.
    pub backend_ref: Option<String>,
}

impl Monitor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        backend_ref: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            backend_ref,
        }
    }

    pub fn fallback_default() -> Self {
        Self::new(DEFAULT_MONITOR_ID, DEFAULT_MONITOR_NAME, None)
    }
}

/// Snapshot of the monitors discovered at startup. Never empty.
#[derive(Debug, Clone)]
pub struct MonitorRegistry {
    monitors: Vec<Monitor>,
}

impl MonitorRegistry {
    pub fn discover<B>(backend: &B) -> Self
    where
        B: DisplayControl + ?Sized,
    {
        let monitors = backend.list_monitors();
        if monitors.is_empty() {
            warn!(
                backend = ?backend.kind(),
                "no monitors discovered; using synthetic default monitor"
            );
            return Self::from_monitors(Vec::new());
        }
        info!(count = monitors.len(), backend = ?backend.kind(), "discovered monitors");
        Self::from_monitors(monitors)
    }

    pub fn from_monitors(monitors: Vec<Monitor>) -> Self {
        if monitors.is_empty() {
            return Self {
                monitors: vec![Monitor::fallback_default()],
            };
        }
        Self { monitors }
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn get(&self, id: &str) -> Option<&Monitor> {
        self.monitors.iter().find(|monitor| monitor.id == id)
    }

    /// Looks up `id`, or builds an ad-hoc monitor for names that were never
    /// discovered (e.g. an xrandr output passed on the command line).
    pub fn resolve(&self, id: &str) -> Monitor {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| Monitor::new(id, id, None))
    }
}
