use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::system::backend::{BackendKind, DisplayControl};
use crate::system::cache::BrightnessCache;
use crate::system::monitors::{Monitor, MonitorRegistry};
use crate::system::writer::{HardwareWriter, WriteSink};
use crate::util::{MAX_LEVEL, clamp_level, clamp_unit};

/// Routes drained writes from the background worker to the backend.
struct HardwareTarget<B> {
    backend: Arc<B>,
    registry: MonitorRegistry,
}

impl<B> WriteSink for HardwareTarget<B>
where
    B: DisplayControl,
{
    fn apply(&self, monitor_id: &str, value: f64) -> Result<()> {
        let monitor = self.registry.resolve(monitor_id);
        self.backend.write_brightness(&monitor, value)
    }
}

/// In-memory view of a monitor's level. `durable` is false for guesses made
/// after a failed hardware query; those never reach the cache.
#[derive(Debug, Clone, Copy)]
struct Remembered {
    level: f64,
    durable: bool,
}

/// Synchronous brightness API in front of slow display hardware.
///
/// Reads come from memory or the durable cache; writes update both right away
/// and reach the hardware later through the [`HardwareWriter`].
pub struct BrightnessController<B>
where
    B: DisplayControl,
{
    backend: Arc<B>,
    registry: MonitorRegistry,
    cache: BrightnessCache,
    levels: Mutex<HashMap<String, Remembered>>,
    writer: HardwareWriter,
}

impl<B> BrightnessController<B>
where
    B: DisplayControl,
{
    pub fn new(backend: B, cache: BrightnessCache, writer_interval: Duration) -> Result<Self> {
        let backend = Arc::new(backend);
        let registry = MonitorRegistry::discover(backend.as_ref());
        let target = Arc::new(HardwareTarget {
            backend: Arc::clone(&backend),
            registry: registry.clone(),
        });
        let writer = HardwareWriter::spawn(target, writer_interval)?;

        info!(
            backend = ?backend.kind(),
            monitors = registry.monitors().len(),
            cache = %cache.dir().display(),
            "brightness controller ready"
        );

        Ok(Self {
            backend,
            registry,
            cache,
            levels: Mutex::new(HashMap::new()),
            writer,
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn get_monitors(&self) -> &[Monitor] {
        self.registry.monitors()
    }

    pub fn get_brightness(&self, monitor_id: &str) -> f64 {
        let remembered = self.levels().get(monitor_id).copied();
        if let Some(Remembered { level, durable }) = remembered {
            if durable && self.cache.read(monitor_id).is_none() {
                self.cache.write(monitor_id, level);
            }
            return level;
        }

        if let Some(level) = self.cache.read(monitor_id) {
            self.remember(monitor_id, level, true);
            return level;
        }

        let monitor = self.registry.resolve(monitor_id);
        let level = match self.backend.read_brightness(&monitor) {
            Ok(Some(level)) => clamp_unit(level),
            Ok(None) => MAX_LEVEL,
            Err(err) => {
                // Remembered for this process only so a later run asks again.
                warn!(
                    monitor = %monitor_id,
                    error = %err,
                    "failed to query brightness; assuming {MAX_LEVEL}"
                );
                self.remember(monitor_id, MAX_LEVEL, false);
                return MAX_LEVEL;
            }
        };

        debug!(monitor = %monitor_id, level, "seeded brightness from backend");
        self.remember(monitor_id, level, true);
        self.cache.write(monitor_id, level);
        level
    }

    /// Accepts the request and returns immediately; `true` means accepted,
    /// not confirmed by the hardware.
    pub fn set_brightness(&self, monitor_id: &str, value: f64) -> bool {
        if value.is_nan() {
            warn!(monitor = %monitor_id, "rejecting NaN brightness");
            return false;
        }

        let level = clamp_level(value);
        self.remember(monitor_id, level, true);
        self.cache.write(monitor_id, level);
        self.writer.schedule(monitor_id, level);
        true
    }

    pub fn adjust_brightness(&self, monitor_id: &str, delta: f64) -> bool {
        if delta.is_nan() {
            warn!(monitor = %monitor_id, "rejecting NaN brightness step");
            return false;
        }
        let current = self.get_brightness(monitor_id);
        self.set_brightness(monitor_id, clamp_level(current + delta))
    }

    pub fn set_all(&self, value: f64) -> bool {
        self.registry
            .monitors()
            .iter()
            .fold(true, |ok, monitor| self.set_brightness(&monitor.id, value) && ok)
    }

    pub fn reset_all(&self) -> bool {
        self.set_all(MAX_LEVEL)
    }

    /// Pushes every pending write to the hardware before returning, bounded
    /// by `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.writer.flush(timeout)
    }

    fn remember(&self, monitor_id: &str, level: f64, durable: bool) {
        self.levels()
            .insert(monitor_id.to_string(), Remembered { level, durable });
    }

    fn levels(&self) -> MutexGuard<'_, HashMap<String, Remembered>> {
        self.levels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
