use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::debug;

use crate::system::backend::DisplayControl;

use super::{BrightnessController, Tickable};

/// Holds back rapid per-monitor requests until they have been quiet for
/// `delay`. Only the newest value for a monitor survives.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: HashMap<String, (f64, Instant)>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    pub fn submit(&mut self, monitor_id: &str, value: f64) {
        self.submit_at(monitor_id, value, Instant::now());
    }

    pub fn submit_at(&mut self, monitor_id: &str, value: f64, now: Instant) {
        self.pending
            .insert(monitor_id.to_string(), (value, now + self.delay));
    }

    pub fn take_due(&mut self, now: Instant) -> Vec<(String, f64)> {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        due.into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|(value, _)| (id, value)))
            .collect()
    }

    pub fn drain(&mut self) -> Vec<(String, f64)> {
        self.pending
            .drain()
            .map(|(id, (value, _))| (id, value))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Debounced front of the controller for UI-driven updates (sliders, key
/// repeat). Due values are forwarded on each tick.
pub struct DebouncedBrightness<B>
where
    B: DisplayControl,
{
    controller: Arc<BrightnessController<B>>,
    debouncer: Debouncer,
}

impl<B> DebouncedBrightness<B>
where
    B: DisplayControl,
{
    pub fn new(controller: Arc<BrightnessController<B>>, delay: Duration) -> Self {
        Self {
            controller,
            debouncer: Debouncer::new(delay),
        }
    }

    pub fn request(&mut self, monitor_id: &str, value: f64) {
        self.debouncer.submit(monitor_id, value);
    }

    pub fn has_pending(&self) -> bool {
        !self.debouncer.is_empty()
    }

    pub fn discard(&mut self) {
        let dropped = self.debouncer.drain();
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "discarded pending brightness requests");
        }
    }

    /// Forwards everything still waiting, regardless of deadlines.
    pub fn flush_now(&mut self) {
        for (monitor_id, value) in self.debouncer.drain() {
            self.controller.set_brightness(&monitor_id, value);
        }
    }

    fn forward_due(&mut self, now: Instant) {
        for (monitor_id, value) in self.debouncer.take_due(now) {
            debug!(monitor = %monitor_id, value, "debounced brightness request");
            self.controller.set_brightness(&monitor_id, value);
        }
    }
}

impl<B> Tickable for DebouncedBrightness<B>
where
    B: DisplayControl,
{
    fn on_tick(&mut self) -> Result<()> {
        self.forward_due(Instant::now());
        Ok(())
    }
}
