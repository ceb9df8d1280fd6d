use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, bounded, select, tick, unbounded};
use tracing::{debug, warn};

/// Where the writer sends the values it drains.
pub trait WriteSink: Send + Sync + 'static {
    fn apply(&self, monitor_id: &str, value: f64) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub monitor_id: String,
    pub value: f64,
    pub requested_at: Instant,
}

enum Control {
    Flush(Sender<()>),
}

type PendingMap = Arc<Mutex<HashMap<String, PendingWrite>>>;

/// Applies brightness writes on a single background thread.
///
/// At most one value per monitor is ever pending; a newer request replaces
/// the older one. The lock is only held to insert or swap the map, never while
/// a hardware command runs.
pub struct HardwareWriter {
    pending: PendingMap,
    control: Sender<Control>,
}

impl HardwareWriter {
    pub fn spawn<S>(sink: Arc<S>, interval: Duration) -> Result<Self>
    where
        S: WriteSink + ?Sized,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (control, control_rx) = unbounded();
        let worker_pending = Arc::clone(&pending);

        thread::Builder::new()
            .name("lumonitor-writer".into())
            .spawn(move || run_worker(sink, worker_pending, control_rx, interval))
            .context("failed to spawn hardware writer thread")?;

        Ok(Self { pending, control })
    }

    pub fn schedule(&self, monitor_id: &str, value: f64) {
        let mut pending = lock(&self.pending);
        let requested_at = Instant::now();
        match pending.get_mut(monitor_id) {
            Some(entry) => {
                debug!(
                    monitor = %monitor_id,
                    replaced = entry.value,
                    value,
                    "coalescing pending brightness write"
                );
                entry.value = value;
                entry.requested_at = requested_at;
            }
            None => {
                pending.insert(
                    monitor_id.to_string(),
                    PendingWrite {
                        monitor_id: monitor_id.to_string(),
                        value,
                        requested_at,
                    },
                );
            }
        }
    }

    #[cfg(test)]
    pub fn pending(&self, monitor_id: &str) -> Option<PendingWrite> {
        lock(&self.pending).get(monitor_id).cloned()
    }

    /// Asks the worker to sweep now and waits until it has. Returns `false`
    /// when the sweep did not finish within `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = bounded(1);
        if self.control.send(Control::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }
}

fn lock(
    pending: &Mutex<HashMap<String, PendingWrite>>,
) -> MutexGuard<'_, HashMap<String, PendingWrite>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_worker<S>(sink: Arc<S>, pending: PendingMap, control: Receiver<Control>, interval: Duration)
where
    S: WriteSink + ?Sized,
{
    let ticker = tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => {
                sweep(sink.as_ref(), &pending);
            },
            recv(control) -> message => match message {
                Ok(Control::Flush(ack)) => {
                    sweep(sink.as_ref(), &pending);
                    let _ = ack.send(());
                }
                Err(_) => break,
            },
        }
    }
    debug!("hardware writer stopped");
}

fn sweep<S>(sink: &S, pending: &Mutex<HashMap<String, PendingWrite>>) -> usize
where
    S: WriteSink + ?Sized,
{
    let drained = std::mem::take(&mut *lock(pending));
    if drained.is_empty() {
        return 0;
    }

    let mut batch: Vec<PendingWrite> = drained.into_values().collect();
    batch.sort_by_key(|write| write.requested_at);

    let count = batch.len();
    for write in batch {
        let started = Instant::now();
        match sink.apply(&write.monitor_id, write.value) {
            Ok(()) => debug!(
                monitor = %write.monitor_id,
                value = write.value,
                queued_ms = started.duration_since(write.requested_at).as_millis() as u64,
                apply_ms = started.elapsed().as_millis() as u64,
                "applied brightness"
            ),
            Err(err) => warn!(
                monitor = %write.monitor_id,
                value = write.value,
                error = %err,
                "failed to apply brightness; dropping write"
            ),
        }
    }
    count
}
