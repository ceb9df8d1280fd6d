use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, bounded, select, tick, unbounded};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{debug, info, warn};

use crate::cli::{Invocation, Request};
use crate::config::Settings;
use crate::controls::{BrightnessController, Tickable};
use crate::serve::{Outcome, Reply, Session};
use crate::system::backend::{Backend, DisplayControl};
use crate::system::cache::BrightnessCache;
use crate::system::command::{CommandRunner, SystemRunner};
use crate::util::{MAX_LEVEL, format_percent};

const SESSION_TICK: Duration = Duration::from_millis(25);

pub struct App<B>
where
    B: DisplayControl,
{
    controller: Arc<BrightnessController<B>>,
    settings: Settings,
}

impl App<Backend> {
    pub fn new(settings: Settings) -> Result<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let backend = Backend::probe(runner, settings.use_sudo);
        let cache = BrightnessCache::new(settings.cache_dir());
        let controller = BrightnessController::new(backend, cache, settings.writer_interval())?;
        debug!(kind = ?controller.kind(), "selected brightness backend");

        Ok(Self::with_controller(controller, settings))
    }
}

impl<B> App<B>
where
    B: DisplayControl,
{
    pub fn with_controller(controller: BrightnessController<B>, settings: Settings) -> Self {
        Self {
            controller: Arc::new(controller),
            settings,
        }
    }

    /// Runs one invocation, writing user-facing lines to `out`. `Ok(false)`
    /// means at least one monitor refused the request.
    pub fn run<W: Write>(&self, invocation: Invocation, out: &mut W) -> Result<bool> {
        let targets = self.targets(invocation.monitor.as_deref());
        match invocation.request {
            Request::Serve => self.serve(out),
            Request::List => {
                for monitor in self.controller.get_monitors() {
                    writeln!(
                        out,
                        "{}\t{}\t{}",
                        monitor.id,
                        monitor.display_name,
                        monitor.backend_ref.as_deref().unwrap_or("-")
                    )?;
                }
                Ok(true)
            }
            Request::Status => {
                for monitor in &targets {
                    writeln!(
                        out,
                        "{}\t{}\t{}",
                        monitor,
                        self.label(monitor),
                        format_percent(self.controller.get_brightness(monitor))
                    )?;
                }
                Ok(true)
            }
            Request::Get => {
                for monitor in &targets {
                    let level = self.controller.get_brightness(monitor);
                    writeln!(out, "{monitor}: {}", format_percent(level))?;
                }
                Ok(true)
            }
            Request::Set(level) => {
                let mut all_accepted = true;
                for monitor in &targets {
                    if self.controller.set_brightness(monitor, level) {
                        let applied = self.controller.get_brightness(monitor);
                        writeln!(
                            out,
                            "Set brightness for {monitor} to {}",
                            format_percent(applied)
                        )?;
                    } else {
                        writeln!(out, "Failed to set brightness for {monitor}")?;
                        all_accepted = false;
                    }
                }
                self.finish_writes();
                Ok(all_accepted)
            }
            Request::Step(delta) => {
                let mut all_accepted = true;
                for monitor in &targets {
                    if self.controller.adjust_brightness(monitor, delta) {
                        let applied = self.controller.get_brightness(monitor);
                        writeln!(
                            out,
                            "Adjusted brightness for {monitor} to {}",
                            format_percent(applied)
                        )?;
                    } else {
                        writeln!(out, "Failed to adjust brightness for {monitor}")?;
                        all_accepted = false;
                    }
                }
                self.finish_writes();
                Ok(all_accepted)
            }
            Request::Reset => {
                for monitor in &targets {
                    self.controller.set_brightness(monitor, MAX_LEVEL);
                }
                writeln!(out, "Brightness reset to {}", format_percent(MAX_LEVEL))?;
                self.finish_writes();
                Ok(true)
            }
        }
    }

    fn targets(&self, monitor: Option<&str>) -> Vec<String> {
        match monitor {
            Some(monitor) => vec![monitor.to_string()],
            None => self
                .controller
                .get_monitors()
                .iter()
                .map(|monitor| monitor.id.clone())
                .collect(),
        }
    }

    fn label(&self, monitor_id: &str) -> String {
        self.controller
            .get_monitors()
            .iter()
            .find(|monitor| monitor.id == monitor_id)
            .map(|monitor| monitor.display_name.clone())
            .unwrap_or_else(|| monitor_id.to_string())
    }

    /// Waits for the writer so a one-shot command does not exit before its
    /// writes reach the hardware.
    fn finish_writes(&self) -> bool {
        let flushed = self.controller.flush(self.settings.flush_timeout());
        if !flushed {
            warn!(
                timeout_ms = self.settings.flush_timeout_ms,
                "timed out waiting for brightness writes to finish"
            );
        }
        flushed
    }

    fn serve<W: Write>(&self, out: &mut W) -> Result<bool> {
        let lines = spawn_stdin_reader()?;
        let shutdown = shutdown_channel()?;
        let ticker = tick(SESSION_TICK);
        let mut session = Session::new(Arc::clone(&self.controller), self.settings.debounce());

        info!("serving brightness requests on stdin");

        loop {
            select! {
                recv(lines) -> line => match line {
                    Ok(line) => match session.handle_line(&line) {
                        Outcome::Reply(reply) => write_reply(&mut *out, &reply)?,
                        Outcome::Quit => break,
                        Outcome::Ignore => {}
                    },
                    Err(_) => {
                        info!("stdin closed");
                        break;
                    }
                },
                recv(ticker) -> _ => {
                    if let Err(err) = session.on_tick() {
                        warn!(error = %err, "debounce tick failed");
                    }
                },
                recv(shutdown) -> _ => {
                    info!("shutdown requested");
                    break;
                },
            }
        }

        session.finish();
        self.finish_writes();
        Ok(true)
    }
}

fn write_reply(out: &mut impl Write, reply: &Reply) -> Result<()> {
    serde_json::to_writer(&mut *out, reply).context("failed to encode reply")?;
    writeln!(out).context("failed to write reply")?;
    out.flush().context("failed to flush stdout")
}

fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("lumonitor-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to read stdin");
                        break;
                    }
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

fn shutdown_channel() -> Result<Receiver<()>> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to register signal handlers")?;
    let (tx, rx) = bounded(1);
    thread::Builder::new()
        .name("lumonitor-signals".into())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                debug!(signal, "received termination signal");
                let _ = tx.send(());
            }
        })
        .context("failed to spawn signal listener")?;
    Ok(rx)
}
