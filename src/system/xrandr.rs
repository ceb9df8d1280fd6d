use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::util::title_case;

use super::command::CommandRunner;
use super::monitors::Monitor;

/// Software brightness through `xrandr --brightness`. The gamma value cannot
/// be read back, so callers rely on their own record of the last level.
pub struct XrandrControl {
    runner: Arc<dyn CommandRunner>,
}

impl Clone for XrandrControl {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
        }
    }
}

impl std::fmt::Debug for XrandrControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XrandrControl").finish_non_exhaustive()
    }
}

impl XrandrControl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub fn list_monitors(&self) -> Vec<Monitor> {
        match self.runner.run("xrandr", &["--listmonitors"]) {
            Ok(output) => {
                let monitors = parse_listmonitors(&output);
                if !monitors.is_empty() {
                    return monitors;
                }
                debug!("xrandr --listmonitors reported no monitors");
            }
            Err(err) => warn!(error = %err, "xrandr --listmonitors failed"),
        }

        match self.runner.run("xrandr", &[]) {
            Ok(output) => parse_connected_outputs(&output),
            Err(err) => {
                warn!(error = %err, "xrandr query failed");
                Vec::new()
            }
        }
    }

    pub fn set_brightness(&self, monitor: &Monitor, value: f64) -> Result<()> {
        let level = format!("{:.2}", value);
        debug!(monitor = %monitor.id, level = %level, "xrandr --brightness");
        self.runner
            .run("xrandr", &["--output", &monitor.id, "--brightness", &level])
            .with_context(|| format!("xrandr failed to set brightness on {}", monitor.id))?;
        Ok(())
    }
}

fn output_monitor(name: &str) -> Monitor {
    Monitor::new(name, title_case(name), None)
}

/// Parses `xrandr --listmonitors`:
///
/// ```text
/// Monitors: 2
///  0: +*eDP-1 1920/344x1080/193+0+0  eDP-1
///  1: +HDMI-1 2560/597x1440/336+1920+0  HDMI-1
/// ```
pub fn parse_listmonitors(output: &str) -> Vec<Monitor> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 || !parts[0].ends_with(':') || parts[0] == "Monitors:" {
                return None;
            }
            Some(output_monitor(parts[3]))
        })
        .collect()
}

/// Parses plain `xrandr` output for `<name> connected ...` lines.
pub fn parse_connected_outputs(output: &str) -> Vec<Monitor> {
    output
        .lines()
        .filter(|line| line.contains(" connected"))
        .filter_map(|line| line.split_whitespace().next())
        .map(output_monitor)
        .collect()
}
