use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::CommandError;

use super::command::CommandRunner;
use super::monitors::Monitor;

const BRIGHTNESS_VCP: &str = "10";

static DISPLAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*Display\s+(\d+)\b").unwrap());
static MODEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*Model:\s*(.*?)\s*$").unwrap());
static VCP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"current value\s*=\s*(\d+)\s*,\s*max value\s*=\s*(\d+)").unwrap()
});

/// DDC/CI control through the `ddcutil` CLI.
pub struct DdcutilControl {
    runner: Arc<dyn CommandRunner>,
    sudo: bool,
    displays: Vec<Monitor>,
}

impl Clone for DdcutilControl {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            sudo: self.sudo,
            displays: self.displays.clone(),
        }
    }
}

impl std::fmt::Debug for DdcutilControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdcutilControl")
            .field("sudo", &self.sudo)
            .field("displays", &self.displays)
            .finish()
    }
}

impl DdcutilControl {
    /// Builds the control from the output of an earlier `ddcutil detect`.
    pub fn from_detect(runner: Arc<dyn CommandRunner>, sudo: bool, detect_output: &str) -> Self {
        Self {
            runner,
            sudo,
            displays: parse_detect_output(detect_output),
        }
    }

    pub fn detect(runner: &dyn CommandRunner, sudo: bool) -> Result<String, CommandError> {
        invoke(runner, sudo, &["detect"])
    }

    pub fn displays(&self) -> &[Monitor] {
        &self.displays
    }

    pub fn get_brightness(&self, monitor: &Monitor) -> Result<f64> {
        let display = display_number(monitor)?;
        let output = invoke(
            self.runner.as_ref(),
            self.sudo,
            &["--display", display, "getvcp", BRIGHTNESS_VCP],
        )
        .with_context(|| format!("ddcutil getvcp failed for {}", monitor.id))?;

        parse_vcp_brightness(&output)
            .ok_or_else(|| anyhow!("unable to parse brightness from {:?}", output.trim()))
    }

    pub fn set_brightness(&self, monitor: &Monitor, value: f64) -> Result<()> {
        let display = display_number(monitor)?;
        let percent = to_percent(value).to_string();
        debug!(monitor = %monitor.id, percent = %percent, "ddcutil setvcp");
        invoke(
            self.runner.as_ref(),
            self.sudo,
            &["--display", display, "setvcp", BRIGHTNESS_VCP, &percent],
        )
        .with_context(|| format!("ddcutil setvcp failed for {}", monitor.id))?;
        Ok(())
    }
}

fn invoke(runner: &dyn CommandRunner, sudo: bool, args: &[&str]) -> Result<String, CommandError> {
    if sudo {
        let mut elevated = Vec::with_capacity(args.len() + 2);
        elevated.push("-n");
        elevated.push("ddcutil");
        elevated.extend_from_slice(args);
        runner.run("sudo", &elevated)
    } else {
        runner.run("ddcutil", args)
    }
}

fn display_number(monitor: &Monitor) -> Result<&str> {
    monitor
        .backend_ref
        .as_deref()
        .ok_or_else(|| anyhow!("monitor {} has no ddcutil display number", monitor.id))
}

fn to_percent(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// True when the detect output names at least one display.
pub fn reports_display(detect_output: &str) -> bool {
    detect_output.lines().any(|line| DISPLAY_RE.is_match(line))
}

pub fn parse_detect_output(output: &str) -> Vec<Monitor> {
    struct Detected {
        number: String,
        model: Option<String>,
    }

    let mut detected: Vec<Detected> = Vec::new();
    let mut current: Option<Detected> = None;

    for line in output.lines() {
        if let Some(captures) = DISPLAY_RE.captures(line) {
            detected.extend(current.take());
            current = Some(Detected {
                number: captures[1].to_string(),
                model: None,
            });
            continue;
        }

        // Any other top-level line ("Invalid display", "Phantom display", ...)
        // closes the block we were collecting.
        if !line.trim().is_empty() && !line.starts_with(char::is_whitespace) {
            detected.extend(current.take());
            continue;
        }

        if let (Some(display), Some(captures)) = (current.as_mut(), MODEL_RE.captures(line)) {
            let model = captures[1].to_string();
            if display.model.is_none() && !model.is_empty() {
                display.model = Some(model);
            }
        }
    }
    detected.extend(current.take());

    detected
        .into_iter()
        .map(|display| {
            let label = match display.model {
                Some(model) => format!("{model} (Display {})", display.number),
                None => format!("Display {}", display.number),
            };
            Monitor::new(
                format!("display-{}", display.number),
                label,
                Some(display.number),
            )
        })
        .collect()
}

/// Parses `current value = X, max value = Y` into `X / Y`.
pub fn parse_vcp_brightness(output: &str) -> Option<f64> {
    let captures = VCP_RE.captures(output)?;
    let current = captures[1].parse::<u32>().ok()?;
    let max = captures[2].parse::<u32>().ok()?;
    if max == 0 {
        return None;
    }
    Some((f64::from(current) / f64::from(max)).clamp(0.0, 1.0))
}
