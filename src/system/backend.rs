use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use super::command::CommandRunner;
use super::ddcutil::{self, DdcutilControl};
use super::monitors::Monitor;
use super::xrandr::XrandrControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    HardwareControl,
    SoftwareFallback,
}

/// What every brightness backend can do. Implementations contain their own
/// process errors; only `read_brightness`/`write_brightness` report failure.
pub trait DisplayControl: Send + Sync + 'static {
    fn kind(&self) -> BackendKind;

    fn list_monitors(&self) -> Vec<Monitor>;

    /// `Ok(None)` means the backend cannot read levels back.
    fn read_brightness(&self, monitor: &Monitor) -> Result<Option<f64>>;

    fn write_brightness(&self, monitor: &Monitor, value: f64) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct Probe {
    pub kind: BackendKind,
    detect_output: Option<String>,
}

/// One-shot check for a working `ddcutil` that can see at least one display.
pub fn probe(runner: &dyn CommandRunner, use_sudo: bool) -> Probe {
    let fallback = Probe {
        kind: BackendKind::SoftwareFallback,
        detect_output: None,
    };

    match DdcutilControl::detect(runner, use_sudo) {
        Ok(output) if ddcutil::reports_display(&output) => Probe {
            kind: BackendKind::HardwareControl,
            detect_output: Some(output),
        },
        Ok(_) => {
            info!("ddcutil reported no displays; falling back to xrandr");
            fallback
        }
        Err(err) => {
            info!(error = %err, "ddcutil unavailable; falling back to xrandr");
            fallback
        }
    }
}

#[derive(Debug, Clone)]
pub enum Backend {
    Ddcutil(DdcutilControl),
    Xrandr(XrandrControl),
}

impl Backend {
    pub fn probe(runner: Arc<dyn CommandRunner>, use_sudo: bool) -> Self {
        let probed = probe(runner.as_ref(), use_sudo);
        match probed.detect_output {
            Some(output) if probed.kind == BackendKind::HardwareControl => {
                Backend::Ddcutil(DdcutilControl::from_detect(runner, use_sudo, &output))
            }
            _ => Backend::Xrandr(XrandrControl::new(runner)),
        }
    }
}

impl DisplayControl for Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Backend::Ddcutil(_) => BackendKind::HardwareControl,
            Backend::Xrandr(_) => BackendKind::SoftwareFallback,
        }
    }

    fn list_monitors(&self) -> Vec<Monitor> {
        match self {
            Backend::Ddcutil(control) => control.displays().to_vec(),
            Backend::Xrandr(control) => control.list_monitors(),
        }
    }

    fn read_brightness(&self, monitor: &Monitor) -> Result<Option<f64>> {
        match self {
            Backend::Ddcutil(control) => control.get_brightness(monitor).map(Some),
            Backend::Xrandr(_) => Ok(None),
        }
    }

    fn write_brightness(&self, monitor: &Monitor, value: f64) -> Result<()> {
        match self {
            Backend::Ddcutil(control) => control.set_brightness(monitor, value),
            Backend::Xrandr(control) => control.set_brightness(monitor, value),
        }
    }
}
