use clap::Parser;

use crate::error::InputError;

#[derive(Debug, Parser)]
#[clap(name = "lumonitor", version, about = "Per-monitor brightness control")]
pub struct Cli {
    /// Set brightness level (0.1 to 1.0) and exit
    #[clap(long, value_name = "LEVEL", allow_hyphen_values = true)]
    pub brightness: Option<String>,

    /// Adjust brightness by step (+0.1, -0.1) and exit
    #[clap(long = "brightness-step", value_name = "STEP", allow_hyphen_values = true)]
    pub brightness_step: Option<String>,

    /// Restrict the action to one monitor (default: all)
    #[clap(long, value_name = "NAME")]
    pub monitor: Option<String>,

    /// Print the current brightness and exit
    #[clap(long)]
    pub get: bool,

    /// List detected monitors and exit
    #[clap(long)]
    pub list: bool,

    /// Reset brightness to 100% and exit
    #[clap(long)]
    pub reset: bool,

    /// Read commands from stdin and answer with JSON lines
    #[clap(long)]
    pub serve: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Status,
    List,
    Get,
    Set(f64),
    Step(f64),
    Reset,
    Serve,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub request: Request,
    pub monitor: Option<String>,
}

impl Cli {
    /// Validates the flags. Nothing is applied when this fails.
    pub fn invocation(&self) -> Result<Invocation, InputError> {
        let mut requests = Vec::new();
        if let Some(raw) = &self.brightness {
            requests.push(Request::Set(parse_level(raw)?));
        }
        if let Some(raw) = &self.brightness_step {
            requests.push(Request::Step(parse_step(raw)?));
        }
        if self.get {
            requests.push(Request::Get);
        }
        if self.list {
            requests.push(Request::List);
        }
        if self.reset {
            requests.push(Request::Reset);
        }
        if self.serve {
            requests.push(Request::Serve);
        }

        if requests.len() > 1 {
            return Err(InputError::ConflictingActions);
        }

        Ok(Invocation {
            request: requests.pop().unwrap_or(Request::Status),
            monitor: self.monitor.clone(),
        })
    }
}

pub fn parse_level(raw: &str) -> Result<f64, InputError> {
    parse_finite(raw).ok_or_else(|| InputError::InvalidLevel(raw.to_string()))
}

pub fn parse_step(raw: &str) -> Result<f64, InputError> {
    parse_finite(raw).ok_or_else(|| InputError::InvalidStep(raw.to_string()))
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation, InputError> {
        let mut argv = vec!["lumonitor"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().invocation()
    }

    #[test]
    fn defaults_to_status() {
        assert_eq!(
            parse(&[]).unwrap(),
            Invocation {
                request: Request::Status,
                monitor: None
            }
        );
    }

    #[test]
    fn parses_absolute_level_for_one_monitor() {
        assert_eq!(
            parse(&["--brightness", "0.6", "--monitor", "display-1"]).unwrap(),
            Invocation {
                request: Request::Set(0.6),
                monitor: Some("display-1".into())
            }
        );
    }

    #[test]
    fn accepts_signed_steps() {
        assert_eq!(
            parse(&["--brightness-step", "-0.1"]).unwrap().request,
            Request::Step(-0.1)
        );
        assert_eq!(
            parse(&["--brightness-step", "+0.1"]).unwrap().request,
            Request::Step(0.1)
        );
    }

    #[test]
    fn rejects_unparsable_step() {
        assert_eq!(
            parse(&["--brightness-step", "brighter"]),
            Err(InputError::InvalidStep("brighter".into()))
        );
        assert_eq!(
            parse(&["--brightness-step", "NaN"]),
            Err(InputError::InvalidStep("NaN".into()))
        );
    }

    #[test]
    fn rejects_unparsable_level() {
        assert_eq!(
            parse(&["--brightness", "full"]),
            Err(InputError::InvalidLevel("full".into()))
        );
    }

    #[test]
    fn rejects_conflicting_actions() {
        assert_eq!(
            parse(&["--reset", "--list"]),
            Err(InputError::ConflictingActions)
        );
    }
}
