use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::cli::{parse_level, parse_step};
use crate::controls::{BrightnessController, DebouncedBrightness, Tickable};
use crate::error::InputError;
use crate::system::backend::DisplayControl;
use crate::system::monitors::Monitor;

#[derive(Debug, Clone, PartialEq)]
pub enum ServeCommand {
    List,
    Get(String),
    Set(String, f64),
    Step(String, f64),
    Reset,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Monitors {
        monitors: Vec<Monitor>,
    },
    Brightness {
        monitor: String,
        brightness: f64,
    },
    Accepted {
        #[serde(skip_serializing_if = "Option::is_none")]
        monitor: Option<String>,
        accepted: bool,
    },
    Error {
        message: String,
    },
}

pub enum Outcome {
    Reply(Reply),
    Quit,
    Ignore,
}

/// Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ServeCommand>, InputError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "list" => ServeCommand::List,
        "get" => ServeCommand::Get(monitor_arg(words.next(), "get")?),
        "set" => {
            let monitor = monitor_arg(words.next(), "set")?;
            let raw = words.next().ok_or(InputError::MissingArgument("set"))?;
            ServeCommand::Set(monitor, parse_level(raw)?)
        }
        "step" => {
            let monitor = monitor_arg(words.next(), "step")?;
            let raw = words.next().ok_or(InputError::MissingArgument("step"))?;
            ServeCommand::Step(monitor, parse_step(raw)?)
        }
        "reset" => ServeCommand::Reset,
        "quit" | "exit" => ServeCommand::Quit,
        _ => return Err(InputError::UnknownCommand(line.trim().to_string())),
    };
    Ok(Some(command))
}

fn monitor_arg(word: Option<&str>, verb: &'static str) -> Result<String, InputError> {
    word.map(str::to_string)
        .ok_or(InputError::MissingArgument(verb))
}

/// State of one serve session: the controller plus the debounce layer that
/// sits in front of `set`.
pub struct Session<B>
where
    B: DisplayControl,
{
    controller: Arc<BrightnessController<B>>,
    debounced: DebouncedBrightness<B>,
}

impl<B> Session<B>
where
    B: DisplayControl,
{
    pub fn new(controller: Arc<BrightnessController<B>>, debounce: Duration) -> Self {
        let debounced = DebouncedBrightness::new(Arc::clone(&controller), debounce);
        Self {
            controller,
            debounced,
        }
    }

    pub fn handle_line(&mut self, line: &str) -> Outcome {
        match parse_command(line) {
            Ok(None) => Outcome::Ignore,
            Ok(Some(ServeCommand::Quit)) => Outcome::Quit,
            Ok(Some(command)) => Outcome::Reply(self.handle(command)),
            Err(err) => Outcome::Reply(Reply::Error {
                message: err.to_string(),
            }),
        }
    }

    fn handle(&mut self, command: ServeCommand) -> Reply {
        match command {
            ServeCommand::List => Reply::Monitors {
                monitors: self.controller.get_monitors().to_vec(),
            },
            ServeCommand::Get(monitor) => Reply::Brightness {
                brightness: self.controller.get_brightness(&monitor),
                monitor,
            },
            ServeCommand::Set(monitor, value) => {
                self.debounced.request(&monitor, value);
                Reply::Accepted {
                    monitor: Some(monitor),
                    accepted: true,
                }
            }
            ServeCommand::Step(monitor, delta) => Reply::Accepted {
                accepted: self.controller.adjust_brightness(&monitor, delta),
                monitor: Some(monitor),
            },
            ServeCommand::Reset => {
                // A reset overrides anything still waiting in the debouncer.
                self.debounced.discard();
                Reply::Accepted {
                    monitor: None,
                    accepted: self.controller.reset_all(),
                }
            }
            ServeCommand::Quit => Reply::Accepted {
                monitor: None,
                accepted: true,
            },
        }
    }

    /// Applies whatever the debouncer is still holding.
    pub fn finish(&mut self) {
        if self.debounced.has_pending() {
            self.debounced.flush_now();
        }
    }
}

impl<B> Tickable for Session<B>
where
    B: DisplayControl,
{
    fn on_tick(&mut self) -> Result<()> {
        self.debounced.on_tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::backend::tests::MockDisplayControl;
    use crate::system::cache::BrightnessCache;
    use tempfile::{TempDir, tempdir};

    const WAIT: Duration = Duration::from_secs(5);

    fn session(
        backend: &MockDisplayControl,
    ) -> (Session<MockDisplayControl>, Arc<BrightnessController<MockDisplayControl>>, TempDir) {
        let dir = tempdir().unwrap();
        let controller = Arc::new(
            BrightnessController::new(
                backend.clone(),
                BrightnessCache::new(dir.path()),
                Duration::from_secs(3600),
            )
            .unwrap(),
        );
        let session = Session::new(Arc::clone(&controller), Duration::from_secs(3600));
        (session, controller, dir)
    }

    fn reply(outcome: Outcome) -> Reply {
        match outcome {
            Outcome::Reply(reply) => reply,
            Outcome::Quit => panic!("unexpected quit"),
            Outcome::Ignore => panic!("unexpected ignore"),
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(parse_command("LIST"), Ok(Some(ServeCommand::List)));
        assert_eq!(
            parse_command("  set  display-1   0.4 "),
            Ok(Some(ServeCommand::Set("display-1".into(), 0.4)))
        );
        assert_eq!(
            parse_command("step HDMI-1 -0.1"),
            Ok(Some(ServeCommand::Step("HDMI-1".into(), -0.1)))
        );
        assert_eq!(parse_command("quit"), Ok(Some(ServeCommand::Quit)));
    }

    #[test]
    fn reports_malformed_commands() {
        assert_eq!(
            parse_command("dim everything"),
            Err(InputError::UnknownCommand("dim everything".into()))
        );
        assert_eq!(
            parse_command("set display-1"),
            Err(InputError::MissingArgument("set"))
        );
        assert_eq!(
            parse_command("step display-1 up"),
            Err(InputError::InvalidStep("up".into()))
        );
    }

    #[test]
    fn replies_serialise_with_tag() {
        let json = serde_json::to_value(Reply::Brightness {
            monitor: "display-1".into(),
            brightness: 0.5,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"reply": "brightness", "monitor": "display-1", "brightness": 0.5})
        );

        let json = serde_json::to_value(Reply::Accepted {
            monitor: None,
            accepted: true,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"reply": "accepted", "accepted": true}));
    }

    #[test]
    fn list_returns_registry_snapshot() {
        let backend = MockDisplayControl::default();
        let (mut session, _controller, _dir) = session(&backend);

        match reply(session.handle_line("list")) {
            Reply::Monitors { monitors } => {
                assert_eq!(monitors.len(), 1);
                assert_eq!(monitors[0].id, "display-1");
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn set_is_debounced_until_finish() {
        let backend = MockDisplayControl::default();
        let (mut session, controller, _dir) = session(&backend);

        session.handle_line("set display-1 0.3");
        session.handle_line("set display-1 0.6");
        session.on_tick().unwrap();
        assert!(controller.flush(WAIT));
        assert!(backend.history().is_empty());

        session.finish();
        assert!(controller.flush(WAIT));
        assert_eq!(backend.history(), vec![("display-1".to_string(), 0.6)]);
    }

    #[test]
    fn step_applies_immediately() {
        let backend = MockDisplayControl::default();
        let (mut session, controller, _dir) = session(&backend);
        controller.set_brightness("display-1", 0.5);

        let outcome = reply(session.handle_line("step display-1 +0.2"));
        assert_eq!(
            outcome,
            Reply::Accepted {
                monitor: Some("display-1".into()),
                accepted: true
            }
        );
        match reply(session.handle_line("get display-1")) {
            Reply::Brightness { brightness, .. } => assert!((brightness - 0.7).abs() < 1e-9),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn reset_drops_pending_debounced_values() {
        let backend = MockDisplayControl::default();
        let (mut session, controller, _dir) = session(&backend);

        session.handle_line("set display-1 0.2");
        session.handle_line("reset");
        session.finish();
        assert!(controller.flush(WAIT));
        assert_eq!(backend.history(), vec![("display-1".to_string(), 1.0)]);
    }

    #[test]
    fn quit_and_blank_lines() {
        let backend = MockDisplayControl::default();
        let (mut session, _controller, _dir) = session(&backend);

        assert!(matches!(session.handle_line(""), Outcome::Ignore));
        assert!(matches!(session.handle_line("exit"), Outcome::Quit));
    }
}
