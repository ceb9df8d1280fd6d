mod app;
mod cli;
mod config;
mod controls;
mod error;
mod serve;
mod system;
mod util;

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::warn;

use crate::cli::Cli;
use crate::config::Settings;

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let invocation = match cli.invocation() {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let settings = match config::load_settings() {
        Ok(Some((path, settings))) => {
            tracing::debug!(path = %path.display(), "loaded settings");
            settings
        }
        Ok(None) => Settings::default(),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "ignoring unreadable settings");
            Settings::default()
        }
    };

    let stdout = io::stdout();
    match app::App::new(settings).and_then(|app| app.run(invocation, &mut stdout.lock())) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();
}
