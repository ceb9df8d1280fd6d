use thiserror::Error;

/// Failure to run an external control command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code}: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },
}

/// User supplied a value that cannot be applied.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Invalid brightness level: {0}")]
    InvalidLevel(String),

    #[error("Invalid brightness step: {0}")]
    InvalidStep(String),

    #[error("Unrecognised command: {0}")]
    UnknownCommand(String),

    #[error("Missing argument for `{0}`")]
    MissingArgument(&'static str),

    #[error("Only one action may be given at a time")]
    ConflictingActions,
}
