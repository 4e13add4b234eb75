use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("command failed: {cmd}, source: {source}")]
    CommandFailed { cmd: String, source: std::io::Error },

    #[error("empty command line")]
    EmptyCommand,

    #[error("stage {stage} has no stdout to read from")]
    MissingStdout { stage: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Spawn failures keep the platform error untouched; this recovers it.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            Error::CommandFailed { source, .. } | Error::Io(source) => Some(source),
            _ => None,
        }
    }
}
