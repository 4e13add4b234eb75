use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A download or filter process exited unsuccessfully. The message is the
/// captured stderr of the chain, decoded lossily and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DownloadError {
    message: String,
    program: String,
    code: Option<i32>,
}

impl DownloadError {
    pub fn new(message: impl Into<String>, program: impl Into<String>, code: Option<i32>) -> Self {
        Self {
            message: message.into(),
            program: program.into(),
            code,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// First stage of the chain that failed.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Exit code of that stage; `None` when it was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<DownloadError> for io::Error {
    fn from(e: DownloadError) -> Self {
        io::Error::other(e)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Platform(#[from] debfetch_platform::Error),

    #[error(transparent)]
    Config(#[from] debfetch_config::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("failed to open log file {}: {source}", path.display())]
    LogFile { path: PathBuf, source: io::Error },
}

impl Error {
    pub fn as_download(&self) -> Option<&DownloadError> {
        match self {
            Error::Download(e) => Some(e),
            _ => None,
        }
    }
}
