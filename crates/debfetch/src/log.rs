//! Line-oriented log of downloads and package actions.
//!
//! Every entry is one line with a one-letter tag, a format other tools
//! parse:
//!
//! ```text
//! D: <url>
//! I: <package> <version> => <action>
//! E: <package> <version> => <message>
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

pub struct Logger {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::stdout()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Logger {
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Append to `path`, creating it if needed.
    pub fn to_file(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| Error::LogFile {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(file))
    }

    pub fn download(&self, url: impl fmt::Display) {
        self.line(format_args!("D: {url}"));
    }

    pub fn action(&self, package: &str, version: &str, action: &str) {
        self.line(format_args!("I: {package} {version} => {action}"));
    }

    pub fn error(&self, package: &str, version: &str, message: &str) {
        self.line(format_args!("E: {package} {version} => {message}"));
    }

    // A broken log destination must not stop a download.
    fn line(&self, entry: fmt::Arguments<'_>) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let written = writeln!(sink, "{entry}").and_then(|()| sink.flush());
        if let Err(e) = written {
            warn!(error = %e, entry = %entry, "failed to write log entry");
        }
    }
}

/// In-memory log destination; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
