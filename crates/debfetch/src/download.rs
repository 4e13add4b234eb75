//! Scoped access to the bytes behind a URL or local path.
//!
//! A [`ScopedDownload`] describes what to read; [`ScopedDownload::acquire`]
//! logs it, starts the process chain and hands back a [`Download`] to read
//! from. Failures of the chain only surface in [`Download::release`], once
//! the reader is done.

use crate::error::{DownloadError, Error, Result};
use crate::log::Logger;
use crate::source::Source;
use debfetch_platform::{Command, EnvOverrides, Pipeline, StageOutcome};
use std::io::{self, Read};
use tracing::{debug, warn};

/// Filter the raw bytes are piped through, as an argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeCommand {
    argv: Vec<String>,
}

impl PipeCommand {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl<S: Into<String>> FromIterator<S> for PipeCommand {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Program used for remote sources. It must write the body to stdout; the
/// URL is appended as the last argument.
///
/// The default `wget` exits non-zero instead of dying of `SIGPIPE` when the
/// reader goes away, so releasing an unfinished remote download with it
/// reports a [`DownloadError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTool {
    argv: Vec<String>,
}

impl Default for FetchTool {
    fn default() -> Self {
        Self::new(["wget", "-O-", "-q"])
    }
}

impl FetchTool {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

#[derive(Debug, Clone)]
pub struct ScopedDownload {
    source: Source,
    pipe: Option<PipeCommand>,
    fetcher: FetchTool,
    env: EnvOverrides,
}

impl ScopedDownload {
    pub fn new(source: impl Into<Source>) -> Self {
        Self {
            source: source.into(),
            pipe: None,
            fetcher: FetchTool::default(),
            env: EnvOverrides::new(),
        }
    }

    pub fn pipe(mut self, pipe: impl Into<PipeCommand>) -> Self {
        self.pipe = Some(pipe.into());
        self
    }

    pub fn fetcher(mut self, fetcher: FetchTool) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Variables set on every spawned stage.
    pub fn env(mut self, env: EnvOverrides) -> Self {
        self.env = env;
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// The chain that [`acquire`](Self::acquire) will spawn:
    ///
    /// - local path: `cat -- <path>`
    /// - remote URL: `<fetch tool...> <url>`
    ///
    /// followed by the pipe command, if any.
    pub fn commands(&self) -> Result<Vec<Command>> {
        let first = match &self.source {
            Source::Local(path) => Command::new("cat").arg("--").arg(path),
            Source::Remote(url) => Command::from_argv(self.fetcher.argv())?.arg(url),
        };

        let mut commands = vec![self.env.apply(first)];
        if let Some(pipe) = &self.pipe {
            commands.push(self.env.apply(Command::from_argv(pipe.argv())?));
        }
        Ok(commands)
    }

    /// Log the source and start reading it. Spawn failures are returned
    /// here; everything else waits for [`Download::release`].
    pub fn acquire(self, log: &Logger) -> Result<Download> {
        log.download(&self.source);
        let commands = self.commands()?;
        let pipeline = Pipeline::spawn(commands)?;
        debug!(
            source = %self.source,
            local = self.source.is_local(),
            stages = pipeline.len(),
            "download started"
        );
        Ok(Download {
            source: self.source,
            pipeline: Some(pipeline),
        })
    }

    /// Acquire, hand the stream to `body`, then release on every exit path.
    ///
    /// When `body` fails, its error is returned and a download failure
    /// found while releasing is only logged.
    pub fn run<T, E, F>(self, log: &Logger, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Download) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let mut download = self.acquire(log)?;
        let result = body(&mut download);
        let released = download.release();

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(suppressed)) => {
                warn!(error = %suppressed, "download failure suppressed by an earlier error");
                Err(e)
            }
        }
    }
}

/// A running download. Read it like any byte stream, then call
/// [`release`](Download::release). Dropping it unreleased still reaps the
/// processes, but a failure can then only be logged.
#[derive(Debug)]
pub struct Download {
    source: Source,
    pipeline: Option<Pipeline>,
}

impl Download {
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Close the stream, collect stderr and exit statuses, and turn any
    /// failed stage into a [`DownloadError`].
    pub fn release(mut self) -> Result<()> {
        let Some(pipeline) = self.pipeline.take() else {
            return Ok(());
        };
        let outcomes = pipeline.finish()?;
        check(&outcomes)?;
        debug!(source = %self.source, "download released");
        Ok(())
    }
}

impl Read for Download {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.pipeline.as_mut() {
            Some(pipeline) => pipeline.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for Download {
    fn drop(&mut self) {
        let Some(pipeline) = self.pipeline.take() else {
            return;
        };
        let checked = pipeline
            .finish()
            .map_err(Error::from)
            .and_then(|outcomes| check(&outcomes).map_err(Error::from));
        if let Err(e) = checked {
            warn!(source = %self.source, error = %e, "download dropped without release");
        }
    }
}

fn check(outcomes: &[StageOutcome]) -> std::result::Result<(), DownloadError> {
    let Some(failed) = outcomes.iter().find(|o| !o.succeeded()) else {
        return Ok(());
    };
    let stderr: Vec<u8> = outcomes
        .iter()
        .flat_map(|o| o.stderr.iter().copied())
        .collect();
    let message = String::from_utf8_lossy(&stderr).trim().to_string();
    Err(DownloadError::new(
        message,
        failed.program.clone(),
        failed.status.code(),
    ))
}
