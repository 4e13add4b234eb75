//! Chains of child processes connected stdout-to-stdin.
//!
//! The last stage's stdout is handed to the caller; every stage keeps its
//! own stderr pipe, drained in the background and handed back by
//! [`Pipeline::finish`].

use crate::command::Command;
use crate::error::{Error, Result};
use std::io::{self, Read};
use std::process::{Child, ChildStderr, ChildStdout, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

type StderrReader = JoinHandle<io::Result<Vec<u8>>>;

#[derive(Debug)]
struct Stage {
    program: String,
    child: Child,
    stderr: Option<StderrReader>,
}

impl Stage {
    /// Starts reading the child's stderr on a background thread.
    fn new(program: String, mut child: Child) -> Self {
        let stderr = child.stderr.take().map(drain);
        Self {
            program,
            child,
            stderr,
        }
    }

    fn finish(mut self) -> Result<StageOutcome> {
        let status = self.child.wait()?;
        let stderr = match self.stderr.take() {
            Some(reader) => reader
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stderr reader panicked")))?,
            None => Vec::new(),
        };
        Ok(StageOutcome {
            program: self.program,
            status,
            stderr,
        })
    }

    fn reap(mut self) {
        if let Err(e) = self.child.wait() {
            warn!(program = %self.program, error = %e, "failed to reap child process");
        }
        if let Some(reader) = self.stderr.take() {
            let _ = reader.join();
        }
    }
}

fn drain(mut pipe: ChildStderr) -> StderrReader {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

/// Exit information for one stage of a finished [`Pipeline`].
#[derive(Debug)]
pub struct StageOutcome {
    pub program: String,
    pub status: ExitStatus,
    pub stderr: Vec<u8>,
}

impl StageOutcome {
    /// A stage that died of `SIGPIPE` only lost its reader; that is not
    /// counted as a failure.
    pub fn succeeded(&self) -> bool {
        self.status.success() || killed_by_sigpipe(&self.status)
    }
}

#[cfg(unix)]
fn killed_by_sigpipe(status: &ExitStatus) -> bool {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    status.signal() == Some(Signal::SIGPIPE as i32)
}

#[cfg(not(unix))]
fn killed_by_sigpipe(_status: &ExitStatus) -> bool {
    false
}

#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Stage>,
    stdout: Option<ChildStdout>,
}

impl Pipeline {
    /// Spawn `commands` in order, each reading the previous one's stdout.
    ///
    /// If a later stage fails to start, the stages already running are
    /// reaped before the spawn error is returned.
    pub fn spawn(commands: impl IntoIterator<Item = Command>) -> Result<Self> {
        let mut stages: Vec<Stage> = Vec::new();
        let mut upstream: Option<ChildStdout> = None;

        for cmd in commands {
            let cmd = match upstream.take() {
                Some(out) => cmd.stdin(Stdio::from(out)),
                None => cmd.stdin(Stdio::null()),
            };
            let mut cmd = cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            debug!(command = %cmd.display(), "spawning stage");

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    // Release the upstream pipe first so running stages can exit.
                    drop(cmd);
                    stages.into_iter().for_each(Stage::reap);
                    return Err(e);
                }
            };
            upstream = child.stdout.take();
            stages.push(Stage::new(cmd.program().to_string(), child));
        }

        let Some(last) = stages.last() else {
            return Err(Error::EmptyCommand);
        };
        let Some(stdout) = upstream else {
            let stage = last.program.clone();
            stages.into_iter().for_each(Stage::reap);
            return Err(Error::MissingStdout { stage });
        };

        Ok(Self {
            stages,
            stdout: Some(stdout),
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn programs(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.program.as_str())
    }

    /// Close the caller's end of the output and wait for every stage, first
    /// stage first, collecting the stderr each one wrote.
    pub fn finish(mut self) -> Result<Vec<StageOutcome>> {
        drop(self.stdout.take());
        let mut outcomes = Vec::with_capacity(self.stages.len());
        let mut stages = std::mem::take(&mut self.stages).into_iter();
        while let Some(stage) = stages.next() {
            match stage.finish() {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    stages.for_each(Stage::reap);
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }
}

impl Read for Pipeline {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stdout.as_mut() {
            Some(out) => out.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.stages.is_empty() {
            return;
        }
        drop(self.stdout.take());
        for stage in self.stages.drain(..) {
            debug!(program = %stage.program, "reaping unfinished stage");
            stage.reap();
        }
    }
}
