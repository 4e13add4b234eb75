//! Streaming downloads for Debian tooling.
//!
//! Open the bytes behind a URL or a local path, optionally through a
//! decompression filter, read them as a plain [`std::io::Read`] stream, and
//! get a [`DownloadError`] carrying the tools' stderr when anything in the
//! chain fails.
//!
//! # Example
//!
//! ```no_run
//! use std::io::Read;
//! use debfetch::{Logger, PipeCommand, ScopedDownload};
//!
//! let log = Logger::stdout();
//! let packages = ScopedDownload::new("http://ftp.debian.org/debian/dists/unstable/main/binary-all/Packages.gz")
//!     .pipe(PipeCommand::new(["gzip", "-dc"]))
//!     .run(&log, |stream| -> debfetch::Result<String> {
//!         let mut text = String::new();
//!         stream.read_to_string(&mut text)?;
//!         Ok(text)
//!     })?;
//! # Ok::<(), debfetch::Error>(())
//! ```

pub use download::{Download, FetchTool, PipeCommand, ScopedDownload};
pub use environment::{environment, load_environment, setup_locale, setup_proxies};
pub use error::{DownloadError, Error, Result};
pub use log::{LogBuffer, Logger};
pub use source::Source;

pub mod download;
pub mod environment;
mod error;
pub mod log;
pub mod source;
