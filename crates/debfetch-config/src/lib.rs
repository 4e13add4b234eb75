//! Configuration sources for debfetch.
//!
//! - [`apt`] reads APT's own configuration, which is where proxy settings
//!   live on a Debian system.
//! - [`settings`] holds the tool's settings (mirror, log file, fetch tool).

pub use apt::{AptConfig, FTP_PROXY_KEY, HTTP_PROXY_KEY};
pub use error::{Error, Result};
pub use settings::{DEFAULT_DISTRIBUTION, DEFAULT_MIRROR, Settings};

pub mod apt;
mod error;
pub mod settings;
