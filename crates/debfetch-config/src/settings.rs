use crate::error::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_MIRROR: &str = "http://ftp.debian.org/debian";
pub const DEFAULT_DISTRIBUTION: &str = "unstable";
pub const ENV_PREFIX: &str = "DEBFETCH_";

const APP_DIR: &str = "debfetch";
const CONFIG_FILE: &str = "config.toml";

/// Tool settings. Layers, lowest to highest: defaults, the user config
/// file, an explicit config file, `DEBFETCH_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mirror: String,
    pub distribution: String,
    pub log_file: Option<PathBuf>,
    /// argv prefix of the fetch tool; the URL is appended.
    pub fetcher: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mirror: DEFAULT_MIRROR.to_string(),
            distribution: DEFAULT_DISTRIBUTION.to_string(),
            log_file: None,
            fetcher: vec!["wget".into(), "-O-".into(), "-q".into()],
        }
    }
}

impl Settings {
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(user) = Self::user_config_path() {
            figment = figment.merge(Toml::file(user));
        }
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Ok(Self::figment(explicit).extract()?)
    }

    pub fn user_config_path() -> Option<PathBuf> {
        let base = match env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            Some(xdg) => PathBuf::from(xdg),
            None => home::home_dir()?.join(".config"),
        };
        Some(base.join(APP_DIR).join(CONFIG_FILE))
    }

    /// `path` resolved against the configured mirror.
    pub fn mirror_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.mirror.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
