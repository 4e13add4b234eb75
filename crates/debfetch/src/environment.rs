//! Environment every download runs under.

use crate::error::Result;
use debfetch_config::{AptConfig, FTP_PROXY_KEY, HTTP_PROXY_KEY};
use debfetch_platform::EnvOverrides;

/// `http_proxy` and `ftp_proxy` from APT's proxy settings; empty when unset.
pub fn setup_proxies(config: &AptConfig) -> EnvOverrides {
    EnvOverrides::new().proxies(
        config.get_or(HTTP_PROXY_KEY, ""),
        config.get_or(FTP_PROXY_KEY, ""),
    )
}

/// `LC_ALL=C`.
pub fn setup_locale() -> EnvOverrides {
    EnvOverrides::new().locale()
}

pub fn environment(config: &AptConfig) -> EnvOverrides {
    setup_proxies(config).merge(&setup_locale())
}

/// [`environment`] for the system's APT configuration.
pub fn load_environment() -> Result<EnvOverrides> {
    let config = AptConfig::load()?;
    Ok(environment(&config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use debfetch_platform::env::{FTP_PROXY, HTTP_PROXY, LC_ALL};

    #[test]
    fn test_proxies_from_apt() {
        let config = AptConfig::parse(
            r#"
            Acquire::http::Proxy "http://proxy.example:3128";
            Acquire::ftp::Proxy "ftp://proxy.example:2121";
            "#,
        )
        .unwrap();
        let env = setup_proxies(&config);
        assert_eq!(env.get(HTTP_PROXY), Some("http://proxy.example:3128"));
        assert_eq!(env.get(FTP_PROXY), Some("ftp://proxy.example:2121"));
    }

    #[test]
    fn test_proxies_default_to_empty() {
        let env = setup_proxies(&AptConfig::new());
        assert_eq!(env.get(HTTP_PROXY), Some(""));
        assert_eq!(env.get(FTP_PROXY), Some(""));
    }

    #[test]
    fn test_locale() {
        assert_eq!(setup_locale().get(LC_ALL), Some("C"));
    }

    #[test]
    fn test_environment_combines_both() {
        let config = AptConfig::parse(r#"Acquire { http { Proxy "http://p:8080"; }; };"#).unwrap();
        let env = environment(&config);
        let vars: Vec<_> = env.iter().collect();
        assert_eq!(
            vars,
            [(HTTP_PROXY, "http://p:8080"), (FTP_PROXY, ""), (LC_ALL, "C")]
        );
    }
}
