use std::fmt;
use std::path::PathBuf;

/// Where a download reads from. Anything starting with `/` or `.` is a
/// local path, whatever else it contains; the rest is a URL for the fetch
/// tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    Remote(String),
}

impl Source {
    pub fn parse(source: &str) -> Self {
        if source.starts_with(['/', '.']) {
            Source::Local(PathBuf::from(source))
        } else {
            Source::Remote(source.to_string())
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Source::Local(_))
    }
}

impl From<&str> for Source {
    fn from(source: &str) -> Self {
        Source::parse(source)
    }
}

impl From<String> for Source {
    fn from(source: String) -> Self {
        Source::parse(&source)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local(path) => write!(f, "{}", path.display()),
            Source::Remote(url) => f.write_str(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_absolute_and_relative_paths_are_local() {
        assert!(Source::parse("/var/cache/apt/archives/foo.deb").is_local());
        assert!(Source::parse("./fixture.txt").is_local());
        assert!(Source::parse("../up/one").is_local());
        assert!(Source::parse(".hidden").is_local());
    }

    #[test]
    fn test_urls_are_remote() {
        let source = Source::parse("http://ftp.debian.org/debian/dists/unstable/Release");
        assert_eq!(
            source,
            Source::Remote("http://ftp.debian.org/debian/dists/unstable/Release".into())
        );
        assert!(!Source::parse("fixture.txt").is_local());
    }

    #[test]
    fn test_url_lookalike_path_stays_local() {
        let source = Source::parse("./http://example.org/x");
        assert_eq!(source, Source::Local(PathBuf::from("./http://example.org/x")));
    }

    #[test]
    fn test_display_round_trips() {
        for raw in ["/tmp/a b", "./x;y", "ftp://host/file"] {
            assert_eq!(Source::parse(raw).to_string(), raw);
        }
    }

    proptest! {
        #[test]
        fn prop_leading_slash_or_dot_is_local(rest in ".*", lead in prop::sample::select(vec!['/', '.'])) {
            let raw = format!("{lead}{rest}");
            prop_assert!(Source::parse(&raw).is_local());
        }

        #[test]
        fn prop_other_leads_are_remote(raw in "[^/.].*") {
            prop_assert!(!Source::parse(&raw).is_local());
        }
    }
}
