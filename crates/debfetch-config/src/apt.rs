//! Reader for APT's configuration format (`apt.conf` and its parts).
//!
//! Supports the subset of the syntax found in practice: `Key::Path "value";`
//! assignments, nested `Scope { ... };` blocks, unnamed list entries,
//! `//`, `/* */` and `#` comments, and the `#clear` / `#include` directives.
//! Keys are case-insensitive.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MAX_INCLUDE_DEPTH: usize = 8;

pub const HTTP_PROXY_KEY: &str = "Acquire::http::Proxy";
pub const FTP_PROXY_KEY: &str = "Acquire::ftp::Proxy";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AptConfig {
    values: BTreeMap<String, String>,
    lists: BTreeMap<String, Vec<String>>,
}

impl AptConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut config = Self::new();
        config.merge_str(text, "<string>")?;
        Ok(config)
    }

    /// Read the system configuration the way libapt does: `$APT_CONFIG`
    /// first, then the parts directory, then the main file.
    pub fn load() -> Result<Self> {
        let alternate = env::var_os("APT_CONFIG").map(PathBuf::from);
        Self::load_with(Path::new("/"), alternate)
    }

    /// Like [`AptConfig::load`], but rooted at `root` and ignoring `$APT_CONFIG`.
    pub fn load_from(root: &Path) -> Result<Self> {
        Self::load_with(root, None)
    }

    fn load_with(root: &Path, alternate: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::new();

        if let Some(path) = alternate.filter(|p| !p.as_os_str().is_empty()) {
            if path.is_file() {
                config.merge_file(&path)?;
            } else {
                warn!(path = %path.display(), "APT_CONFIG points to a missing file");
            }
        }

        let etc = root.join(config.get_or("Dir::Etc", "etc/apt"));
        let parts = etc.join(config.get_or("Dir::Etc::parts", "apt.conf.d"));
        if parts.is_dir() {
            for part in config_parts(&parts)? {
                config.merge_file(&part)?;
            }
        }

        let main = etc.join(config.get_or("Dir::Etc::main", "apt.conf"));
        if main.is_file() {
            config.merge_file(&main)?;
        }

        Ok(config)
    }

    pub fn merge_str(&mut self, text: &str, origin: &str) -> Result<()> {
        Parser::new(self, text, origin, None, 0).run()
    }

    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        self.merge_file_at(path, 0)
    }

    fn merge_file_at(&mut self, path: &Path, depth: usize) -> Result<()> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(Error::IncludeDepth {
                path: path.to_path_buf(),
            });
        }
        if path.is_dir() {
            for part in config_parts(path)? {
                self.merge_file_at(&part, depth + 1)?;
            }
            return Ok(());
        }

        debug!(path = %path.display(), "reading apt configuration");
        let text = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();
        Parser::new(self, &text, &origin, path.parent(), depth).run()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize(key)).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }


    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize(key), value.into());
    }

    fn push_list(&mut self, key: &str, value: String) {
        self.lists.entry(normalize(key)).or_default().push(value);
    }

    /// Drop `key` and everything below it.
    pub fn clear(&mut self, key: &str) {
        let key = normalize(key);
        let prefix = format!("{key}::");
        let keep = |k: &String| *k != key && !k.starts_with(&prefix);
        self.values.retain(|k, _| keep(k));
        self.lists.retain(|k, _| keep(k));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.lists.is_empty()
    }

    /// Assigned values by normalized key, sorted.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Unnamed list entries by normalized key, sorted.
    pub fn lists(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.lists.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

fn normalize(key: &str) -> String {
    key.trim_matches(':').to_ascii_lowercase()
}

/// Files libapt would read from a parts directory, in reading order.
fn config_parts(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_err = |source| Error::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut parts = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let valid = entry
            .file_name()
            .to_str()
            .is_some_and(is_valid_part_name);
        if valid && path.is_file() {
            parts.push(path);
        } else {
            debug!(path = %path.display(), "skipping configuration part");
        }
    }
    parts.sort();
    Ok(parts)
}

fn is_valid_part_name(name: &str) -> bool {
    let charset = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !charset || name.starts_with('.') {
        return false;
    }
    match name.rsplit_once('.') {
        None => true,
        Some((_, ext)) => ext == "conf",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Open,
    Close,
    Semi,
    Clear,
    Include,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    fn next(&mut self) -> std::result::Result<Option<(Token, usize)>, (usize, String)> {
        loop {
            let Some(c) = self.peek() else {
                return Ok(None);
            };
            let line = self.line;
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => self.skip_line(),
                '/' if self.peek_at(1) == Some('*') => {
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err((line, "unterminated comment".into())),
                        }
                    }
                }
                '#' => {
                    self.bump();
                    let mut word = String::new();
                    while let Some(c) = self.peek().filter(char::is_ascii_alphabetic) {
                        word.push(c);
                        self.bump();
                    }
                    match word.as_str() {
                        "clear" => return Ok(Some((Token::Clear, line))),
                        "include" => return Ok(Some((Token::Include, line))),
                        _ => self.skip_line(),
                    }
                }
                '"' => {
                    self.bump();
                    let mut value = String::new();
                    loop {
                        match self.bump() {
                            Some('"') => break,
                            Some(c) => value.push(c),
                            None => return Err((line, "unterminated string".into())),
                        }
                    }
                    return Ok(Some((Token::Quoted(value), line)));
                }
                '{' => {
                    self.bump();
                    return Ok(Some((Token::Open, line)));
                }
                '}' => {
                    self.bump();
                    return Ok(Some((Token::Close, line)));
                }
                ';' => {
                    self.bump();
                    return Ok(Some((Token::Semi, line)));
                }
                _ => {
                    let mut word = String::new();
                    while let Some(c) = self.peek() {
                        let comment = c == '/' && matches!(self.peek_at(1), Some('/' | '*'));
                        if c.is_whitespace() || matches!(c, '{' | '}' | ';' | '"') || comment {
                            break;
                        }
                        word.push(c);
                        self.bump();
                    }
                    return Ok(Some((Token::Word(word), line)));
                }
            }
        }
    }
}

struct Parser<'c> {
    config: &'c mut AptConfig,
    lexer: Lexer,
    origin: String,
    base: Option<PathBuf>,
    depth: usize,
    scopes: Vec<String>,
}

impl<'c> Parser<'c> {
    fn new(
        config: &'c mut AptConfig,
        text: &str,
        origin: &str,
        base: Option<&Path>,
        depth: usize,
    ) -> Self {
        Self {
            config,
            lexer: Lexer::new(text),
            origin: origin.to_string(),
            base: base.map(Path::to_path_buf),
            depth,
            scopes: Vec::new(),
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> Error {
        Error::Parse {
            origin: self.origin.clone(),
            line,
            message: message.into(),
        }
    }

    fn next(&mut self) -> Result<Option<(Token, usize)>> {
        self.lexer
            .next()
            .map_err(|(line, message)| self.error(line, message))
    }

    fn qualify(&self, name: &str) -> String {
        let name = name.trim_matches(':');
        match self.scopes.last() {
            Some(scope) => format!("{scope}::{name}"),
            None => name.to_string(),
        }
    }

    fn expect_semi(&mut self, after: &str, line: usize) -> Result<()> {
        match self.next()? {
            Some((Token::Semi, _)) => Ok(()),
            _ => Err(self.error(line, format!("expected ';' after {after}"))),
        }
    }

    fn expect_operand(&mut self, directive: &str, line: usize) -> Result<String> {
        match self.next()? {
            Some((Token::Word(v) | Token::Quoted(v), _)) => {
                self.expect_semi(directive, line)?;
                Ok(v)
            }
            _ => Err(self.error(line, format!("{directive} needs an argument"))),
        }
    }

    fn run(mut self) -> Result<()> {
        while let Some((token, line)) = self.next()? {
            match token {
                Token::Word(name) => self.statement(&name, line)?,
                Token::Quoted(value) => {
                    self.expect_semi("list entry", line)?;
                    let Some(scope) = self.scopes.last().cloned() else {
                        return Err(self.error(line, "list entry outside of a scope"));
                    };
                    self.config.push_list(&scope, value);
                }
                Token::Close => {
                    if self.scopes.pop().is_none() {
                        return Err(self.error(line, "unmatched '}'"));
                    }
                }
                Token::Semi => {}
                Token::Open => return Err(self.error(line, "'{' without a key")),
                Token::Clear => {
                    let key = self.expect_operand("#clear", line)?;
                    let key = self.qualify(&key);
                    self.config.clear(&key);
                }
                Token::Include => {
                    let target = self.expect_operand("#include", line)?;
                    self.include(&target)?;
                }
            }
        }

        if !self.scopes.is_empty() {
            let line = self.lexer.line;
            return Err(self.error(line, "unterminated scope"));
        }
        Ok(())
    }

    fn statement(&mut self, name: &str, line: usize) -> Result<()> {
        let key = self.qualify(name);
        match self.next()? {
            Some((Token::Semi, _)) => self.config.set(&key, ""),
            Some((Token::Open, _)) => self.scopes.push(key),
            Some((Token::Quoted(value) | Token::Word(value), _)) => {
                self.config.set(&key, value);
                match self.next()? {
                    Some((Token::Semi, _)) => {}
                    Some((Token::Open, _)) => self.scopes.push(key),
                    _ => return Err(self.error(line, format!("expected ';' after {name}"))),
                }
            }
            _ => return Err(self.error(line, format!("expected a value after {name}"))),
        }
        Ok(())
    }

    fn include(&mut self, target: &str) -> Result<()> {
        let target = Path::new(target);
        let path = match &self.base {
            Some(base) if target.is_relative() => base.join(target),
            _ => target.to_path_buf(),
        };
        self.config.merge_file_at(&path, self.depth + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flat_assignment() {
        let config = AptConfig::parse(r#"Acquire::http::Proxy "http://proxy:3128";"#).unwrap();
        assert_eq!(config.get(HTTP_PROXY_KEY), Some("http://proxy:3128"));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let config = AptConfig::parse(r#"acquire::HTTP::proxy "http://p";"#).unwrap();
        assert_eq!(config.get("Acquire::http::Proxy"), Some("http://p"));
    }

    #[test]
    fn test_nested_scopes() {
        let text = r#"
            Acquire {
                http { Proxy "http://a:3128"; };
                ftp::Proxy "ftp://b:21";
            };
        "#;
        let config = AptConfig::parse(text).unwrap();
        assert_eq!(config.get(HTTP_PROXY_KEY), Some("http://a:3128"));
        assert_eq!(config.get(FTP_PROXY_KEY), Some("ftp://b:21"));
    }

    #[test]
    fn test_comments() {
        let text = r#"
            // a line comment
            # another one
            /* block
               comment */
            APT::Get::Assume-Yes true; // trailing
            Acquire::http::Proxy "http://x//y";
        "#;
        let config = AptConfig::parse(text).unwrap();
        assert_eq!(config.get("APT::Get::Assume-Yes"), Some("true"));
        assert_eq!(config.get(HTTP_PROXY_KEY), Some("http://x//y"));
        assert_eq!(config.len(), 2);
    }

    #[test]
    fn test_list_entries() {
        let text = r#"DPkg::Pre-Invoke { "echo one"; "echo two"; };"#;
        let config = AptConfig::parse(text).unwrap();
        let lists: Vec<_> = config.lists().collect();
        assert_eq!(
            lists,
            [("dpkg::pre-invoke", &["echo one".to_string(), "echo two".to_string()][..])]
        );
        assert_eq!(config.iter().count(), 0);
    }

    #[test]
    fn test_clear() {
        let text = r#"
            Acquire::http::Proxy "http://a";
            Acquire::http::Timeout "10";
            Acquire::ftp::Proxy "ftp://b";
            #clear Acquire::http;
        "#;
        let config = AptConfig::parse(text).unwrap();
        assert_eq!(config.get(HTTP_PROXY_KEY), None);
        assert_eq!(config.get("Acquire::http::Timeout"), None);
        assert_eq!(config.get(FTP_PROXY_KEY), Some("ftp://b"));
    }

    #[test]
    fn test_later_assignment_wins() {
        let text = r#"
            Acquire::http::Proxy "http://old";
            Acquire::http::Proxy "http://new";
        "#;
        let config = AptConfig::parse(text).unwrap();
        assert_eq!(config.get(HTTP_PROXY_KEY), Some("http://new"));
    }

    #[test]
    fn test_get_or_default() {
        let config = AptConfig::new();
        assert_eq!(config.get_or(HTTP_PROXY_KEY, ""), "");
        assert!(config.is_empty());
    }

    #[test]
    fn test_unterminated_string() {
        let err = AptConfig::parse("Foo \"bar;\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_unterminated_scope() {
        let err = AptConfig::parse("Acquire {\n  http::Proxy \"x\";\n").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_unmatched_close_reports_line() {
        let err = AptConfig::parse("Foo \"1\";\n\n};\n").unwrap_err();
        match err {
            Error::Parse { origin, line, .. } => {
                assert_eq!(origin, "<string>");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_semicolon() {
        assert!(AptConfig::parse(r#"Foo "1" Bar "2";"#).is_err());
    }

    #[test]
    fn test_part_names() {
        assert!(is_valid_part_name("70debconf"));
        assert!(is_valid_part_name("99proxy.conf"));
        assert!(is_valid_part_name("01-local_settings"));
        assert!(!is_valid_part_name("99proxy.conf.dpkg-old"));
        assert!(!is_valid_part_name("proxy.bak"));
        assert!(!is_valid_part_name(".hidden"));
        assert!(!is_valid_part_name("with space"));
    }

    #[test]
    fn test_load_from_root() {
        let root = tempdir().unwrap();
        let etc = root.path().join("etc/apt");
        let parts = etc.join("apt.conf.d");
        fs::create_dir_all(&parts).unwrap();

        fs::write(parts.join("10proxy"), r#"Acquire::http::Proxy "http://first";"#).unwrap();
        fs::write(parts.join("20proxy.conf"), r#"Acquire::http::Proxy "http://second";"#).unwrap();
        fs::write(parts.join("30proxy.disabled"), r#"Acquire::http::Proxy "http://no";"#).unwrap();
        fs::write(etc.join("apt.conf"), r#"Acquire::ftp::Proxy "ftp://main";"#).unwrap();

        let config = AptConfig::load_from(root.path()).unwrap();
        assert_eq!(config.get(HTTP_PROXY_KEY), Some("http://second"));
        assert_eq!(config.get(FTP_PROXY_KEY), Some("ftp://main"));
    }

    #[test]
    fn test_load_from_empty_root() {
        let root = tempdir().unwrap();
        let config = AptConfig::load_from(root.path()).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_include_relative() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("proxy.conf"), r#"Acquire::http::Proxy "http://inc";"#).unwrap();
        fs::write(dir.path().join("main.conf"), "#include \"proxy.conf\";\n").unwrap();

        let mut config = AptConfig::new();
        config.merge_file(&dir.path().join("main.conf")).unwrap();
        assert_eq!(config.get(HTTP_PROXY_KEY), Some("http://inc"));
    }

    #[test]
    fn test_include_cycle_is_bounded() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("loop.conf"), "#include \"loop.conf\";\n").unwrap();

        let mut config = AptConfig::new();
        let err = config.merge_file(&dir.path().join("loop.conf")).unwrap_err();
        assert!(matches!(err, Error::IncludeDepth { .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.conf");
        fs::write(&path, "Acquire {\n").unwrap();

        let mut config = AptConfig::new();
        let err = config.merge_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.conf"));
    }
}
