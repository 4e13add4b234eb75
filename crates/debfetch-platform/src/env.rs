//! Environment variables handed to download processes.

use crate::command::Command;
use std::env;

pub const HTTP_PROXY: &str = "http_proxy";
pub const FTP_PROXY: &str = "ftp_proxy";
pub const LC_ALL: &str = "LC_ALL";

/// An ordered set of variable assignments. Setting a name twice keeps the
/// last value at the position of the first assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    vars: Vec<(String, String)>,
}

impl EnvOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.vars.push((name, value)),
        }
        self
    }

    /// Proxy variables read by wget and friends.
    pub fn proxies(self, http: impl Into<String>, ftp: impl Into<String>) -> Self {
        self.set(HTTP_PROXY, http).set(FTP_PROXY, ftp)
    }

    /// Force the C locale so tool messages are stable.
    pub fn locale(self) -> Self {
        self.set(LC_ALL, "C")
    }

    pub fn merge(self, other: &EnvOverrides) -> Self {
        other
            .iter()
            .fold(self, |acc, (name, value)| acc.set(name, value))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn apply(&self, cmd: Command) -> Command {
        self.iter().fold(cmd, |cmd, (name, value)| cmd.env(name, value))
    }

    /// Write every assignment into the process environment.
    ///
    /// # Safety
    ///
    /// Same contract as [`std::env::set_var`]: no other thread may read or
    /// write the environment while this runs.
    pub unsafe fn export(&self) {
        for (name, value) in self.iter() {
            unsafe { env::set_var(name, value) };
        }
    }
}
