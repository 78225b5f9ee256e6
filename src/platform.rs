use crate::error::{FuncvmError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    MacOs,
    Linux,
}

/// Fixed per-OS record used to filter the feed and name GitHub assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformDescriptor {
    pub host: HostOs,
    /// Value of the feed's `OS` field
    pub os_name: &'static str,
    /// Standard architecture label
    pub arch_name: &'static str,
    /// Label used in release asset names, e.g. `linux-x64`
    pub label: &'static str,
}

/// An upstream feed irregularity for one OS: the artifact is listed under
/// `feed_arch`, and its URL carries `url_from` where `url_to` is wanted.
#[derive(Debug, Clone, Copy)]
struct FeedQuirk {
    os_name: &'static str,
    feed_arch: &'static str,
    url_from: &'static str,
    url_to: &'static str,
}

static FEED_QUIRKS: &[FeedQuirk] = &[FeedQuirk {
    os_name: "Windows",
    feed_arch: "x86",
    url_from: "win-x86",
    url_to: "win-x64",
}];

impl PlatformDescriptor {
    pub const WINDOWS: Self = Self {
        host: HostOs::Windows,
        os_name: "Windows",
        arch_name: "x64",
        label: "win-x64",
    };

    pub const MACOS: Self = Self {
        host: HostOs::MacOs,
        os_name: "MacOS",
        arch_name: "x64",
        label: "osx-x64",
    };

    pub const LINUX: Self = Self {
        host: HostOs::Linux,
        os_name: "Linux",
        arch_name: "x64",
        label: "linux-x64",
    };

    pub fn current() -> Result<Self> {
        Self::for_os(std::env::consts::OS)
    }

    pub fn for_os(os: &str) -> Result<Self> {
        match os {
            "windows" => Ok(Self::WINDOWS),
            "macos" => Ok(Self::MACOS),
            "linux" => Ok(Self::LINUX),
            other => Err(FuncvmError::UnsupportedPlatform(other.to_string())),
        }
    }

    fn quirk(&self) -> Option<&'static FeedQuirk> {
        FEED_QUIRKS.iter().find(|q| q.os_name == self.os_name)
    }

    /// Architecture value to match against the feed's `Architecture` field.
    pub fn feed_arch(&self) -> &'static str {
        self.quirk().map(|q| q.feed_arch).unwrap_or(self.arch_name)
    }

    /// Undo any URL irregularity of the artifact selected via [`Self::feed_arch`].
    pub fn rewrite_download_url(&self, url: &str) -> String {
        match self.quirk() {
            Some(q) => url.replace(q.url_from, q.url_to),
            None => url.to_string(),
        }
    }

    pub fn executable_name(&self) -> &'static str {
        match self.host {
            HostOs::Windows => "func.exe",
            HostOs::MacOs | HostOs::Linux => "func",
        }
    }

    /// Helper shipped next to `func` that also needs the executable bit.
    pub fn companion_name(&self) -> &'static str {
        match self.host {
            HostOs::Windows => "gozip.exe",
            HostOs::MacOs | HostOs::Linux => "gozip",
        }
    }

    pub fn is_posix(&self) -> bool {
        !matches!(self.host, HostOs::Windows)
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}
