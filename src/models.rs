use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

static VERSION_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+").expect("valid version pattern"));

static URL_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+\.\d+\.\d+)/").expect("valid url version pattern"));

/// Whether a cache entry name looks like an installed version.
pub fn is_version_name(name: &str) -> bool {
    VERSION_DIR_RE.is_match(name)
}

/// Pull the `X.Y.Z` path segment out of an artifact download URL.
pub fn version_from_url(url: &str) -> Option<String> {
    URL_VERSION_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Remote release feed document.
#[derive(Debug, Clone, Deserialize)]
pub struct Feed {
    #[serde(default)]
    pub tags: IndexMap<String, ReleaseTag>,
    #[serde(default)]
    pub releases: HashMap<String, Release>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseTag {
    #[serde(default)]
    pub hidden: bool,
    /// Key into [`Feed::releases`]
    pub release: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(rename = "coreTools", default)]
    pub core_tools: Vec<ArtifactDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactDescriptor {
    #[serde(rename = "OS", default)]
    pub os: String,
    #[serde(rename = "Architecture", default)]
    pub arch: String,
    #[serde(default)]
    pub size: String,
    #[serde(rename = "downloadLink", default)]
    pub download_link: String,
}

impl ArtifactDescriptor {
    pub fn is_full(&self) -> bool {
        self.size == "full"
    }
}

/// GitHub `releases/tags/{tag}` response, reduced to what we read.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// A concrete archive to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub download_url: String,
    pub resolved_version: String,
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.resolved_version, self.download_url)
    }
}

/// Feed tag that survived platform filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveTag {
    pub name: String,
    pub target: ResolvedTarget,
}
