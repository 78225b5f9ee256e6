use crate::error::Result;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_FEED_URL: &str = "https://aka.ms/AAbbk68";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_REPO: &str = "Azure/azure-functions-core-tools";

/// Environment variable that overrides every pinned version.
pub const VERSION_ENV_VAR: &str = "FUNCVM_CORE_TOOLS_VERSION";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub funcvm_dir: PathBuf,

    #[serde(skip)]
    pub download_dir: PathBuf,

    #[serde(skip)]
    pub config_file: PathBuf,

    /// Release feed listing tags and their platform artifacts
    pub feed_url: String,

    /// Base URL of the GitHub REST API used as a fallback
    pub github_api_url: String,

    /// `owner/name` of the repository publishing Core Tools releases
    pub github_repo: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_root(Self::default_funcvm_dir())
    }
}

impl Config {
    /// Build a config rooted at `funcvm_dir` with default endpoints.
    pub fn with_root(funcvm_dir: impl Into<PathBuf>) -> Self {
        let funcvm_dir = funcvm_dir.into();
        Self {
            download_dir: funcvm_dir.join("download"),
            config_file: funcvm_dir.join("config.toml"),
            funcvm_dir,
            feed_url: DEFAULT_FEED_URL.to_string(),
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            github_repo: DEFAULT_GITHUB_REPO.to_string(),
        }
    }

    fn default_funcvm_dir() -> PathBuf {
        // First check FUNCVM_DIR environment variable
        if let Ok(dir) = std::env::var("FUNCVM_DIR") {
            if !dir.trim().is_empty() {
                return PathBuf::from(shellexpand::tilde(&dir).to_string());
            }
        }

        if let Some(home) = dirs::home_dir() {
            return home.join(".funcvm");
        }

        PathBuf::from(shellexpand::tilde("~/.funcvm").to_string())
    }

    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_funcvm_dir())
    }

    /// Load defaults for `funcvm_dir`, then apply `config.toml` if present.
    pub fn load_from(funcvm_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config = Self::with_root(funcvm_dir);

        if config.config_file.exists() {
            let contents = std::fs::read_to_string(&config.config_file)?;
            let file_config: Config = toml::from_str(&contents)?;

            config.feed_url = file_config.feed_url;
            config.github_api_url = file_config.github_api_url;
            config.github_repo = file_config.github_repo;
        }

        tracing::debug!(root = %config.funcvm_dir.display(), "configuration loaded");
        Ok(config)
    }

    /// Listing page shown when a tag is missing upstream.
    pub fn releases_page(&self) -> String {
        format!("https://github.com/{}/releases", self.github_repo)
    }

    pub fn release_page(&self, tag: &str) -> String {
        format!("{}/tag/{}", self.releases_page(), tag)
    }

    pub fn release_api_url(&self, tag: &str) -> String {
        format!(
            "{}/repos/{}/releases/tags/{}",
            self.github_api_url.trim_end_matches('/'),
            self.github_repo,
            tag
        )
    }
}
