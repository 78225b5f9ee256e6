use thiserror::Error;

#[derive(Error, Debug)]
pub enum FuncvmError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("funcvm not initialized. Run `funcvm use <version>` or `funcvm --help`")]
    NotInitialized,

    #[error("Unable to find version {version} on GitHub releases {listing_url}")]
    VersionNotFound { version: String, listing_url: String },

    #[error("Unable to find suitable asset for {label} on GitHub releases {release_url}")]
    AssetNotAvailable { label: String, release_url: String },

    #[error("Version {0} is not installed. Run `funcvm list` to see installed versions")]
    NotInstalled(String),

    #[error("func binary not found at {path}. Try running `funcvm use {version}` to repair")]
    BinaryNotFound { version: String, path: String },

    #[error(
        "A local version file already exists at {path} (pinned to {current}). \
         Run `funcvm use {requested} --local` to update it"
    )]
    LocalPinExists {
        path: String,
        current: String,
        requested: String,
    },

    #[error("Failed to download from {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Failed to extract archive: {0}")]
    ExtractionFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, FuncvmError>;
