use crate::error::{FuncvmError, Result};
use crate::store::{StateFs, VersionStore};
use std::fmt;
use std::path::Path;

/// Where the effective version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    Env,
    Local,
    Global,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::Env => "env",
            VersionSource::Local => "local",
            VersionSource::Global => "global",
        }
    }
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVersion {
    pub version: String,
    pub source: VersionSource,
}

/// All three version sources for one working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinState {
    pub env: Option<String>,
    pub local: Option<String>,
    pub global: Option<String>,
}

impl PinState {
    pub fn read<F: StateFs>(
        env_value: Option<&str>,
        working_dir: &Path,
        store: &VersionStore<F>,
    ) -> Result<Self> {
        Ok(Self {
            env: normalize_env(env_value),
            local: store.read_local_pin(working_dir)?,
            global: store.read_global_pin()?,
        })
    }

    /// Highest-precedence source that is set.
    pub fn effective(&self) -> Option<ActiveVersion> {
        [
            (VersionSource::Env, &self.env),
            (VersionSource::Local, &self.local),
            (VersionSource::Global, &self.global),
        ]
        .into_iter()
        .find_map(|(source, version)| {
            version.as_ref().map(|version| ActiveVersion {
                version: version.clone(),
                source,
            })
        })
    }

    /// Sources naming `version`, in precedence order.
    pub fn sources_for(&self, version: &str) -> Vec<VersionSource> {
        let mut sources = Vec::new();
        if self.env.as_deref() == Some(version) {
            sources.push(VersionSource::Env);
        }
        if self.local.as_deref() == Some(version) {
            sources.push(VersionSource::Local);
        }
        if self.global.as_deref() == Some(version) {
            sources.push(VersionSource::Global);
        }
        sources
    }
}

// The override is used verbatim; only unset and blank are treated as absent.
fn normalize_env(env_value: Option<&str>) -> Option<String> {
    env_value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Resolve the version a dispatch should use: env > local pin > global pin.
/// The result is not checked against the cache.
pub fn effective_version<F: StateFs>(
    env_value: Option<&str>,
    working_dir: &Path,
    store: &VersionStore<F>,
) -> Result<Option<ActiveVersion>> {
    if let Some(version) = normalize_env(env_value) {
        return Ok(Some(ActiveVersion {
            version,
            source: VersionSource::Env,
        }));
    }

    if let Some(version) = store.read_local_pin(working_dir)? {
        return Ok(Some(ActiveVersion {
            version,
            source: VersionSource::Local,
        }));
    }

    Ok(store.read_global_pin()?.map(|version| ActiveVersion {
        version,
        source: VersionSource::Global,
    }))
}

pub fn require_effective_version<F: StateFs>(
    env_value: Option<&str>,
    working_dir: &Path,
    store: &VersionStore<F>,
) -> Result<ActiveVersion> {
    effective_version(env_value, working_dir, store)?.ok_or(FuncvmError::NotInitialized)
}
