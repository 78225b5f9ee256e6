use crate::config::Config;
use crate::error::{FuncvmError, Result};
use crate::models::{version_from_url, EffectiveTag, Feed, GithubRelease, ResolvedTarget};
use crate::platform::PlatformDescriptor;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::collections::HashSet;
use tracing::debug;

/// Upstream documents consulted during resolution.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn fetch_feed(&self) -> Result<Feed>;

    /// `Ok(None)` when GitHub has no release with this exact tag.
    async fn fetch_github_release(&self, tag: &str) -> Result<Option<GithubRelease>>;
}

pub struct HttpReleaseSource {
    client: Client,
    config: Config,
}

impl HttpReleaseSource {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .user_agent(concat!(
                    env!("CARGO_PKG_NAME"),
                    "/",
                    env!("CARGO_PKG_VERSION")
                ))
                .build()?,
            config,
        })
    }
}

#[async_trait]
impl ReleaseSource for HttpReleaseSource {
    async fn fetch_feed(&self) -> Result<Feed> {
        let url = &self.config.feed_url;
        debug!(%url, "fetching release feed");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FuncvmError::DownloadFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let body = response.text().await?;
        let feed = serde_json::from_str(body.trim_start_matches('\u{feff}'))?;
        Ok(feed)
    }

    async fn fetch_github_release(&self, tag: &str) -> Result<Option<GithubRelease>> {
        let url = self.config.release_api_url(tag);
        debug!(%url, "querying GitHub release");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| FuncvmError::DownloadFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "no GitHub release for tag");
            return Ok(None);
        }

        Ok(Some(response.json().await?))
    }
}

/// Name of the Core Tools zip attached to a GitHub release.
pub fn github_asset_name(platform: &PlatformDescriptor, version: &str) -> String {
    format!("Azure.Functions.Cli.{}.{}.zip", platform.label, version)
}

/// Visible tags whose release ships a full artifact for `platform`, in feed order.
pub fn effective_tags(feed: &Feed, platform: &PlatformDescriptor) -> Vec<EffectiveTag> {
    let feed_arch = platform.feed_arch();

    feed.tags
        .iter()
        .filter(|(_, tag)| !tag.hidden)
        .filter_map(|(name, tag)| {
            let Some(release) = feed.releases.get(&tag.release) else {
                debug!(tag = %name, release = %tag.release, "tag points at unknown release");
                return None;
            };

            let artifact = release.core_tools.iter().find(|a| {
                a.os == platform.os_name && a.arch == feed_arch && a.is_full()
            })?;

            let download_url = platform.rewrite_download_url(&artifact.download_link);
            let resolved_version = version_from_url(&download_url)?;

            Some(EffectiveTag {
                name: name.clone(),
                target: ResolvedTarget {
                    download_url,
                    resolved_version,
                },
            })
        })
        .collect()
}

/// Alias `v{token}` first, then the first tag whose version is exactly `token`.
pub fn match_tag<'a>(tags: &'a [EffectiveTag], token: &str) -> Option<&'a EffectiveTag> {
    let alias = format!("v{}", token);
    tags.iter()
        .find(|t| t.name == alias)
        .or_else(|| tags.iter().find(|t| t.target.resolved_version == token))
}

pub struct FeedResolver<S: ReleaseSource> {
    source: S,
    config: Config,
}

impl FeedResolver<HttpReleaseSource> {
    pub fn from_config(config: Config) -> Result<Self> {
        let source = HttpReleaseSource::new(config.clone())?;
        Ok(Self::new(source, config))
    }
}

impl<S: ReleaseSource> FeedResolver<S> {
    pub fn new(source: S, config: Config) -> Self {
        Self { source, config }
    }

    /// Turn a version token into a download URL and exact version.
    pub async fn resolve(
        &self,
        token: &str,
        platform: &PlatformDescriptor,
    ) -> Result<ResolvedTarget> {
        let token = token.trim();
        if token.is_empty() {
            return Err(self.not_found(token));
        }

        let feed = self.source.fetch_feed().await?;
        let tags = effective_tags(&feed, platform);
        debug!(count = tags.len(), "effective feed tags");

        if let Some(tag) = match_tag(&tags, token) {
            debug!(tag = %tag.name, version = %tag.target.resolved_version, "resolved from feed");
            return Ok(tag.target.clone());
        }

        self.resolve_from_github(token, platform).await
    }

    async fn resolve_from_github(
        &self,
        token: &str,
        platform: &PlatformDescriptor,
    ) -> Result<ResolvedTarget> {
        let release = self
            .source
            .fetch_github_release(token)
            .await?
            .ok_or_else(|| self.not_found(token))?;

        let name = github_asset_name(platform, token);
        let asset = release
            .assets
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| FuncvmError::AssetNotAvailable {
                label: platform.label.to_string(),
                release_url: self.config.release_page(token),
            })?;

        debug!(asset = %asset.name, "resolved from GitHub releases");
        Ok(ResolvedTarget {
            download_url: asset.browser_download_url,
            resolved_version: token.to_string(),
        })
    }

    /// Versions advertised by the feed for `platform`, one entry per version.
    pub async fn remote_versions(&self, platform: &PlatformDescriptor) -> Result<Vec<EffectiveTag>> {
        let feed = self.source.fetch_feed().await?;
        let mut seen = HashSet::new();
        Ok(effective_tags(&feed, platform)
            .into_iter()
            .filter(|t| seen.insert(t.target.resolved_version.clone()))
            .collect())
    }

    fn not_found(&self, token: &str) -> FuncvmError {
        FuncvmError::VersionNotFound {
            version: token.to_string(),
            listing_url: self.config.releases_page(),
        }
    }
}
