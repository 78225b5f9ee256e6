use crate::arbiter::{PinState, VersionSource};
use crate::config::{Config, VERSION_ENV_VAR};
use crate::doctor::{probe_path, PathProbe};
use crate::download::{ArchiveSource, Downloader};
use crate::error::{FuncvmError, Result};
use crate::feed::{FeedResolver, HttpReleaseSource, ReleaseSource};
use crate::install::{InstallOutcome, Installer};
use crate::platform::PlatformDescriptor;
use crate::store::{StateFs, VersionStore};
use crate::utils::{format_markers, print_info, print_success, print_warning};
use clap::{CommandFactory, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

const EXAMPLES: &str = "\
Examples:

    Use latest stable 4.x version:
        funcvm use 4

    Use exact version:
        funcvm use 4.0.3928

    Pin a version for the current directory:
        funcvm use 4.0.3928 --local

    List installed versions:
        funcvm list

    List versions available for download:
        funcvm list --remote";

#[derive(Parser)]
#[command(name = "funcvm")]
#[command(about = "Azure Functions Core Tools Version Manager (unofficial)", long_about = None)]
#[command(after_help = EXAMPLES)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(skip)]
    config: Config,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Install a version if needed and make it the active one
    Use {
        /// Version to use (e.g., 4, 4.0.3928)
        version: String,

        /// Pin the version for the current directory instead of globally
        #[arg(long)]
        local: bool,
    },

    /// Download a version without activating it
    Install {
        /// Version to install (e.g., 4, 4.0.3928)
        version: String,
    },

    /// List installed versions
    #[command(alias = "ls")]
    List {
        /// List versions available from the release feed
        #[arg(long)]
        remote: bool,
    },

    /// Remove an installed version
    #[command(alias = "uninstall")]
    Remove {
        /// Version to remove
        version: String,
    },

    /// Check for a conflicting func installation on PATH
    Doctor,
}

/// Ambient process state, read once and passed down explicitly.
struct Invocation {
    env_version: Option<String>,
    working_dir: PathBuf,
}

impl Invocation {
    fn capture() -> Result<Self> {
        Ok(Self {
            env_version: std::env::var(VERSION_ENV_VAR).ok(),
            working_dir: std::env::current_dir()?,
        })
    }

    fn pins<F: StateFs>(&self, store: &VersionStore<F>) -> Result<PinState> {
        PinState::read(self.env_version.as_deref(), &self.working_dir, store)
    }
}

/// Markers for one line of `list`: the sources naming `version`.
fn installed_markers(version: &str, pins: &PinState) -> Vec<&'static str> {
    pins.sources_for(version)
        .into_iter()
        .map(|s| s.as_str())
        .collect()
}

/// Markers for one line of `list --remote`. `not installed` is only shown
/// for pinned versions, so unrelated remote versions stay unmarked.
fn remote_markers(version: &str, pins: &PinState, installed: bool) -> Vec<&'static str> {
    let mut markers = installed_markers(version, pins);
    if installed {
        markers.push("installed");
    } else if !markers.is_empty() {
        markers.push("not installed");
    }
    markers
}

/// Record `version` as active. A bare `use` never touches the global pin
/// while a local pin file exists in `working_dir`.
fn write_pin<F: StateFs>(
    store: &VersionStore<F>,
    working_dir: &Path,
    version: &str,
    local: bool,
) -> Result<VersionSource> {
    if local {
        store.write_local_pin(working_dir, version, true)?;
        return Ok(VersionSource::Local);
    }

    ensure_no_local_pin(store, working_dir, version)?;
    store.write_global_pin(version)?;
    Ok(VersionSource::Global)
}

fn ensure_no_local_pin<F: StateFs>(
    store: &VersionStore<F>,
    working_dir: &Path,
    requested: &str,
) -> Result<()> {
    if store.has_local_pin(working_dir) {
        return Err(FuncvmError::LocalPinExists {
            path: store.local_pin_path(working_dir).display().to_string(),
            current: store.read_local_pin(working_dir)?.unwrap_or_default(),
            requested: requested.to_string(),
        });
    }
    Ok(())
}

/// Resolve, install and pin `token`. A bare `use` with a local pin present
/// fails before anything upstream is contacted.
async fn activate<S: ReleaseSource, A: ArchiveSource>(
    resolver: &FeedResolver<S>,
    installer: &Installer<A>,
    store: &VersionStore,
    platform: &PlatformDescriptor,
    working_dir: &Path,
    token: &str,
    local: bool,
) -> Result<(InstallOutcome, VersionSource)> {
    if !local {
        ensure_no_local_pin(store, working_dir, token)?;
    }

    let target = resolver.resolve(token, platform).await?;
    let outcome = installer.ensure_installed(&target).await?;
    let scope = write_pin(store, working_dir, &outcome.version, local)?;
    Ok((outcome, scope))
}

impl Cli {
    pub fn new(config: Config) -> Self {
        let mut cli = Self::parse();
        cli.config = config;
        cli
    }

    pub async fn run(self) -> Result<()> {
        let platform = PlatformDescriptor::current()?;
        let invocation = Invocation::capture()?;

        match self.command {
            Some(Commands::Use { ref version, local }) => {
                self.use_version(version, local, &platform, &invocation).await
            }
            Some(Commands::Install { ref version }) => self.install(version, &platform).await,
            Some(Commands::List { remote: false }) => self.list(&invocation),
            Some(Commands::List { remote: true }) => self.list_remote(&platform, &invocation).await,
            Some(Commands::Remove { ref version }) => self.remove(version, &invocation),
            Some(Commands::Doctor) => {
                self.doctor();
                Ok(())
            }
            None => {
                Cli::command().print_long_help()?;
                Ok(())
            }
        }
    }

    fn store(&self) -> VersionStore {
        VersionStore::new(self.config.download_dir.clone())
    }

    fn upstream(
        &self,
        platform: &PlatformDescriptor,
    ) -> Result<(FeedResolver<HttpReleaseSource>, Installer<Downloader>)> {
        let resolver = FeedResolver::from_config(self.config.clone())?;
        let installer = Installer::new(self.store(), Downloader::new()?, *platform);
        Ok((resolver, installer))
    }

    async fn install_target(
        &self,
        token: &str,
        platform: &PlatformDescriptor,
    ) -> Result<InstallOutcome> {
        let (resolver, installer) = self.upstream(platform)?;
        let target = resolver.resolve(token, platform).await?;
        installer.ensure_installed(&target).await
    }

    async fn use_version(
        &self,
        token: &str,
        local: bool,
        platform: &PlatformDescriptor,
        invocation: &Invocation,
    ) -> Result<()> {
        let store = self.store();
        let (resolver, installer) = self.upstream(platform)?;
        let (outcome, scope) = activate(
            &resolver,
            &installer,
            &store,
            platform,
            &invocation.working_dir,
            token,
            local,
        )
        .await?;

        print_success(&format!("Using {}", outcome.version));
        if scope == VersionSource::Local {
            println!(
                "  {} {}",
                "Pinned in".dimmed(),
                store.local_pin_path(&invocation.working_dir).display().to_string().dimmed()
            );
        }

        if let Some(env_version) = invocation.env_version.as_deref().filter(|v| !v.trim().is_empty()) {
            if env_version != outcome.version {
                print_warning(&format!(
                    "{} is set to {}, which takes precedence in this shell",
                    VERSION_ENV_VAR, env_version
                ));
            }
        }

        Ok(())
    }

    async fn install(&self, token: &str, platform: &PlatformDescriptor) -> Result<()> {
        let outcome = self.install_target(token, platform).await?;

        if outcome.downloaded {
            print_success(&format!("Installed {}", outcome.version));
        } else {
            print_info(&format!("{} is already installed", outcome.version));
        }
        println!("  Path: {}", outcome.path.display().to_string().dimmed());
        println!("\n{}", "Activate it with:".yellow());
        println!("  funcvm use {}", outcome.version);

        Ok(())
    }

    fn list(&self, invocation: &Invocation) -> Result<()> {
        let store = self.store();
        let mut installed = store.list_installed()?;
        installed.sort();

        let pins = invocation.pins(&store)?;
        let effective = pins.effective();

        if installed.is_empty() {
            print_warning("No versions installed");
            println!("\n{}", "Install a version:".yellow());
            println!("  funcvm use 4");
            return Ok(());
        }

        println!("{}", "Installed versions:".green().bold());

        for version in &installed {
            let is_selected = effective.as_ref().is_some_and(|a| &a.version == version);
            let mut markers = installed_markers(version, &pins);
            if is_selected {
                markers.push("selected");
            }

            let prefix = if is_selected {
                "→".green().bold()
            } else {
                " ".normal()
            };

            println!("  {} {}{}", prefix, version.cyan(), format_markers(&markers));
        }

        match effective {
            Some(active) if !installed.contains(&active.version) => {
                print_warning(&format!(
                    "Active version {} (from {}) is not installed. Run `funcvm use {}` to repair",
                    active.version, active.source, active.version
                ));
            }
            None => {
                println!("\n{}", "Activate a version:".yellow());
                println!("  funcvm use <version>");
            }
            _ => {}
        }

        Ok(())
    }

    async fn list_remote(&self, platform: &PlatformDescriptor, invocation: &Invocation) -> Result<()> {
        let store = self.store();
        let pins = invocation.pins(&store)?;

        print_info("Fetching available versions...");
        let resolver = FeedResolver::from_config(self.config.clone())?;
        let tags = resolver.remote_versions(platform).await?;

        println!("\n{}", "Available versions:".green().bold());
        for tag in &tags {
            let version = &tag.target.resolved_version;
            let markers = remote_markers(version, &pins, store.is_installed(version));
            println!(
                "  {} {}{}",
                version.cyan(),
                tag.name.dimmed(),
                format_markers(&markers)
            );
        }

        println!("\n{}", "Usage:".yellow());
        println!("  funcvm use <version>");

        Ok(())
    }

    fn remove(&self, version: &str, invocation: &Invocation) -> Result<()> {
        let store = self.store();
        let pins = invocation.pins(&store)?;

        store.remove(version)?;
        print_success(&format!("Removed {}", version));

        for source in pins.sources_for(version) {
            print_warning(&format!(
                "{} is still pinned ({}); `func` will fail until you run `funcvm use <version>`",
                version, source
            ));
        }

        Ok(())
    }

    fn doctor(&self) {
        print_info("Validating environment...");

        match probe_path() {
            PathProbe::Absent => {
                print_warning("func is not on PATH. Add the directory containing the funcvm shim to PATH");
            }
            PathProbe::Shim(path) => {
                print_success(&format!("func resolves to the funcvm shim at {}", path.display()));
            }
            PathProbe::Foreign(path) => {
                print_warning(&format!(
                    "Azure Functions Core Tools appears to be installed already at {}. \
                     It's highly recommended that you uninstall it",
                    path.display()
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feed, GithubRelease};
    use crate::store::memory::MemoryFs;
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    const FEED: &str = r#"{
        "tags": { "v4": { "release": "4.0.3928", "hidden": false } },
        "releases": {
            "4.0.3928": { "coreTools": [
                { "OS": "Linux", "Architecture": "x64", "size": "full", "downloadLink": "https://cdn.test/public/4.0.3928/Azure.Functions.Cli.linux-x64.4.0.3928.zip" }
            ] }
        }
    }"#;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReleaseSource for CountingSource {
        async fn fetch_feed(&self) -> Result<Feed> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_str(FEED)?)
        }

        async fn fetch_github_release(&self, _tag: &str) -> Result<Option<GithubRelease>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    struct CountingArchives {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ArchiveSource for CountingArchives {
        async fn fetch_archive(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
            writer
                .start_file("func", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"#!/bin/sh\n").unwrap();
            Ok(writer.finish().unwrap().into_inner())
        }
    }

    struct Harness {
        _temp: TempDir,
        store: VersionStore,
        work: PathBuf,
        resolver: FeedResolver<CountingSource>,
        installer: Installer<CountingArchives>,
        feed_calls: Arc<AtomicUsize>,
        archive_calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let config = Config::with_root(temp.path().join("funcvm"));
            let store = VersionStore::new(config.download_dir.clone());
            let work = temp.path().join("project");
            std::fs::create_dir_all(&work).unwrap();
            let feed_calls = Arc::new(AtomicUsize::new(0));
            let archive_calls = Arc::new(AtomicUsize::new(0));

            Self {
                resolver: FeedResolver::new(
                    CountingSource {
                        calls: feed_calls.clone(),
                    },
                    config,
                ),
                installer: Installer::new(
                    store.clone(),
                    CountingArchives {
                        calls: archive_calls.clone(),
                    },
                    PlatformDescriptor::LINUX,
                ),
                feed_calls,
                archive_calls,
                store,
                work,
                _temp: temp,
            }
        }

        fn resolver_calls(&self) -> usize {
            self.feed_calls.load(Ordering::SeqCst)
        }

        fn installer_calls(&self) -> usize {
            self.archive_calls.load(Ordering::SeqCst)
        }

        async fn activate(&self, token: &str, local: bool) -> Result<(InstallOutcome, VersionSource)> {
            activate(
                &self.resolver,
                &self.installer,
                &self.store,
                &PlatformDescriptor::LINUX,
                &self.work,
                token,
                local,
            )
            .await
        }
    }

    fn parse(args: &[&str]) -> Option<Commands> {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse(&["funcvm", "use", "4", "--local"]),
            Some(Commands::Use {
                version: "4".to_string(),
                local: true
            })
        );
        assert_eq!(
            parse(&["funcvm", "install", "4.0.3928"]),
            Some(Commands::Install {
                version: "4.0.3928".to_string()
            })
        );
        assert_eq!(parse(&["funcvm", "list", "--remote"]), Some(Commands::List { remote: true }));
        assert_eq!(parse(&["funcvm", "ls"]), Some(Commands::List { remote: false }));
        assert_eq!(
            parse(&["funcvm", "remove", "4.0.3928"]),
            Some(Commands::Remove {
                version: "4.0.3928".to_string()
            })
        );
        assert_eq!(parse(&["funcvm"]), None);
    }

    #[test]
    fn test_use_requires_version() {
        assert!(Cli::try_parse_from(["funcvm", "use"]).is_err());
    }

    #[test]
    fn test_bare_use_refuses_when_local_pin_exists() {
        let fs = MemoryFs::new();
        fs.add_file("/work/.func-version", "3.0.3904");
        fs.add_file("/cache/funcvm-core-tools-version.txt", "2.7.3188");
        let store = VersionStore::with_fs(fs, "/cache");
        let work = Path::new("/work");

        let err = write_pin(&store, work, "4.0.3928", false).unwrap_err();
        assert!(matches!(err, FuncvmError::LocalPinExists { .. }));
        assert_eq!(store.read_global_pin().unwrap(), Some("2.7.3188".to_string()));
        assert_eq!(store.read_local_pin(work).unwrap(), Some("3.0.3904".to_string()));
    }

    #[test]
    fn test_local_use_overwrites_local_pin() {
        let fs = MemoryFs::new();
        fs.add_file("/work/.func-version", "3.0.3904");
        let store = VersionStore::with_fs(fs, "/cache");
        let work = Path::new("/work");

        let scope = write_pin(&store, work, "4.0.3928", true).unwrap();
        assert_eq!(scope, VersionSource::Local);
        assert_eq!(store.read_local_pin(work).unwrap(), Some("4.0.3928".to_string()));
        assert_eq!(store.read_global_pin().unwrap(), None);
    }

    #[test]
    fn test_bare_use_writes_global_pin() {
        let store = VersionStore::with_fs(MemoryFs::new(), "/cache");
        let scope = write_pin(&store, Path::new("/work"), "4.0.3928", false).unwrap();
        assert_eq!(scope, VersionSource::Global);
        assert_eq!(store.read_global_pin().unwrap(), Some("4.0.3928".to_string()));
        assert!(!store.has_local_pin(Path::new("/work")));
    }

    #[test]
    fn test_remote_markers() {
        let pins = PinState {
            env: Some("4.0.3928".to_string()),
            local: None,
            global: Some("3.0.3904".to_string()),
        };

        assert_eq!(remote_markers("4.0.3928", &pins, true), vec!["env", "installed"]);
        assert_eq!(remote_markers("3.0.3904", &pins, false), vec!["global", "not installed"]);
        assert_eq!(remote_markers("2.7.3188", &pins, true), vec!["installed"]);
        assert!(remote_markers("1.0.19", &pins, false).is_empty());
    }

    #[test]
    fn test_installed_markers_list_every_source() {
        let pins = PinState {
            env: None,
            local: Some("4.0.3928".to_string()),
            global: Some("4.0.3928".to_string()),
        };
        assert_eq!(installed_markers("4.0.3928", &pins), vec!["local", "global"]);
        assert!(installed_markers("3.0.3904", &pins).is_empty());
    }

    #[tokio::test]
    async fn test_bare_use_with_local_pin_contacts_nothing_upstream() {
        let harness = Harness::new();
        std::fs::write(harness.work.join(".func-version"), "3.0.3904").unwrap();

        let err = harness.activate("4", false).await.unwrap_err();
        assert!(matches!(err, FuncvmError::LocalPinExists { .. }));
        assert_eq!(harness.resolver_calls(), 0);
        assert_eq!(harness.installer_calls(), 0);
        assert_eq!(harness.store.read_global_pin().unwrap(), None);
        assert!(harness.store.list_installed().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_use_installs_and_pins() {
        let harness = Harness::new();
        std::fs::write(harness.work.join(".func-version"), "3.0.3904").unwrap();

        let (outcome, scope) = harness.activate("4", true).await.unwrap();
        assert_eq!(outcome.version, "4.0.3928");
        assert!(outcome.downloaded);
        assert_eq!(scope, VersionSource::Local);
        assert_eq!(harness.installer_calls(), 1);
        assert_eq!(
            harness.store.read_local_pin(&harness.work).unwrap(),
            Some("4.0.3928".to_string())
        );
        assert_eq!(harness.store.read_global_pin().unwrap(), None);
    }
}
