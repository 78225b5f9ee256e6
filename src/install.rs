use crate::download::ArchiveSource;
use crate::error::{FuncvmError, Result};
use crate::models::ResolvedTarget;
use crate::platform::PlatformDescriptor;
use crate::store::VersionStore;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub version: String,
    pub path: PathBuf,
    /// `false` when the version was already cached
    pub downloaded: bool,
}

pub struct Installer<A: ArchiveSource> {
    store: VersionStore,
    archives: A,
    platform: PlatformDescriptor,
}

impl<A: ArchiveSource> Installer<A> {
    pub fn new(store: VersionStore, archives: A, platform: PlatformDescriptor) -> Self {
        Self {
            store,
            archives,
            platform,
        }
    }

    /// Make sure `target` is present in the cache. An existing directory is
    /// trusted as-is and nothing is fetched; any other entry under that name
    /// does not count as installed.
    pub async fn ensure_installed(&self, target: &ResolvedTarget) -> Result<InstallOutcome> {
        let version = target.resolved_version.clone();
        let install_dir = self.store.install_dir(&version);

        if self.store.is_installed(&version) {
            debug!(path = %install_dir.display(), "version already cached");
            return Ok(InstallOutcome {
                version,
                path: install_dir,
                downloaded: false,
            });
        }

        println!(
            "{} {} to {}...",
            "Downloading".green().bold(),
            target.download_url.cyan(),
            install_dir.display().to_string().dimmed()
        );

        let bytes = self.archives.fetch_archive(&target.download_url).await?;

        extract_zip(Cursor::new(bytes), &install_dir)?;

        if self.platform.is_posix() {
            self.mark_executables(&install_dir)?;
        }

        Ok(InstallOutcome {
            version,
            path: install_dir,
            downloaded: true,
        })
    }

    fn mark_executables(&self, install_dir: &Path) -> Result<()> {
        let primary = install_dir.join(self.platform.executable_name());
        if !primary.is_file() {
            return Err(FuncvmError::ExtractionFailed(format!(
                "archive did not contain {}",
                self.platform.executable_name()
            )));
        }
        make_executable(&primary)?;

        let companion = install_dir.join(self.platform.companion_name());
        if companion.is_file() {
            make_executable(&companion)?;
        } else {
            debug!(path = %companion.display(), "companion utility not shipped");
        }

        Ok(())
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Extract a zip archive into `dest_dir`. The archive is validated before
/// the directory is created, but a failure mid-extraction leaves a partial
/// directory behind.
pub fn extract_zip<R: Read + Seek>(reader: R, dest_dir: &Path) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Extracting...");

    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| FuncvmError::ExtractionFailed(e.to_string()))?;

    std::fs::create_dir_all(dest_dir)?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| FuncvmError::ExtractionFailed(e.to_string()))?;

        let outpath = match file.enclosed_name() {
            Some(path) => dest_dir.join(path),
            None => continue,
        };

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(p) = outpath.parent() {
                std::fs::create_dir_all(p)?;
            }
            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut file, &mut outfile)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }

    pb.finish_and_clear();
    debug!(path = %dest_dir.display(), entries = archive.len(), "archive extracted");
    Ok(())
}
