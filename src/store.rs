use crate::error::{FuncvmError, Result};
use crate::models::is_version_name;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const GLOBAL_PIN_FILE: &str = "funcvm-core-tools-version.txt";
pub const LOCAL_PIN_FILE: &str = ".func-version";

/// File access used by the version store, injectable for tests.
pub trait StateFs {
    /// `Ok(None)` when the file does not exist.
    fn read_to_string(&self, path: &Path) -> io::Result<Option<String>>;
    /// Writes `contents`, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// Entry names of `path` in enumeration order; empty when it does not exist.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>>;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl StateFs for OsFs {
    fn read_to_string(&self, path: &Path) -> io::Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        // symlinks are not followed, a linked directory is not an install
        std::fs::symlink_metadata(path)
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

/// On-disk layout: cached versions and pin files.
#[derive(Debug, Clone)]
pub struct VersionStore<F: StateFs = OsFs> {
    fs: F,
    root: PathBuf,
}

impl VersionStore<OsFs> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_fs(OsFs, root)
    }
}

impl<F: StateFs> VersionStore<F> {
    pub fn with_fs(fs: F, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn install_dir(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }

    pub fn is_installed(&self, version: &str) -> bool {
        self.fs.is_dir(&self.install_dir(version))
    }

    /// Installed versions in directory enumeration order (unsorted).
    pub fn list_installed(&self) -> Result<Vec<String>> {
        let names = self.fs.list_dir(&self.root)?;
        Ok(names
            .into_iter()
            .filter(|name| is_version_name(name) && self.fs.is_dir(&self.root.join(name)))
            .collect())
    }

    pub fn global_pin_path(&self) -> PathBuf {
        self.root.join(GLOBAL_PIN_FILE)
    }

    pub fn local_pin_path(&self, dir: &Path) -> PathBuf {
        dir.join(LOCAL_PIN_FILE)
    }

    pub fn read_global_pin(&self) -> Result<Option<String>> {
        self.read_pin(&self.global_pin_path())
    }

    pub fn write_global_pin(&self, version: &str) -> Result<()> {
        let path = self.global_pin_path();
        debug!(path = %path.display(), version, "writing global pin");
        self.fs.write(&path, version)?;
        Ok(())
    }

    pub fn read_local_pin(&self, dir: &Path) -> Result<Option<String>> {
        self.read_pin(&self.local_pin_path(dir))
    }

    pub fn has_local_pin(&self, dir: &Path) -> bool {
        self.fs.exists(&self.local_pin_path(dir))
    }

    /// Write `.func-version` in `dir`. An existing file is only replaced when
    /// `overwrite` is set.
    pub fn write_local_pin(&self, dir: &Path, version: &str, overwrite: bool) -> Result<()> {
        let path = self.local_pin_path(dir);

        if !overwrite && self.has_local_pin(dir) {
            let current = self.read_pin(&path)?.unwrap_or_default();
            return Err(FuncvmError::LocalPinExists {
                path: path.display().to_string(),
                current,
                requested: version.to_string(),
            });
        }

        debug!(path = %path.display(), version, "writing local pin");
        self.fs.write(&path, version)?;
        Ok(())
    }

    /// Delete a cached version. The pin files are left alone. Only a direct
    /// child of the cache root with a version name is ever removed.
    pub fn remove(&self, version: &str) -> Result<()> {
        if !is_cache_entry_name(version) || !self.is_installed(version) {
            return Err(FuncvmError::NotInstalled(version.to_string()));
        }

        let dir = self.install_dir(version);

        debug!(path = %dir.display(), "removing cached version");
        self.fs.remove_dir_all(&dir)?;
        Ok(())
    }

    fn read_pin(&self, path: &Path) -> Result<Option<String>> {
        let contents = self.fs.read_to_string(path)?;
        Ok(contents
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()))
    }
}

/// A single path component that looks like a version.
fn is_cache_entry_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && is_version_name(name)
}

/// In-memory [`StateFs`] for tests that should not touch the disk.
#[cfg(test)]
pub(crate) mod memory {
    use super::StateFs;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, BTreeSet};
    use std::io;
    use std::path::{Path, PathBuf};

    #[derive(Debug, Default)]
    pub struct MemoryFs {
        files: RefCell<BTreeMap<PathBuf, String>>,
        dirs: RefCell<BTreeSet<PathBuf>>,
    }

    impl MemoryFs {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_file(&self, path: impl Into<PathBuf>, contents: &str) {
            let path = path.into();
            if let Some(parent) = path.parent() {
                self.add_dir(parent);
            }
            self.files.borrow_mut().insert(path, contents.to_string());
        }

        pub fn add_dir(&self, path: impl Into<PathBuf>) {
            let path = path.into();
            let mut dirs = self.dirs.borrow_mut();
            for ancestor in path.ancestors() {
                if ancestor.as_os_str().is_empty() {
                    break;
                }
                dirs.insert(ancestor.to_path_buf());
            }
        }
    }

    impl StateFs for MemoryFs {
        fn read_to_string(&self, path: &Path) -> io::Result<Option<String>> {
            Ok(self.files.borrow().get(path).cloned())
        }

        fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
            self.add_file(path, contents);
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            self.files.borrow().contains_key(path) || self.dirs.borrow().contains(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.dirs.borrow().contains(path)
        }

        fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
            let files = self.files.borrow();
            let dirs = self.dirs.borrow();
            let children = files
                .keys()
                .chain(dirs.iter())
                .filter(|p| p.parent() == Some(path))
                .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
                .collect::<BTreeSet<_>>();
            Ok(children.into_iter().collect())
        }

        fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
            self.files.borrow_mut().retain(|p, _| !p.starts_with(path));
            self.dirs.borrow_mut().retain(|p| !p.starts_with(path));
            Ok(())
        }
    }
}
