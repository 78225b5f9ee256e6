use crate::arbiter::ActiveVersion;
use crate::error::{FuncvmError, Result};
use crate::platform::PlatformDescriptor;
use crate::store::VersionStore;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Flag the shim answers with `yes`, used to tell it apart from a real `func`.
pub const IDENTIFY_FLAG: &str = "--is-funcvm";

/// Path of the cached `func` binary for the active version.
pub fn resolve_binary(
    store: &VersionStore,
    platform: &PlatformDescriptor,
    active: &ActiveVersion,
) -> Result<PathBuf> {
    let binary = store
        .install_dir(&active.version)
        .join(platform.executable_name());

    if !binary.is_file() {
        return Err(FuncvmError::BinaryNotFound {
            version: active.version.clone(),
            path: binary.display().to_string(),
        });
    }

    Ok(binary)
}

/// Run `binary` with inherited stdio and return its exit code.
pub fn forward(binary: &Path, args: &[OsString]) -> Result<i32> {
    debug!(binary = %binary.display(), "forwarding invocation");
    let status = Command::new(binary).args(args).status()?;
    // killed by a signal
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::VersionSource;
    use tempfile::TempDir;

    fn active(version: &str) -> ActiveVersion {
        ActiveVersion {
            version: version.to_string(),
            source: VersionSource::Global,
        }
    }

    #[test]
    fn test_resolve_binary() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("4.0.3928")).unwrap();
        std::fs::write(temp.path().join("4.0.3928/func"), "").unwrap();

        let store = VersionStore::new(temp.path());
        let binary = resolve_binary(&store, &PlatformDescriptor::LINUX, &active("4.0.3928")).unwrap();
        assert_eq!(binary, temp.path().join("4.0.3928/func"));
    }

    #[test]
    fn test_removed_pinned_version_is_reported() {
        let temp = TempDir::new().unwrap();
        let store = VersionStore::new(temp.path());
        std::fs::create_dir_all(temp.path().join("4.0.3928")).unwrap();
        std::fs::write(temp.path().join("4.0.3928/func"), "").unwrap();
        store.write_global_pin("4.0.3928").unwrap();

        store.remove("4.0.3928").unwrap();

        let err = resolve_binary(&store, &PlatformDescriptor::LINUX, &active("4.0.3928")).unwrap_err();
        match err {
            FuncvmError::BinaryNotFound { version, path } => {
                assert_eq!(version, "4.0.3928");
                assert!(path.ends_with("func"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.read_global_pin().unwrap(), Some("4.0.3928".to_string()));
    }

    #[test]
    fn test_windows_binary_name() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("4.0.3928")).unwrap();
        std::fs::write(temp.path().join("4.0.3928/func"), "").unwrap();

        let store = VersionStore::new(temp.path());
        let err = resolve_binary(&store, &PlatformDescriptor::WINDOWS, &active("4.0.3928")).unwrap_err();
        assert!(matches!(err, FuncvmError::BinaryNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_forward_returns_exit_code() {
        let code = forward(Path::new("/bin/sh"), &["-c".into(), "exit 3".into()]).unwrap();
        assert_eq!(code, 3);
    }
}
