use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// What `func` on PATH turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathProbe {
    /// Nothing named `func` is on PATH
    Absent,
    /// The funcvm shim answers `--is-funcvm`
    Shim(PathBuf),
    /// Some other installation of Core Tools
    Foreign(PathBuf),
}

/// Whether a `func --is-funcvm` stdout identifies the shim.
pub fn is_shim_response(stdout: &str) -> bool {
    stdout.trim() == "yes"
}

/// Look for `func` on PATH and ask it whether it is the funcvm shim.
/// Failures to run it are treated as "not the shim".
pub fn probe_path() -> PathProbe {
    let Ok(path) = which::which("func") else {
        return PathProbe::Absent;
    };

    let answered_yes = match Command::new(&path).arg("--is-funcvm").output() {
        Ok(output) => is_shim_response(&String::from_utf8_lossy(&output.stdout)),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not run func");
            false
        }
    };

    if answered_yes {
        PathProbe::Shim(path)
    } else {
        PathProbe::Foreign(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shim_response() {
        assert!(is_shim_response("yes\n"));
        assert!(is_shim_response("  yes"));
        assert!(!is_shim_response("4.0.3928"));
        assert!(!is_shim_response(""));
    }
}
