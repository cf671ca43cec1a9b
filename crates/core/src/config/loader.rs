//! Config path resolution
//!
//! The library is injected into an arbitrary host, so paths are anchored on
//! the host executable rather than the working directory.

use std::path::{Path, PathBuf};

use super::{ConfigError, ConfigResult};

/// Directory name created next to the host executable
pub const BASE_DIR_NAME: &str = "camhook";

/// Config file name inside [`camhook_base_dir`]
pub const CORE_CONFIG_FILE: &str = "config.toml";

/// Returns `<host exe dir>/camhook/`
pub fn camhook_base_dir() -> ConfigResult<PathBuf> {
    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;
    base_dir_for(&exe)
}

/// Returns `<host exe dir>/camhook/config.toml`
pub fn core_config_path() -> ConfigResult<PathBuf> {
    Ok(camhook_base_dir()?.join(CORE_CONFIG_FILE))
}

fn base_dir_for(exe: &Path) -> ConfigResult<PathBuf> {
    exe.parent()
        .map(|dir| dir.join(BASE_DIR_NAME))
        .ok_or(ConfigError::NoConfigDirectory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_dir_next_to_exe() {
        let exe = PathBuf::from("/games/host/bin/host.exe");
        let base = base_dir_for(&exe).unwrap();
        assert_eq!(base, PathBuf::from("/games/host/bin/camhook"));
        assert!(base.join(CORE_CONFIG_FILE).ends_with("camhook/config.toml"));
    }

    #[test]
    fn test_exe_without_parent() {
        assert!(matches!(
            base_dir_for(Path::new("")),
            Err(ConfigError::NoConfigDirectory)
        ));
    }

    #[test]
    fn test_core_config_path_resolves() {
        // The test runner itself stands in for the host
        let path = core_config_path().unwrap();
        assert!(path.ends_with("camhook/config.toml"));
    }
}
