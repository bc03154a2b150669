use std::path::PathBuf;
use std::fs;
use crate::common::config::DEFAULT_CONFIG_PATH;
use crate::common::error::Result;
use crate::common::paths;

/// Switches between the system layout and a development layout: data and
/// models under `./dev_data`, the socket at `/tmp/faceverify.sock`.
#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from("./dev_data"))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        if enabled {
            fs::create_dir_all(&base_dir)?;
            fs::create_dir_all(base_dir.join("users"))?;
            fs::create_dir_all(base_dir.join("models"))?;

            tracing::info!("Development mode enabled - data will be saved to: {}", base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn data_dir(&self) -> PathBuf {
        if self.enabled {
            self.base_dir.join("users")
        } else {
            paths::system_user_data_dir()
        }
    }

    pub fn models_dir(&self) -> PathBuf {
        if self.enabled {
            self.base_dir.join("models")
        } else {
            paths::system_models_dir()
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        if self.enabled {
            PathBuf::from("/tmp/faceverify.sock")
        } else {
            paths::system_socket_path()
        }
    }

    pub fn config_path(&self) -> PathBuf {
        if self.enabled {
            PathBuf::from(DEFAULT_CONFIG_PATH)
        } else {
            paths::system_config_file()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn dev_mode_keeps_data_under_base_dir_and_socket_in_tmp() {
        let tmp = TempDir::new().unwrap();
        let dev = DevMode::with_base_dir(true, tmp.path().to_path_buf()).unwrap();
        assert!(dev.data_dir().starts_with(tmp.path()));
        assert!(dev.data_dir().is_dir());
        assert!(dev.models_dir().is_dir());
        assert_eq!(dev.socket_path(), PathBuf::from("/tmp/faceverify.sock"));
        assert_eq!(dev.config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn system_mode_uses_system_paths() {
        let dev = DevMode::new(false).unwrap();
        assert_eq!(dev.data_dir(), paths::system_user_data_dir());
        assert_eq!(dev.socket_path(), paths::system_socket_path());
        assert_eq!(dev.config_path(), paths::system_config_file());
    }
}
