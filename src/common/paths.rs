use std::path::PathBuf;

pub fn system_user_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/faceverify/users")
}

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/faceverify/faceverify.toml")
}

pub fn system_models_dir() -> PathBuf {
    PathBuf::from("/usr/share/faceverify/models")
}

pub fn system_socket_path() -> PathBuf {
    PathBuf::from("/run/faceverify/service.sock")
}

/// Resolves a model path from the config; relative paths live under the models dir.
pub fn resolve_model_path(path: &std::path::Path, models_base: &std::path::Path) -> PathBuf {
    if path.is_relative() {
        models_base.join(path)
    } else {
        path.to_path_buf()
    }
}
