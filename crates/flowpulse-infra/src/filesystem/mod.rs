//! Data directory layout.

use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "FLOWPULSE_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `FLOWPULSE_DATA_DIR` environment variable
/// 2. `~/.flowpulse`
/// 3. `.flowpulse` in the working directory
pub fn resolve_data_dir() -> PathBuf {
    data_dir_from(std::env::var(DATA_DIR_ENV).ok(), dirs::home_dir())
}

fn data_dir_from(env_value: Option<String>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env_value.filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    match home {
        Some(home) => home.join(".flowpulse"),
        None => PathBuf::from(".flowpulse"),
    }
}

/// `{data_dir}/config.toml`
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Default event storage root: `{data_dir}/events`.
pub fn default_storage_root(data_dir: &Path) -> PathBuf {
    data_dir.join("events")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_value_wins() {
        let dir = data_dir_from(Some("/srv/flowpulse".to_string()), Some(PathBuf::from("/home/u")));
        assert_eq!(dir, PathBuf::from("/srv/flowpulse"));
    }

    #[test]
    fn falls_back_to_home_then_cwd() {
        assert_eq!(
            data_dir_from(None, Some(PathBuf::from("/home/u"))),
            PathBuf::from("/home/u/.flowpulse")
        );
        assert_eq!(
            data_dir_from(Some("  ".to_string()), None),
            PathBuf::from(".flowpulse")
        );
    }

    #[test]
    fn layout_paths() {
        let root = Path::new("/data");
        assert_eq!(config_path(root), PathBuf::from("/data/config.toml"));
        assert_eq!(default_storage_root(root), PathBuf::from("/data/events"));
    }
}
