use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("deltat")
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", "deltat") {
            proj_dirs.data_local_dir().to_path_buf()
        } else {
            PathBuf::from(".")
        }
    }

    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "deltat") {
            proj_dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("deltat_config.json")
        }
    }

    pub fn stats_path() -> PathBuf {
        Self::state_dir().join("stats.json")
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir().join("events.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_files_share_a_directory() {
        let stats = AppDirs::stats_path();
        let log = AppDirs::log_path();
        assert_eq!(stats.parent(), log.parent());
        assert!(stats.ends_with("stats.json"));
        assert!(log.ends_with("events.log"));
    }

    #[test]
    fn config_is_json() {
        assert!(AppDirs::config_path().ends_with("config.json"));
    }
}
