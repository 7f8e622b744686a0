use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use cookbook_core::remote::RemoteConfig;
use directories::ProjectDirs;
use tracing::{debug, warn};

pub const REMOTE_URL_VAR: &str = "COOKBOOK_REMOTE_URL";
pub const REMOTE_KEY_VAR: &str = "COOKBOOK_REMOTE_KEY";

pub struct Config {
    pub cache_path: PathBuf,
    pub remote: Option<RemoteConfig>,
}

impl Config {
    pub fn load(cache_override: Option<PathBuf>, local_only: bool) -> Result<Self> {
        let cache_path = match cache_override {
            Some(path) => path,
            None => {
                let proj_dirs = ProjectDirs::from("", "", "cookbook")
                    .context("Could not determine home directory")?;
                proj_dirs.data_dir().join("cookbook.db")
            }
        };

        let remote = if local_only {
            debug!("--local-only given, remote store disabled");
            None
        } else {
            remote_from(var(REMOTE_URL_VAR).as_deref(), var(REMOTE_KEY_VAR).as_deref())
        };

        Ok(Config { cache_path, remote })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the remote endpoint, falling back to local-only mode with a
/// warning when the settings are missing or unusable.
fn remote_from(url: Option<&str>, api_key: Option<&str>) -> Option<RemoteConfig> {
    match (url, api_key) {
        (None, None) => {
            warn!("{REMOTE_URL_VAR} and {REMOTE_KEY_VAR} not set, running in local-only mode");
            None
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!(
                "Only one of {REMOTE_URL_VAR} and {REMOTE_KEY_VAR} is set, running in local-only mode"
            );
            None
        }
        (Some(url), Some(key)) => {
            let config = RemoteConfig::new(Some(url), Some(key));
            if config.is_none() {
                warn!("{REMOTE_URL_VAR} must be an https:// URL, running in local-only mode");
            }
            config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_from_complete() {
        let config = remote_from(Some("https://abc.example.co/"), Some("anon")).unwrap();
        assert_eq!(config.base_url(), "https://abc.example.co");
        assert_eq!(config.api_key(), "anon");
    }

    #[test]
    fn test_remote_from_incomplete_is_local_only() {
        assert!(remote_from(None, None).is_none());
        assert!(remote_from(Some("https://abc.example.co"), None).is_none());
        assert!(remote_from(None, Some("anon")).is_none());
        assert!(remote_from(Some("ftp://abc.example.co"), Some("anon")).is_none());
    }

    #[test]
    fn test_load_with_override_and_local_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.db");
        let config = Config::load(Some(path.clone()), true).unwrap();
        assert_eq!(config.cache_path, path);
        assert!(config.remote.is_none());
    }
}
