use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geometry::{Color, SurfaceSize};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::render::scheduler::{RenderDelays, DEFAULT_CONTINUOUS_DELAY, DEFAULT_STRUCTURAL_DELAY};
use crate::render::{Compositor, DEFAULT_BACKGROUND, DEFAULT_FALLBACK_SIZE};
use crate::storage::DEFAULT_QUOTA_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPathError {
    MissingHomeDirectory,
}

pub(crate) const APP_DIR: &str = "memeforge";
const APP_CONFIG_FILE: &str = "config.json";

/// Engine settings from `config.json`; every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub load_timeout_ms: u64,
    pub structural_render_delay_ms: u64,
    pub continuous_render_delay_ms: u64,
    pub history_limit: usize,
    pub storage_quota_bytes: u64,
    pub fallback_width: u32,
    pub fallback_height: u32,
    pub background: Color,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 10_000,
            structural_render_delay_ms: DEFAULT_STRUCTURAL_DELAY.as_millis() as u64,
            continuous_render_delay_ms: DEFAULT_CONTINUOUS_DELAY.as_millis() as u64,
            history_limit: DEFAULT_HISTORY_LIMIT,
            storage_quota_bytes: DEFAULT_QUOTA_BYTES,
            fallback_width: DEFAULT_FALLBACK_SIZE.width,
            fallback_height: DEFAULT_FALLBACK_SIZE.height,
            background: DEFAULT_BACKGROUND,
        }
    }
}

impl EngineConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn render_delays(&self) -> RenderDelays {
        RenderDelays {
            structural: Duration::from_millis(self.structural_render_delay_ms),
            continuous: Duration::from_millis(self.continuous_render_delay_ms),
        }
    }

    pub fn fallback_size(&self) -> SurfaceSize {
        SurfaceSize::new(self.fallback_width.max(1), self.fallback_height.max(1))
    }

    pub fn compositor(&self) -> Compositor {
        Compositor::new(self.background, self.fallback_size())
    }
}

pub fn load_engine_config() -> EngineConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_engine_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_engine_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> EngineConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return EngineConfig::default(),
    };
    if !path.exists() {
        return EngineConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            EngineConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            EngineConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn data_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = xdg_root(xdg_config_home, home, ".config")?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

pub(crate) fn app_data_path(
    app_dir: &str,
    file_name: &str,
    xdg_data_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = xdg_root(xdg_data_home, home, ".local/share")?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn xdg_root(
    xdg_dir: Option<&Path>,
    home: Option<&Path>,
    home_fallback: &str,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_dir.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(home_fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_config_path_prefers_xdg_config_home() {
        let path = app_config_path(
            "memeforge",
            "config.json",
            Some(Path::new("/tmp/config-root")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(
            path,
            PathBuf::from("/tmp/config-root/memeforge/config.json")
        );
    }

    #[test]
    fn app_config_path_falls_back_to_home_dot_config() {
        let path = app_config_path("memeforge", "config.json", None, Some(Path::new("/tmp/home")))
            .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/home/.config/memeforge/config.json"));
    }

    #[test]
    fn app_data_path_falls_back_to_local_share() {
        let path = app_data_path(
            "memeforge",
            "projects.json",
            Some(Path::new("")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(
            path,
            PathBuf::from("/tmp/home/.local/share/memeforge/projects.json")
        );
    }

    #[test]
    fn app_config_path_errors_when_home_missing_and_xdg_unset() {
        let error = app_config_path("memeforge", "config.json", None, None).unwrap_err();
        assert_eq!(error, ConfigPathError::MissingHomeDirectory);
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let root = std::env::temp_dir().join(format!("memeforge-config-{}", std::process::id()));
        let dir = root.join("memeforge");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.json"),
            r##"{"load_timeout_ms": 2500, "background": "#101010"}"##,
        )
        .unwrap();

        let config = load_engine_config_with(Some(&root), None);
        assert_eq!(config.load_timeout(), Duration::from_millis(2500));
        assert_eq!(config.background, Color::new(0x10, 0x10, 0x10));
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.render_delays(), RenderDelays::default());
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let root =
            std::env::temp_dir().join(format!("memeforge-config-bad-{}", std::process::id()));
        let dir = root.join("memeforge");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.json"), "{ nope").unwrap();

        assert_eq!(load_engine_config_with(Some(&root), None), EngineConfig::default());
        let _ = std::fs::remove_dir_all(root);
    }
}
