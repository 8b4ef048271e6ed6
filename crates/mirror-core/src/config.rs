use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How each frame of the main display is sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// Every visual layer, status bar and system overlays included
    #[default]
    FullScreen,
    /// Composite of the application's own windows on the main display
    Window,
}

/// Where the capture cadence runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CadencePolicy {
    /// Dedicated capture thread handing frames to the UI context
    #[default]
    BackgroundThread,
    /// Recurring timer on the UI context itself
    UiTimer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Capture cadence in frames per second
    #[serde(default = "default_fps")]
    pub fps: u16,

    #[serde(default)]
    pub capture_mode: CaptureMode,

    #[serde(default)]
    pub cadence: CadencePolicy,

    /// Shrink output into the TV-safe area instead of zooming past the edges
    #[serde(default)]
    pub safe_mode: bool,

    /// Start mirroring when a display is connected or changes mode
    #[serde(default = "default_auto_start")]
    pub auto_start_on_connect: bool,

    /// How long `stop` waits for the capture thread to exit
    #[serde(default = "default_join_timeout")]
    pub worker_join_timeout_ms: u64,

    /// RGBA fill behind the mirror rectangle
    #[serde(default = "default_background")]
    pub background: [u8; 4],
}

fn default_fps() -> u16 {
    15
}
fn default_auto_start() -> bool {
    true
}
fn default_join_timeout() -> u64 {
    500
}
fn default_background() -> [u8; 4] {
    [85, 85, 85, 255]
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            capture_mode: CaptureMode::default(),
            cadence: CadencePolicy::default(),
            safe_mode: false,
            auto_start_on_connect: default_auto_start(),
            worker_join_timeout_ms: default_join_timeout(),
            background: default_background(),
        }
    }
}

impl MirrorConfig {
    /// Default config file path for this platform
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "display-mirror", "mirror") {
            dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("mirror-config.json")
        }
    }

    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    /// Save config to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create config dir {}", parent.display()))?;
            }
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Time between capture ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.fps.max(1) as u64)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_join_timeout_ms)
    }
}
