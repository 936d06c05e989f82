use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration for a replay: playback timing plus the timeline
/// productions to register against the scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub playback: PlaybackConfig,
    pub timeline: Vec<EntryConfig>,
    /// Applied after every entry is registered.
    pub retime: Vec<RetimeConfig>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(
            ?path,
            entries = config.timeline.len(),
            patches = config.retime.len(),
            "loaded config"
        );
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Keyframe rate of the scene's tracks.
    pub frames_per_second: f32,
    /// Rate at which the timeline is driven.
    pub render_fps: u32,
    pub start_ms: i64,
    /// Defaults to the end of the last timeline entry.
    pub end_ms: Option<i64>,
    pub soundtrack_length_ms: Option<i64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 30.0,
            render_fps: 60,
            start_ms: 0,
            end_ms: None,
            soundtrack_length_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryConfig {
    pub name: String,
    pub start_ms: i64,
    pub end_ms: i64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub effect: EffectConfig,
}

fn enabled_by_default() -> bool {
    true
}

/// Effect bound to a timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectConfig {
    /// Publishes a scene camera as the active camera.
    SceneCamera { camera: String },
    /// Follows a geometry object and reports its placement.
    ObjectTracker {
        object: String,
        #[serde(default)]
        skinned: bool,
    },
    /// Reports a light's evaluated state.
    LightMonitor { light: String },
    /// Reports helper placement, typically emitter anchors.
    HelperMonitor { helper: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetimeConfig {
    pub name: String,
    pub start_ms: i64,
    pub end_ms: i64,
    #[serde(default)]
    pub priority: i32,
}
