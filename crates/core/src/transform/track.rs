use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// One timed sample of an animated quantity. Times are scene frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// Samples ordered by time and assumed to be equally spaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframeTrack<T> {
    pub keys: Vec<Keyframe<T>>,
}

impl<T> Default for KeyframeTrack<T> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

impl<T> KeyframeTrack<T> {
    pub fn new(keys: Vec<Keyframe<T>>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Tracks with fewer than two samples are constant (or default) over time.
    pub fn is_degenerate(&self) -> bool {
        self.keys.len() < 2
    }

    pub fn start_time(&self) -> Option<f32> {
        self.keys.first().map(|key| key.time)
    }

    pub fn end_time(&self) -> Option<f32> {
        self.keys.last().map(|key| key.time)
    }
}

impl<T> FromIterator<(f32, T)> for KeyframeTrack<T> {
    fn from_iter<I: IntoIterator<Item = (f32, T)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(time, value)| Keyframe::new(time, value))
                .collect(),
        )
    }
}

/// Scale along axes rotated by `axis`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleKey {
    pub scale: Vec3,
    pub axis: Quat,
}

impl ScaleKey {
    pub const IDENTITY: Self = Self {
        scale: Vec3::ONE,
        axis: Quat::IDENTITY,
    };
}

impl Default for ScaleKey {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Lens parameters animated by a camera settings track. Angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub fov: f32,
    pub roll: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov: std::f32::consts::FRAC_PI_4,
            roll: 0.0,
            near: 1.0,
            far: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSettings {
    pub color: Vec3,
    pub intensity: f32,
    pub falloff: f32,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            falloff: 0.0,
        }
    }
}

pub type PositionTrack = KeyframeTrack<Vec3>;
pub type RotationTrack = KeyframeTrack<Quat>;
pub type ScaleTrack = KeyframeTrack<ScaleKey>;
pub type CameraSettingsTrack = KeyframeTrack<CameraSettings>;
pub type LightSettingsTrack = KeyframeTrack<LightSettings>;

/// Animated tracks that may drive one transform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSet {
    pub position: Option<PositionTrack>,
    pub scale: Option<ScaleTrack>,
    pub rotation: Option<RotationTrack>,
}

impl TrackSet {
    pub fn is_static(&self) -> bool {
        self.position.is_none() && self.scale.is_none() && self.rotation.is_none()
    }

    pub fn track_count(&self) -> usize {
        usize::from(self.position.is_some())
            + usize::from(self.scale.is_some())
            + usize::from(self.rotation.is_some())
    }
}
