//! Core library for replaying binary demo scenes.
//!
//! The crate decodes the chunked scene container into an owned scene graph,
//! evaluates keyframed transforms for any frame, and drives a priority
//! ordered timeline of effects against a playback clock. Rendering and audio
//! live outside this crate; effects receive only times and the active camera.

pub mod clock;
pub mod config;
pub mod cursor;
pub mod error;
pub mod scene;
pub mod timeline;
pub mod transform;

pub use clock::{scene_frame, FrameStepper, PlaybackClock};
pub use config::{AppConfig, EffectConfig, EntryConfig, PlaybackConfig, RetimeConfig};
pub use cursor::{BinaryCursor, CursorError, Tag};
pub use error::{DecodeError, DecodeErrorKind, DemoError, Result};
pub use scene::{decode, load_scene, CameraState, LightState, Scene};
pub use timeline::{Effect, EntryId, FrameContext, FrameReport, Timeline, TimelineEntry};
pub use transform::{compose_transform, KeyframeTrack, TrackSet};
