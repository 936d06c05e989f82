//! On-disk vocabulary of the scene container: chunk tags, fixed offsets and
//! the flag words that decide which optional records are present.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::cursor::Tag;

pub const MAGIC: Tag = Tag::new(b"SCN3");

pub const GLOBAL_INFO_TAG: Tag = Tag::new(b"INFO");
pub const GLOBAL_INFO_END: Tag = Tag::new(b"IEND");
pub const MATERIALS_TAG: Tag = Tag::new(b"MATS");
pub const MATERIALS_END: Tag = Tag::new(b"MEND");
pub const GEOMETRY_TAG: Tag = Tag::new(b"OBJE");
pub const GEOMETRY_END: Tag = Tag::new(b"OEND");
pub const CAMERA_TAG: Tag = Tag::new(b"CAME");
pub const CAMERA_END: Tag = Tag::new(b"CEND");
pub const LIGHT_TAG: Tag = Tag::new(b"LIGH");
pub const LIGHT_END: Tag = Tag::new(b"LEND");
pub const HELPER_TAG: Tag = Tag::new(b"HELP");
pub const HELPER_END: Tag = Tag::new(b"HEND");
pub const EOF_TAG: Tag = Tag::new(b"EOF ");

pub const HEADER_SIZE: usize = 52;

/// Absolute offset of the global-info end tag. The chunk is padded up to it
/// whatever size it declares.
pub const GLOBAL_INFO_END_OFFSET: usize = 128;

pub const TEXTURE_NAME_LEN: usize = 64;

/// Sub-material recursion cap.
pub const MAX_MATERIAL_DEPTH: usize = 16;

pub const MAT4_SIZE: usize = 64;
pub const VEC3_SIZE: usize = 12;
pub const VEC2_SIZE: usize = 8;
pub const FACE_SIZE: usize = 12;

pub const TEXTURE_REF_SIZE: usize = TEXTURE_NAME_LEN + 16;
/// Smallest possible material record: empty name, no textures, no children.
pub const MIN_MATERIAL_SIZE: usize = 1 + 4 + 3 * VEC3_SIZE + 4 + 4 + 4;
/// Smallest possible bone record: empty name, no tracks.
pub const MIN_BONE_SIZE: usize = 1 + 4 + 4 + MAT4_SIZE;
/// Local position, bone index and weight of one vertex influence.
pub const INFLUENCE_SIZE: usize = VEC3_SIZE + 4 + 4;

pub const POSITION_KEY_SIZE: usize = 16;
pub const ROTATION_KEY_SIZE: usize = 20;
pub const SCALE_KEY_SIZE: usize = 32;
pub const CAMERA_KEY_SIZE: usize = 20;
pub const LIGHT_KEY_SIZE: usize = 24;

pub const CAMERA_FREE: u32 = 0;
pub const CAMERA_TARGET: u32 = 1;

pub const LIGHT_POINT: u32 = 0;
pub const LIGHT_SPOT: u32 = 1;
pub const LIGHT_DIRECTIONAL: u32 = 2;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct SceneFlags: u32 {
        const GLOBAL_INFO = 1 << 0;
        const MATERIALS = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct MaterialFlags: u32 {
        const TWO_SIDED = 1 << 0;
        const TEXTURE1 = 1 << 1;
        const TEXTURE2 = 1 << 2;
        const SPHERE_MAP1 = 1 << 3;
        const SPHERE_MAP2 = 1 << 4;
        /// Texture slot 2 holds a bump map.
        const BUMP_MAP = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ObjectFlags: u32 {
        /// A flat wire color replaces the material index.
        const WIRE_COLOR = 1 << 0;
        const POSITION_TRACK = 1 << 1;
        const ROTATION_TRACK = 1 << 2;
        const SCALE_TRACK = 1 << 3;
        const NORMALS = 1 << 4;
        const COLORS = 1 << 5;
        const UV1 = 1 << 6;
        const UV2 = 1 << 7;
        /// Informational only: the bone count is read either way.
        const DEFORMABLE = 1 << 8;
        const HIDDEN = 1 << 9;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct BoneFlags: u32 {
        const POSITION_TRACK = 1 << 0;
        const ROTATION_TRACK = 1 << 1;
        const SCALE_TRACK = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct CameraFlags: u32 {
        const SETTINGS_TRACK = 1 << 0;
        const ORIGIN_POSITION = 1 << 1;
        const ORIGIN_SCALE = 1 << 2;
        const ORIGIN_ROTATION = 1 << 3;
        const TARGET_POSITION = 1 << 4;
        const TARGET_SCALE = 1 << 5;
        const TARGET_ROTATION = 1 << 6;
    }
}

bitflags! {
    /// Shares the track bits of [`CameraFlags`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct LightFlags: u32 {
        const SETTINGS_TRACK = 1 << 0;
        const ORIGIN_POSITION = 1 << 1;
        const ORIGIN_SCALE = 1 << 2;
        const ORIGIN_ROTATION = 1 << 3;
        const TARGET_POSITION = 1 << 4;
        const TARGET_SCALE = 1 << 5;
        const TARGET_ROTATION = 1 << 6;
        const CASTS_SHADOWS = 1 << 7;
        const ATTENUATE = 1 << 8;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct HelperFlags: u32 {
        const POSITION_TRACK = 1 << 0;
        const ROTATION_TRACK = 1 << 1;
        const SCALE_TRACK = 1 << 2;
    }
}

/// Which of the three transform tracks a flag word announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackPresence {
    pub position: bool,
    pub scale: bool,
    pub rotation: bool,
}

impl ObjectFlags {
    pub fn tracks(self) -> TrackPresence {
        TrackPresence {
            position: self.contains(Self::POSITION_TRACK),
            scale: self.contains(Self::SCALE_TRACK),
            rotation: self.contains(Self::ROTATION_TRACK),
        }
    }
}

impl BoneFlags {
    pub fn tracks(self) -> TrackPresence {
        TrackPresence {
            position: self.contains(Self::POSITION_TRACK),
            scale: self.contains(Self::SCALE_TRACK),
            rotation: self.contains(Self::ROTATION_TRACK),
        }
    }
}

impl HelperFlags {
    pub fn tracks(self) -> TrackPresence {
        TrackPresence {
            position: self.contains(Self::POSITION_TRACK),
            scale: self.contains(Self::SCALE_TRACK),
            rotation: self.contains(Self::ROTATION_TRACK),
        }
    }
}

impl CameraFlags {
    pub fn origin_tracks(self) -> TrackPresence {
        TrackPresence {
            position: self.contains(Self::ORIGIN_POSITION),
            scale: self.contains(Self::ORIGIN_SCALE),
            rotation: self.contains(Self::ORIGIN_ROTATION),
        }
    }

    pub fn target_tracks(self) -> TrackPresence {
        TrackPresence {
            position: self.contains(Self::TARGET_POSITION),
            scale: self.contains(Self::TARGET_SCALE),
            rotation: self.contains(Self::TARGET_ROTATION),
        }
    }
}

impl LightFlags {
    pub fn origin_tracks(self) -> TrackPresence {
        CameraFlags::from_bits_retain(self.bits()).origin_tracks()
    }

    pub fn target_tracks(self) -> TrackPresence {
        CameraFlags::from_bits_retain(self.bits()).target_tracks()
    }
}
