//! Little-endian writer for hand-built scene buffers used by tests.

use glam::{Mat4, Quat, Vec3};

use super::format::*;
use super::SceneCounts;
use crate::cursor::Tag;

#[derive(Debug, Default, Clone)]
pub(crate) struct ByteWriter {
    pub bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn tag(&mut self, tag: Tag) -> &mut Self {
        self.bytes.extend_from_slice(tag.as_bytes());
        self
    }

    pub fn cstr(&mut self, text: &str) -> &mut Self {
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0);
        self
    }

    pub fn fixed_str(&mut self, text: &str, len: usize) -> &mut Self {
        let mut window = vec![0u8; len];
        window[..text.len()].copy_from_slice(text.as_bytes());
        self.bytes.extend_from_slice(&window);
        self
    }

    pub fn vec3(&mut self, value: Vec3) -> &mut Self {
        self.f32(value.x).f32(value.y).f32(value.z)
    }

    pub fn quat(&mut self, value: Quat) -> &mut Self {
        self.f32(value.x).f32(value.y).f32(value.z).f32(value.w)
    }

    pub fn mat4(&mut self, value: Mat4) -> &mut Self {
        for v in value.to_cols_array() {
            self.f32(v);
        }
        self
    }

    /// Pads with `fill` up to an absolute offset.
    pub fn pad_to(&mut self, offset: usize, fill: u8) -> &mut Self {
        while self.bytes.len() < offset {
            self.bytes.push(fill);
        }
        self
    }

    pub fn header(&mut self, flags: SceneFlags, counts: SceneCounts) -> &mut Self {
        self.tag(MAGIC)
            .u32(flags.bits())
            .u32(counts.position_tracks)
            .u32(counts.rotation_tracks)
            .u32(counts.scale_tracks)
            .u32(counts.camera_settings_tracks)
            .u32(counts.light_settings_tracks)
            .u32(counts.objects)
            .u32(counts.cameras)
            .u32(counts.lights)
            .u32(counts.helpers)
            .u32(0)
            .u32(100)
    }

    pub fn position_track(&mut self, keys: &[(f32, Vec3)]) -> &mut Self {
        self.u32(keys.len() as u32);
        for &(time, value) in keys {
            self.f32(time).vec3(value);
        }
        self
    }

    pub fn rotation_track(&mut self, keys: &[(f32, Quat)]) -> &mut Self {
        self.u32(keys.len() as u32);
        for &(time, value) in keys {
            self.f32(time).quat(value);
        }
        self
    }

    pub fn scale_track(&mut self, keys: &[(f32, Vec3, Quat)]) -> &mut Self {
        self.u32(keys.len() as u32);
        for &(time, scale, axis) in keys {
            self.f32(time).vec3(scale).quat(axis);
        }
        self
    }

    /// Wire-colored single triangle, identity transform, no tracks, no bones.
    pub fn triangle_object(&mut self, name: &str) -> &mut Self {
        self.tag(GEOMETRY_TAG)
            .cstr(name)
            .cstr("")
            .u32(ObjectFlags::WIRE_COLOR.bits())
            .vec3(Vec3::new(1.0, 0.0, 0.0))
            .mat4(Mat4::IDENTITY)
            .u32(3)
            .u32(1)
            .vec3(Vec3::ZERO)
            .vec3(Vec3::X)
            .vec3(Vec3::Y)
            .u32(0)
            .u32(1)
            .u32(2)
            .u8(1)
            .u8(1)
            .u8(0)
            .u32(0)
            .tag(GEOMETRY_END)
    }

    pub fn finish(&mut self) -> Vec<u8> {
        self.tag(EOF_TAG);
        std::mem::take(&mut self.bytes)
    }
}

/// Header with no optional chunks followed directly by the end tag.
pub(crate) fn empty_scene() -> Vec<u8> {
    ByteWriter::new()
        .header(SceneFlags::empty(), SceneCounts::default())
        .finish()
}
