//! Per-frame evaluation of decoded scene nodes: composed transforms, camera
//! and light state, bone hierarchies and skinned vertex positions.

use glam::{Mat4, Quat, Vec3};
use serde::Serialize;

use super::{Camera, CameraKind, GeometryObject, Helper, Light, LightKind};
use crate::transform::{
    compose_transform, interpolate_camera_settings, interpolate_light_settings, CameraSettings,
    LightSettings,
};

/// Camera placement resolved for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraState {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub settings: CameraSettings,
    pub view: Mat4,
}

impl CameraState {
    /// Right-handed perspective projection for a viewport of the given aspect.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.settings.fov,
            aspect,
            self.settings.near,
            self.settings.far,
        )
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LightState {
    pub kind: LightKind,
    pub position: Vec3,
    /// `None` for point lights.
    pub direction: Option<Vec3>,
    pub settings: LightSettings,
}

impl Camera {
    pub fn evaluate(&self, frame: f32) -> CameraState {
        let origin = compose_transform(frame, &self.origin_tracks, self.origin);
        let eye = origin.w_axis.truncate();

        let target = match (self.kind, self.target) {
            (CameraKind::Target, Some(target)) => {
                compose_transform(frame, &self.target_tracks, target)
                    .w_axis
                    .truncate()
            }
            _ => eye + origin.transform_vector3(Vec3::NEG_Z),
        };

        let settings = match &self.settings_track {
            Some(track) => interpolate_camera_settings(track, frame, self.settings),
            None => self.settings,
        };

        let mut forward = (target - eye).normalize_or_zero();
        if forward == Vec3::ZERO {
            forward = Vec3::NEG_Z;
        }

        let mut up = Quat::from_axis_angle(forward, settings.roll) * Vec3::Y;
        if up.cross(forward).length_squared() < 1e-8 {
            up = Quat::from_axis_angle(forward, settings.roll) * Vec3::Z;
        }

        CameraState {
            eye,
            target,
            up,
            settings,
            view: Mat4::look_at_rh(eye, eye + forward, up),
        }
    }
}

impl Light {
    pub fn evaluate(&self, frame: f32) -> LightState {
        let origin = compose_transform(frame, &self.origin_tracks, self.origin);
        let position = origin.w_axis.truncate();

        let direction = match (self.kind, self.target) {
            (LightKind::Point, _) => None,
            (_, Some(target)) => {
                let aim = compose_transform(frame, &self.target_tracks, target)
                    .w_axis
                    .truncate();
                Some((aim - position).normalize_or_zero())
            }
            (_, None) => Some(origin.transform_vector3(Vec3::NEG_Z).normalize_or_zero()),
        };

        let settings = match &self.settings_track {
            Some(track) => interpolate_light_settings(track, frame, self.settings),
            None => self.settings,
        };

        LightState {
            kind: self.kind,
            position,
            direction,
            settings,
        }
    }
}

impl Helper {
    pub fn world_transform(&self, frame: f32) -> Mat4 {
        compose_transform(frame, &self.tracks, self.transform)
    }
}

impl GeometryObject {
    pub fn world_transform(&self, frame: f32) -> Mat4 {
        compose_transform(frame, &self.tracks, self.transform)
    }

    /// World transform of every bone, parents applied before children.
    ///
    /// Bones are stored parents-first, so one forward pass suffices. A parent
    /// index that does not precede the bone is treated as a root.
    pub fn bone_world_transforms(&self, frame: f32) -> Vec<Mat4> {
        let mut worlds: Vec<Mat4> = Vec::with_capacity(self.bones.len());
        for (index, bone) in self.bones.iter().enumerate() {
            let local = compose_transform(frame, &bone.tracks, bone.transform);
            let world = match bone.parent {
                Some(parent) if parent < index => worlds[parent] * local,
                _ => local,
            };
            worlds.push(world);
        }
        worlds
    }

    /// Skinned vertex positions at `frame`.
    ///
    /// Each linked vertex becomes the weighted sum of its bone-local positions
    /// carried through the bone world transforms. Unlinked vertices keep the
    /// bind position.
    pub fn deform(&self, frame: f32) -> Vec<Vec3> {
        if self.bones.is_empty() {
            return self.positions.clone();
        }

        let worlds = self.bone_world_transforms(frame);
        self.positions
            .iter()
            .enumerate()
            .map(|(index, &bind)| {
                let Some(link) = self.links.get(index) else {
                    return bind;
                };
                if link.influences.is_empty() {
                    return bind;
                }
                link.influences
                    .iter()
                    .filter_map(|influence| {
                        worlds
                            .get(influence.bone)
                            .map(|world| world.transform_point3(influence.local) * influence.weight)
                    })
                    .sum()
            })
            .collect()
    }
}
