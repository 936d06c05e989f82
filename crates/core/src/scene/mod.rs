//! Typed scene graph decoded from the binary scene container.

mod decode;
mod eval;
pub mod format;
#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;
use std::path::Path;

use glam::{Mat4, Vec2, Vec3};
use serde::Serialize;

use crate::cursor::Tag;
use crate::transform::{
    CameraSettings, CameraSettingsTrack, LightSettings, LightSettingsTrack, TrackSet,
};
use crate::Result;

pub use decode::decode;
pub use eval::{CameraState, LightState};
pub use format::{
    BoneFlags, CameraFlags, HelperFlags, LightFlags, MaterialFlags, ObjectFlags, SceneFlags,
};

/// Reads a scene file from disk and decodes it.
pub fn load_scene(path: impl AsRef<Path>) -> Result<Scene> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    tracing::debug!(?path, len = bytes.len(), "loaded scene file");
    Ok(decode(&bytes)?)
}

/// Root of a decoded scene. Built in one pass and never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub header: SceneHeader,
    pub global: Option<GlobalInfo>,
    pub materials: Vec<Material>,
    pub objects: Vec<GeometryObject>,
    pub cameras: Vec<Camera>,
    pub lights: Vec<Light>,
    pub helpers: Vec<Helper>,
    /// Recoverable inconsistencies noticed while decoding.
    pub diagnostics: Vec<Diagnostic>,
}

impl Scene {
    pub fn find_object(&self, name: &str) -> Option<&GeometryObject> {
        self.objects.iter().find(|object| object.name == name)
    }

    pub fn find_camera(&self, name: &str) -> Option<&Camera> {
        self.cameras.iter().find(|camera| camera.name == name)
    }

    pub fn find_light(&self, name: &str) -> Option<&Light> {
        self.lights.iter().find(|light| light.name == name)
    }

    pub fn find_helper(&self, name: &str) -> Option<&Helper> {
        self.helpers.iter().find(|helper| helper.name == name)
    }

    pub fn material(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    /// Counts of everything actually present, in the header's terms.
    pub fn counts(&self) -> SceneCounts {
        let mut counts = SceneCounts {
            objects: self.objects.len() as u32,
            cameras: self.cameras.len() as u32,
            lights: self.lights.len() as u32,
            helpers: self.helpers.len() as u32,
            ..Default::default()
        };

        for object in &self.objects {
            counts.add_tracks(&object.tracks);
            for bone in &object.bones {
                counts.add_tracks(&bone.tracks);
            }
        }
        for camera in &self.cameras {
            counts.add_tracks(&camera.origin_tracks);
            counts.add_tracks(&camera.target_tracks);
            counts.camera_settings_tracks += u32::from(camera.settings_track.is_some());
        }
        for light in &self.lights {
            counts.add_tracks(&light.origin_tracks);
            counts.add_tracks(&light.target_tracks);
            counts.light_settings_tracks += u32::from(light.settings_track.is_some());
        }
        for helper in &self.helpers {
            counts.add_tracks(&helper.tracks);
        }

        counts
    }

    /// Frame range the scene was authored for.
    pub fn frame_range(&self) -> (u32, u32) {
        (self.header.first_frame, self.header.last_frame)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneHeader {
    pub magic: Tag,
    pub flags: SceneFlags,
    pub declared: SceneCounts,
    pub first_frame: u32,
    pub last_frame: u32,
}

/// Per-kind counts, either as declared by the header or as decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SceneCounts {
    pub position_tracks: u32,
    pub rotation_tracks: u32,
    pub scale_tracks: u32,
    pub camera_settings_tracks: u32,
    pub light_settings_tracks: u32,
    pub objects: u32,
    pub cameras: u32,
    pub lights: u32,
    pub helpers: u32,
}

impl SceneCounts {
    fn add_tracks(&mut self, tracks: &TrackSet) {
        self.position_tracks += u32::from(tracks.position.is_some());
        self.rotation_tracks += u32::from(tracks.rotation.is_some());
        self.scale_tracks += u32::from(tracks.scale.is_some());
    }

    /// `(label, declared, decoded)` for every field that disagrees.
    pub fn mismatches(&self, decoded: &SceneCounts) -> Vec<(&'static str, u32, u32)> {
        [
            ("position tracks", self.position_tracks, decoded.position_tracks),
            ("rotation tracks", self.rotation_tracks, decoded.rotation_tracks),
            ("scale tracks", self.scale_tracks, decoded.scale_tracks),
            (
                "camera settings tracks",
                self.camera_settings_tracks,
                decoded.camera_settings_tracks,
            ),
            (
                "light settings tracks",
                self.light_settings_tracks,
                decoded.light_settings_tracks,
            ),
            ("objects", self.objects, decoded.objects),
            ("cameras", self.cameras, decoded.cameras),
            ("lights", self.lights, decoded.lights),
            ("helpers", self.helpers, decoded.helpers),
        ]
        .into_iter()
        .filter(|(_, declared, decoded)| declared != decoded)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalInfo {
    /// Size the chunk claims for itself. Never used to locate the end tag.
    pub declared_size: u32,
    pub background: Vec3,
    pub ambient: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextureRef {
    pub file: String,
    pub u_scale: f32,
    pub v_scale: f32,
    pub u_offset: f32,
    pub v_offset: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub name: String,
    pub flags: MaterialFlags,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub opacity: f32,
    pub texture1: Option<TextureRef>,
    pub texture2: Option<TextureRef>,
    pub sub_materials: Vec<Material>,
}

impl Material {
    pub fn is_two_sided(&self) -> bool {
        self.flags.contains(MaterialFlags::TWO_SIDED)
    }

    pub fn is_bump_mapped(&self) -> bool {
        self.flags.contains(MaterialFlags::BUMP_MAP)
    }

    /// Whether texture slot `slot` (1 or 2) is sampled as a sphere map.
    pub fn is_sphere_mapped(&self, slot: u8) -> bool {
        match slot {
            1 => self.flags.contains(MaterialFlags::SPHERE_MAP1),
            2 => self.flags.contains(MaterialFlags::SPHERE_MAP2),
            _ => false,
        }
    }

    /// Depth-first walk over this material and all nested sub-materials.
    pub fn walk(&self) -> impl Iterator<Item = &Material> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.sub_materials.iter().rev());
            Some(next)
        })
    }
}

/// How a geometry object is shaded: by material or by a flat wire color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Surface {
    Material(Option<usize>),
    Wire(Vec3),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Influence {
    pub bone: usize,
    /// Vertex position in the bone's local space.
    pub local: Vec3,
    pub weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VertexLink {
    pub influences: Vec<Influence>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub name: String,
    pub flags: BoneFlags,
    /// Always an earlier bone of the same object.
    pub parent: Option<usize>,
    pub transform: Mat4,
    pub tracks: TrackSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryObject {
    pub name: String,
    pub properties: String,
    pub flags: ObjectFlags,
    pub surface: Surface,
    pub transform: Mat4,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    pub uv1: Vec<Vec2>,
    pub uv2: Vec<Vec2>,
    pub faces: Vec<[u32; 3]>,
    /// One byte per triangle edge, three per face.
    pub edge_visibility: Vec<u8>,
    pub tracks: TrackSet,
    pub bones: Vec<Bone>,
    /// One record per vertex when `bones` is non-empty, otherwise empty.
    pub links: Vec<VertexLink>,
}

impl GeometryObject {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.contains(ObjectFlags::HIDDEN)
    }

    pub fn is_skinned(&self) -> bool {
        !self.bones.is_empty()
    }

    pub fn material_index(&self) -> Option<usize> {
        match self.surface {
            Surface::Material(index) => index,
            Surface::Wire(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CameraKind {
    Free,
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Camera {
    pub name: String,
    pub kind: CameraKind,
    pub flags: CameraFlags,
    pub origin: Mat4,
    /// Present only for [`CameraKind::Target`].
    pub target: Option<Mat4>,
    /// Static lens values, also the fallback for an absent settings track.
    pub settings: CameraSettings,
    pub settings_track: Option<CameraSettingsTrack>,
    pub origin_tracks: TrackSet,
    pub target_tracks: TrackSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LightKind {
    Point,
    Spot,
    Directional,
}

impl LightKind {
    pub fn has_target(self) -> bool {
        matches!(self, Self::Spot | Self::Directional)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Light {
    pub name: String,
    pub kind: LightKind,
    pub flags: LightFlags,
    pub origin: Mat4,
    pub target: Option<Mat4>,
    pub settings: LightSettings,
    pub settings_track: Option<LightSettingsTrack>,
    pub origin_tracks: TrackSet,
    pub target_tracks: TrackSet,
}

/// Invisible attachment point, typically used to place emitters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Helper {
    pub name: String,
    pub properties: String,
    pub flags: HelperFlags,
    pub transform: Mat4,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub tracks: TrackSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChunkKind {
    Header,
    Body,
    GlobalInfo,
    Materials,
    Geometry,
    Camera,
    Light,
    Helper,
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Header => "header",
            Self::Body => "chunk list",
            Self::GlobalInfo => "global info",
            Self::Materials => "material list",
            Self::Geometry => "geometry",
            Self::Camera => "camera",
            Self::Light => "light",
            Self::Helper => "helper",
        };
        f.write_str(label)
    }
}

/// Recoverable oddities found while decoding. Each occurrence is reported once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    BadMagic {
        found: Tag,
    },
    EndMarkerMismatch {
        offset: usize,
        chunk: ChunkKind,
        name: Option<String>,
        expected: Tag,
        found: Tag,
    },
    CountMismatch {
        what: &'static str,
        declared: u32,
        decoded: u32,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { found } => write!(f, "unexpected magic `{found}`"),
            Self::EndMarkerMismatch {
                offset,
                chunk,
                name,
                expected,
                found,
            } => {
                write!(
                    f,
                    "{chunk} end marker at byte {offset} is `{found}`, expected `{expected}`"
                )?;
                if let Some(name) = name {
                    write!(f, " (`{name}`)")?;
                }
                Ok(())
            }
            Self::CountMismatch {
                what,
                declared,
                decoded,
            } => write!(f, "header declares {declared} {what}, decoded {decoded}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(name: &str, sub_materials: Vec<Material>) -> Material {
        Material {
            name: name.to_string(),
            flags: MaterialFlags::empty(),
            ambient: Vec3::ZERO,
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
            shininess: 0.0,
            opacity: 1.0,
            texture1: None,
            texture2: None,
            sub_materials,
        }
    }

    #[test]
    fn walks_material_tree_depth_first() {
        let tree = material(
            "root",
            vec![
                material("a", vec![material("a1", vec![]), material("a2", vec![])]),
                material("b", vec![]),
            ],
        );

        let names: Vec<_> = tree.walk().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["root", "a", "a1", "a2", "b"]);
    }

    #[test]
    fn count_mismatches_name_the_field() {
        let declared = SceneCounts {
            objects: 2,
            cameras: 1,
            ..Default::default()
        };
        let decoded = SceneCounts {
            objects: 2,
            ..Default::default()
        };

        assert_eq!(declared.mismatches(&decoded), vec![("cameras", 1, 0)]);
    }

    #[test]
    fn sphere_map_flags_are_per_slot() {
        let mut m = material("chrome", vec![]);
        m.flags = MaterialFlags::SPHERE_MAP2 | MaterialFlags::TWO_SIDED;
        assert!(!m.is_sphere_mapped(1));
        assert!(m.is_sphere_mapped(2));
        assert!(m.is_two_sided());
        assert!(!m.is_bump_mapped());
    }
}
