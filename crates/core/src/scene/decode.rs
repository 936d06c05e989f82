//! One-shot decoder from the binary container to a [`Scene`].
//!
//! Layout is entirely positional: each chunk reads its flag word first and
//! then exactly the records those flags announce, in a fixed order. Nothing
//! can be resynchronised from content, so any structural error aborts the
//! whole load. Only a mislabelled end tag is tolerated.

use glam::{Mat4, Quat, Vec2, Vec3};
use tracing::{debug, info, warn};

use super::format::*;
use super::{
    Bone, Camera, CameraKind, ChunkKind, Diagnostic, GeometryObject, GlobalInfo, Helper,
    Influence, Light, LightKind, Material, Scene, SceneCounts, SceneHeader, Surface, TextureRef,
    VertexLink,
};
use crate::cursor::{BinaryCursor, Tag};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::transform::{
    CameraSettings, CameraSettingsTrack, Keyframe, KeyframeTrack, LightSettings,
    LightSettingsTrack, PositionTrack, RotationTrack, ScaleKey, ScaleTrack, TrackSet,
};

type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Decodes a complete scene. Either the whole scene or an error, never a
/// partially populated value.
pub fn decode(bytes: &[u8]) -> DecodeResult<Scene> {
    let mut decoder = SceneDecoder::new(bytes);
    let result = decoder.scene();
    result.map_err(|err| decoder.annotate(err))
}

struct SceneDecoder<'a> {
    cursor: BinaryCursor<'a>,
    chunk: ChunkKind,
    name: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SceneDecoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: BinaryCursor::new(bytes),
            chunk: ChunkKind::Header,
            name: None,
            diagnostics: Vec::new(),
        }
    }

    fn scene(&mut self) -> DecodeResult<Scene> {
        let header = self.header()?;

        let global = if header.flags.contains(SceneFlags::GLOBAL_INFO) {
            Some(self.global_info()?)
        } else {
            None
        };

        let materials = if header.flags.contains(SceneFlags::MATERIALS) {
            self.material_list()?
        } else {
            Vec::new()
        };

        let mut scene = Scene {
            header,
            global,
            materials,
            objects: Vec::new(),
            cameras: Vec::new(),
            lights: Vec::new(),
            helpers: Vec::new(),
            diagnostics: Vec::new(),
        };

        loop {
            self.enter(ChunkKind::Body);
            let offset = self.cursor.offset();
            match self.cursor.read_tag()? {
                GEOMETRY_TAG => {
                    let object = self.geometry(scene.materials.len())?;
                    scene.objects.push(object);
                }
                CAMERA_TAG => {
                    let camera = self.camera()?;
                    scene.cameras.push(camera);
                }
                LIGHT_TAG => {
                    let light = self.light()?;
                    scene.lights.push(light);
                }
                HELPER_TAG => {
                    let helper = self.helper()?;
                    scene.helpers.push(helper);
                }
                EOF_TAG => break,
                other => {
                    return Err(DecodeError::new(
                        DecodeErrorKind::UnknownChunkTag(other),
                        offset,
                    ))
                }
            }
        }

        if !self.cursor.eof() {
            debug!(
                trailing = self.cursor.remaining(),
                "ignoring bytes after end tag"
            );
        }

        let decoded = scene.counts();
        for (what, declared, decoded) in scene.header.declared.mismatches(&decoded) {
            warn!(what, declared, decoded, "header count disagrees with decoded scene");
            self.diagnostics.push(Diagnostic::CountMismatch {
                what,
                declared,
                decoded,
            });
        }

        scene.diagnostics = std::mem::take(&mut self.diagnostics);
        info!(
            materials = scene.materials.len(),
            objects = scene.objects.len(),
            cameras = scene.cameras.len(),
            lights = scene.lights.len(),
            helpers = scene.helpers.len(),
            diagnostics = scene.diagnostics.len(),
            "decoded scene"
        );
        Ok(scene)
    }

    fn header(&mut self) -> DecodeResult<SceneHeader> {
        self.enter(ChunkKind::Header);

        let magic = self.cursor.read_tag()?;
        if magic != MAGIC {
            warn!(%magic, "unexpected scene magic");
            self.diagnostics.push(Diagnostic::BadMagic { found: magic });
        }

        let flags = SceneFlags::from_bits_retain(self.cursor.read_u32()?);
        let declared = SceneCounts {
            position_tracks: self.cursor.read_u32()?,
            rotation_tracks: self.cursor.read_u32()?,
            scale_tracks: self.cursor.read_u32()?,
            camera_settings_tracks: self.cursor.read_u32()?,
            light_settings_tracks: self.cursor.read_u32()?,
            objects: self.cursor.read_u32()?,
            cameras: self.cursor.read_u32()?,
            lights: self.cursor.read_u32()?,
            helpers: self.cursor.read_u32()?,
        };
        let first_frame = self.cursor.read_u32()?;
        let last_frame = self.cursor.read_u32()?;
        debug_assert_eq!(self.cursor.offset(), HEADER_SIZE);

        Ok(SceneHeader {
            magic,
            flags,
            declared,
            first_frame,
            last_frame,
        })
    }

    fn global_info(&mut self) -> DecodeResult<GlobalInfo> {
        self.enter(ChunkKind::GlobalInfo);
        self.expect_start(GLOBAL_INFO_TAG)?;

        let declared_size = self.cursor.read_u32()?;
        let background = self.vec3()?;
        let ambient = self.vec3()?;

        // The end tag sits at a fixed absolute offset, not after the content
        // and not where `declared_size` would put it.
        self.cursor.seek(GLOBAL_INFO_END_OFFSET)?;
        self.expect_end(GLOBAL_INFO_END)?;

        Ok(GlobalInfo {
            declared_size,
            background,
            ambient,
        })
    }

    fn material_list(&mut self) -> DecodeResult<Vec<Material>> {
        self.enter(ChunkKind::Materials);
        self.expect_start(MATERIALS_TAG)?;

        let count = self.count(MIN_MATERIAL_SIZE)?;
        let mut materials = Vec::with_capacity(count);
        for _ in 0..count {
            materials.push(self.material(0)?);
        }

        self.name = None;
        self.expect_end(MATERIALS_END)?;
        debug!(count, "decoded material list");
        Ok(materials)
    }

    fn material(&mut self, depth: usize) -> DecodeResult<Material> {
        if depth > MAX_MATERIAL_DEPTH {
            return Err(self.error(DecodeErrorKind::NestingTooDeep {
                depth: MAX_MATERIAL_DEPTH,
            }));
        }

        let name = self.named()?;
        let flags = MaterialFlags::from_bits_retain(self.cursor.read_u32()?);
        let ambient = self.vec3()?;
        let diffuse = self.vec3()?;
        let specular = self.vec3()?;
        let shininess = self.cursor.read_f32()?;
        let opacity = self.cursor.read_f32()?;

        let texture1 = if flags.contains(MaterialFlags::TEXTURE1) {
            Some(self.texture_ref()?)
        } else {
            None
        };
        let texture2 = if flags.contains(MaterialFlags::TEXTURE2) {
            Some(self.texture_ref()?)
        } else {
            None
        };

        let sub_count = self.count(MIN_MATERIAL_SIZE)?;
        let mut sub_materials = Vec::with_capacity(sub_count);
        for _ in 0..sub_count {
            sub_materials.push(self.material(depth + 1)?);
        }

        Ok(Material {
            name,
            flags,
            ambient,
            diffuse,
            specular,
            shininess,
            opacity,
            texture1,
            texture2,
            sub_materials,
        })
    }

    fn texture_ref(&mut self) -> DecodeResult<TextureRef> {
        self.cursor.ensure_records(1, TEXTURE_REF_SIZE)?;
        Ok(TextureRef {
            file: self.cursor.read_fixed_string(TEXTURE_NAME_LEN)?,
            u_scale: self.cursor.read_f32()?,
            v_scale: self.cursor.read_f32()?,
            u_offset: self.cursor.read_f32()?,
            v_offset: self.cursor.read_f32()?,
        })
    }

    fn geometry(&mut self, material_count: usize) -> DecodeResult<GeometryObject> {
        self.enter(ChunkKind::Geometry);
        let start = self.cursor.offset();

        let name = self.named()?;
        let properties = self.cursor.read_cstring()?;
        let flags = ObjectFlags::from_bits_retain(self.cursor.read_u32()?);

        let surface = if flags.contains(ObjectFlags::WIRE_COLOR) {
            Surface::Wire(self.vec3()?)
        } else {
            Surface::Material(self.material_ref(material_count)?)
        };
        let transform = self.mat4()?;

        let vertex_count = self.cursor.read_u32()? as usize;
        let face_count = self.cursor.read_u32()? as usize;

        let positions = self.vec3_array(vertex_count)?;
        let normals = if flags.contains(ObjectFlags::NORMALS) {
            self.vec3_array(vertex_count)?
        } else {
            Vec::new()
        };
        let colors = if flags.contains(ObjectFlags::COLORS) {
            self.vec3_array(vertex_count)?
        } else {
            Vec::new()
        };
        let uv1 = if flags.contains(ObjectFlags::UV1) {
            self.vec2_array(vertex_count)?
        } else {
            Vec::new()
        };
        let uv2 = if flags.contains(ObjectFlags::UV2) {
            self.vec2_array(vertex_count)?
        } else {
            Vec::new()
        };

        let faces = self.faces(face_count, vertex_count)?;
        let edge_visibility = self.cursor.read_bytes(face_count * 3)?.to_vec();

        let tracks = self.track_set(flags.tracks())?;

        // The bone count is always on disk, DEFORMABLE or not.
        let bone_count = self.cursor.read_u32()? as usize;
        let (bones, links) = if bone_count > 0 {
            let bones = self.bones(bone_count)?;
            let links = self.vertex_links(vertex_count, bone_count)?;
            (bones, links)
        } else {
            (Vec::new(), Vec::new())
        };

        self.expect_end(GEOMETRY_END)?;
        debug!(
            name = %name,
            offset = start,
            vertices = vertex_count,
            faces = face_count,
            bones = bone_count,
            "decoded geometry object"
        );

        Ok(GeometryObject {
            name,
            properties,
            flags,
            surface,
            transform,
            positions,
            normals,
            colors,
            uv1,
            uv2,
            faces,
            edge_visibility,
            tracks,
            bones,
            links,
        })
    }

    fn material_ref(&mut self, material_count: usize) -> DecodeResult<Option<usize>> {
        let offset = self.cursor.offset();
        let index = self.cursor.read_i32()?;
        match index {
            -1 => Ok(None),
            i if i >= 0 && (i as usize) < material_count => Ok(Some(i as usize)),
            i => Err(DecodeError::new(
                DecodeErrorKind::InvalidReference {
                    what: "material",
                    index: i64::from(i),
                    limit: material_count,
                },
                offset,
            )),
        }
    }

    fn faces(&mut self, face_count: usize, vertex_count: usize) -> DecodeResult<Vec<[u32; 3]>> {
        self.cursor.ensure_records(face_count, FACE_SIZE)?;
        let mut faces = Vec::with_capacity(face_count);
        for _ in 0..face_count {
            let mut face = [0u32; 3];
            for corner in &mut face {
                *corner = self.index("face vertex", vertex_count)? as u32;
            }
            faces.push(face);
        }
        Ok(faces)
    }

    fn bones(&mut self, bone_count: usize) -> DecodeResult<Vec<Bone>> {
        self.cursor.ensure_records(bone_count, MIN_BONE_SIZE)?;

        let mut bones = Vec::with_capacity(bone_count);
        for index in 0..bone_count {
            // Errors keep naming the owning object, not the bone.
            let name = self.cursor.read_cstring()?;
            let flags = BoneFlags::from_bits_retain(self.cursor.read_u32()?);

            let parent_offset = self.cursor.offset();
            let parent = match self.cursor.read_i32()? {
                -1 => None,
                p if p >= 0 && (p as usize) < index => Some(p as usize),
                p => {
                    return Err(DecodeError::new(
                        DecodeErrorKind::InvalidReference {
                            what: "bone parent",
                            index: i64::from(p),
                            limit: index,
                        },
                        parent_offset,
                    ))
                }
            };

            let transform = self.mat4()?;
            let tracks = self.track_set(flags.tracks())?;
            bones.push(Bone {
                name,
                flags,
                parent,
                transform,
                tracks,
            });
        }
        Ok(bones)
    }

    fn vertex_links(
        &mut self,
        vertex_count: usize,
        bone_count: usize,
    ) -> DecodeResult<Vec<VertexLink>> {
        self.cursor.ensure_records(vertex_count, 4)?;

        let mut links = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            let linked = self.count(INFLUENCE_SIZE)?;

            let locals = self.vec3_array(linked)?;
            let mut bones = Vec::with_capacity(linked);
            for _ in 0..linked {
                bones.push(self.index("bone", bone_count)?);
            }
            let mut weights = Vec::with_capacity(linked);
            for _ in 0..linked {
                weights.push(self.cursor.read_f32()?);
            }

            let influences = locals
                .into_iter()
                .zip(bones)
                .zip(weights)
                .map(|((local, bone), weight)| Influence {
                    bone,
                    local,
                    weight,
                })
                .collect();
            links.push(VertexLink { influences });
        }
        Ok(links)
    }

    fn camera(&mut self) -> DecodeResult<Camera> {
        self.enter(ChunkKind::Camera);

        let name = self.named()?;
        let kind = match self.type_code()? {
            (CAMERA_FREE, _) => CameraKind::Free,
            (CAMERA_TARGET, _) => CameraKind::Target,
            (value, offset) => {
                return Err(DecodeError::new(
                    DecodeErrorKind::InvalidEnum {
                        what: "camera type",
                        value,
                    },
                    offset,
                ))
            }
        };
        let flags = CameraFlags::from_bits_retain(self.cursor.read_u32()?);

        let origin = self.mat4()?;
        let target = if kind == CameraKind::Target {
            Some(self.mat4()?)
        } else {
            None
        };

        let near = self.cursor.read_f32()?;
        let far = self.cursor.read_f32()?;
        let fov = self.cursor.read_f32()?;
        let roll = self.cursor.read_f32()?;

        let settings_track = if flags.contains(CameraFlags::SETTINGS_TRACK) {
            Some(self.camera_settings_track()?)
        } else {
            None
        };
        let origin_tracks = self.track_set(flags.origin_tracks())?;
        let target_tracks = self.track_set(flags.target_tracks())?;

        self.expect_end(CAMERA_END)?;
        debug!(name = %name, ?kind, "decoded camera");

        Ok(Camera {
            name,
            kind,
            flags,
            origin,
            target,
            settings: CameraSettings {
                fov,
                roll,
                near,
                far,
            },
            settings_track,
            origin_tracks,
            target_tracks,
        })
    }

    fn light(&mut self) -> DecodeResult<Light> {
        self.enter(ChunkKind::Light);

        let name = self.named()?;
        let kind = match self.type_code()? {
            (LIGHT_POINT, _) => LightKind::Point,
            (LIGHT_SPOT, _) => LightKind::Spot,
            (LIGHT_DIRECTIONAL, _) => LightKind::Directional,
            (value, offset) => {
                return Err(DecodeError::new(
                    DecodeErrorKind::InvalidEnum {
                        what: "light type",
                        value,
                    },
                    offset,
                ))
            }
        };
        let flags = LightFlags::from_bits_retain(self.cursor.read_u32()?);

        let origin = self.mat4()?;
        let target = if kind.has_target() {
            Some(self.mat4()?)
        } else {
            None
        };

        let settings = LightSettings {
            color: self.vec3()?,
            intensity: self.cursor.read_f32()?,
            falloff: self.cursor.read_f32()?,
        };

        let settings_track = if flags.contains(LightFlags::SETTINGS_TRACK) {
            Some(self.light_settings_track()?)
        } else {
            None
        };
        let origin_tracks = self.track_set(flags.origin_tracks())?;
        let target_tracks = self.track_set(flags.target_tracks())?;

        self.expect_end(LIGHT_END)?;
        debug!(name = %name, ?kind, "decoded light");

        Ok(Light {
            name,
            kind,
            flags,
            origin,
            target,
            settings,
            settings_track,
            origin_tracks,
            target_tracks,
        })
    }

    fn helper(&mut self) -> DecodeResult<Helper> {
        self.enter(ChunkKind::Helper);

        let name = self.named()?;
        let properties = self.cursor.read_cstring()?;
        let flags = HelperFlags::from_bits_retain(self.cursor.read_u32()?);
        let transform = self.mat4()?;
        let bounds_min = self.vec3()?;
        let bounds_max = self.vec3()?;
        let tracks = self.track_set(flags.tracks())?;

        self.expect_end(HELPER_END)?;
        debug!(name = %name, "decoded helper");

        Ok(Helper {
            name,
            properties,
            flags,
            transform,
            bounds_min,
            bounds_max,
            tracks,
        })
    }

    fn track_set(&mut self, presence: TrackPresence) -> DecodeResult<TrackSet> {
        let position = if presence.position {
            Some(self.position_track()?)
        } else {
            None
        };
        let scale = if presence.scale {
            Some(self.scale_track()?)
        } else {
            None
        };
        let rotation = if presence.rotation {
            Some(self.rotation_track()?)
        } else {
            None
        };
        Ok(TrackSet {
            position,
            scale,
            rotation,
        })
    }

    fn track<T>(
        &mut self,
        key_size: usize,
        mut value: impl FnMut(&mut Self) -> DecodeResult<T>,
    ) -> DecodeResult<KeyframeTrack<T>> {
        let count = self.count(key_size)?;
        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            let time = self.cursor.read_f32()?;
            keys.push(Keyframe::new(time, value(self)?));
        }
        Ok(KeyframeTrack::new(keys))
    }

    fn position_track(&mut self) -> DecodeResult<PositionTrack> {
        self.track(POSITION_KEY_SIZE, Self::vec3)
    }

    fn rotation_track(&mut self) -> DecodeResult<RotationTrack> {
        self.track(ROTATION_KEY_SIZE, Self::quat)
    }

    fn scale_track(&mut self) -> DecodeResult<ScaleTrack> {
        self.track(SCALE_KEY_SIZE, |d| {
            Ok(ScaleKey {
                scale: d.vec3()?,
                axis: d.quat()?,
            })
        })
    }

    fn camera_settings_track(&mut self) -> DecodeResult<CameraSettingsTrack> {
        self.track(CAMERA_KEY_SIZE, |d| {
            Ok(CameraSettings {
                fov: d.cursor.read_f32()?,
                roll: d.cursor.read_f32()?,
                near: d.cursor.read_f32()?,
                far: d.cursor.read_f32()?,
            })
        })
    }

    fn light_settings_track(&mut self) -> DecodeResult<LightSettingsTrack> {
        self.track(LIGHT_KEY_SIZE, |d| {
            Ok(LightSettings {
                color: d.vec3()?,
                intensity: d.cursor.read_f32()?,
                falloff: d.cursor.read_f32()?,
            })
        })
    }

    /// Reads the name that opens most records and remembers it for diagnostics.
    fn named(&mut self) -> DecodeResult<String> {
        let name = self.cursor.read_cstring()?;
        self.name = Some(name.clone());
        Ok(name)
    }

    /// Reads a `u32` count and checks that many records could still follow.
    fn count(&mut self, record_size: usize) -> DecodeResult<usize> {
        let offset = self.cursor.offset();
        let count = self.cursor.read_u32()? as usize;
        if let Err(err) = self.cursor.ensure_records(count, record_size) {
            self.cursor.seek(offset)?;
            return Err(err.into());
        }
        Ok(count)
    }

    /// Reads a `u32` index that must be below `limit`.
    fn index(&mut self, what: &'static str, limit: usize) -> DecodeResult<usize> {
        let offset = self.cursor.offset();
        let index = self.cursor.read_u32()?;
        if index as usize >= limit {
            return Err(DecodeError::new(
                DecodeErrorKind::InvalidReference {
                    what,
                    index: i64::from(index),
                    limit,
                },
                offset,
            ));
        }
        Ok(index as usize)
    }

    /// Reads a type code together with the offset it was found at.
    fn type_code(&mut self) -> DecodeResult<(u32, usize)> {
        let offset = self.cursor.offset();
        Ok((self.cursor.read_u32()?, offset))
    }

    fn vec3(&mut self) -> DecodeResult<Vec3> {
        Ok(Vec3::new(
            self.cursor.read_f32()?,
            self.cursor.read_f32()?,
            self.cursor.read_f32()?,
        ))
    }

    fn quat(&mut self) -> DecodeResult<Quat> {
        Ok(Quat::from_xyzw(
            self.cursor.read_f32()?,
            self.cursor.read_f32()?,
            self.cursor.read_f32()?,
            self.cursor.read_f32()?,
        ))
    }

    /// Sixteen floats, column-major.
    fn mat4(&mut self) -> DecodeResult<Mat4> {
        self.cursor.ensure_records(1, MAT4_SIZE)?;
        let mut cols = [0f32; 16];
        for value in &mut cols {
            *value = self.cursor.read_f32()?;
        }
        Ok(Mat4::from_cols_array(&cols))
    }

    fn vec3_array(&mut self, count: usize) -> DecodeResult<Vec<Vec3>> {
        self.cursor.ensure_records(count, VEC3_SIZE)?;
        (0..count).map(|_| self.vec3()).collect()
    }

    fn vec2_array(&mut self, count: usize) -> DecodeResult<Vec<Vec2>> {
        self.cursor.ensure_records(count, VEC2_SIZE)?;
        (0..count)
            .map(|_| -> DecodeResult<Vec2> {
                Ok(Vec2::new(self.cursor.read_f32()?, self.cursor.read_f32()?))
            })
            .collect()
    }

    fn expect_start(&mut self, expected: Tag) -> DecodeResult<()> {
        let offset = self.cursor.offset();
        let found = self.cursor.read_tag()?;
        if found != expected {
            return Err(DecodeError::new(
                DecodeErrorKind::UnknownChunkTag(found),
                offset,
            ));
        }
        Ok(())
    }

    /// A wrong end tag is reported and skipped: every field before it was read
    /// at its declared width, so the offsets are still sound.
    fn expect_end(&mut self, expected: Tag) -> DecodeResult<()> {
        let offset = self.cursor.offset();
        let found = self.cursor.read_tag()?;
        if found != expected {
            warn!(
                chunk = %self.chunk,
                name = self.name.as_deref().unwrap_or(""),
                %expected,
                %found,
                offset,
                "end marker mismatch"
            );
            self.diagnostics.push(Diagnostic::EndMarkerMismatch {
                offset,
                chunk: self.chunk,
                name: self.name.clone(),
                expected,
                found,
            });
        }
        Ok(())
    }

    fn enter(&mut self, chunk: ChunkKind) {
        self.chunk = chunk;
        self.name = None;
    }

    fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(kind, self.cursor.offset())
    }

    fn annotate(&self, err: DecodeError) -> DecodeError {
        err.with_context(|| match &self.name {
            Some(name) => format!("{} `{}`", self.chunk, name),
            None => self.chunk.to_string(),
        })
    }
}
