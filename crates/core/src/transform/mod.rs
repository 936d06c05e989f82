//! Keyframe interpolation and transform composition.
//!
//! Every function here is total: out-of-range times clamp to the track ends,
//! empty tracks fall back to a default and nothing is cached between calls.

mod track;

use glam::{Mat4, Quat, Vec3};

pub use track::{
    CameraSettings, CameraSettingsTrack, Keyframe, KeyframeTrack, LightSettings,
    LightSettingsTrack, PositionTrack, RotationTrack, ScaleKey, ScaleTrack, TrackSet,
};

/// Blends two samples of the same track at `u` in `[0, 1]`.
pub trait Blend: Copy {
    fn blend(self, other: Self, u: f32) -> Self;
}

impl Blend for f32 {
    fn blend(self, other: Self, u: f32) -> Self {
        self + (other - self) * u
    }
}

impl Blend for Vec3 {
    fn blend(self, other: Self, u: f32) -> Self {
        self.lerp(other, u)
    }
}

impl Blend for Quat {
    fn blend(self, other: Self, u: f32) -> Self {
        slerp_shortest(self, other, u)
    }
}

impl Blend for ScaleKey {
    fn blend(self, other: Self, u: f32) -> Self {
        Self {
            scale: self.scale.blend(other.scale, u),
            axis: self.axis.blend(other.axis, u),
        }
    }
}

impl Blend for CameraSettings {
    fn blend(self, other: Self, u: f32) -> Self {
        Self {
            fov: self.fov.blend(other.fov, u),
            roll: self.roll.blend(other.roll, u),
            near: self.near.blend(other.near, u),
            far: self.far.blend(other.far, u),
        }
    }
}

impl Blend for LightSettings {
    fn blend(self, other: Self, u: f32) -> Self {
        Self {
            color: self.color.blend(other.color, u),
            intensity: self.intensity.blend(other.intensity, u),
            falloff: self.falloff.blend(other.falloff, u),
        }
    }
}

/// Spherical interpolation along the shorter of the two arcs.
pub fn slerp_shortest(from: Quat, to: Quat, u: f32) -> Quat {
    let to = if from.dot(to) < 0.0 { -to } else { to };
    from.slerp(to, u)
}

/// Samples `track` at `time`, or `None` for an empty track.
pub fn sample<T: Blend>(track: &KeyframeTrack<T>, time: f32) -> Option<T> {
    let keys = &track.keys;
    let first = keys.first()?;
    let last = keys.last()?;

    if keys.len() == 1 || time.is_nan() || time <= first.time {
        return Some(first.value);
    }
    if time >= last.time {
        return Some(last.value);
    }

    let (index, u) = locate_segment(keys, time);
    Some(keys[index].value.blend(keys[index + 1].value, u))
}

/// Finds the segment holding `time` assuming a constant step taken from the
/// first two keys. Callers guarantee `first.time < time < last.time`.
fn locate_segment<T>(keys: &[Keyframe<T>], time: f32) -> (usize, f32) {
    let last_segment = keys.len() - 2;
    let origin = keys[0].time;
    let step = keys[1].time - origin;

    if step > 0.0 {
        let elapsed = time - origin;
        let index = ((elapsed / step).floor() as usize).min(last_segment);
        let u = ((elapsed - index as f32 * step) / step).clamp(0.0, 1.0);
        return (index, u);
    }

    // Leading keys share a timestamp, so no step can be derived.
    let next = keys
        .partition_point(|key| key.time <= time)
        .clamp(1, keys.len() - 1);
    let index = next - 1;
    let span = keys[next].time - keys[index].time;
    let u = if span > 0.0 {
        ((time - keys[index].time) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (index, u)
}

pub fn interpolate_position(track: &PositionTrack, time: f32) -> Vec3 {
    sample(track, time).unwrap_or(Vec3::ZERO)
}

pub fn interpolate_rotation(track: &RotationTrack, time: f32) -> Quat {
    sample(track, time).unwrap_or(Quat::IDENTITY)
}

/// Returns the scale factors and the orientation of the axes they apply along.
pub fn interpolate_scale(track: &ScaleTrack, time: f32) -> (Vec3, Quat) {
    let key = sample(track, time).unwrap_or(ScaleKey::IDENTITY);
    (key.scale, key.axis)
}

pub fn interpolate_camera_settings(
    track: &CameraSettingsTrack,
    time: f32,
    defaults: CameraSettings,
) -> CameraSettings {
    sample(track, time).unwrap_or(defaults)
}

pub fn interpolate_light_settings(
    track: &LightSettingsTrack,
    time: f32,
    defaults: LightSettings,
) -> LightSettings {
    sample(track, time).unwrap_or(defaults)
}

/// Matrix scaling by `scale` along the axes of `axis`.
pub fn axis_scale_matrix(scale: Vec3, axis: Quat) -> Mat4 {
    Mat4::from_quat(axis) * Mat4::from_scale(scale) * Mat4::from_quat(axis.inverse())
}

/// Builds the world matrix for `time` from a static transform and its tracks.
///
/// Each step left-multiplies the running result, in this exact order:
///
/// 1. initial scale
/// 2. animated scale
/// 3. initial rotation
/// 4. animated rotation
/// 5. initial translation
/// 6. animated translation
///
/// Matrix products do not commute, so the order above is observable.
pub fn compose_transform(time: f32, tracks: &TrackSet, initial: Mat4) -> Mat4 {
    let (initial_scale, initial_rotation, initial_translation) =
        initial.to_scale_rotation_translation();

    // 1. initial scale
    let mut result = Mat4::from_scale(initial_scale);

    // 2. animated scale
    if let Some(track) = &tracks.scale {
        let (scale, axis) = interpolate_scale(track, time);
        result = axis_scale_matrix(scale, axis) * result;
    }

    // 3. initial rotation
    result = Mat4::from_quat(initial_rotation) * result;

    // 4. animated rotation
    if let Some(track) = &tracks.rotation {
        result = Mat4::from_quat(interpolate_rotation(track, time)) * result;
    }

    // 5. initial translation
    result = Mat4::from_translation(initial_translation) * result;

    // 6. animated translation
    if let Some(track) = &tracks.position {
        result = Mat4::from_translation(interpolate_position(track, time)) * result;
    }

    result
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    use super::*;

    const EPS: f32 = 1e-5;

    fn positions() -> PositionTrack {
        [
            (0.0, Vec3::ZERO),
            (10.0, Vec3::new(10.0, 0.0, 0.0)),
            (20.0, Vec3::new(10.0, 20.0, 0.0)),
        ]
        .into_iter()
        .collect()
    }

    fn rotations() -> RotationTrack {
        [
            (0.0, Quat::IDENTITY),
            (10.0, Quat::from_rotation_z(FRAC_PI_2)),
            (20.0, Quat::from_rotation_z(std::f32::consts::PI)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn clamps_to_track_boundaries() {
        let track = positions();
        assert_eq!(interpolate_position(&track, 0.0), Vec3::ZERO);
        assert_eq!(interpolate_position(&track, -50.0), Vec3::ZERO);
        assert_eq!(
            interpolate_position(&track, 20.0),
            Vec3::new(10.0, 20.0, 0.0)
        );
        assert_eq!(
            interpolate_position(&track, 999.0),
            Vec3::new(10.0, 20.0, 0.0)
        );

        let track = rotations();
        assert_eq!(interpolate_rotation(&track, 0.0), Quat::IDENTITY);
        assert_eq!(
            interpolate_rotation(&track, 20.0),
            Quat::from_rotation_z(std::f32::consts::PI)
        );
    }

    #[test]
    fn midpoints_blend_linearly() {
        let track = positions();
        assert!(interpolate_position(&track, 5.0).abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), EPS));
        assert!(interpolate_position(&track, 15.0).abs_diff_eq(Vec3::new(10.0, 10.0, 0.0), EPS));
        assert!(interpolate_position(&track, 12.5).abs_diff_eq(Vec3::new(10.0, 5.0, 0.0), EPS));
    }

    #[test]
    fn rotation_midpoints_are_spherical() {
        let track = rotations();
        let mid = interpolate_rotation(&track, 5.0);
        assert!(mid.abs_diff_eq(Quat::from_rotation_z(FRAC_PI_4), EPS));
        assert!(mid.is_normalized());
    }

    #[test]
    fn rotation_takes_the_short_arc() {
        let from = Quat::from_rotation_y(0.1);
        let to = -Quat::from_rotation_y(0.3);
        let track: RotationTrack = [(0.0, from), (2.0, to)].into_iter().collect();

        let mid = interpolate_rotation(&track, 1.0);
        let expected = Quat::from_rotation_y(0.2);
        assert!(mid.abs_diff_eq(expected, EPS) || mid.abs_diff_eq(-expected, EPS));
    }

    #[test]
    fn degenerate_tracks_use_defaults_or_single_value() {
        assert_eq!(interpolate_position(&PositionTrack::default(), 3.0), Vec3::ZERO);
        assert_eq!(interpolate_rotation(&RotationTrack::default(), 3.0), Quat::IDENTITY);
        assert_eq!(
            interpolate_scale(&ScaleTrack::default(), 3.0),
            (Vec3::ONE, Quat::IDENTITY)
        );

        let defaults = CameraSettings {
            fov: 1.0,
            roll: 0.0,
            near: 2.0,
            far: 50.0,
        };
        assert_eq!(
            interpolate_camera_settings(&CameraSettingsTrack::default(), 7.0, defaults),
            defaults
        );

        let single: PositionTrack = [(4.0, Vec3::X)].into_iter().collect();
        assert!(single.is_degenerate());
        for time in [-10.0, 4.0, 100.0] {
            assert_eq!(interpolate_position(&single, time), Vec3::X);
        }
    }

    #[test]
    fn step_is_derived_from_the_first_two_keys() {
        let track: PositionTrack = [
            (0.0, Vec3::ZERO),
            (10.0, Vec3::X),
            (30.0, Vec3::Y),
        ]
        .into_iter()
        .collect();

        // 25.0 lies past the second uniform segment, which clamps to the last key.
        assert_eq!(interpolate_position(&track, 25.0), Vec3::Y);
    }

    #[test]
    fn repeated_leading_times_fall_back_to_search() {
        let track: PositionTrack = [
            (0.0, Vec3::ZERO),
            (0.0, Vec3::X),
            (10.0, Vec3::new(1.0, 10.0, 0.0)),
        ]
        .into_iter()
        .collect();

        let value = interpolate_position(&track, 5.0);
        assert!(value.abs_diff_eq(Vec3::new(1.0, 5.0, 0.0), EPS));
    }

    #[test]
    fn camera_and_light_settings_blend_per_field() {
        let track: CameraSettingsTrack = [
            (
                0.0,
                CameraSettings {
                    fov: 1.0,
                    roll: 0.0,
                    near: 1.0,
                    far: 100.0,
                },
            ),
            (
                4.0,
                CameraSettings {
                    fov: 2.0,
                    roll: 1.0,
                    near: 3.0,
                    far: 300.0,
                },
            ),
        ]
        .into_iter()
        .collect();
        let mid = interpolate_camera_settings(&track, 2.0, CameraSettings::default());
        assert!((mid.fov - 1.5).abs() < EPS);
        assert!((mid.roll - 0.5).abs() < EPS);
        assert!((mid.near - 2.0).abs() < EPS);
        assert!((mid.far - 200.0).abs() < EPS);

        let track: LightSettingsTrack = [
            (0.0, LightSettings::default()),
            (
                2.0,
                LightSettings {
                    color: Vec3::ZERO,
                    intensity: 3.0,
                    falloff: 2.0,
                },
            ),
        ]
        .into_iter()
        .collect();
        let mid = interpolate_light_settings(&track, 1.0, LightSettings::default());
        assert!(mid.color.abs_diff_eq(Vec3::splat(0.5), EPS));
        assert!((mid.intensity - 2.0).abs() < EPS);
        assert!((mid.falloff - 1.0).abs() < EPS);
    }

    #[test]
    fn static_transform_round_trips_through_composition() {
        let initial = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 3.0, 4.0),
            Quat::from_rotation_x(0.7),
            Vec3::new(1.0, -2.0, 5.0),
        );
        let composed = compose_transform(12.0, &TrackSet::default(), initial);
        assert!(composed.abs_diff_eq(initial, 1e-4));
    }

    #[test]
    fn axis_scale_stretches_along_rotated_axis() {
        let track: ScaleTrack = [(
            0.0,
            ScaleKey {
                scale: Vec3::new(2.0, 1.0, 1.0),
                axis: Quat::from_rotation_z(FRAC_PI_2),
            },
        )]
        .into_iter()
        .collect();
        let tracks = TrackSet {
            scale: Some(track),
            ..Default::default()
        };

        let composed = compose_transform(0.0, &tracks, Mat4::IDENTITY);
        assert!(composed
            .transform_point3(Vec3::Y)
            .abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), EPS));
        assert!(composed.transform_point3(Vec3::X).abs_diff_eq(Vec3::X, EPS));
    }

    #[test]
    fn animated_tracks_apply_after_initial_components() {
        let tracks = TrackSet {
            position: Some([(0.0, Vec3::new(0.0, 0.0, 5.0))].into_iter().collect()),
            rotation: Some([(0.0, Quat::from_rotation_z(FRAC_PI_2))].into_iter().collect()),
            scale: None,
        };
        let initial = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));

        // Origin: translated to (1,0,0), rotated about Z is applied first, then
        // both translations.
        let composed = compose_transform(0.0, &tracks, initial);
        assert!(composed
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::new(1.0, 0.0, 5.0), EPS));
        assert!(composed
            .transform_point3(Vec3::X)
            .abs_diff_eq(Vec3::new(1.0, 1.0, 5.0), EPS));
    }

    #[test]
    fn composition_order_is_observable() {
        let initial_rotation = Quat::from_rotation_x(FRAC_PI_2);
        let initial_translation = Vec3::new(3.0, 0.0, 0.0);
        let initial = Mat4::from_rotation_translation(initial_rotation, initial_translation);

        let animated_rotation = Quat::from_rotation_z(FRAC_PI_2);
        let animated_translation = Vec3::new(0.0, 2.0, 0.0);
        let tracks = TrackSet {
            position: Some([(0.0, animated_translation)].into_iter().collect()),
            rotation: Some([(0.0, animated_rotation)].into_iter().collect()),
            scale: None,
        };

        let composed = compose_transform(0.0, &tracks, initial);

        let expected = Mat4::from_translation(animated_translation)
            * Mat4::from_translation(initial_translation)
            * Mat4::from_quat(animated_rotation)
            * Mat4::from_quat(initial_rotation);
        assert!(composed.abs_diff_eq(expected, EPS));

        // Steps 3 and 4 swapped.
        let rotations_swapped = Mat4::from_translation(animated_translation)
            * Mat4::from_translation(initial_translation)
            * Mat4::from_quat(initial_rotation)
            * Mat4::from_quat(animated_rotation);
        assert!(!composed.abs_diff_eq(rotations_swapped, EPS));

        // Animated rotation applied after the translations.
        let rotation_last = Mat4::from_quat(animated_rotation)
            * Mat4::from_translation(animated_translation)
            * Mat4::from_translation(initial_translation)
            * Mat4::from_quat(initial_rotation);
        assert!(!composed.abs_diff_eq(rotation_last, EPS));
    }
}
