//! Diagnostic effects: each evaluates one scene node per frame and logs what a
//! renderer would receive.

use std::rc::Rc;

use demoplay_core::{scene_frame, DemoError, Effect, EffectConfig, FrameContext, Result, Scene};
use glam::Vec3;
use tracing::{debug, info};

/// Builds the effect an entry names, resolving scene nodes up front so a
/// misspelt name fails at registration rather than mid-playback.
pub fn build(scene: &Rc<Scene>, config: &EffectConfig, fps: f32) -> Result<Box<dyn Effect>> {
    let scene = Rc::clone(scene);
    let effect: Box<dyn Effect> = match config {
        EffectConfig::SceneCamera { camera } => {
            let index = position(&scene.cameras, |c| c.name == *camera, "camera", camera)?;
            Box::new(SceneCamera { scene, index, fps })
        }
        EffectConfig::ObjectTracker { object, skinned } => {
            let index = position(&scene.objects, |o| o.name == *object, "object", object)?;
            Box::new(ObjectTracker {
                scene,
                index,
                fps,
                skinned: *skinned,
            })
        }
        EffectConfig::LightMonitor { light } => {
            let index = position(&scene.lights, |l| l.name == *light, "light", light)?;
            Box::new(LightMonitor { scene, index, fps })
        }
        EffectConfig::HelperMonitor { helper } => {
            let index = position(&scene.helpers, |h| h.name == *helper, "helper", helper)?;
            Box::new(HelperMonitor { scene, index, fps })
        }
    };
    Ok(effect)
}

fn position<T>(
    items: &[T],
    matches: impl Fn(&T) -> bool,
    what: &str,
    name: &str,
) -> Result<usize> {
    items
        .iter()
        .position(matches)
        .ok_or_else(|| DemoError::msg(format!("scene has no {what} named `{name}`")))
}

/// Publishes a scene camera for the entries that run after it.
struct SceneCamera {
    scene: Rc<Scene>,
    index: usize,
    fps: f32,
}

impl Effect for SceneCamera {
    fn render(&mut self, ctx: &mut FrameContext) -> Result<()> {
        let camera = &self.scene.cameras[self.index];
        let state = camera.evaluate(scene_frame(ctx.local_ms, self.fps));
        debug!(
            camera = %camera.name,
            clock_ms = ctx.clock_ms,
            eye = ?state.eye,
            target = ?state.target,
            fov = state.settings.fov,
            "camera"
        );
        ctx.camera = Some(state);
        Ok(())
    }
}

struct ObjectTracker {
    scene: Rc<Scene>,
    index: usize,
    fps: f32,
    skinned: bool,
}

impl Effect for ObjectTracker {
    fn render(&mut self, ctx: &mut FrameContext) -> Result<()> {
        let object = &self.scene.objects[self.index];
        if object.is_hidden() {
            return Ok(());
        }

        let frame = scene_frame(ctx.local_ms, self.fps);
        let world = object.world_transform(frame);

        let local_points = if self.skinned && object.is_skinned() {
            object.deform(frame)
        } else {
            object.positions.clone()
        };
        let Some((min, max)) = bounds(local_points.iter().map(|&p| world.transform_point3(p)))
        else {
            debug!(object = %object.name, clock_ms = ctx.clock_ms, "object has no vertices");
            return Ok(());
        };
        let center = (min + max) * 0.5;

        let depth = ctx
            .camera
            .map(|camera| -camera.view.transform_point3(center).z);
        info!(
            object = %object.name,
            clock_ms = ctx.clock_ms,
            center = ?center,
            extent = ?(max - min),
            depth,
            "object"
        );
        Ok(())
    }
}

fn bounds(points: impl Iterator<Item = Vec3>) -> Option<(Vec3, Vec3)> {
    points.fold(None, |acc, p| match acc {
        None => Some((p, p)),
        Some((min, max)) => Some((min.min(p), max.max(p))),
    })
}

struct LightMonitor {
    scene: Rc<Scene>,
    index: usize,
    fps: f32,
}

impl Effect for LightMonitor {
    fn render(&mut self, ctx: &mut FrameContext) -> Result<()> {
        let light = &self.scene.lights[self.index];
        let state = light.evaluate(scene_frame(ctx.local_ms, self.fps));
        debug!(
            light = %light.name,
            kind = ?state.kind,
            position = ?state.position,
            direction = ?state.direction,
            intensity = state.settings.intensity,
            "light"
        );
        Ok(())
    }
}

struct HelperMonitor {
    scene: Rc<Scene>,
    index: usize,
    fps: f32,
}

impl Effect for HelperMonitor {
    fn render(&mut self, ctx: &mut FrameContext) -> Result<()> {
        let helper = &self.scene.helpers[self.index];
        let world = helper.world_transform(scene_frame(ctx.local_ms, self.fps));
        debug!(
            helper = %helper.name,
            position = ?world.w_axis.truncate(),
            properties = %helper.properties,
            "helper"
        );
        Ok(())
    }
}
