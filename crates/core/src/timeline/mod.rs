use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::scene::CameraState;
use crate::Result;

/// Handle returned by [`Timeline::register`]. Stable for the timeline's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(usize);

impl EntryId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an effect sees when the frame driver invokes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Clock time relative to the entry's registered start. Negative when the
    /// entry was retimed to open before it.
    pub local_ms: i64,
    pub clock_ms: i64,
    /// Camera published by an earlier entry this frame, if any. An effect may
    /// replace it for the entries that run after it.
    pub camera: Option<CameraState>,
}

pub trait Effect {
    fn render(&mut self, ctx: &mut FrameContext) -> Result<()>;
}

impl<F> Effect for F
where
    F: FnMut(&mut FrameContext) -> Result<()>,
{
    fn render(&mut self, ctx: &mut FrameContext) -> Result<()> {
        self(ctx)
    }
}

pub struct TimelineEntry<E: ?Sized> {
    pub name: String,
    /// Start given at registration. Local time is measured from here even
    /// after a retime moves the window.
    pub origin_ms: i64,
    pub start_ms: i64,
    pub end_ms: i64,
    /// Lower priorities run first within a frame.
    pub priority: i32,
    /// Registration order, the tie-break between equal priorities.
    pub order: usize,
    pub enabled: bool,
    owner: Box<E>,
}

impl<E: ?Sized> TimelineEntry<E> {
    /// Inclusive at both ends.
    pub fn is_active_at(&self, clock_ms: i64) -> bool {
        self.enabled && self.start_ms <= clock_ms && clock_ms <= self.end_ms
    }

    pub fn owner(&self) -> &E {
        &self.owner
    }

    pub fn owner_mut(&mut self) -> &mut E {
        &mut self.owner
    }
}

impl<E: ?Sized> fmt::Debug for TimelineEntry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineEntry")
            .field("name", &self.name)
            .field("origin_ms", &self.origin_ms)
            .field("start_ms", &self.start_ms)
            .field("end_ms", &self.end_ms)
            .field("priority", &self.priority)
            .field("order", &self.order)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Outcome of one [`Timeline::run_frame`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Entries invoked, in invocation order, including failed ones.
    pub ran: Vec<EntryId>,
    pub failed: Vec<(EntryId, String)>,
    /// Camera left behind by the last entry that ran.
    pub camera: Option<CameraState>,
}

/// Append-only list of effects bound to time windows.
///
/// Entries are never removed or reordered. Mutation happens between frames
/// only, which `&mut self` on both paths enforces.
pub struct Timeline<E: Effect + ?Sized = dyn Effect> {
    entries: Vec<TimelineEntry<E>>,
}

impl<E: Effect + ?Sized> Default for Timeline<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: Effect + ?Sized> fmt::Debug for Timeline<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<E: Effect + ?Sized> Timeline<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        owner: Box<E>,
        start_ms: i64,
        end_ms: i64,
        priority: i32,
        name: impl Into<String>,
    ) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries.push(TimelineEntry {
            name: name.into(),
            origin_ms: start_ms,
            start_ms,
            end_ms,
            priority,
            order: id.0,
            enabled: true,
            owner,
        });
        id
    }

    /// Enabled entries whose window contains `clock_ms`, lowest priority
    /// first, then in registration order.
    pub fn select_active(&self, clock_ms: i64) -> Vec<EntryId> {
        let mut active: Vec<&TimelineEntry<E>> = self
            .entries
            .iter()
            .filter(|entry| entry.is_active_at(clock_ms))
            .collect();
        active.sort_by_key(|entry| (entry.priority, entry.order));

        let ids: Vec<EntryId> = active.iter().map(|entry| EntryId(entry.order)).collect();
        trace!(clock_ms, active = ids.len(), "selected active entries");
        ids
    }

    /// Flips the enabled flag. Returns `false` for an unknown id.
    pub fn toggle(&mut self, id: EntryId) -> bool {
        match self.entries.get_mut(id.0) {
            Some(entry) => {
                entry.enabled = !entry.enabled;
                true
            }
            None => false,
        }
    }

    pub fn set_enabled(&mut self, id: EntryId, enabled: bool) -> bool {
        match self.entries.get_mut(id.0) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Moves the first entry called `name` to a new window and priority.
    /// Registration order and origin are kept. Returns `false` when nothing
    /// matched.
    pub fn retime(&mut self, name: &str, start_ms: i64, end_ms: i64, priority: i32) -> bool {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => {
                entry.start_ms = start_ms;
                entry.end_ms = end_ms;
                entry.priority = priority;
                true
            }
            None => false,
        }
    }

    pub fn entry(&self, id: EntryId) -> Option<&TimelineEntry<E>> {
        self.entries.get(id.0)
    }

    pub fn find(&self, name: &str) -> Option<EntryId> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .map(EntryId)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &TimelineEntry<E>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (EntryId(index), entry))
    }

    /// Runs every active entry once, in [`select_active`](Self::select_active)
    /// order.
    ///
    /// A failing entry is logged and recorded; the rest of the frame still
    /// runs. The camera is threaded through the entries in order.
    pub fn run_frame(&mut self, clock_ms: i64, camera: Option<CameraState>) -> FrameReport {
        let mut report = FrameReport {
            camera,
            ..FrameReport::default()
        };

        for id in self.select_active(clock_ms) {
            let entry = &mut self.entries[id.0];
            let mut ctx = FrameContext {
                local_ms: clock_ms - entry.origin_ms,
                clock_ms,
                camera: report.camera,
            };

            report.ran.push(id);
            match entry.owner.render(&mut ctx) {
                Ok(()) => report.camera = ctx.camera,
                Err(err) => {
                    error!(entry = %entry.name, clock_ms, error = %err, "timeline entry failed");
                    report.failed.push((id, err.to_string()));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::{Mat4, Vec3};

    use super::*;
    use crate::transform::CameraSettings;
    use crate::DemoError;

    /// `(label, local_ms, clock_ms)` per invocation.
    type Log = Rc<RefCell<Vec<(String, i64, i64)>>>;

    fn recorder(log: &Log, label: &str) -> Box<dyn Effect> {
        let log = Rc::clone(log);
        let label = label.to_string();
        Box::new(move |ctx: &mut FrameContext| -> Result<()> {
            log.borrow_mut()
                .push((label.clone(), ctx.local_ms, ctx.clock_ms));
            Ok(())
        })
    }

    fn abc(log: &Log) -> (Timeline, [EntryId; 3]) {
        let mut timeline = Timeline::new();
        let a = timeline.register(recorder(log, "A"), 0, 100, 1, "A");
        let b = timeline.register(recorder(log, "B"), 0, 100, 1, "B");
        let c = timeline.register(recorder(log, "C"), 0, 100, 0, "C");
        (timeline, [a, b, c])
    }

    fn camera_at(eye: Vec3) -> CameraState {
        CameraState {
            eye,
            target: Vec3::ZERO,
            up: Vec3::Y,
            settings: CameraSettings::default(),
            view: Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y),
        }
    }

    #[test]
    fn lower_priority_runs_first_then_registration_order() {
        let log = Log::default();
        let (timeline, [a, b, c]) = abc(&log);

        assert_eq!(timeline.select_active(50), vec![c, a, b]);
        assert!(timeline.select_active(150).is_empty());
    }

    #[test]
    fn windows_are_inclusive() {
        let log = Log::default();
        let (timeline, [a, b, c]) = abc(&log);

        assert_eq!(timeline.select_active(0), vec![c, a, b]);
        assert_eq!(timeline.select_active(100), vec![c, a, b]);
        assert!(timeline.select_active(-1).is_empty());
        assert!(timeline.select_active(101).is_empty());
    }

    #[test]
    fn toggle_disables_without_reordering() {
        let log = Log::default();
        let (mut timeline, [a, b, c]) = abc(&log);

        assert!(timeline.toggle(a));
        assert_eq!(timeline.select_active(50), vec![c, b]);
        assert!(timeline.toggle(a));
        assert_eq!(timeline.select_active(50), vec![c, a, b]);

        assert!(timeline.set_enabled(c, false));
        assert_eq!(timeline.select_active(50), vec![a, b]);
        assert!(!timeline.toggle(EntryId(99)));
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn retime_patches_the_first_matching_entry() {
        let log = Log::default();
        let (mut timeline, [a, b, c]) = abc(&log);
        let shadow = timeline.register(recorder(&log, "A2"), 0, 100, 1, "A");

        assert!(timeline.retime("A", 0, 200, -5));
        assert_eq!(timeline.select_active(50), vec![a, c, b, shadow]);
        assert_eq!(timeline.select_active(150), vec![a]);

        let patched = timeline.entry(a).unwrap();
        assert_eq!((patched.order, patched.origin_ms), (0, 0));
        assert_eq!(timeline.entry(shadow).map(|e| e.end_ms), Some(100));

        assert!(!timeline.retime("missing", 0, 1, 0));
        assert_eq!(timeline.find("B"), Some(b));
        assert_eq!(timeline.find("missing"), None);
    }

    #[test]
    fn local_time_goes_negative_when_window_opens_early() {
        let log = Log::default();
        let mut timeline = Timeline::new();
        timeline.register(recorder(&log, "intro"), 1_000, 2_000, 0, "intro");
        assert!(timeline.select_active(500).is_empty());

        assert!(timeline.retime("intro", 0, 2_000, 0));
        timeline.run_frame(400, None);
        timeline.run_frame(1_250, None);

        assert_eq!(
            *log.borrow(),
            vec![
                ("intro".to_string(), -600, 400),
                ("intro".to_string(), 250, 1_250),
            ]
        );
    }

    #[test]
    fn frame_driver_runs_entries_in_selection_order() {
        let log = Log::default();
        let (mut timeline, [a, b, c]) = abc(&log);

        let report = timeline.run_frame(50, None);
        assert_eq!(report.ran, vec![c, a, b]);
        assert!(report.failed.is_empty());
        assert_eq!(
            *log.borrow(),
            vec![
                ("C".to_string(), 50, 50),
                ("A".to_string(), 50, 50),
                ("B".to_string(), 50, 50),
            ]
        );

        assert!(timeline.run_frame(150, None).ran.is_empty());
    }

    #[test]
    fn failing_entry_does_not_stop_the_frame() {
        let log = Log::default();
        let mut timeline: Timeline = Timeline::new();
        let bad = timeline.register(
            Box::new(|_: &mut FrameContext| -> Result<()> { Err(DemoError::msg("boom")) }),
            0,
            10,
            0,
            "bad",
        );
        let good = timeline.register(recorder(&log, "good"), 0, 10, 1, "good");

        let report = timeline.run_frame(5, None);
        assert_eq!(report.ran, vec![bad, good]);
        assert_eq!(report.failed, vec![(bad, "boom".to_string())]);
        assert_eq!(*log.borrow(), vec![("good".to_string(), 5, 5)]);
    }

    #[test]
    fn camera_is_handed_to_later_entries() {
        let seen: Rc<RefCell<Vec<Option<Vec3>>>> = Rc::default();
        let mut timeline: Timeline = Timeline::new();

        let published = camera_at(Vec3::new(0.0, 0.0, 5.0));
        timeline.register(
            Box::new(move |ctx: &mut FrameContext| -> Result<()> {
                ctx.camera = Some(published);
                Ok(())
            }),
            0,
            10,
            0,
            "camera",
        );
        let observer = Rc::clone(&seen);
        timeline.register(
            Box::new(move |ctx: &mut FrameContext| -> Result<()> {
                observer.borrow_mut().push(ctx.camera.map(|c| c.eye));
                Ok(())
            }),
            0,
            10,
            1,
            "consumer",
        );

        let report = timeline.run_frame(0, Some(camera_at(Vec3::X)));
        assert_eq!(*seen.borrow(), vec![Some(Vec3::new(0.0, 0.0, 5.0))]);
        assert_eq!(report.camera.map(|c| c.eye), Some(Vec3::new(0.0, 0.0, 5.0)));

        // With the publisher out of range the caller's camera flows through.
        timeline.retime("camera", 20, 30, 0);
        let report = timeline.run_frame(0, Some(camera_at(Vec3::X)));
        assert_eq!(seen.borrow()[1], Some(Vec3::X));
        assert_eq!(report.camera.map(|c| c.eye), Some(Vec3::X));
    }
}
