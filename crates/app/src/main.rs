use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use demoplay_core::{
    load_scene, AppConfig, DemoError, FrameStepper, PlaybackClock, Scene, Timeline,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod effects;

fn main() -> demoplay_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { scene, json } => run_inspect(&scene, json),
        Commands::Play {
            scene,
            config,
            from_ms,
            to_ms,
            fps,
        } => run_play(&scene, config.as_deref(), from_ms, to_ms, fps),
    }
}

#[derive(Debug, Serialize)]
struct SceneSummary<'a> {
    frames: (u32, u32),
    materials: Vec<&'a str>,
    objects: Vec<&'a str>,
    cameras: Vec<&'a str>,
    lights: Vec<&'a str>,
    helpers: Vec<&'a str>,
    diagnostics: Vec<String>,
}

impl<'a> SceneSummary<'a> {
    fn new(scene: &'a Scene) -> Self {
        Self {
            frames: scene.frame_range(),
            materials: scene
                .materials
                .iter()
                .flat_map(|m| m.walk())
                .map(|m| m.name.as_str())
                .collect(),
            objects: scene.objects.iter().map(|o| o.name.as_str()).collect(),
            cameras: scene.cameras.iter().map(|c| c.name.as_str()).collect(),
            lights: scene.lights.iter().map(|l| l.name.as_str()).collect(),
            helpers: scene.helpers.iter().map(|h| h.name.as_str()).collect(),
            diagnostics: scene.diagnostics.iter().map(|d| d.to_string()).collect(),
        }
    }
}

fn run_inspect(path: &Path, json: bool) -> demoplay_core::Result<()> {
    let scene = load_scene(path)?;
    let summary = SceneSummary::new(&scene);

    if json {
        let text = serde_json::to_string_pretty(&summary)
            .map_err(|err| DemoError::msg(format!("cannot render summary: {err}")))?;
        println!("{text}");
        return Ok(());
    }

    let counts = scene.counts();
    println!("{}", path.display());
    println!("  frames      {}..={}", summary.frames.0, summary.frames.1);
    println!("  materials   {}", summary.materials.join(", "));
    println!("  objects     {} ({})", counts.objects, summary.objects.join(", "));
    println!("  cameras     {} ({})", counts.cameras, summary.cameras.join(", "));
    println!("  lights      {} ({})", counts.lights, summary.lights.join(", "));
    println!("  helpers     {} ({})", counts.helpers, summary.helpers.join(", "));
    println!(
        "  tracks      {} position, {} rotation, {} scale",
        counts.position_tracks, counts.rotation_tracks, counts.scale_tracks
    );
    for diagnostic in &summary.diagnostics {
        println!("  warning: {diagnostic}");
    }
    Ok(())
}

fn run_play(
    path: &Path,
    config: Option<&Path>,
    from_ms: Option<i64>,
    to_ms: Option<i64>,
    fps: Option<u32>,
) -> demoplay_core::Result<()> {
    let scene = Rc::new(load_scene(path)?);
    let config = match config {
        Some(config) => AppConfig::load(config)?,
        None => AppConfig::default(),
    };
    let playback = &config.playback;

    let mut timeline: Timeline = Timeline::new();
    for entry in &config.timeline {
        let effect = effects::build(&scene, &entry.effect, playback.frames_per_second)?;
        let id = timeline.register(
            effect,
            entry.start_ms,
            entry.end_ms,
            entry.priority,
            &entry.name,
        );
        timeline.set_enabled(id, entry.enabled);
    }
    for patch in &config.retime {
        if !timeline.retime(&patch.name, patch.start_ms, patch.end_ms, patch.priority) {
            tracing::warn!(name = %patch.name, "retime names no registered entry");
        }
    }

    let from_ms = from_ms.unwrap_or(playback.start_ms);
    let to_ms = to_ms
        .or(playback.end_ms)
        .or_else(|| timeline.iter().map(|(_, entry)| entry.end_ms).max())
        .unwrap_or_else(|| scene_end_ms(&scene, playback.frames_per_second));
    let fps = fps.unwrap_or(playback.render_fps);

    let mut clock = PlaybackClock::new();
    if let Some(length) = playback.soundtrack_length_ms {
        clock = clock.with_length(length);
    }

    tracing::info!(
        scene = %path.display(),
        entries = timeline.len(),
        from_ms,
        to_ms,
        fps,
        "starting playback"
    );

    let mut frames = 0usize;
    let mut failures = 0usize;
    for time in FrameStepper::new(from_ms, to_ms, fps) {
        clock.seek(time);
        let report = timeline.run_frame(clock.now_ms(), None);
        frames += 1;
        failures += report.failed.len();
        if clock.finished() {
            tracing::info!(now_ms = clock.now_ms(), "soundtrack finished");
            break;
        }
    }

    tracing::info!(frames, failures, "playback complete");
    Ok(())
}

fn scene_end_ms(scene: &Scene, frames_per_second: f32) -> i64 {
    let (_, last) = scene.frame_range();
    (f64::from(last) * 1000.0 / f64::from(frames_per_second.max(1.0))).round() as i64
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Binary demo scene player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a scene file and print what it contains.
    Inspect {
        /// Path to the scene file.
        scene: PathBuf,
        /// Emit the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Replay a scene through the timeline described by a config file.
    Play {
        /// Path to the scene file.
        scene: PathBuf,
        /// JSON timeline and playback configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// First clock time to render, in milliseconds.
        #[arg(long)]
        from_ms: Option<i64>,
        /// Last clock time to render, in milliseconds.
        #[arg(long)]
        to_ms: Option<i64>,
        /// Frames per second to drive the timeline at.
        #[arg(long)]
        fps: Option<u32>,
    },
}
