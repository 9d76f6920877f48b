use std::time::Instant;

use voxmarch_core::types::VoxelType;
use voxmarch_core::Result;
use voxmarch_render::{
    AccumulationRenderer, GpuContext, GpuRayMarcher, KernelSource, SceneInputs,
};
use voxmarch_world::World;

use crate::config::RunnerConfig;
use crate::report::RenderReport;

/// Yaw applied at each orbit step, in radians.
const ORBIT_STEP_RAD: f32 = 0.05;

/// Timing data for a series of frames.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// One rendered frame.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameRecord {
    pub frame: u32,
    pub time_ms: f64,
    pub dispatches: u32,
    pub sample_count: u32,
    /// Whether accumulation restarted at the start of this frame.
    pub reset: bool,
}

/// Whether the camera moves before `frame`. Frame 0 never moves.
pub fn should_orbit(frame: u32, orbit_every: u32) -> bool {
    orbit_every > 0 && frame > 0 && frame.is_multiple_of(orbit_every)
}

/// Generate the world and scene, render `config.frames` frames offscreen
/// and collect timings.
pub fn run(config: &RunnerConfig) -> Result<RenderReport> {
    let start = Instant::now();
    let mut world = World::generate(config.world.clone())?;
    let histogram = world.type_histogram()?;
    let texture = world.build_voxel_texture()?;
    log::info!(
        "Generated world {} in {:.1}ms",
        texture.extent(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let spheres = config.scene.place()?;

    log::info!("Initializing GPU...");
    let context = GpuContext::headless()?;
    let adapter = context.adapter_name.clone();
    let backend_name = context.backend.clone();

    let kernel = KernelSource::from_path(config.kernel_path.clone());
    let marcher = GpuRayMarcher::new(
        context,
        &kernel,
        &config.render,
        SceneInputs {
            world: &texture,
            spheres: &spheres,
            light: config.light,
            sky: None,
        },
    )?;
    let mut renderer = AccumulationRenderer::new(marcher, config.render.clone())?;

    let mut camera = config.camera.clone();
    let mut frames = Vec::with_capacity(config.frames as usize);
    let mut delta_time = 0.0f32;

    for frame in 0..config.frames {
        if should_orbit(frame, config.orbit_every) {
            camera.orbit(ORBIT_STEP_RAD, 0.0);
        }
        let pose = camera.pose(config.resolution)?;

        let frame_start = Instant::now();
        let reset = renderer.on_frame(delta_time, &pose, config.resolution)?;
        let stats = renderer.render_frame()?;
        renderer.backend().wait_idle();
        let elapsed = frame_start.elapsed().as_secs_f64() * 1000.0;
        delta_time = (elapsed / 1000.0) as f32;

        frames.push(FrameRecord {
            frame,
            time_ms: elapsed,
            dispatches: stats.dispatches,
            sample_count: stats.sample_count,
            reset,
        });
    }

    let times: Vec<f64> = frames.iter().map(|f| f.time_ms).collect();
    let timings = compute_timings(&times);
    log::info!(
        "  Done: mean={:.2}ms, p95={:.2}ms, p99={:.2}ms",
        timings.mean_ms,
        timings.p95_ms,
        timings.p99_ms
    );

    let report = RenderReport {
        adapter,
        backend: backend_name,
        resolution: config.resolution.to_array(),
        final_sample_count: renderer.sample_count(),
        resets: renderer.resets(),
        sphere_count: spheres.len() as u32,
        voxel_histogram: VoxelType::ALL
            .iter()
            .zip(histogram)
            .map(|(ty, count)| (format!("{ty:?}"), count))
            .collect(),
        timings,
        frames,
    };

    renderer.teardown();
    world.teardown();
    Ok(report)
}

/// Compute timing statistics from a list of frame times in milliseconds.
pub fn compute_timings(times: &[f64]) -> TimingSeries {
    if times.is_empty() {
        return TimingSeries {
            mean_ms: 0.0,
            median_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
        };
    }

    let mut sorted = times.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n.is_multiple_of(2) {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    // Nearest rank: the ceil(n * p)-th smallest sample, 1-based.
    let percentile = |p: f64| {
        let rank = ((n as f64) * p).ceil() as usize;
        sorted[rank.saturating_sub(1).min(n - 1)]
    };

    TimingSeries {
        mean_ms: mean,
        median_ms: median,
        p95_ms: percentile(0.95),
        p99_ms: percentile(0.99),
        min_ms: sorted[0],
        max_ms: sorted[n - 1],
    }
}
