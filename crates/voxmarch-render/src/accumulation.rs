//! Progressive accumulation: one noisy sample per dispatch, blended into a
//! running average that resets whenever the camera or resolution changes.

use glam::{UVec2, Vec2};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use voxmarch_core::constants::THREAD_GROUP_SIZE;
use voxmarch_core::{Result, VoxmarchError};

use crate::camera::CameraPose;

/// Render loop tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Samples after which accumulation stops until the next reset.
    pub max_samples: u32,
    /// Dispatches per rendered frame.
    pub sample_step: u32,
    /// Ray march step length in world units.
    pub march_distance: f32,
    /// Rays give up after travelling this far.
    pub max_march_distance: f32,
    /// Seed for per-sample jitter and kernel seeds.
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_samples: 256,
            sample_step: 1,
            march_distance: 0.5,
            max_march_distance: 300.0,
            seed: 0,
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<()> {
        let march_ok = self.march_distance.is_finite() && self.march_distance > 0.0;
        let max_ok =
            self.max_march_distance.is_finite() && self.max_march_distance >= self.march_distance;
        if !march_ok || !max_ok {
            return Err(VoxmarchError::InvalidArgument(format!(
                "march distance {} / max march distance {} must be positive and ordered",
                self.march_distance, self.max_march_distance
            )));
        }
        Ok(())
    }
}

/// Per-dispatch inputs handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleParams {
    pub pose: CameraPose,
    pub resolution: UVec2,
    /// Workgroups to dispatch: `ceil(resolution / 16)`.
    pub thread_groups: UVec2,
    /// Sub-pixel jitter, each component in `[0, 1)`.
    pub pixel_offset: Vec2,
    /// Kernel random seed in `[0, 1)`.
    pub seed: f32,
    /// Number of samples already in the converged buffer.
    pub sample_index: u32,
    /// Weight of this sample in the running average: `1 / (sample_index + 1)`.
    pub blend_weight: f32,
}

/// GPU side of the accumulation loop. Only `dispatch_and_blend` is required;
/// a backend without resizable targets or a display can ignore the rest.
pub trait SampleBackend {
    /// Render one sample into the target and blend it into the converged image.
    fn dispatch_and_blend(&mut self, params: &SampleParams) -> Result<()>;

    /// (Re)allocate target and converged buffers for `resolution`.
    fn resize(&mut self, _resolution: UVec2) -> Result<()> {
        Ok(())
    }

    /// Show the converged image.
    fn present(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release size-dependent resources.
    fn release(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationState {
    /// No targets allocated yet (or torn down).
    Uninitialized,
    /// Targets allocated, no samples accumulated.
    Ready,
    Accumulating,
    /// `max_samples` reached; frames only present.
    Converged,
}

/// Outcome of one `render_frame` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub dispatches: u32,
    pub sample_count: u32,
    pub state: AccumulationState,
}

/// Workgroup grid covering `resolution` with 16x16 groups.
pub fn thread_groups(resolution: UVec2) -> UVec2 {
    UVec2::new(
        resolution.x.div_ceil(THREAD_GROUP_SIZE),
        resolution.y.div_ceil(THREAD_GROUP_SIZE),
    )
}

pub struct AccumulationRenderer<B: SampleBackend> {
    backend: B,
    settings: RenderSettings,
    rng: Pcg64Mcg,
    sample_count: u32,
    elapsed_time: f32,
    resets: u64,
    resolution: Option<UVec2>,
    pose: Option<CameraPose>,
}

impl<B: SampleBackend> AccumulationRenderer<B> {
    pub fn new(backend: B, settings: RenderSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            rng: Pcg64Mcg::seed_from_u64(settings.seed),
            backend,
            settings,
            sample_count: 0,
            elapsed_time: 0.0,
            resets: 0,
            resolution: None,
            pose: None,
        })
    }

    pub fn state(&self) -> AccumulationState {
        if self.resolution.is_none() {
            AccumulationState::Uninitialized
        } else if self.sample_count >= self.settings.max_samples {
            AccumulationState::Converged
        } else if self.sample_count == 0 {
            AccumulationState::Ready
        } else {
            AccumulationState::Accumulating
        }
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Seconds since the last reset.
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    /// Number of resets since construction.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn resolution(&self) -> Option<UVec2> {
        self.resolution
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Restart accumulation. Reallocates the backend's targets when
    /// `resolution` differs from the current one.
    pub fn on_camera_or_resolution_changed(&mut self, resolution: UVec2) -> Result<()> {
        if resolution.x == 0 || resolution.y == 0 {
            return Err(VoxmarchError::InvalidArgument(format!(
                "render resolution must be non-zero, got {resolution}"
            )));
        }
        if self.resolution != Some(resolution) {
            log::debug!("Allocating accumulation targets at {resolution}");
            self.backend.resize(resolution)?;
            self.resolution = Some(resolution);
        }
        if self.sample_count > 0 {
            log::debug!(
                "Accumulation reset after {} samples ({:.2}s)",
                self.sample_count,
                self.elapsed_time
            );
        }
        self.sample_count = 0;
        self.elapsed_time = 0.0;
        self.resets += 1;
        Ok(())
    }

    /// Restart accumulation at the current resolution, e.g. after the scene
    /// changed under a still camera. A no-op before targets exist.
    pub fn reset(&mut self) -> Result<()> {
        match self.resolution {
            Some(resolution) => self.on_camera_or_resolution_changed(resolution),
            None => Ok(()),
        }
    }

    /// Per-frame tick. Resets when the pose or resolution differs from the
    /// previous frame; returns whether a reset happened.
    pub fn on_frame(
        &mut self,
        delta_time: f32,
        pose: &CameraPose,
        resolution: UVec2,
    ) -> Result<bool> {
        self.elapsed_time += delta_time;
        let pose_changed = self.pose.is_none_or(|previous| pose.changed_from(&previous));
        let resized = self.resolution != Some(resolution);
        self.pose = Some(*pose);
        if pose_changed || resized {
            self.on_camera_or_resolution_changed(resolution)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Dispatch up to `sample_step` samples, then present.
    ///
    /// Once `max_samples` is reached no dispatches happen until the next
    /// reset, but the converged image is still presented.
    pub fn render_frame(&mut self) -> Result<FrameStats> {
        let resolution = self
            .resolution
            .ok_or(VoxmarchError::NotInitialized("accumulation targets"))?;
        let pose = self
            .pose
            .ok_or(VoxmarchError::NotInitialized("camera pose"))?;

        let mut dispatches = 0;
        if self.sample_count < self.settings.max_samples {
            for _ in 0..self.settings.sample_step {
                if self.sample_count >= self.settings.max_samples {
                    break;
                }
                let params = SampleParams {
                    pose,
                    resolution,
                    thread_groups: thread_groups(resolution),
                    pixel_offset: Vec2::new(self.rng.random(), self.rng.random()),
                    seed: self.rng.random(),
                    sample_index: self.sample_count,
                    blend_weight: 1.0 / (self.sample_count as f32 + 1.0),
                };
                log::trace!(
                    "Dispatch sample {} ({} groups, offset {})",
                    params.sample_index,
                    params.thread_groups,
                    params.pixel_offset
                );
                self.backend.dispatch_and_blend(&params)?;
                self.sample_count += 1;
                dispatches += 1;
            }
            if self.sample_count >= self.settings.max_samples {
                log::info!(
                    "Accumulation converged: {} samples in {:.2}s",
                    self.sample_count,
                    self.elapsed_time
                );
            }
        }

        self.backend.present()?;

        Ok(FrameStats {
            dispatches,
            sample_count: self.sample_count,
            state: self.state(),
        })
    }

    /// Release targets and forget the camera; the next frame starts over.
    pub fn teardown(&mut self) {
        self.backend.release();
        self.resolution = None;
        self.pose = None;
        self.sample_count = 0;
        self.elapsed_time = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    /// Records calls and keeps a one-value "converged image" that blends
    /// each sample's seed exactly like the GPU blend does.
    #[derive(Default)]
    struct FakeBackend {
        resizes: Vec<UVec2>,
        dispatched: Vec<SampleParams>,
        presents: u32,
        releases: u32,
        converged: f32,
        fail_dispatch: bool,
    }

    impl SampleBackend for FakeBackend {
        fn dispatch_and_blend(&mut self, params: &SampleParams) -> Result<()> {
            if self.fail_dispatch {
                return Err(VoxmarchError::ResourceUnavailable("kernel".into()));
            }
            let w = params.blend_weight;
            self.converged = self.converged * (1.0 - w) + params.seed * w;
            self.dispatched.push(*params);
            Ok(())
        }

        fn resize(&mut self, resolution: UVec2) -> Result<()> {
            self.resizes.push(resolution);
            self.converged = 0.0;
            Ok(())
        }

        fn present(&mut self) -> Result<()> {
            self.presents += 1;
            Ok(())
        }

        fn release(&mut self) {
            self.releases += 1;
        }
    }

    fn pose(x: f32) -> CameraPose {
        CameraPose::new(
            Mat4::from_translation(glam::Vec3::new(x, 0.0, 0.0)),
            Mat4::IDENTITY,
        )
    }

    fn renderer(max_samples: u32, sample_step: u32) -> AccumulationRenderer<FakeBackend> {
        let settings = RenderSettings {
            max_samples,
            sample_step,
            seed: 7,
            ..Default::default()
        };
        AccumulationRenderer::new(FakeBackend::default(), settings).unwrap()
    }

    const RES: UVec2 = UVec2::new(100, 50);

    #[test]
    fn test_render_before_init_fails() {
        let mut r = renderer(4, 1);
        assert_eq!(r.state(), AccumulationState::Uninitialized);
        assert!(matches!(
            r.render_frame(),
            Err(VoxmarchError::NotInitialized(_))
        ));
        assert!(r.backend().dispatched.is_empty());
    }

    #[test]
    fn test_first_frame_allocates_and_resets() {
        let mut r = renderer(4, 1);
        assert!(r.on_frame(0.016, &pose(0.0), RES).unwrap());
        assert_eq!(r.state(), AccumulationState::Ready);
        assert_eq!(r.backend().resizes, vec![RES]);
        assert_eq!(r.sample_count(), 0);
        assert_eq!(r.elapsed_time(), 0.0);
    }

    #[test]
    fn test_blend_weights_are_running_average() {
        let mut r = renderer(8, 2);
        r.on_frame(0.0, &pose(0.0), RES).unwrap();
        for _ in 0..4 {
            r.render_frame().unwrap();
        }
        let weights: Vec<f32> = r.backend().dispatched.iter().map(|p| p.blend_weight).collect();
        let expected: Vec<f32> = (0..8).map(|n| 1.0 / (n as f32 + 1.0)).collect();
        assert_eq!(weights, expected);

        let seeds: Vec<f32> = r.backend().dispatched.iter().map(|p| p.seed).collect();
        let mean = seeds.iter().sum::<f32>() / seeds.len() as f32;
        assert!((r.backend().converged - mean).abs() < 1e-5);
    }

    #[test]
    fn test_no_op_after_max_samples() {
        let mut r = renderer(3, 2);
        r.on_frame(0.0, &pose(0.0), RES).unwrap();
        let first = r.render_frame().unwrap();
        assert_eq!(first.dispatches, 2);
        assert_eq!(first.state, AccumulationState::Accumulating);
        let second = r.render_frame().unwrap();
        assert_eq!(second.dispatches, 1);
        assert_eq!(second.state, AccumulationState::Converged);

        let converged = r.backend().converged;
        for _ in 0..5 {
            assert!(!r.on_frame(0.016, &pose(0.0), RES).unwrap());
            let stats = r.render_frame().unwrap();
            assert_eq!(stats.dispatches, 0);
            assert_eq!(stats.sample_count, 3);
        }
        assert_eq!(r.backend().dispatched.len(), 3);
        assert_eq!(r.backend().converged, converged);
        // Presented every frame, converged or not.
        assert_eq!(r.backend().presents, 7);
    }

    #[test]
    fn test_camera_change_resets_without_reallocating() {
        let mut r = renderer(4, 4);
        r.on_frame(0.0, &pose(0.0), RES).unwrap();
        r.render_frame().unwrap();
        assert_eq!(r.state(), AccumulationState::Converged);

        r.on_frame(0.5, &pose(0.0), RES).unwrap();
        assert!((r.elapsed_time() - 0.5).abs() < 1e-6);

        assert!(r.on_frame(0.016, &pose(1.0), RES).unwrap());
        assert_eq!(r.sample_count(), 0);
        assert_eq!(r.elapsed_time(), 0.0);
        assert_eq!(r.state(), AccumulationState::Ready);
        assert_eq!(r.backend().resizes.len(), 1);

        r.render_frame().unwrap();
        assert_eq!(r.backend().dispatched[4].sample_index, 0);
        assert_eq!(r.backend().dispatched[4].blend_weight, 1.0);
        assert_eq!(r.backend().dispatched[4].pose, pose(1.0));
    }

    #[test]
    fn test_resolution_change_reallocates() {
        let mut r = renderer(4, 1);
        r.on_frame(0.0, &pose(0.0), RES).unwrap();
        r.render_frame().unwrap();
        let bigger = UVec2::new(33, 17);
        assert!(r.on_frame(0.0, &pose(0.0), bigger).unwrap());
        assert_eq!(r.backend().resizes, vec![RES, bigger]);
        r.render_frame().unwrap();
        let last = r.backend().dispatched.last().unwrap();
        assert_eq!(last.thread_groups, UVec2::new(3, 2));
        assert_eq!(last.resolution, bigger);
    }

    #[test]
    fn test_thread_groups_round_up() {
        assert_eq!(thread_groups(UVec2::new(16, 16)), UVec2::new(1, 1));
        assert_eq!(thread_groups(UVec2::new(17, 1)), UVec2::new(2, 1));
        assert_eq!(thread_groups(UVec2::new(1920, 1080)), UVec2::new(120, 68));
    }

    #[test]
    fn test_jitter_in_unit_square() {
        let mut r = renderer(64, 64);
        r.on_frame(0.0, &pose(0.0), RES).unwrap();
        r.render_frame().unwrap();
        for p in &r.backend().dispatched {
            assert!((0.0..1.0).contains(&p.pixel_offset.x));
            assert!((0.0..1.0).contains(&p.pixel_offset.y));
            assert!((0.0..1.0).contains(&p.seed));
        }
    }

    #[test]
    fn test_dispatch_error_propagates() {
        let mut r = renderer(4, 1);
        r.on_frame(0.0, &pose(0.0), RES).unwrap();
        r.backend_mut().fail_dispatch = true;
        assert!(matches!(
            r.render_frame(),
            Err(VoxmarchError::ResourceUnavailable(_))
        ));
        assert_eq!(r.sample_count(), 0);
    }

    #[test]
    fn test_reset_keeps_targets() {
        let mut r = renderer(4, 2);
        r.reset().unwrap();
        assert_eq!(r.resets(), 0);

        r.on_frame(0.0, &pose(0.0), RES).unwrap();
        r.render_frame().unwrap();
        assert_eq!(r.sample_count(), 2);
        r.reset().unwrap();
        assert_eq!(r.sample_count(), 0);
        assert_eq!(r.resets(), 2);
        assert_eq!(r.backend().resizes.len(), 1);
    }

    #[test]
    fn test_teardown_returns_to_uninitialized() {
        let mut r = renderer(4, 1);
        r.on_frame(0.0, &pose(0.0), RES).unwrap();
        r.render_frame().unwrap();
        r.teardown();
        assert_eq!(r.state(), AccumulationState::Uninitialized);
        assert_eq!(r.backend().releases, 1);
        assert!(r.render_frame().is_err());
        assert!(r.on_frame(0.0, &pose(0.0), RES).unwrap());
        assert_eq!(r.backend().resizes.len(), 2);
    }

    #[test]
    fn test_invalid_settings_and_resolution() {
        let bad = RenderSettings {
            march_distance: 0.0,
            ..Default::default()
        };
        assert!(AccumulationRenderer::new(FakeBackend::default(), bad).is_err());
        let mut r = renderer(4, 1);
        assert!(r.on_camera_or_resolution_changed(UVec2::new(0, 4)).is_err());
    }

    #[test]
    fn test_settings_from_ron() {
        let s: RenderSettings = ron::from_str("(max_samples: 32, sample_step: 4)").unwrap();
        assert_eq!(s.max_samples, 32);
        assert_eq!(s.sample_step, 4);
        assert_eq!(s.march_distance, RenderSettings::default().march_distance);
    }
}
