use glam::{Mat4, UVec2, Vec3};
use serde::{Deserialize, Serialize};
use voxmarch_core::{Result, VoxmarchError};

/// Matrices below this per-element difference count as the same pose.
const POSE_EPSILON: f32 = 1e-6;

/// Per-frame camera state consumed by the ray march kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub camera_to_world: Mat4,
    pub inverse_projection: Mat4,
}

impl CameraPose {
    pub fn new(camera_to_world: Mat4, inverse_projection: Mat4) -> Self {
        Self {
            camera_to_world,
            inverse_projection,
        }
    }

    /// Whether moving from `previous` to this pose invalidates accumulation.
    pub fn changed_from(&self, previous: &CameraPose) -> bool {
        !self
            .camera_to_world
            .abs_diff_eq(previous.camera_to_world, POSE_EPSILON)
            || !self
                .inverse_projection
                .abs_diff_eq(previous.inverse_projection, POSE_EPSILON)
    }

    pub fn position(&self) -> Vec3 {
        self.camera_to_world.w_axis.truncate()
    }
}

/// Orbit camera around a target point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y_rad: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::splat(32.0),
            distance: 120.0,
            yaw: std::f32::consts::FRAC_PI_4,
            pitch: -0.4,
            fov_y_rad: std::f32::consts::FRAC_PI_3,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl OrbitCamera {
    pub fn new(target: Vec3, distance: f32) -> Self {
        Self {
            target,
            distance,
            ..Default::default()
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Rotate by `d_yaw`/`d_pitch` radians. Pitch stays short of the poles.
    pub fn orbit(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw += d_yaw;
        self.pitch = (self.pitch + d_pitch).clamp(-1.5, 1.5);
    }

    /// Move toward the target by a fraction of the current distance.
    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance - delta * self.distance * 0.1)
            .max(1.0)
            .min(self.far * 0.5);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_rad, aspect, self.near, self.far)
    }

    /// Pose for an output of `resolution` pixels.
    pub fn pose(&self, resolution: UVec2) -> Result<CameraPose> {
        if resolution.x == 0 || resolution.y == 0 {
            return Err(VoxmarchError::InvalidArgument(format!(
                "camera resolution must be non-zero, got {resolution}"
            )));
        }
        let aspect = resolution.x as f32 / resolution.y as f32;
        Ok(CameraPose::new(
            self.view().inverse(),
            self.projection(aspect).inverse(),
        ))
    }
}
