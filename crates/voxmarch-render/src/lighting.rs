use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use voxmarch_core::{Result, VoxmarchError};

/// Directional light: the direction light travels plus an intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub direction: Vec3,
    pub intensity: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.4, -1.0, 0.3),
            intensity: 1.0,
        }
    }
}

impl LightConfig {
    /// Kernel `directionalLight`: normalized direction in xyz, intensity in w.
    pub fn to_vec4(&self) -> Result<Vec4> {
        let direction = self.direction.try_normalize().ok_or_else(|| {
            VoxmarchError::InvalidArgument(format!(
                "light direction {} cannot be normalized",
                self.direction
            ))
        })?;
        if !self.intensity.is_finite() || self.intensity < 0.0 {
            return Err(VoxmarchError::InvalidArgument(format!(
                "light intensity must be finite and non-negative, got {}",
                self.intensity
            )));
        }
        Ok(direction.extend(self.intensity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packs_direction_and_intensity() {
        let light = LightConfig {
            direction: Vec3::new(0.0, -2.0, 0.0),
            intensity: 1.5,
        };
        assert_eq!(light.to_vec4().unwrap(), Vec4::new(0.0, -1.0, 0.0, 1.5));
    }

    #[test]
    fn test_default_is_unit_length() {
        let v = LightConfig::default().to_vec4().unwrap();
        assert!((v.truncate().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_light_rejected() {
        let zero = LightConfig {
            direction: Vec3::ZERO,
            intensity: 1.0,
        };
        assert!(zero.to_vec4().is_err());
        let negative = LightConfig {
            intensity: -1.0,
            ..Default::default()
        };
        assert!(negative.to_vec4().is_err());
    }
}
