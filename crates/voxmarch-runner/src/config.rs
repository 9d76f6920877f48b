use std::path::{Path, PathBuf};

use glam::UVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use voxmarch_render::{LightConfig, OrbitCamera, RenderSettings, SceneConfig};
use voxmarch_world::WorldConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    ReadError { path: String, message: String },
    #[error("Failed to parse config RON: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Everything one headless run needs. Every section may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub world: WorldConfig,
    pub scene: SceneConfig,
    pub render: RenderSettings,
    pub light: LightConfig,
    pub camera: OrbitCamera,
    pub resolution: UVec2,
    pub frames: u32,
    /// Nudge the camera every this many frames; 0 keeps it still.
    pub orbit_every: u32,
    /// Ray march kernel to load instead of the built-in one.
    pub kernel_path: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            scene: SceneConfig::default(),
            render: RenderSettings::default(),
            light: LightConfig::default(),
            camera: OrbitCamera::default(),
            resolution: UVec2::new(640, 480),
            frames: 120,
            orbit_every: 30,
            kernel_path: None,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution.x == 0 || self.resolution.y == 0 {
            return Err(ConfigError::Invalid(format!(
                "resolution must be non-zero, got {}",
                self.resolution
            )));
        }
        if self.frames == 0 {
            return Err(ConfigError::Invalid("frames must be at least 1".into()));
        }
        Ok(())
    }
}

/// Parse a runner config from a RON string.
pub fn load_config_from_str(ron_str: &str) -> Result<RunnerConfig, ConfigError> {
    let options = ron::Options::default();
    options
        .from_str(ron_str)
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Read and parse a runner config file.
pub fn load_config(path: &Path) -> Result<RunnerConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    load_config_from_str(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;
    use voxmarch_world::texture::TextureLayout;

    #[test]
    fn test_empty_config_is_default() {
        let config = load_config_from_str("()").unwrap();
        assert_eq!(config, RunnerConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config = load_config_from_str(
            r#"(
                world: (max_chunks: (2, 1, 2), layout: RowMajor),
                scene: (sphere_count: 10, radius_range: (1.0, 2.0)),
                render: (max_samples: 16),
                resolution: (320, 200),
                frames: 8,
                kernel_path: Some("shaders/custom.wgsl"),
            )"#,
        )
        .unwrap();
        assert_eq!(config.world.max_chunks, UVec3::new(2, 1, 2));
        assert_eq!(config.world.layout, TextureLayout::RowMajor);
        assert_eq!(config.scene.sphere_count, 10);
        assert_eq!(config.scene.radius_range, (1.0, 2.0));
        assert_eq!(config.render.max_samples, 16);
        assert_eq!(config.render.sample_step, 1);
        assert_eq!(config.resolution, UVec2::new(320, 200));
        assert_eq!(config.frames, 8);
        assert_eq!(
            config.kernel_path,
            Some(PathBuf::from("shaders/custom.wgsl"))
        );
    }

    #[test]
    fn test_parse_error() {
        let err = load_config_from_str("(frames: \"many\")").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/voxmarch.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_validate_rejects_empty_output() {
        let config = RunnerConfig {
            resolution: UVec2::new(0, 480),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = RunnerConfig {
            frames: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_config_parses() {
        let config =
            load_config_from_str(include_str!("../../../config/voxmarch.ron")).unwrap();
        assert!(config.validate().is_ok());
    }
}
