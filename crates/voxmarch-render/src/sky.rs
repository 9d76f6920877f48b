//! Skybox for rays that leave the world.
//! The kernel samples `_SkyboxTexture` as an equirectangular map. When no image
//! is supplied, a gradient is generated with a squared falloff:
//! t = (dir.y * 0.5 + 0.5)^2.

use glam::Vec3;

/// Default sky zenith color (deep blue, looking straight up).
pub const DEFAULT_SKY_ZENITH: [f32; 3] = [0.1, 0.15, 0.4];

/// Default sky horizon color (warm haze at the horizon).
pub const DEFAULT_SKY_HORIZON: [f32; 3] = [0.5, 0.45, 0.35];

/// Default generated skybox size.
pub const DEFAULT_SKY_WIDTH: u32 = 256;
pub const DEFAULT_SKY_HEIGHT: u32 = 128;

/// Equirectangular RGBA8 image, rows top (zenith) to bottom (nadir).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkyImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SkyImage {
    /// Generate the gradient sky. Azimuth does not affect color, so every
    /// row is a single color.
    pub fn gradient(width: u32, height: u32, zenith: [f32; 3], horizon: [f32; 3]) -> Self {
        let zenith = Vec3::from_array(zenith);
        let horizon = Vec3::from_array(horizon);
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);

        for row in 0..height {
            let polar = std::f32::consts::PI * (row as f32 + 0.5) / height as f32;
            let color = sky_color(polar.cos(), zenith, horizon);
            let texel = [
                to_unorm8(color.x),
                to_unorm8(color.y),
                to_unorm8(color.z),
                255,
            ];
            for _ in 0..width {
                pixels.extend_from_slice(&texel);
            }
        }

        Self {
            width,
            height,
            pixels,
        }
    }

    /// RGBA of the texel at `(x, y)`.
    pub fn texel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl Default for SkyImage {
    fn default() -> Self {
        Self::gradient(
            DEFAULT_SKY_WIDTH,
            DEFAULT_SKY_HEIGHT,
            DEFAULT_SKY_ZENITH,
            DEFAULT_SKY_HORIZON,
        )
    }
}

/// Gradient color for a ray whose direction has vertical component `dir_y`.
pub fn sky_color(dir_y: f32, zenith: Vec3, horizon: Vec3) -> Vec3 {
    let t = (dir_y.clamp(-1.0, 1.0) * 0.5 + 0.5).powi(2);
    horizon.lerp(zenith, t)
}

fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sky_colors_valid() {
        for c in DEFAULT_SKY_ZENITH.into_iter().chain(DEFAULT_SKY_HORIZON) {
            assert!((0.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn test_gradient_size() {
        let sky = SkyImage::gradient(8, 4, DEFAULT_SKY_ZENITH, DEFAULT_SKY_HORIZON);
        assert_eq!(sky.pixels.len(), 8 * 4 * 4);
        assert_eq!(sky.texel(8, 0), None);
    }

    #[test]
    fn test_top_row_near_zenith() {
        let sky = SkyImage::gradient(4, 64, [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]);
        let top = sky.texel(0, 0).unwrap();
        let bottom = sky.texel(0, 63).unwrap();
        assert!(top[2] > 250 && top[0] < 5);
        assert!(bottom[0] > 250 && bottom[2] < 5);
        assert_eq!(top[3], 255);
    }

    #[test]
    fn test_rows_are_uniform() {
        let sky = SkyImage::default();
        for y in [0, 40, 127] {
            let first = sky.texel(0, y);
            assert!((0..sky.width).all(|x| sky.texel(x, y) == first));
        }
    }

    #[test]
    fn test_sky_color_endpoints() {
        let z = Vec3::from_array(DEFAULT_SKY_ZENITH);
        let h = Vec3::from_array(DEFAULT_SKY_HORIZON);
        assert!(sky_color(1.0, z, h).abs_diff_eq(z, 1e-6));
        assert!(sky_color(-1.0, z, h).abs_diff_eq(h, 1e-6));
    }
}
