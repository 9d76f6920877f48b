//! Random sphere scatter for the path-traced overlay.

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use voxmarch_core::constants::{
    DIELECTRIC_SPECULAR, EMISSION_BOOST_MIN, EMISSION_BOOST_SPAN, EMISSIVE_PROBABILITY,
    EMISSIVE_RADIUS_FRACTION, METAL_PROBABILITY, SPHERE_FLOATS,
};
use voxmarch_core::{Result, VoxmarchError};

/// Random stream used for scene setup.
pub type SceneRng = Pcg64Mcg;

/// GPU-uploadable sphere. Field order matches the kernel's `sphereBuffer`
/// (14 packed floats per sphere).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Sphere {
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
    pub smoothness: f32,
    pub emission: [f32; 3],
    pub radius: f32,
    pub position: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<Sphere>() == SPHERE_FLOATS * 4);

impl Sphere {
    pub fn center(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn is_metal(&self) -> bool {
        self.albedo == [0.0; 3]
    }

    pub fn is_emissive(&self) -> bool {
        self.emission != [0.0; 3]
    }

    /// Whether the two spheres' bounding circles overlap.
    pub fn overlaps(&self, other: &Sphere) -> bool {
        let min_dist = self.radius + other.radius;
        self.center().distance_squared(other.center()) < min_dist * min_dist
    }
}

/// Scatter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub seed: u64,
    /// Number of placement attempts; rejected attempts are not retried.
    pub sphere_count: u32,
    /// Radius drawn uniformly from `[min, max)`.
    pub radius_range: (f32, f32),
    /// Centers are drawn uniformly inside a disk of this radius on the y=0 plane.
    pub placement_radius: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            sphere_count: 100,
            radius_range: (3.0, 8.0),
            placement_radius: 100.0,
        }
    }
}

impl SceneConfig {
    pub fn place(&self) -> Result<Vec<Sphere>> {
        place_spheres(
            self.seed,
            self.sphere_count,
            self.radius_range,
            self.placement_radius,
        )
    }
}

/// Place up to `count` non-overlapping spheres from a stream seeded with `seed`.
///
/// Each attempt draws a radius and a disk position; an attempt whose bounding
/// circle overlaps an accepted sphere is skipped. Accepted spheres then draw
/// an HSV colour, a metal flip, an emissive flip (only honoured below 75% of
/// the maximum radius), a smoothness and, when emissive, a boost in `[1, 11)`.
pub fn place_spheres(
    seed: u64,
    count: u32,
    radius_range: (f32, f32),
    placement_radius: f32,
) -> Result<Vec<Sphere>> {
    let (min_radius, max_radius) = radius_range;
    let valid = min_radius.is_finite()
        && max_radius.is_finite()
        && placement_radius.is_finite()
        && min_radius >= 0.0
        && min_radius <= max_radius
        && placement_radius >= 0.0;
    if !valid {
        return Err(VoxmarchError::InvalidArgument(format!(
            "sphere radius range {radius_range:?} / placement radius {placement_radius} \
             must be finite, non-negative and ordered"
        )));
    }

    let mut rng = SceneRng::seed_from_u64(seed);
    // Accepted spheres are bounded by the disk area, not by `count`.
    let mut spheres: Vec<Sphere> = Vec::new();

    for _ in 0..count {
        let radius = min_radius + rng.random::<f32>() * (max_radius - min_radius);
        let disk = inside_unit_circle(&mut rng) * placement_radius;
        let mut sphere = Sphere {
            albedo: [0.0; 3],
            specular: [0.0; 3],
            smoothness: 0.0,
            emission: [0.0; 3],
            radius,
            position: [disk.x, 0.0, disk.y],
        };

        if spheres.iter().any(|other| sphere.overlaps(other)) {
            continue;
        }

        let color = random_hsv(&mut rng);
        let metal = rng.random::<f32>() < METAL_PROBABILITY;
        let emissive_roll = rng.random::<f32>() < EMISSIVE_PROBABILITY;
        let emissive = emissive_roll && radius < max_radius * EMISSIVE_RADIUS_FRACTION;

        if metal {
            sphere.albedo = [0.0; 3];
            sphere.specular = color.to_array();
        } else {
            sphere.albedo = color.to_array();
            sphere.specular = [DIELECTRIC_SPECULAR; 3];
        }
        sphere.smoothness = rng.random::<f32>();
        if emissive {
            let boost = rng.random::<f32>() * EMISSION_BOOST_SPAN + EMISSION_BOOST_MIN;
            sphere.emission = (color * boost).to_array();
        }

        spheres.push(sphere);
    }

    let accepted = spheres.len();
    if accepted == 0 && count > 0 {
        log::warn!("Sphere placement accepted none of {count} attempts");
    } else {
        log::info!("Placed {accepted} of {count} spheres (seed {seed})");
    }
    Ok(spheres)
}

/// Uniform point inside the unit disk.
fn inside_unit_circle<R: Rng>(rng: &mut R) -> Vec2 {
    let r = rng.random::<f32>().sqrt();
    let theta = rng.random::<f32>() * std::f32::consts::TAU;
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Colour with hue, saturation and value each uniform in `[0, 1)`.
fn random_hsv<R: Rng>(rng: &mut R) -> Vec3 {
    let h = rng.random::<f32>();
    let s = rng.random::<f32>();
    let v = rng.random::<f32>();
    hsv_to_rgb(h, s, v)
}

/// HSV (all components in `[0, 1]`) to linear RGB.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let h6 = (h.rem_euclid(1.0)) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as u32 {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_layout_is_14_floats() {
        let sphere = Sphere {
            albedo: [1.0, 2.0, 3.0],
            specular: [4.0, 5.0, 6.0],
            smoothness: 7.0,
            emission: [8.0, 9.0, 10.0],
            radius: 11.0,
            position: [12.0, 13.0, 14.0],
        };
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&sphere));
        let expected: Vec<f32> = (1..=14).map(|i| i as f32).collect();
        assert_eq!(floats, expected.as_slice());
    }

    #[test]
    fn test_no_overlaps_for_many_seeds() {
        for seed in 0..25 {
            let spheres = place_spheres(seed, 200, (3.0, 8.0), 60.0).unwrap();
            for (i, a) in spheres.iter().enumerate() {
                for b in &spheres[i + 1..] {
                    let d = a.center().distance(b.center());
                    assert!(d >= a.radius + b.radius, "seed {seed}: overlap {d}");
                }
            }
        }
    }

    #[test]
    fn test_deterministic_per_seed() {
        let a = place_spheres(17, 100, (3.0, 8.0), 100.0).unwrap();
        let b = place_spheres(17, 100, (3.0, 8.0), 100.0).unwrap();
        assert_eq!(a, b);
        let c = place_spheres(18, 100, (3.0, 8.0), 100.0).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_count_is_an_upper_bound() {
        let spheres = place_spheres(1, 500, (3.0, 8.0), 30.0).unwrap();
        assert!(!spheres.is_empty());
        assert!(spheres.len() < 500, "dense disk must reject some attempts");
        assert!(place_spheres(1, 0, (3.0, 8.0), 30.0).unwrap().is_empty());
    }

    #[test]
    fn test_placement_within_disk_on_ground_plane() {
        let spheres = place_spheres(5, 100, (1.0, 2.0), 40.0).unwrap();
        for s in &spheres {
            assert_eq!(s.position[1], 0.0);
            let r = Vec2::new(s.position[0], s.position[2]).length();
            assert!(r <= 40.0 + 1e-3);
            assert!(s.radius >= 1.0 && s.radius < 2.0);
        }
    }

    #[test]
    fn test_material_branches() {
        let spheres = place_spheres(9, 300, (3.0, 8.0), 200.0).unwrap();
        for s in &spheres {
            if s.is_metal() {
                assert_eq!(s.albedo, [0.0; 3]);
            } else {
                assert_eq!(s.specular, [DIELECTRIC_SPECULAR; 3]);
            }
            if s.is_emissive() {
                assert!(s.radius < 8.0 * EMISSIVE_RADIUS_FRACTION);
            }
            assert!((0.0..1.0).contains(&s.smoothness));
        }
        assert!(spheres.iter().any(|s| s.is_metal()));
        assert!(spheres.iter().any(|s| !s.is_metal()));
        assert!(spheres.iter().any(|s| s.is_emissive()));
    }

    #[test]
    fn test_all_collide_yields_zero_after_first() {
        // Zero placement radius stacks every attempt at the origin.
        let spheres = place_spheres(3, 10, (1.0, 2.0), 0.0).unwrap();
        assert_eq!(spheres.len(), 1);
    }

    #[test]
    fn test_many_attempts_allocate_for_accepted_only() {
        let spheres = place_spheres(0, 200_000, (1.0, 2.0), 0.0).unwrap();
        assert_eq!(spheres.len(), 1);
        assert!(spheres.capacity() < 64, "capacity {}", spheres.capacity());
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(place_spheres(0, 10, (8.0, 3.0), 10.0).is_err());
        assert!(place_spheres(0, 10, (-1.0, 3.0), 10.0).is_err());
        assert!(place_spheres(0, 10, (1.0, f32::NAN), 10.0).is_err());
        assert!(place_spheres(0, 10, (1.0, 2.0), -5.0).is_err());
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(hsv_to_rgb(0.0, 0.0, 0.5), Vec3::splat(0.5));
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!((green - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);
    }
}
