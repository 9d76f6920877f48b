//! Grid traversal along a ray (digital differential analyzer).
//!
//! `march` yields every unit cell the ray enters, one axis step at a time,
//! starting from the cell containing the origin (which is not yielded).
//! The traversal is a pure function of its inputs: clone the returned
//! iterator, or call `march` again, to restart it.

use glam::{IVec3, Vec3};

use crate::constants::DEFAULT_DDA_STEPS;
use crate::error::{Result, VoxmarchError};

/// Lazy, finite cell sequence produced by [`march`].
#[derive(Debug, Clone)]
pub struct DdaMarch {
    cell: IVec3,
    step: IVec3,
    t_max: Vec3,
    t_delta: Vec3,
    remaining: usize,
}

/// Traverse the grid from `origin` along `direction` for `max_steps` cells.
///
/// Axes whose direction component is zero (or so small that its reciprocal
/// overflows) get an infinite boundary distance so they never step. A
/// non-finite direction, or one where no axis can step, is rejected instead
/// of producing a traversal that never advances.
pub fn march(origin: Vec3, direction: Vec3, max_steps: usize) -> Result<DdaMarch> {
    if !origin.is_finite() {
        return Err(VoxmarchError::InvalidArgument(format!(
            "ray origin must be finite, got {origin}"
        )));
    }
    if !direction.is_finite() || direction == Vec3::ZERO {
        return Err(VoxmarchError::InvalidArgument(format!(
            "ray direction must be finite and non-zero, got {direction}"
        )));
    }

    let start = origin.floor();
    let cell = start.as_ivec3();
    let mut step = IVec3::ZERO;
    let mut t_max = Vec3::splat(f32::INFINITY);
    let mut t_delta = Vec3::splat(f32::INFINITY);

    for axis in 0..3 {
        let d = direction[axis];
        if d > 0.0 {
            step[axis] = 1;
            t_max[axis] = (start[axis] + 1.0 - origin[axis]) / d;
            t_delta[axis] = 1.0 / d;
        } else if d < 0.0 {
            step[axis] = -1;
            t_max[axis] = (origin[axis] - start[axis]) / -d;
            t_delta[axis] = 1.0 / -d;
        }
    }

    if t_delta.to_array().iter().all(|t| !t.is_finite()) {
        return Err(VoxmarchError::InvalidArgument(format!(
            "ray direction {direction} is too small to advance along any axis"
        )));
    }

    Ok(DdaMarch {
        cell,
        step,
        t_max,
        t_delta,
        remaining: max_steps,
    })
}

/// [`march`] with the default step budget of 100 cells.
pub fn march_default(origin: Vec3, direction: Vec3) -> Result<DdaMarch> {
    march(origin, direction, DEFAULT_DDA_STEPS)
}

impl DdaMarch {
    /// Cell the traversal currently sits in (the last one yielded, or the
    /// origin cell before the first step).
    pub fn current_cell(&self) -> IVec3 {
        self.cell
    }

    /// Index of the axis to advance next.
    ///
    /// Pairwise strict comparisons, x against y first, then the winner's
    /// branch against z. Ties therefore fall through to the later axis.
    fn next_axis(&self) -> usize {
        let t = self.t_max;
        if t.x < t.y {
            if t.x < t.z {
                0
            } else {
                2
            }
        } else if t.y < t.z {
            1
        } else {
            2
        }
    }
}

impl Iterator for DdaMarch {
    type Item = IVec3;

    fn next(&mut self) -> Option<IVec3> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let axis = self.next_axis();
        self.cell[axis] = self.cell[axis].saturating_add(self.step[axis]);
        self.t_max[axis] += self.t_delta[axis];
        Some(self.cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for DdaMarch {}
