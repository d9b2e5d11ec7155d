//! Similarity transform between two star lists.
//!
//! ```text
//! [x']   [a  -b] [x]   [c]
//! [y'] = [b   a] [y] + [d]
//! ```
//!
//! `(a, b)` jointly encode a counter-clockwise rotation `atan2(b, a)` and an
//! isotropic scale `sqrt(a² + b²)`. Shear and anisotropic scale cannot be
//! represented.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{AlignError, Result};
use crate::Star;

/// Default match radius (pixels) used when scoring a transform.
pub const DEFAULT_EVALUATE_RADIUS: f64 = 2.0;
/// Default match radius (pixels) used when refitting a transform.
pub const DEFAULT_REFINE_RADIUS: f64 = 5.0;

/// Relative singular-value threshold below which the fit is considered rank deficient.
const RANK_EPS: f64 = 1e-12;

/// Rotation + isotropic scale + shift, parameterized as `(a, b, c, d)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Default for SimpleTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl SimpleTransform {
    pub fn identity() -> Self {
        Self::from_params([1.0, 0.0, 0.0, 0.0])
    }

    pub fn from_params(v: [f64; 4]) -> Self {
        Self {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
        }
    }

    /// Scale about the origin, then rotate counter-clockwise about the origin, then shift.
    pub fn from_scale_rotation_shift(scale: f64, angle_deg: f64, shift: (f64, f64)) -> Self {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        Self {
            a: scale * cos,
            b: scale * sin,
            c: shift.0,
            d: shift.1,
        }
    }

    pub fn params(&self) -> [f64; 4] {
        [self.a, self.b, self.c, self.d]
    }

    pub fn scaling(&self) -> f64 {
        self.a.hypot(self.b)
    }

    /// Counter-clockwise rotation angle in degrees, within (-180, 180].
    pub fn rotation_deg(&self) -> f64 {
        self.b.atan2(self.a).to_degrees()
    }

    #[inline]
    pub fn apply_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x - self.b * y + self.c,
            self.b * x + self.a * y + self.d,
        )
    }

    /// Transformed copy of `star`; name, flux and attributes are preserved.
    pub fn apply(&self, star: &Star) -> Star {
        let (x, y) = self.apply_point(star.x, star.y);
        Star {
            x,
            y,
            ..star.clone()
        }
    }

    pub fn apply_all(&self, stars: &[Star]) -> Vec<Star> {
        stars.iter().map(|s| self.apply(s)).collect()
    }

    /// Fit the transform that puts `ukn` onto `reference` (pairwise, same order).
    ///
    /// Two pairs give four equations for four unknowns and are solved exactly.
    /// More pairs are solved in the linear least-squares sense, minimizing the
    /// summed squared 2-D displacement.
    pub fn fit(ukn: &[Star], reference: &[Star]) -> Result<Self> {
        if ukn.len() != reference.len() {
            return Err(AlignError::LengthMismatch {
                unknown: ukn.len(),
                reference: reference.len(),
            });
        }
        if ukn.len() < 2 {
            return Err(AlignError::InsufficientCorrespondences {
                found: ukn.len(),
                required: 2,
            });
        }

        // ukn * (a, b, c, d) = ref
        let n = ukn.len();
        let mut a_mat = DMatrix::<f64>::zeros(2 * n, 4);
        let mut b_vec = DVector::<f64>::zeros(2 * n);
        for (i, (u, r)) in ukn.iter().zip(reference).enumerate() {
            let row = 2 * i;
            a_mat[(row, 0)] = u.x;
            a_mat[(row, 1)] = -u.y;
            a_mat[(row, 2)] = 1.0;
            b_vec[row] = r.x;

            a_mat[(row + 1, 0)] = u.y;
            a_mat[(row + 1, 1)] = u.x;
            a_mat[(row + 1, 3)] = 1.0;
            b_vec[row + 1] = r.y;
        }

        let svd = a_mat.clone().svd(true, true);
        let max_sv = svd.singular_values.max();
        if max_sv <= 0.0 || svd.rank(max_sv * RANK_EPS) < 4 {
            return Err(AlignError::SingularSystem);
        }

        let v = if n == 2 {
            a_mat.lu().solve(&b_vec).ok_or(AlignError::SingularSystem)?
        } else {
            svd.solve(&b_vec, RANK_EPS)
                .map_err(|_| AlignError::SingularSystem)?
        };

        Ok(Self::from_params([v[0], v[1], v[2], v[3]]))
    }

    /// For each unknown star, the closest reference star after transforming.
    ///
    /// Returns `(ukn_index, ref_index, distance)` for pairs closer than `radius`.
    pub fn nearest_matches(
        &self,
        ukn: &[Star],
        reference: &[Star],
        radius: f64,
    ) -> Vec<(usize, usize, f64)> {
        ukn.iter()
            .enumerate()
            .filter_map(|(ui, u)| {
                let (tx, ty) = self.apply_point(u.x, u.y);
                reference
                    .iter()
                    .enumerate()
                    .map(|(ri, r)| (ri, (r.x - tx).hypot(r.y - ty)))
                    .min_by(|p, q| p.1.total_cmp(&q.1))
                    .filter(|&(_, d)| d < radius)
                    .map(|(ri, d)| (ui, ri, d))
            })
            .collect()
    }

    /// Number of transformed unknown stars with a reference star within `radius`.
    pub fn evaluate(&self, ukn: &[Star], reference: &[Star], radius: f64) -> usize {
        self.nearest_matches(ukn, reference, radius).len()
    }

    /// One refinement pass: match within `radius`, then refit on all matched pairs.
    pub fn refine(&self, ukn: &[Star], reference: &[Star], radius: f64) -> Result<Self> {
        let matches = self.nearest_matches(ukn, reference, radius);
        if matches.len() < 2 {
            return Err(AlignError::InsufficientCorrespondences {
                found: matches.len(),
                required: 2,
            });
        }
        let (match_ukn, match_ref): (Vec<Star>, Vec<Star>) = matches
            .iter()
            .map(|&(ui, ri, _)| (ukn[ui].clone(), reference[ri].clone()))
            .unzip();

        let refined = Self::fit(&match_ukn, &match_ref)?;
        debug!("Refined on {} pairs: {}", matches.len(), refined);
        Ok(refined)
    }
}

impl fmt::Display for SimpleTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rotation {:+9.6} [deg], Scaling {:8.6}",
            self.rotation_deg(),
            self.scaling()
        )
    }
}
