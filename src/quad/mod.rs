//! Asterisms of four stars reduced to a shift, rotation and scale invariant fingerprint.
//!
//! Following the Astrometry.net geometric hash: the two most distant stars
//! of the quad, A and B, define a frame in which A sits at (0, 0) and B at
//! (1, 1). The positions of the remaining stars C and D in that frame form
//! the 4-component hash `(xC, yC, xD, yD)`. Two symmetry tests then pick one
//! of the equivalent A/B and C/D role assignments so that the hash no longer
//! depends on the order the four stars were given in.
//!
//! The hash is **not** invariant under reflection: the normalizing frame is
//! a proper similarity (no mirror), so a mirrored asterism gets a different
//! fingerprint. Catalogs from mirrored images will not match.

pub mod builder;
pub mod combinations;
pub mod matcher;

use std::fmt;

use crate::error::{AlignError, Result};
use crate::{SimpleTransform, Star};

pub use builder::{
    make_bright_quads, make_grid_quads, make_quads, remove_duplicates, BrightQuadConfig,
    GridQuadConfig, QuadSetConfig,
};
pub use matcher::{propose_candidates, quad_transform, QuadCandidate};

/// Number of stars in a quad.
pub const QUAD_SIZE: usize = 4;
/// Number of star pairs in a quad: C(4,2) = 6.
pub const NUM_PAIRS: usize = 6;
/// Pairs `(i, j)` of a quad, and for each the complementary pair.
const PAIRS: [(usize, usize); NUM_PAIRS] = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];
const OTHERS: [(usize, usize); NUM_PAIRS] = [(2, 3), (1, 3), (1, 2), (0, 3), (0, 2), (0, 1)];

/// Default guard on the smallest pair distance (pixels) accepted in a quad.
pub const DEFAULT_MIN_SEPARATION: f64 = 1.0;

/// Four stars in canonical role order `[A, B, C, D]` with their fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    /// Canonical fingerprint. Always satisfies `hash[0] <= hash[2]` and
    /// `hash[0] + hash[2] <= 1`.
    pub hash: [f64; 4],
    /// Stars in role order A, B, C, D. May differ from the input order.
    pub stars: [Star; QUAD_SIZE],
}

/// The 6 pairwise distances of four stars, in `PAIRS` order.
fn pair_distances(stars: [&Star; QUAD_SIZE]) -> [f64; NUM_PAIRS] {
    std::array::from_fn(|k| {
        let (i, j) = PAIRS[k];
        stars[i].distance(stars[j])
    })
}

/// Smallest pairwise distance among four stars.
pub fn min_pair_distance(stars: [&Star; QUAD_SIZE]) -> f64 {
    pair_distances(stars)
        .into_iter()
        .fold(f64::INFINITY, f64::min)
}

impl Quad {
    /// Build a quad with the default degeneracy guard of [`DEFAULT_MIN_SEPARATION`].
    pub fn new(stars: [&Star; QUAD_SIZE]) -> Result<Self> {
        Self::with_min_separation(stars, DEFAULT_MIN_SEPARATION)
    }

    /// Build a quad, failing if any two stars are `min_separation` or closer.
    pub fn with_min_separation(stars: [&Star; QUAD_SIZE], min_separation: f64) -> Result<Self> {
        let dists = pair_distances(stars);
        let min_distance = dists.iter().copied().fold(f64::INFINITY, f64::min);
        if !(min_distance > min_separation) {
            return Err(AlignError::DegenerateQuad {
                min_distance,
                threshold: min_separation,
            });
        }

        // First maximum wins, so ties resolve the same way for the same input order.
        let mut max_idx = 0;
        for k in 1..NUM_PAIRS {
            if dists[k] > dists[max_idx] {
                max_idx = k;
            }
        }
        let (ai, bi) = PAIRS[max_idx];
        let (ci, di) = OTHERS[max_idx];
        let (mut a, mut b, mut c, mut d) = (stars[ai], stars[bi], stars[ci], stars[di]);

        let frame = unit_frame(a, b);
        let (xc, yc) = frame.apply_point(c.x, c.y);
        let (xd, yd) = frame.apply_point(d.x, d.y);

        // Break the symmetries.
        let test_a = xc > xd;
        let test_b = xc + xd > 1.0;
        let hash = match (test_a, test_b) {
            (true, false) => {
                std::mem::swap(&mut c, &mut d);
                [xd, yd, xc, yc]
            }
            (false, true) => {
                std::mem::swap(&mut a, &mut b);
                std::mem::swap(&mut c, &mut d);
                [1.0 - xd, 1.0 - yd, 1.0 - xc, 1.0 - yc]
            }
            (true, true) => {
                std::mem::swap(&mut a, &mut b);
                [1.0 - xc, 1.0 - yc, 1.0 - xd, 1.0 - yd]
            }
            (false, false) => [xc, yc, xd, yd],
        };

        assert!(hash[0] <= hash[2], "quad hash not canonical: {:?}", hash);
        assert!(hash[0] + hash[2] <= 1.0, "quad hash not canonical: {:?}", hash);

        Ok(Self {
            hash,
            stars: [a.clone(), b.clone(), c.clone(), d.clone()],
        })
    }

    /// Euclidean distance between two fingerprints.
    pub fn hash_distance(&self, other: &Quad) -> f64 {
        self.hash
            .iter()
            .zip(&other.hash)
            .map(|(p, q)| (p - q) * (p - q))
            .sum::<f64>()
            .sqrt()
    }

    pub fn names(&self) -> [&str; QUAD_SIZE] {
        std::array::from_fn(|i| self.stars[i].name.as_str())
    }
}

/// Similarity transform (no reflection) taking `a` to (0, 0) and `b` to (1, 1).
fn unit_frame(a: &Star, b: &Star) -> SimpleTransform {
    let x = b.x - a.x;
    let y = b.y - a.y;
    let r2 = x * x + y * y;
    let ta = (x + y) / r2;
    let tb = (x - y) / r2;
    SimpleTransform::from_params([ta, tb, tb * a.y - ta * a.x, -(tb * a.x + ta * a.y)])
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.names();
        write!(
            f,
            "Hash : {:6.3} {:6.3} {:6.3} {:6.3} / IDs : ({}, {}, {}, {})",
            self.hash[0], self.hash[1], self.hash[2], self.hash[3], a, b, c, d
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asterism() -> [Star; 4] {
        [
            Star::new("s0", 12.0, 7.0, 1.0),
            Star::new("s1", 130.0, 40.0, 1.0),
            Star::new("s2", 61.0, 95.0, 1.0),
            Star::new("s3", 35.0, 52.0, 1.0),
        ]
    }

    fn refs(stars: &[Star; 4]) -> [&Star; 4] {
        [&stars[0], &stars[1], &stars[2], &stars[3]]
    }

    fn assert_hash_close(h1: &[f64; 4], h2: &[f64; 4]) {
        for i in 0..4 {
            assert!((h1[i] - h2[i]).abs() < 1e-9, "{:?} vs {:?}", h1, h2);
        }
    }

    #[test]
    fn test_unit_frame_maps_basis() {
        let a = Star::at(3.0, -2.0);
        let b = Star::at(3.0, 8.0); // vertical basis
        let t = unit_frame(&a, &b);
        let (xa, ya) = t.apply_point(a.x, a.y);
        let (xb, yb) = t.apply_point(b.x, b.y);
        assert!(xa.abs() < 1e-12 && ya.abs() < 1e-12);
        assert!((xb - 1.0).abs() < 1e-12 && (yb - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hash_invariant_under_similarity() {
        let stars = asterism();
        let q0 = Quad::new(refs(&stars)).unwrap();
        for &(scale, angle, shift) in &[
            (1.0, 0.0, (100.0, -50.0)),
            (2.5, 33.0, (0.0, 0.0)),
            (0.4, -120.0, (17.0, 900.0)),
            (1.7, 181.0, (-3.0, 4.0)),
        ] {
            let t = SimpleTransform::from_scale_rotation_shift(scale, angle, shift);
            let moved: Vec<Star> = t.apply_all(&stars);
            let q = Quad::new([&moved[0], &moved[1], &moved[2], &moved[3]]).unwrap();
            assert_hash_close(&q0.hash, &q.hash);
            assert_eq!(q0.names(), q.names());
        }
    }

    #[test]
    fn test_hash_invariant_under_reordering() {
        let stars = asterism();
        let q0 = Quad::new(refs(&stars)).unwrap();
        let mut seen = 0;
        for i in 0..4 {
            for j in (0..4).filter(|&j| j != i) {
                for k in (0..4).filter(|&k| k != i && k != j) {
                    let l = 6 - i - j - k;
                    let q = Quad::new([&stars[i], &stars[j], &stars[k], &stars[l]]).unwrap();
                    assert_hash_close(&q0.hash, &q.hash);
                    assert_eq!(q0.names(), q.names(), "order {:?}", [i, j, k, l]);
                    seen += 1;
                }
            }
        }
        assert_eq!(seen, 24);
    }

    #[test]
    fn test_square_scenario() {
        let square = [
            Star::new("p0", 0.0, 0.0, 1.0),
            Star::new("p1", 10.0, 0.0, 1.0),
            Star::new("p2", 0.0, 10.0, 1.0),
            Star::new("p3", 10.0, 10.0, 1.0),
        ];
        let q0 = Quad::new(refs(&square)).unwrap();
        // A and B span a diagonal.
        assert!((q0.stars[0].distance(&q0.stars[1]) - 200f64.sqrt()).abs() < 1e-9);
        assert!(q0.hash[0] <= q0.hash[2]);
        assert!(q0.hash[0] + q0.hash[2] <= 1.0);

        let t = SimpleTransform::from_scale_rotation_shift(3.0, 25.0, (40.0, -8.0));
        let moved = t.apply_all(&square);
        let q1 = Quad::new([&moved[0], &moved[1], &moved[2], &moved[3]]).unwrap();
        assert_hash_close(&q0.hash, &q1.hash);
    }

    #[test]
    fn test_mirror_changes_hash() {
        let stars = asterism();
        let mirrored: Vec<Star> = stars
            .iter()
            .map(|s| Star::new(s.name.clone(), -s.x, s.y, s.flux))
            .collect();
        let q0 = Quad::new(refs(&stars)).unwrap();
        let q1 = Quad::new([&mirrored[0], &mirrored[1], &mirrored[2], &mirrored[3]]).unwrap();
        assert!(q0.hash_distance(&q1) > 1e-3);
    }

    #[test]
    fn test_degenerate_quad() {
        let stars = [
            Star::at(0.0, 0.0),
            Star::at(0.5, 0.0),
            Star::at(50.0, 0.0),
            Star::at(0.0, 50.0),
        ];
        match Quad::new(refs(&stars)) {
            Err(AlignError::DegenerateQuad {
                min_distance,
                threshold,
            }) => {
                assert!((min_distance - 0.5).abs() < 1e-12);
                assert_eq!(threshold, DEFAULT_MIN_SEPARATION);
            }
            other => panic!("expected a degenerate quad, got {:?}", other),
        }
        assert!(Quad::with_min_separation(refs(&stars), 0.1).is_ok());
    }

    #[test]
    fn test_display() {
        let q = Quad::new(refs(&asterism())).unwrap();
        let s = format!("{q}");
        assert!(s.starts_with("Hash : "));
        assert!(s.contains("IDs : ("));
    }
}
