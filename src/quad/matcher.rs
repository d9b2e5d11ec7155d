//! Cross-catalog quad matching.
//!
//! Each unknown quad is paired with the reference quad whose fingerprint is
//! closest (Euclidean distance in the 4-D hash space). The pairs are ranked
//! by that distance and the best ones are proposed as candidates. Quad sets
//! are small enough for a brute-force scan of the full cross product.

use rayon::prelude::*;
use tracing::debug;

use super::Quad;
use crate::error::Result;
use crate::{SimpleTransform, Star};

/// An unknown quad together with its nearest reference quad.
#[derive(Debug, Clone, Copy)]
pub struct QuadCandidate<'a> {
    pub ukn: &'a Quad,
    pub reference: &'a Quad,
    /// Fingerprint distance between the two quads.
    pub distance: f64,
}

impl QuadCandidate<'_> {
    /// Transform implied by the A/B roles of the two quads.
    pub fn transform(&self) -> Result<SimpleTransform> {
        quad_transform(self.ukn, self.reference)
    }
}

/// The `n` most similar (unknown, reference) quad pairs, best first.
///
/// If `n` exceeds the number of unknown quads, all of them are returned.
/// Empty input on either side gives no candidates.
pub fn propose_candidates<'a>(
    ukn_quads: &'a [Quad],
    ref_quads: &'a [Quad],
    n: usize,
) -> Vec<QuadCandidate<'a>> {
    if ukn_quads.is_empty() || ref_quads.is_empty() {
        return Vec::new();
    }
    if n > ukn_quads.len() {
        debug!(
            "Requested {} candidates but only {} unknown quads, clamping",
            n,
            ukn_quads.len()
        );
    }

    // For each unknown quad: index of and distance to the closest reference quad.
    let nearest: Vec<(usize, f64)> = ukn_quads
        .par_iter()
        .map(|u| {
            ref_quads
                .iter()
                .enumerate()
                .fold((0, f64::INFINITY), |best, (ri, r)| {
                    let d = u.hash_distance(r);
                    if d < best.1 {
                        (ri, d)
                    } else {
                        best
                    }
                })
        })
        .collect();

    let mut order: Vec<usize> = (0..ukn_quads.len()).collect();
    order.sort_by(|&i, &j| nearest[i].1.total_cmp(&nearest[j].1));

    order
        .into_iter()
        .take(n)
        .map(|ui| {
            let (ri, distance) = nearest[ui];
            QuadCandidate {
                ukn: &ukn_quads[ui],
                reference: &ref_quads[ri],
                distance,
            }
        })
        .collect()
}

/// Transform fitted exactly on stars A and B of two matched quads.
pub fn quad_transform(ukn: &Quad, reference: &Quad) -> Result<SimpleTransform> {
    let ukn_ab: [Star; 2] = [ukn.stars[0].clone(), ukn.stars[1].clone()];
    let ref_ab: [Star; 2] = [reference.stars[0].clone(), reference.stars[1].clone()];
    SimpleTransform::fit(&ukn_ab, &ref_ab)
}
