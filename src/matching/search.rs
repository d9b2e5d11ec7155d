//! Exhaustive pair search.
//!
//! Bootstraps a transform when asterisms are unusable (too few stars, or a
//! field too sparse for quads). Every ordered pair of bright reference stars
//! is compared with every ordered pair of bright candidate stars of similar
//! separation. Each such pair-of-pairs fixes a rotation and a shift; the
//! resulting transform is applied to the whole candidate list and scored by
//! a global point match with ambiguity rejection. The first transform that
//! reaches `min_matches` is returned.
//!
//! Cost is bounded by `n_ref² × n_auto²` point matches, reduced in practice
//! by the minimum distance and separation agreement filters.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, trace};

use super::pairs::{pair_outcomes, PairOutcome};
use crate::star::wrap_degrees;
use crate::{SimpleTransform, Star};

/// Parameters for [`find_transform`].
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Candidate coordinates are multiplied by this before anything else.
    pub scaling_ratio: f64,
    /// Point match tolerance, pixels.
    pub tolerance: f64,
    /// Matched stars needed to accept a transform.
    pub min_matches: usize,
    /// Reference pairs closer than this are skipped; short baselines give poor angles.
    pub min_distance: f64,
    /// Brightest reference stars examined.
    pub n_ref: usize,
    /// Brightest candidate stars examined.
    pub n_auto: usize,
    /// Maximum relative disagreement between reference and candidate pair separations.
    pub distance_tolerance: f64,
    /// Scan reference pairs on the rayon pool.
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            scaling_ratio: 1.0,
            tolerance: 2.0,
            min_matches: 5,
            min_distance: 100.0,
            n_ref: 10,
            n_auto: 30,
            distance_tolerance: 0.05,
            parallel: true,
        }
    }
}

/// Transform found by [`find_transform`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSolution {
    /// Matched reference stars under the transform.
    pub matches: usize,
    /// Counter-clockwise rotation in degrees, within [0, 360).
    pub angle_deg: f64,
    /// Shift applied after scaling and rotation.
    pub shift: (f64, f64),
    pub scaling_ratio: f64,
    /// Transforms evaluated, including the successful one.
    pub tries: usize,
    /// (bright, faint) indices of the reference pair that produced the solution.
    pub reference_pair: (usize, usize),
    /// (bright, faint) indices of the matching candidate pair.
    pub candidate_pair: (usize, usize),
}

impl SearchSolution {
    /// Transform taking raw candidate coordinates onto the reference.
    pub fn transform(&self) -> SimpleTransform {
        SimpleTransform::from_scale_rotation_shift(self.scaling_ratio, self.angle_deg, self.shift)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(SearchSolution),
    /// No transform reached `min_matches`. Not an error.
    NotFound {
        /// Best matched count seen over all tries.
        best_matches: usize,
        tries: usize,
    },
}

impl SearchOutcome {
    /// Matched count, or -1 when nothing was found.
    pub fn matched_count(&self) -> i64 {
        match self {
            SearchOutcome::Found(s) => s.matches as i64,
            SearchOutcome::NotFound { .. } => -1,
        }
    }

    pub fn solution(&self) -> Option<&SearchSolution> {
        match self {
            SearchOutcome::Found(s) => Some(s),
            SearchOutcome::NotFound { .. } => None,
        }
    }

    pub fn tries(&self) -> usize {
        match self {
            SearchOutcome::Found(s) => s.tries,
            SearchOutcome::NotFound { tries, .. } => *tries,
        }
    }
}

/// Result of scanning the candidate pairs against one reference pair.
struct PairScan {
    tries: usize,
    best: usize,
    found: Option<SearchSolution>,
}

struct Search<'a> {
    reference: &'a [Star],
    /// Candidates multiplied by the scaling ratio.
    zoomed: Vec<Star>,
    config: &'a SearchConfig,
    n_auto: usize,
}

impl Search<'_> {
    /// Try every candidate pair against reference pair `(b, f)`.
    ///
    /// `abort` is polled between bright candidates; returns `None` once it is set.
    fn scan(&self, b: usize, f: usize, abort: impl Fn() -> bool) -> Option<PairScan> {
        let bright = &self.reference[b];
        let faint = &self.reference[f];
        let star_dist = bright.distance(faint);
        let star_angle = bright.trig_angle(faint);
        let mut scan = PairScan {
            tries: 0,
            best: 0,
            found: None,
        };

        for bc in 0..self.n_auto {
            if abort() {
                return None;
            }
            for fc in 0..self.n_auto {
                if fc == bc {
                    continue;
                }
                let cand_dist = self.zoomed[bc].distance(&self.zoomed[fc]);
                if (cand_dist - star_dist).abs() / star_dist > self.config.distance_tolerance {
                    continue;
                }

                let cand_angle = self.zoomed[bc].trig_angle(&self.zoomed[fc]);
                let angle_deg = wrap_degrees(star_angle - cand_angle);
                let rotated = self.zoomed[bc].rotated(angle_deg, (0.0, 0.0));
                let shift = rotated.shift_to(bright);
                let transform = SimpleTransform::from_scale_rotation_shift(1.0, angle_deg, shift);

                let positions: Vec<(f64, f64)> = self
                    .zoomed
                    .iter()
                    .map(|s| transform.apply_point(s.x, s.y))
                    .collect();
                let matches = pair_outcomes(self.reference, &positions, self.config.tolerance, true)
                    .into_iter()
                    .filter(|o| matches!(o, PairOutcome::Matched { .. }))
                    .count();
                scan.tries += 1;
                scan.best = scan.best.max(matches);
                trace!(
                    "Pair ({}, {}) vs ({}, {}): angle {:.3}, {} matches",
                    b,
                    f,
                    bc,
                    fc,
                    angle_deg,
                    matches
                );

                if matches >= self.config.min_matches {
                    scan.found = Some(SearchSolution {
                        matches,
                        angle_deg,
                        shift,
                        scaling_ratio: self.config.scaling_ratio,
                        tries: scan.tries,
                        reference_pair: (b, f),
                        candidate_pair: (bc, fc),
                    });
                    return Some(scan);
                }
            }
        }
        Some(scan)
    }
}

/// Search for the transform taking `candidates` onto `reference`.
///
/// Both lists are expected brightest first; only the first `n_ref` reference
/// and `n_auto` candidate stars are used to build trial transforms, while
/// every candidate takes part in the scoring. Reference pairs are visited in
/// (bright, faint) index order and the first success wins. The parallel scan
/// returns the same winner and try count as the sequential one.
pub fn find_transform(
    reference: &[Star],
    candidates: &[Star],
    config: &SearchConfig,
) -> SearchOutcome {
    let n_ref = config.n_ref.min(reference.len());
    let search = Search {
        reference,
        zoomed: candidates.iter().map(|s| s.zoomed(config.scaling_ratio)).collect(),
        config,
        n_auto: config.n_auto.min(candidates.len()),
    };

    let outer: Vec<(usize, usize)> = (0..n_ref)
        .flat_map(|b| (0..n_ref).map(move |f| (b, f)))
        .filter(|&(b, f)| {
            let d = reference[b].distance(&reference[f]);
            b != f && d > 0.0 && d >= config.min_distance
        })
        .collect();
    debug!(
        "Pair search over {} reference pairs and {} candidate stars",
        outer.len(),
        search.n_auto
    );

    let mut tries = 0;
    let mut best = 0;
    if config.parallel {
        // Lowest reference-pair index that has succeeded so far.
        let winner = AtomicUsize::new(usize::MAX);
        let scans: Vec<Option<PairScan>> = outer
            .par_iter()
            .enumerate()
            .map(|(i, &(b, f))| {
                let scan = search.scan(b, f, || winner.load(Ordering::Relaxed) < i)?;
                if scan.found.is_some() {
                    winner.fetch_min(i, Ordering::Relaxed);
                }
                Some(scan)
            })
            .collect();
        // Every scan before the winner ran to completion, so folding in order
        // reproduces the sequential counts.
        for scan in scans.into_iter().flatten() {
            tries += scan.tries;
            best = best.max(scan.best);
            if let Some(solution) = scan.found {
                return found(solution, tries);
            }
        }
    } else {
        for &(b, f) in &outer {
            let Some(scan) = search.scan(b, f, || false) else {
                continue;
            };
            tries += scan.tries;
            best = best.max(scan.best);
            if let Some(solution) = scan.found {
                return found(solution, tries);
            }
        }
    }

    debug!(
        "Pair search failed after {} tries, best was {} matches",
        tries, best
    );
    SearchOutcome::NotFound {
        best_matches: best,
        tries,
    }
}

fn found(mut solution: SearchSolution, tries: usize) -> SearchOutcome {
    solution.tries = tries;
    debug!(
        "Pair search found {} matches after {} tries: angle {:.4} deg, shift ({:.2}, {:.2})",
        solution.matches, tries, solution.angle_deg, solution.shift.0, solution.shift.1
    );
    SearchOutcome::Found(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_field() -> Vec<Star> {
        let pts = [
            (120.0, 80.0),
            (840.0, 150.0),
            (400.0, 700.0),
            (650.0, 520.0),
            (210.0, 430.0),
            (900.0, 880.0),
            (55.0, 910.0),
            (500.0, 260.0),
            (760.0, 690.0),
            (330.0, 120.0),
            (610.0, 950.0),
            (980.0, 400.0),
        ];
        pts.iter()
            .enumerate()
            .map(|(i, &(x, y))| Star::new(format!("r{i}"), x, y, 1000.0 - 50.0 * i as f64))
            .collect()
    }

    /// Reference stars mapped by the inverse of (rotate 40 deg, shift (30, 70)).
    fn candidate_field(reference: &[Star]) -> Vec<Star> {
        let moved: Vec<Star> = reference.iter().map(|s| s.shifted((-30.0, -70.0))).collect();
        SimpleTransform::from_scale_rotation_shift(1.0, -40.0, (0.0, 0.0)).apply_all(&moved)
    }

    #[test]
    fn test_recovers_rotation_and_shift() {
        let reference = reference_field();
        let candidates = candidate_field(&reference);
        let config = SearchConfig {
            parallel: false,
            ..Default::default()
        };
        let outcome = find_transform(&reference, &candidates, &config);
        let solution = outcome.solution().expect("transform should be found");
        assert!(solution.matches >= config.min_matches);
        assert_eq!(outcome.matched_count(), solution.matches as i64);
        assert!((solution.angle_deg - 40.0).abs() < 1e-6);
        assert!((solution.shift.0 - 30.0).abs() < 1e-6);
        assert!((solution.shift.1 - 70.0).abs() < 1e-6);
        let t = solution.transform();
        assert_eq!(t.evaluate(&candidates, &reference, 1e-3), reference.len());
    }

    #[test]
    fn test_unrotated_angle_in_range() {
        let reference = reference_field();
        let candidates: Vec<Star> = reference.iter().map(|s| s.shifted((-3.5, 12.25))).collect();
        let outcome = find_transform(&reference, &candidates, &SearchConfig::default());
        let solution = outcome.solution().expect("transform should be found");
        assert!(
            (0.0..360.0).contains(&solution.angle_deg),
            "angle {}",
            solution.angle_deg
        );
        let a = solution.angle_deg;
        assert!(a < 1e-9 || a > 360.0 - 1e-9);
        assert!((solution.shift.0 - 3.5).abs() < 1e-6);
        assert!((solution.shift.1 + 12.25).abs() < 1e-6);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let reference = reference_field();
        let candidates = candidate_field(&reference);
        for min_matches in [5, 12, 13] {
            let seq = find_transform(
                &reference,
                &candidates,
                &SearchConfig {
                    min_matches,
                    parallel: false,
                    ..Default::default()
                },
            );
            let par = find_transform(
                &reference,
                &candidates,
                &SearchConfig {
                    min_matches,
                    parallel: true,
                    ..Default::default()
                },
            );
            assert_eq!(seq, par);
        }
    }

    #[test]
    fn test_not_found_sentinel() {
        // Reference on a circle, candidates on a line: no similarity maps five onto five.
        let reference: Vec<Star> = (0..8)
            .map(|i| {
                let t = (i as f64 * 45.0).to_radians();
                Star::new(format!("c{i}"), 500.0 + 300.0 * t.cos(), 500.0 + 300.0 * t.sin(), 100.0)
            })
            .collect();
        let candidates: Vec<Star> = (0..6)
            .map(|i| Star::new(format!("l{i}"), 150.0 * i as f64, 0.0, 100.0))
            .collect();
        let outcome = find_transform(&reference, &candidates, &SearchConfig::default());
        assert_eq!(outcome.matched_count(), -1);
        match outcome {
            SearchOutcome::NotFound { best_matches, tries } => {
                assert!(tries > 0);
                assert!((2..5).contains(&best_matches));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_too_few_stars() {
        let reference = reference_field();
        let outcome = find_transform(&reference, &reference[..1], &SearchConfig::default());
        assert_eq!(
            outcome,
            SearchOutcome::NotFound {
                best_matches: 0,
                tries: 0
            }
        );
    }
}
