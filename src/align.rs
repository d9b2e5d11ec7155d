//! End-to-end identification of an unknown star list against a reference list.
//!
//! 1. **Quads**: build asterism sets for both lists and rank the
//!    (unknown, reference) quad pairs by fingerprint distance.
//! 2. **Evaluate**: fit a transform on each candidate in turn and accept the
//!    first one that brings `min_matches` unknown stars onto reference stars.
//! 3. **Refine**: refit on all matched stars until the matched count stops
//!    changing or the iteration limit is reached.
//! 4. **Fallback**: when no quad candidate is accepted (or there are too few
//!    stars for quads), run the exhaustive pair search if it is enabled.

use std::time::Instant;

use tracing::{debug, info};

use crate::matching::{find_transform, SearchConfig, SearchOutcome};
use crate::quad::{make_quads, propose_candidates, QuadSetConfig, QUAD_SIZE};
use crate::star::sort_by_flux;
use crate::{SimpleTransform, Star};

/// Outcome of an identification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignStatus {
    /// A transform was found and validated.
    MatchFound,
    /// Every candidate was tried without reaching the required match count.
    NoMatch,
    /// Too few stars were provided to attempt a match.
    TooFew,
}

/// How the accepted transform was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMethod {
    Quads,
    PairSearch,
}

/// Parameters for [`identify`].
#[derive(Debug, Clone)]
pub struct AlignConfig {
    /// Quad sets built for both lists.
    pub quads: QuadSetConfig,
    /// Quad candidates tried, best fingerprint distance first.
    pub n_candidates: usize,
    /// Match radius (pixels) used to accept a transform and count the final matches.
    pub evaluate_radius: f64,
    /// Match radius (pixels) of each refinement pass.
    pub refine_radius: f64,
    /// Matched stars needed to accept a quad candidate.
    pub min_matches: usize,
    /// Upper bound on refinement passes.
    pub refine_iterations: usize,
    /// Exhaustive pair search used as a fallback. `None` disables it.
    pub pair_search: Option<SearchConfig>,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            quads: QuadSetConfig::default(),
            n_candidates: 5,
            evaluate_radius: 5.0,
            refine_radius: 5.0,
            min_matches: 5,
            refine_iterations: 5,
            pair_search: Some(SearchConfig::default()),
        }
    }
}

/// Result of [`identify`].
#[derive(Debug, Clone)]
pub struct AlignResult {
    pub status: AlignStatus,
    /// Only set on `MatchFound`.
    pub method: Option<AlignMethod>,
    /// Transform taking unknown coordinates onto the reference.
    pub transform: Option<SimpleTransform>,
    /// Unknown stars within `evaluate_radius` of a reference star under the final transform.
    pub num_matches: Option<usize>,
    /// Fingerprint distance of the accepted quad candidate.
    pub candidate_distance: Option<f64>,
    /// Quad candidates evaluated.
    pub candidates_tried: usize,
    /// Wall-clock time spent, in milliseconds.
    pub solve_time_ms: f32,
}

impl AlignResult {
    fn failure(status: AlignStatus, candidates_tried: usize, t0: Instant) -> Self {
        Self {
            status,
            method: None,
            transform: None,
            num_matches: None,
            candidate_distance: None,
            candidates_tried,
            solve_time_ms: elapsed_ms(t0),
        }
    }

    pub fn is_match(&self) -> bool {
        self.status == AlignStatus::MatchFound
    }
}

fn elapsed_ms(t0: Instant) -> f32 {
    t0.elapsed().as_secs_f32() * 1000.0
}

/// Refine until the matched count is stable. A failed pass keeps the last good transform.
fn refine_until_stable(
    mut transform: SimpleTransform,
    ukn: &[Star],
    reference: &[Star],
    config: &AlignConfig,
) -> SimpleTransform {
    let mut count = transform.evaluate(ukn, reference, config.refine_radius);
    for iteration in 0..config.refine_iterations {
        let refined = match transform.refine(ukn, reference, config.refine_radius) {
            Ok(t) => t,
            Err(e) => {
                debug!("Refinement pass {} failed: {}", iteration, e);
                break;
            }
        };
        let refined_count = refined.evaluate(ukn, reference, config.refine_radius);
        transform = refined;
        if refined_count == count {
            debug!("Refinement stable after {} passes", iteration + 1);
            break;
        }
        count = refined_count;
    }
    transform
}

/// Find the transform taking `ukn` onto `reference`.
///
/// Neither list needs to be sorted; both are ordered brightest first internally.
pub fn identify(ukn: &[Star], reference: &[Star], config: &AlignConfig) -> AlignResult {
    let t0 = Instant::now();

    let quads_possible = ukn.len() >= QUAD_SIZE && reference.len() >= QUAD_SIZE;
    let search_possible = config.pair_search.is_some() && ukn.len() >= 2 && reference.len() >= 2;
    if !quads_possible && !search_possible {
        debug!(
            "Too few stars to identify: {} unknown, {} reference",
            ukn.len(),
            reference.len()
        );
        return AlignResult::failure(AlignStatus::TooFew, 0, t0);
    }

    let ukn = sort_by_flux(ukn);
    let reference = sort_by_flux(reference);
    let mut candidates_tried = 0;

    if quads_possible {
        let ukn_quads = make_quads(&ukn, &config.quads);
        let ref_quads = make_quads(&reference, &config.quads);
        debug!(
            "Built {} unknown and {} reference quads",
            ukn_quads.len(),
            ref_quads.len()
        );

        for cand in propose_candidates(&ukn_quads, &ref_quads, config.n_candidates) {
            candidates_tried += 1;
            let transform = match cand.transform() {
                Ok(t) => t,
                Err(e) => {
                    debug!("Skipping candidate: {}", e);
                    continue;
                }
            };
            let n = transform.evaluate(&ukn, &reference, config.evaluate_radius);
            debug!(
                "Candidate {} (distance {:.5}): {} matches, {}",
                candidates_tried, cand.distance, n, transform
            );
            if n < config.min_matches {
                continue;
            }

            let transform = refine_until_stable(transform, &ukn, &reference, config);
            let num_matches = transform.evaluate(&ukn, &reference, config.evaluate_radius);
            info!(
                "Quad match with {} stars in {:.1} ms: {}",
                num_matches,
                elapsed_ms(t0),
                transform
            );
            return AlignResult {
                status: AlignStatus::MatchFound,
                method: Some(AlignMethod::Quads),
                transform: Some(transform),
                num_matches: Some(num_matches),
                candidate_distance: Some(cand.distance),
                candidates_tried,
                solve_time_ms: elapsed_ms(t0),
            };
        }
        debug!("No quad candidate accepted after {} tries", candidates_tried);
    }

    let Some(search) = config.pair_search.as_ref().filter(|_| search_possible) else {
        return AlignResult::failure(AlignStatus::NoMatch, candidates_tried, t0);
    };
    match find_transform(&reference, &ukn, search) {
        SearchOutcome::Found(solution) => {
            let transform = refine_until_stable(solution.transform(), &ukn, &reference, config);
            let num_matches = transform.evaluate(&ukn, &reference, config.evaluate_radius);
            info!(
                "Pair search match with {} stars after {} tries in {:.1} ms: {}",
                num_matches,
                solution.tries,
                elapsed_ms(t0),
                transform
            );
            AlignResult {
                status: AlignStatus::MatchFound,
                method: Some(AlignMethod::PairSearch),
                transform: Some(transform),
                num_matches: Some(num_matches),
                candidate_distance: None,
                candidates_tried,
                solve_time_ms: elapsed_ms(t0),
            }
        }
        SearchOutcome::NotFound {
            best_matches,
            tries,
        } => {
            info!(
                "No match: pair search best was {} stars after {} tries",
                best_matches, tries
            );
            AlignResult::failure(AlignStatus::NoMatch, candidates_tried, t0)
        }
    }
}
