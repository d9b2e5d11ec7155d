//! Nearest-neighbour pairing of two star lists with ambiguity rejection.
//!
//! Typical use: list 1 is a short hand-picked catalog with meaningful names,
//! list 2 a large automatic catalog. Every star of list 1 is paired with the
//! closest star of list 2 when it lies within the tolerance. With
//! `only_single`, a star is only paired when no other candidate is nearly as
//! close; otherwise it is reported as ambiguous rather than guessed.

use tracing::debug;

use crate::{SimpleTransform, Star};

/// Scale, rotation about the origin and shift applied to list 2 before pairing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListTransform {
    pub scaling_ratio: f64,
    /// Counter-clockwise rotation, degrees.
    pub angle_deg: f64,
    pub shift: (f64, f64),
}

impl ListTransform {
    pub fn to_transform(&self) -> SimpleTransform {
        SimpleTransform::from_scale_rotation_shift(self.scaling_ratio, self.angle_deg, self.shift)
    }
}

/// Parameters for [`form_pairs`] and [`identify_list`].
#[derive(Debug, Clone)]
pub struct PairConfig {
    /// Maximum distance between paired stars. Default 2.0.
    pub tolerance: f64,
    /// Reject pairs whose runner-up candidate is less than `tolerance` farther away.
    pub only_single: bool,
    /// Transform applied to list 2 before pairing. Results always hold the raw list-2 stars.
    pub transform: Option<ListTransform>,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            tolerance: 2.0,
            only_single: false,
            transform: None,
        }
    }
}

/// What happened to one star of list 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairOutcome {
    /// Paired with list-2 star `index` at `distance`.
    Matched { index: usize, distance: f64 },
    /// Nothing within tolerance.
    Unmatched,
    /// Several list-2 stars are about equally close.
    Ambiguous,
}

/// Classify `(x, y)` against candidate positions.
pub fn classify(
    x: f64,
    y: f64,
    candidates: &[(f64, f64)],
    tolerance: f64,
    only_single: bool,
) -> PairOutcome {
    let mut best: Option<(usize, f64)> = None;
    let mut second = f64::INFINITY;
    for (i, &(cx, cy)) in candidates.iter().enumerate() {
        let d = (cx - x).hypot(cy - y);
        match best {
            Some((_, bd)) if d >= bd => {
                if d < second {
                    second = d;
                }
            }
            Some((_, bd)) => {
                second = bd;
                best = Some((i, d));
            }
            None => best = Some((i, d)),
        }
    }

    let Some((index, distance)) = best else {
        return PairOutcome::Unmatched;
    };
    if distance > tolerance {
        PairOutcome::Unmatched
    } else if only_single && candidates.len() > 1 && second - distance < tolerance {
        // A single candidate leaves nothing to be ambiguous about.
        PairOutcome::Ambiguous
    } else {
        PairOutcome::Matched { index, distance }
    }
}

/// Outcome for every star of `list1` against the (already transformed) positions of list 2.
pub(crate) fn pair_outcomes(
    list1: &[Star],
    positions2: &[(f64, f64)],
    tolerance: f64,
    only_single: bool,
) -> Vec<PairOutcome> {
    list1
        .iter()
        .map(|s| classify(s.x, s.y, positions2, tolerance, only_single))
        .collect()
}

fn positions(list2: &[Star], transform: Option<&ListTransform>) -> Vec<(f64, f64)> {
    match transform {
        Some(lt) => {
            let t = lt.to_transform();
            list2.iter().map(|s| t.apply_point(s.x, s.y)).collect()
        }
        None => list2.iter().map(|s| (s.x, s.y)).collect(),
    }
}

/// Partition of list 1 produced by [`form_pairs`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairMatches {
    /// Matched stars of list 1.
    pub matched: Vec<Star>,
    /// Their list-2 partners (untransformed), same order as `matched`.
    pub partners: Vec<Star>,
    /// Pair distances (after the optional transform), same order as `matched`.
    pub distances: Vec<f64>,
    /// List-1 stars with no list-2 star within tolerance.
    pub unmatched: Vec<Star>,
    /// List-1 stars with more than one plausible partner.
    pub ambiguous: Vec<Star>,
}

impl PairMatches {
    pub fn len(&self) -> usize {
        self.matched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// `(list-1 star, list-2 star, distance)` triples.
    pub fn pairs(&self) -> impl Iterator<Item = (&Star, &Star, f64)> {
        self.matched
            .iter()
            .zip(&self.partners)
            .zip(&self.distances)
            .map(|((a, b), &d)| (a, b, d))
    }
}

/// Pair every star of `list1` with its nearest star of `list2`.
pub fn form_pairs(list1: &[Star], list2: &[Star], config: &PairConfig) -> PairMatches {
    let mut result = PairMatches::default();
    if list1.is_empty() {
        debug!("List 1 is empty, nothing to do");
        return result;
    }
    if list2.is_empty() {
        debug!("List 2 is empty, no stars to identify");
        result.unmatched = list1.to_vec();
        return result;
    }

    let pos2 = positions(list2, config.transform.as_ref());
    let outcomes = pair_outcomes(list1, &pos2, config.tolerance, config.only_single);
    for (star, outcome) in list1.iter().zip(outcomes) {
        match outcome {
            PairOutcome::Matched { index, distance } => {
                result.matched.push(star.clone());
                result.partners.push(list2[index].clone());
                result.distances.push(distance);
            }
            PairOutcome::Unmatched => {
                debug!("No match for star {}", star.name);
                result.unmatched.push(star.clone());
            }
            PairOutcome::Ambiguous => {
                debug!("Multiple candidates for star {}, skipping", star.name);
                result.ambiguous.push(star.clone());
            }
        }
    }
    result
}

/// List-2 stars identified from list 1, renamed after their list-1 partner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListIdentification {
    /// Raw list-2 stars with list-1 names and an `"iddist"` prop holding the pair distance.
    pub matched: Vec<Star>,
    pub unmatched_names: Vec<String>,
    pub ambiguous_names: Vec<String>,
}

/// Like [`form_pairs`], but returns the list-2 stars carrying the list-1 names.
///
/// Typical use: give the measured properties of an automatic catalog the
/// names of a hand-picked one.
pub fn identify_list(list1: &[Star], list2: &[Star], config: &PairConfig) -> ListIdentification {
    let pairs = form_pairs(list1, list2, config);
    let matched = pairs
        .pairs()
        .map(|(s1, s2, d)| {
            let mut renamed = s2.clone().with_prop("iddist", d);
            renamed.name = s1.name.clone();
            renamed
        })
        .collect();
    ListIdentification {
        matched,
        unmatched_names: pairs.unmatched.iter().map(|s| s.name.clone()).collect(),
        ambiguous_names: pairs.ambiguous.iter().map(|s| s.name.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::star::PropValue;

    #[test]
    fn test_single_candidate_within_tolerance() {
        let a = vec![Star::new("a", 0.0, 0.0, 1.0)];
        let b = vec![Star::new("b0", 0.0, 0.0, 1.0), Star::new("b1", 1.0, 0.0, 1.0)];
        let config = PairConfig {
            tolerance: 0.5,
            only_single: true,
            transform: None,
        };
        let pairs = form_pairs(&a, &b, &config);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs.partners[0].name, "b0");
        assert_eq!(pairs.distances[0], 0.0);
        assert!(pairs.ambiguous.is_empty());
    }

    #[test]
    fn test_equidistant_candidates_are_ambiguous() {
        let a = vec![Star::new("a", 0.0, 0.0, 1.0)];
        let b = vec![Star::new("left", -1.0, 0.0, 1.0), Star::new("right", 1.0, 0.0, 1.0)];
        let config = PairConfig {
            tolerance: 2.0,
            only_single: true,
            transform: None,
        };
        let pairs = form_pairs(&a, &b, &config);
        assert!(pairs.is_empty());
        assert_eq!(pairs.ambiguous.len(), 1);

        // Without only_single the first of the tied candidates wins.
        let pairs = form_pairs(&a, &b, &PairConfig::default());
        assert_eq!(pairs.partners[0].name, "left");
    }

    #[test]
    fn test_empty_lists() {
        let a = vec![Star::new("a", 0.0, 0.0, 1.0), Star::new("b", 5.0, 0.0, 1.0)];
        assert_eq!(form_pairs(&[], &a, &PairConfig::default()), PairMatches::default());
        let pairs = form_pairs(&a, &[], &PairConfig::default());
        assert_eq!(pairs.unmatched.len(), 2);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_singleton_list2_skips_ambiguity() {
        let a = vec![Star::new("a", 0.0, 0.0, 1.0), Star::new("far", 50.0, 0.0, 1.0)];
        let b = vec![Star::new("only", 0.3, 0.0, 1.0)];
        let config = PairConfig {
            tolerance: 1.0,
            only_single: true,
            transform: None,
        };
        let pairs = form_pairs(&a, &b, &config);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs.matched[0].name, "a");
        assert_eq!(pairs.unmatched[0].name, "far");
    }

    #[test]
    fn test_pretransform_reports_raw_stars() {
        let a = vec![Star::new("a", 10.0, 10.0, 1.0)];
        let b = vec![Star::new("b", 0.0, 0.0, 1.0)];
        let config = PairConfig {
            tolerance: 0.1,
            only_single: false,
            transform: Some(ListTransform {
                scaling_ratio: 2.0,
                angle_deg: 90.0,
                shift: (10.0, 10.0),
            }),
        };
        let pairs = form_pairs(&a, &b, &config);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs.partners[0].x, 0.0);
        assert_eq!(pairs.partners[0].y, 0.0);
    }

    #[test]
    fn test_identify_list_renames() {
        let hand = vec![
            Star::new("ref-A", 100.0, 100.0, -1.0),
            Star::new("ref-B", 500.0, 500.0, -1.0),
        ];
        let auto = vec![
            Star::new("17", 100.5, 100.0, 350.0).with_fwhm(2.1),
            Star::new("42", 300.0, 300.0, 90.0),
        ];
        let id = identify_list(&hand, &auto, &PairConfig::default());
        assert_eq!(id.matched.len(), 1);
        assert_eq!(id.matched[0].name, "ref-A");
        assert_eq!(id.matched[0].flux, 350.0);
        assert_eq!(id.matched[0].fwhm, Some(2.1));
        assert_eq!(id.matched[0].props.get("iddist"), Some(&PropValue::Float(0.5)));
        assert_eq!(id.unmatched_names, vec!["ref-B".to_string()]);
        assert!(id.ambiguous_names.is_empty());
    }
}
