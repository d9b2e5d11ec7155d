//! Quad-set generation.
//!
//! A single combinatorial scan over the N brightest stars only sees the
//! global picture and misses fields where the density varies. The recipe in
//! [`make_quads`] therefore combines:
//!
//! 1. all 4-combinations of the few brightest stars, with a large minimum
//!    separation (wide, globally distinct asterisms), and
//! 2. one or more grid passes: for each center of a `divisions × divisions`
//!    grid over the field, 4-combinations of the brightest stars within a
//!    radius of that center, with a smaller minimum separation.
//!
//! Quads with (nearly) identical fingerprints are removed at the end.

use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::{debug, trace};

use super::combinations::BrightestFirstCombinations;
use super::{Quad, DEFAULT_MIN_SEPARATION, QUAD_SIZE};
use crate::star::{area, sort_by_flux};
use crate::Star;

/// Combinations of the globally brightest stars.
#[derive(Debug, Clone)]
pub struct BrightQuadConfig {
    /// Number of brightest stars to combine. Default 8.
    pub n: usize,
    /// Minimum pair distance within a quad, in pixels. Default 50.
    pub min_separation: f64,
}

impl Default for BrightQuadConfig {
    fn default() -> Self {
        Self {
            n: 8,
            min_separation: 50.0,
        }
    }
}

/// Combinations of locally bright stars around the centers of a grid.
#[derive(Debug, Clone)]
pub struct GridQuadConfig {
    /// Grid centers per axis. Default 3.
    pub divisions: usize,
    /// Brightest stars taken around each center. Default 5.
    pub per_cell: usize,
    /// Search radius around a center, as a multiple of `field size / divisions`. Default 1.5.
    pub radius_factor: f64,
    /// Minimum pair distance within a quad, in pixels. Default 10.
    pub min_separation: f64,
    /// Only the brightest `max_stars` stars are considered. Default 200.
    pub max_stars: usize,
    /// Relative margin added around the bounding box of the stars. Default 0.01.
    pub border: f64,
}

impl Default for GridQuadConfig {
    fn default() -> Self {
        Self {
            divisions: 3,
            per_cell: 5,
            radius_factor: 1.5,
            min_separation: 10.0,
            max_stars: 200,
            border: 0.01,
        }
    }
}

impl GridQuadConfig {
    pub fn with_divisions(divisions: usize) -> Self {
        Self {
            divisions,
            ..Default::default()
        }
    }
}

/// Full quad-set recipe.
#[derive(Debug, Clone)]
pub struct QuadSetConfig {
    /// Global bright-star pass. `None` skips it.
    pub bright: Option<BrightQuadConfig>,
    /// Grid passes, run in order. Default: 3 and 6 divisions.
    pub grids: Vec<GridQuadConfig>,
    /// Per-coordinate fingerprint tolerance for duplicate removal. Default 1e-6.
    pub dedup_epsilon: f64,
}

impl Default for QuadSetConfig {
    fn default() -> Self {
        Self {
            bright: Some(BrightQuadConfig::default()),
            grids: vec![
                GridQuadConfig::with_divisions(3),
                GridQuadConfig::with_divisions(6),
            ],
            dedup_epsilon: 1e-6,
        }
    }
}

/// Build quads from every 4-combination of `stars`, skipping those closer than `min_separation`.
///
/// `stars` is expected brightest-first; combinations come out brightest-first too.
fn combine(stars: &[Star], min_separation: f64) -> Vec<Quad> {
    let threshold = min_separation.max(DEFAULT_MIN_SEPARATION);
    let combos: Vec<[usize; QUAD_SIZE]> =
        BrightestFirstCombinations::<QUAD_SIZE>::new(stars.len()).collect();
    combos
        .par_iter()
        .filter_map(|combo| {
            match Quad::with_min_separation(combo.map(|i| &stars[i]), threshold) {
                Ok(q) => Some(q),
                Err(e) => {
                    trace!("Skipping combination {:?}: {}", combo, e);
                    None
                }
            }
        })
        .collect()
}

/// Quads from all 4-combinations of the `n` brightest stars.
pub fn make_bright_quads(stars: &[Star], config: &BrightQuadConfig) -> Vec<Quad> {
    let sorted = sort_by_flux(stars);
    let top = &sorted[..sorted.len().min(config.n)];
    let quads = combine(top, config.min_separation);
    debug!(
        "Made {} quads from {} stars (combi n={})",
        quads.len(),
        stars.len(),
        config.n
    );
    quads
}

/// Interior points of `linspace(lo, hi, divisions + 2)`.
fn interior_linspace(lo: f64, hi: f64, divisions: usize) -> impl Iterator<Item = f64> {
    let step = (hi - lo) / (divisions + 1) as f64;
    (1..=divisions).map(move |i| lo + step * i as f64)
}

/// Quads from the locally brightest stars around each center of a grid over the field.
pub fn make_grid_quads(stars: &[Star], config: &GridQuadConfig) -> Vec<Quad> {
    if stars.len() < QUAD_SIZE || config.divisions == 0 || config.per_cell < QUAD_SIZE {
        return Vec::new();
    }
    let sorted = sort_by_flux(stars);
    let Some((xmin, xmax, ymin, ymax)) = area(&sorted, config.border) else {
        return Vec::new();
    };
    let pool = &sorted[..sorted.len().min(config.max_stars)];
    let radius = config.radius_factor * (xmax - xmin).max(ymax - ymin) / config.divisions as f64;

    let centers: Vec<Star> = interior_linspace(xmin, xmax, config.divisions)
        .flat_map(|xc| {
            interior_linspace(ymin, ymax, config.divisions).map(move |yc| Star::at(xc, yc))
        })
        .collect();

    let per_center: Vec<Vec<Quad>> = centers
        .par_iter()
        .map(|center| {
            // The pool is brightest-first, so filtering keeps that order.
            let local: Vec<Star> = pool
                .iter()
                .filter(|s| center.distance(s) <= radius)
                .take(config.per_cell)
                .cloned()
                .collect();
            combine(&local, config.min_separation)
        })
        .collect();

    let quads: Vec<Quad> = per_center.into_iter().flatten().collect();
    debug!(
        "Made {} quads from {} stars (combi sub f={} n={})",
        quads.len(),
        stars.len(),
        config.divisions,
        config.per_cell
    );
    quads
}

fn cmp_hash(h1: &[f64; 4], h2: &[f64; 4]) -> Ordering {
    h1.iter()
        .zip(h2)
        .map(|(a, b)| a.total_cmp(b))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Drop quads whose fingerprint is within `epsilon` of an earlier one on every coordinate.
///
/// The first quad of each cluster in (stable) fingerprint order is kept. The
/// survivors are returned in their input order, so running this twice is a no-op.
pub fn remove_duplicates(quads: Vec<Quad>, epsilon: f64) -> Vec<Quad> {
    let n = quads.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| cmp_hash(&quads[i].hash, &quads[j].hash));

    let mut keep = vec![false; n];
    let mut kept: Vec<usize> = Vec::with_capacity(n);
    for &i in &order {
        let h = &quads[i].hash;
        // Kept quads are in ascending hash[0]; only the tail can be within epsilon.
        let duplicate = kept
            .iter()
            .rev()
            .take_while(|&&k| h[0] - quads[k].hash[0] < epsilon)
            .any(|&k| {
                quads[k]
                    .hash
                    .iter()
                    .zip(h)
                    .all(|(a, b)| (a - b).abs() < epsilon)
            });
        if !duplicate {
            keep[i] = true;
            kept.push(i);
        }
    }

    debug!("Removing {}/{} duplicates", n - kept.len(), n);
    quads
        .into_iter()
        .zip(keep)
        .filter_map(|(q, k)| k.then_some(q))
        .collect()
}

/// The full quad recipe: bright pass, grid passes, then duplicate removal.
///
/// Fewer than four stars gives an empty set.
pub fn make_quads(stars: &[Star], config: &QuadSetConfig) -> Vec<Quad> {
    if stars.len() < QUAD_SIZE {
        debug!("Only {} stars, no quads", stars.len());
        return Vec::new();
    }
    debug!("Building quads for {} stars ...", stars.len());

    let mut quads = Vec::new();
    if let Some(bright) = &config.bright {
        quads.extend(make_bright_quads(stars, bright));
    }
    for grid in &config.grids {
        quads.extend(make_grid_quads(stars, grid));
    }
    let quads = remove_duplicates(quads, config.dedup_epsilon);
    debug!("Done, {} quads", quads.len());
    quads
}
