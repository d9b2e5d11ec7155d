//! # starmatch
//!
//! Shift, rotation and scale invariant **identification of star lists** in Rust.
//!
//! Given two lists of stars (pixel positions and fluxes), typically an
//! automatic source-detection catalog of an image and a reference catalog or
//! a second image, `starmatch` finds the similarity transform (scale, rotation,
//! translation) that maps one onto the other. No prior knowledge of the
//! relative pointing, orientation or pixel scale is needed.
//!
//! ## Features
//!
//! - **Asterism matching**: 4-star quads reduced to a canonical fingerprint that
//!   does not change under shift, rotation or scale
//! - **Robust candidate ranking**: brightest-first and grid-cell quad sets, ranked
//!   by fingerprint distance and verified against all stars
//! - **Least-squares refinement** of the transform on every matched star
//! - **Exhaustive pair search** fallback for fields too sparse for quads
//! - **Point-list matching** with ambiguity rejection, to carry names from a
//!   hand-made catalog onto an automatic one
//!
//! ## Example
//!
//! ```no_run
//! use starmatch::{identify, AlignConfig, AlignStatus, Star};
//!
//! let reference = vec![
//!     Star::new("r0", 512.3, 100.8, 5400.0),
//!     Star::new("r1", 80.1, 640.0, 3100.0),
//!     // ... more stars ...
//! ];
//! let ukn = vec![
//!     Star::new("0", 498.2, 131.0, 5100.0),
//!     Star::new("1", 77.4, 660.5, 2900.0),
//!     // ... more stars ...
//! ];
//!
//! let result = identify(&ukn, &reference, &AlignConfig::default());
//! if result.status == AlignStatus::MatchFound {
//!     let t = result.transform.unwrap();
//!     println!("{t}");
//!     println!("Matched {} stars in {:.1} ms",
//!         result.num_matches.unwrap(), result.solve_time_ms);
//! }
//! ```
//!
//! ## Algorithm overview
//!
//! 1. **Quad generation**: combinations of 4 bright stars, plus the brightest stars
//!    of each cell of coarse and fine grids over the field
//! 2. **Fingerprint**: the two most distant stars define a frame; the other two
//!    stars' coordinates in it form a 4-number hash, canonicalized over the
//!    symmetric role assignments
//! 3. **Candidate ranking**: each unknown quad is paired with its nearest reference
//!    quad in hash space; the closest pairs are tried first
//! 4. **Verification**: a candidate transform is accepted when enough stars match
//! 5. **Refinement**: re-fit the transform on all matched stars until stable
//!
//! Mirrored images are not supported: the fingerprint is not invariant under
//! reflection.

mod error;
pub mod align;
pub mod matching;
pub mod quad;
pub mod star;
pub mod transform;

pub use align::{identify, AlignConfig, AlignMethod, AlignResult, AlignStatus};
pub use error::{AlignError, Result};
pub use matching::{
    find_transform, form_pairs, identify_list, ListIdentification, ListTransform, PairConfig,
    PairMatches, PairOutcome, SearchConfig, SearchOutcome, SearchSolution,
};
pub use quad::{
    make_quads, propose_candidates, quad_transform, Quad, QuadCandidate, QuadSetConfig,
};
pub use star::{Measure, PropValue, Star};
pub use transform::SimpleTransform;

// Positions are in pixels; 64-bit floats keep the least-squares fits well conditioned.
pub type Vector2 = nalgebra::Vector2<f64>;
