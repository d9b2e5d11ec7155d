//! Error type shared by quad construction, transform fitting and refinement.
//!
//! Every variant is local to one attempt: a degenerate quad is skipped, a
//! failed fit or refine means the caller falls back to another strategy.
//! Ambiguous point matches and an unsuccessful pair search are ordinary
//! outcomes and are reported through return values instead.

use thiserror::Error;

/// Errors produced by the matching algorithms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignError {
    /// Two of the four stars of a quad are too close to define a stable fingerprint.
    #[error("degenerate quad: minimum pair distance {min_distance} <= {threshold}")]
    DegenerateQuad { min_distance: f64, threshold: f64 },

    /// A fit or refine step had fewer usable star pairs than required.
    #[error("insufficient correspondences: found {found}, need at least {required}")]
    InsufficientCorrespondences { found: usize, required: usize },

    /// The unknown and reference lists handed to a fit differ in length.
    #[error("star lists differ in length: {unknown} unknown vs {reference} reference")]
    LengthMismatch { unknown: usize, reference: usize },

    /// The linear system for the transform parameters has no unique solution.
    #[error("singular linear system, star configuration is degenerate")]
    SingularSystem,
}

pub type Result<T> = std::result::Result<T, AlignError>;
