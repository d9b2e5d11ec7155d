//! Point-level matching that does not rely on asterisms.
//!
//! - [`pairs`]: nearest-neighbour pairing of two star lists under a known transform.
//! - [`search`]: brute-force search over bright star pairs to bootstrap a transform.

pub mod pairs;
pub mod search;

pub use pairs::{
    classify, form_pairs, identify_list, ListIdentification, ListTransform, PairConfig,
    PairMatches, PairOutcome,
};
pub use search::{find_transform, SearchConfig, SearchOutcome, SearchSolution};
