//! Text canonicalization and similarity scoring.

pub mod normalize;
pub mod similarity;
