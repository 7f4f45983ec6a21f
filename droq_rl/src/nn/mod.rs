//! Neural network utilities for critic ensembles.
//!
//! - [`dropout`]: Dropout driven by an explicit [`PrngKey`](crate::core::PrngKey)

pub mod dropout;

pub use dropout::keyed_dropout;
