//! eramap-viz library interface
//!
//! Genre/era analytics over the enriched dataset: genre grouping and
//! trimming, k-means merging of genre groups into clusters, per-decade
//! density grids on the valence/energy plane, temporal interpolation
//! between decades, and aggregate summaries.

pub mod interp;
pub mod kde;
pub mod kmeans;
pub mod preprocess;
pub mod summary;

pub use preprocess::AnalysisRow;
