//! Analyzer and sweep parameters, in physical units.

mod analysis;
mod sweep;

// Re-export all types
pub use analysis::{analysis_constants, AnalyzerConfig, PseudoLevel};
pub use sweep::{LevelSelection, SweepConfig};
