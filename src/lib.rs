//! response-analyzer library - stepped-sine frequency response measurement

pub mod audio;
pub mod cli;
pub mod error;
pub mod params;
pub mod profile;
pub mod sweep;

pub use error::{AnalyzerError, Result};
