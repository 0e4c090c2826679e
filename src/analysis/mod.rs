//! Image analysis tools backed by a vision model and the result cache.
//!
//! `describe`, `analyze` and `compare` go through the cache; `metadata` is
//! answered locally from the file.

pub mod dispatcher;
pub mod prompts;

pub use dispatcher::{
    AnalysisDispatcher, AnalysisOutcome, AnalysisPayload, AnalyzedImage, CacheStatus,
    MAX_ANALYSIS_BYTES,
};
pub use prompts::{AnalysisType, DEFAULT_COMPARISON_FOCUS, DEFAULT_DESCRIBE_PROMPT};
