//! radcoach-extractors: Finding extractor and detector plug-ins.
//!
//! Implements the `FindingExtractor` and `FindingDetector` traits for a
//! rule-based keyword matcher, remote HTTP services and precomputed case
//! labels, and builds a configured `AnalysisEngine` from `radcoach.toml`.

pub mod config;
pub mod detector;
pub mod keyword;
pub mod mock;
pub mod remote;

pub use config::{
    build_engine, create_detector, create_extractor, load_config, load_config_from,
    DetectorConfig, ExtractorConfig, RadcoachConfig,
};
pub use detector::CaseLabelDetector;
pub use keyword::{KeywordConfig, KeywordExtractor};
pub use radcoach_core::error::ExtractorError;
pub use remote::{RemoteDetector, RemoteExtractor};
