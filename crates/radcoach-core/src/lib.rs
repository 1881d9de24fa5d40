//! radcoach-core: Finding reconciliation and feedback scoring.
//!
//! This crate defines the finding data model, the finding-set builder, the
//! gold standard assembler, the style critic and the reconciliation engine,
//! plus the async orchestrator that runs upstream extractors and feeds their
//! output into the engine.

pub mod engine;
pub mod error;
pub mod findings;
pub mod gold;
pub mod model;
pub mod parser;
pub mod reconcile;
pub mod report;
pub mod statistics;
pub mod style;
pub mod traits;
