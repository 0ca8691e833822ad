//! Extraction orchestration for cfpscout.
//!
//! This crate ties the URL store, fetch layer and extraction strategies
//! together into batch runs (see [`pipeline::run_extraction`]) and turns
//! merged extractions into [`CfpRecord`](cfpscout_shared::CfpRecord)s for an
//! indexing sink.

pub mod pipeline;
pub mod record;
pub mod sink;

pub use pipeline::{
    ExtractionConfig, ExtractionSummary, ProgressReporter, SilentProgress, UrlOutcome,
    run_extraction,
};
pub use record::to_record;
pub use sink::{JsonLinesSink, RecordSink, SinkReport};
