//! Shared building blocks for the autotrack trackers: the record model, the
//! emission sink contract, error types and tracker configuration.

pub mod config;
pub mod error;
pub mod event_bus;
pub mod types;

pub use crate::config::{AutotrackConfig, InteractionConfig, InteractionOptions, SessionConfig, SessionOptions};
pub use error::{SinkError, TrackerError, TrackerResult};
pub use event_bus::{RecordSink, SinkFuture};
pub use types::{Record, DEFAULT_PROVIDER};
