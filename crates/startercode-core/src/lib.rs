//! Starter-code generation for an open-data catalogue.
//!
//! The pipeline is strictly linear: fetch the catalogue, keep the datasets
//! with CSV distributions, prepare their codebooks, render a notebook and a
//! report per dataset, then write an overview document linking everything.

pub mod catalogue;
pub mod codebook;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod overview;
pub mod render;
pub mod runtime;

pub use config::{ConfigLoadResult, ConfigSource, Settings, load_config, load_config_with};
pub use error::StarterError;
pub use runtime::{
    Flavor, RunSummary, SkippedArtifact, StageProgressCallback, StageProgressEvent,
    StageProgressEventKind, generate, run,
};
