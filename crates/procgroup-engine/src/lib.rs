//!
//! # Process group engine
//!
//! Reconcile declarative process groups into cluster resources through injected
//! cluster clients, and merge what the cluster reports back into per process
//! [`Progress`](procgroup_metadata::progress::Progress) records and group health.
//!
pub mod client;
pub mod collector;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod resources;
pub mod translator;

#[cfg(any(test, feature = "fixture"))]
pub mod memory;

pub use client::{ClientError, ClusterClient, MetricsClient};
pub use collector::ProgressCollector;
pub use config::EngineConfig;
pub use context::OpContext;
pub use engine::{DestroyOptions, ProcessGroupEngine};
pub use error::{EngineError, EngineResult};
pub use translator::Translator;

pub use procgroup_metadata as metadata;
