//!
//! # Cluster resource types
//!
//! Platform objects are the `k8_types` ones. This module adds the storage kinds that
//! crate does not model, and the health derived from what the platform reports.
//!
pub mod storage;
pub mod service;
pub mod workload;
pub mod node;

pub use storage::*;
pub use service::service_health;
pub use workload::{container_health, HOSTNAME_LABEL};
pub use node::node_health;
