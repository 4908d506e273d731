//!
//! # Process group metadata
//!
//! Declarative description of a process group, the cluster objects it translates into
//! and the health and progress records reported back for it.
//!
pub mod labels;
pub mod group;
pub mod port;
pub mod resource;
pub mod quantity;
pub mod health;
pub mod progress;
pub mod k8;

pub use k8_types;
