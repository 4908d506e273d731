//!
//! # Health
//!
//! Health of a single entity (process, pod, node) and the reduction of many of them
//! into one aggregate value. Process groups and node pools are reduced with the same
//! precedence table so their results stay comparable.
//!
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    #[default]
    Unknown,
    Pending,
    ReadOnly,
    Down,
    Stop,
    Warning,
    Up,
}

/// Consulted in order when states are mixed and none of them is `Up`
const MIXED_PRECEDENCE: [Health; 6] = [
    Health::Warning,
    Health::Down,
    Health::Stop,
    Health::ReadOnly,
    Health::Pending,
    Health::Unknown,
];

impl Health {
    /// Reduce many states into one.
    ///
    /// Empty input is `Unknown`, a single distinct state is kept as is. Mixed states
    /// containing `Up` are a `Warning`: some but not all entities are healthy.
    /// Otherwise the first state of [`MIXED_PRECEDENCE`] that is present wins.
    pub fn aggregate<I>(states: I) -> Self
    where
        I: IntoIterator<Item = Health>,
    {
        let distinct: BTreeSet<Health> = states.into_iter().collect();

        match distinct.len() {
            0 => Self::Unknown,
            1 => distinct.into_iter().next().unwrap_or_default(),
            _ if distinct.contains(&Self::Up) => Self::Warning,
            _ => MIXED_PRECEDENCE
                .into_iter()
                .find(|health| distinct.contains(health))
                .unwrap_or_default(),
        }
    }

    /// Interpret a reported status string. An empty status means the signal was
    /// expected but missing, which counts as `Down`.
    pub fn from_status(status: &str) -> Self {
        if status.trim().is_empty() {
            return Self::Down;
        }
        status.parse().unwrap_or(Self::Unknown)
    }

    /// Pod phase as reported by the platform
    pub fn from_pod_phase(phase: &str) -> Self {
        match phase {
            "Running" => Self::Up,
            "Pending" => Self::Pending,
            "Succeeded" => Self::Stop,
            "Failed" => Self::Down,
            "Unknown" => Self::Unknown,
            other => Self::from_status(other),
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Pending => "PENDING",
            Self::ReadOnly => "READ_ONLY",
            Self::Down => "DOWN",
            Self::Stop => "STOP",
            Self::Warning => "WARNING",
            Self::Up => "UP",
        }
    }
}

impl FromStr for Health {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "UNKNOWN" => Ok(Self::Unknown),
            "PENDING" => Ok(Self::Pending),
            "READ_ONLY" | "READONLY" => Ok(Self::ReadOnly),
            "DOWN" => Ok(Self::Down),
            "STOP" | "STOPPED" => Ok(Self::Stop),
            "WARNING" => Ok(Self::Warning),
            "UP" => Ok(Self::Up),
            other => Err(format!("unknown health: {other}")),
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
