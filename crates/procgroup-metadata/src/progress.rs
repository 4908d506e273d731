use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::health::Health;
use crate::labels::Labels;

pub const INDICATOR_CPU: &str = "cpu";
pub const INDICATOR_MEMORY: &str = "memory";
pub const INDICATOR_SERVICE: &str = "service";
pub const INDICATOR_GROUP: &str = "group";

pub const DETAIL_NODE: &str = "node";
pub const DETAIL_HOST_IP: &str = "hostIp";
pub const DETAIL_POD_IP: &str = "podIp";
pub const DETAIL_POD: &str = "pod";
pub const DETAIL_PORTS: &str = "ports";
pub const DETAIL_SERVICE: &str = "service";
pub const DETAIL_RESTARTS: &str = "restarts";

/// Observation of a single process taken during one collection cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub namespace: String,
    /// owning group
    pub pid: String,
    pub name: String,
    pub status: Health,
    pub labels: Labels,
    /// resource usage and nested health
    pub indicators: BTreeMap<String, Value>,
    /// structural facts such as node and exposed ports
    pub details: BTreeMap<String, Value>,
    pub time: DateTime<Utc>,
}

impl Progress {
    pub fn new(
        namespace: impl Into<String>,
        pid: impl Into<String>,
        name: impl Into<String>,
        status: Health,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pid: pid.into(),
            name: name.into(),
            status,
            labels: Labels::new(),
            indicators: BTreeMap::new(),
            details: BTreeMap::new(),
            time: Utc::now(),
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_indicator(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.indicators.insert(key.into(), value.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    /// health of the service exposing this process, if any
    pub fn service_health(&self) -> Option<Health> {
        self.indicators
            .get(INDICATOR_SERVICE)
            .and_then(Value::as_str)
            .map(Health::from_status)
    }

    /// aggregate health of the owning group
    pub fn group_health(&self) -> Option<Health> {
        self.indicators
            .get(INDICATOR_GROUP)
            .and_then(Value::as_str)
            .map(Health::from_status)
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_nested_health() {
        let progress = Progress::new("ns", "g1", "web", Health::Up)
            .with_indicator(INDICATOR_SERVICE, Health::Pending.as_str())
            .with_indicator(INDICATOR_GROUP, Health::Warning.as_str())
            .with_detail(DETAIL_NODE, "node-1");

        assert_eq!(progress.service_health(), Some(Health::Pending));
        assert_eq!(progress.group_health(), Some(Health::Warning));
        assert_eq!(
            progress.details.get(DETAIL_NODE).and_then(Value::as_str),
            Some("node-1")
        );
    }

    #[test]
    fn test_serialized_shape() {
        let progress = Progress::new("ns", "g1", "web", Health::ReadOnly);
        let value = serde_json::to_value(&progress).expect("serialize");
        assert_eq!(value["status"], "READ_ONLY");
        assert_eq!(value["pid"], "g1");
    }
}
