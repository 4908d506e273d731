use std::fmt;

use serde::{Deserialize, Serialize};

use crate::quantity::{Quantity, QuantityError};

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    #[default]
    Cpu,
    Memory,
}

impl ResourceType {
    /// key used by the platform in requests/limits maps
    pub fn key(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// CPU or memory limit of a process.
/// `minimum` maps to the request, `maximum` to the limit.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceLimit {
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub unit: String,
    pub minimum: i64,
    pub maximum: i64,
    pub threshold: i64,
}

impl ResourceLimit {
    pub fn cpu(unit: impl Into<String>, minimum: i64, maximum: i64) -> Self {
        Self {
            kind: ResourceType::Cpu,
            unit: unit.into(),
            minimum,
            maximum,
            threshold: 0,
        }
    }

    pub fn memory(unit: impl Into<String>, minimum: i64, maximum: i64) -> Self {
        Self {
            kind: ResourceType::Memory,
            unit: unit.into(),
            minimum,
            maximum,
            threshold: 0,
        }
    }

    /// Merge a partial override. Only strictly positive numbers and non empty
    /// units take effect; anything else leaves the current value alone.
    pub fn update(&mut self, other: &ResourceLimit) {
        if !other.unit.is_empty() {
            self.unit = other.unit.clone();
        }
        if other.minimum > 0 {
            self.minimum = other.minimum;
        }
        if other.maximum > 0 {
            self.maximum = other.maximum;
        }
        if other.threshold > 0 {
            self.threshold = other.threshold;
        }
    }

    /// request quantity, `None` when no minimum is set
    pub fn request(&self) -> Result<Option<Quantity>, QuantityError> {
        self.quantity(self.minimum)
    }

    /// limit quantity, `None` when no maximum is set
    pub fn limit(&self) -> Result<Option<Quantity>, QuantityError> {
        self.quantity(self.maximum)
    }

    fn quantity(&self, amount: i64) -> Result<Option<Quantity>, QuantityError> {
        if amount <= 0 {
            return Ok(None);
        }
        Quantity::with_unit(amount, &self.unit).map(Some)
    }
}
