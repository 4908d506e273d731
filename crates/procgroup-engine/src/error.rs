use procgroup_metadata::quantity::QuantityError;

use crate::client::ClientError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while reconciling or observing a process group
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The resource exists and the desired state does not allow updating it
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },
    /// A required argument was empty
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    /// A call to the cluster failed
    #[error("{operation} {kind} {name} failed")]
    RemoteFailure {
        operation: &'static str,
        kind: &'static str,
        name: String,
        source: ClientError,
    },
    /// One of the concurrent observations failed, the rest were still collected
    #[error("partial collection, {source_kind} unavailable")]
    PartialCollection {
        source_kind: &'static str,
        source: Box<EngineError>,
    },
    /// The operation context was cancelled before the call completed
    #[error("operation cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    pub(crate) fn remote(
        operation: &'static str,
        kind: &'static str,
        name: impl Into<String>,
        source: ClientError,
    ) -> Self {
        Self::RemoteFailure {
            operation,
            kind,
            name: name.into(),
            source,
        }
    }

    /// true if the failure was a missing object on the cluster
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RemoteFailure { source, .. } if source.is_not_found())
    }
}

impl From<QuantityError> for EngineError {
    fn from(err: QuantityError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
