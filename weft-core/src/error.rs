//! Error Types
//!
//! Every fallible operation in the runtime returns [`Result`]. Errors fall
//! into three families:
//!
//! - Observation errors: reactivity could not be established or the owner of
//!   the data is gone (`Frozen`, `TornDown`, `InvalidData`, lookups that miss,
//!   `IndexOutOfRange`).
//! - Reconciliation errors: the external tree refused an operation
//!   (`Target`) or a vnode reached `patch` without a handle (`MissingHandle`).
//!   These are recoverable and never abort sibling subtrees.
//! - Scheduler errors: a subscriber failed (`Evaluation`) or kept dirtying
//!   itself (`UpdateLoop`).

use thiserror::Error;

use crate::reactive::SubscriberId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the reactive runtime and the reconciler.
#[derive(Debug, Error)]
pub enum Error {
    /// A write or observation was attempted on a frozen container.
    #[error("cannot make `{key}` reactive: container is frozen")]
    Frozen { key: String },

    /// The component owning the data has been destroyed.
    #[error("component {id} has been torn down")]
    TornDown { id: u64 },

    /// Component data did not evaluate to an object.
    #[error("component data must be an object, found {found}")]
    InvalidData { found: &'static str },

    /// No data property or computed value with this name.
    #[error("unknown property `{key}`")]
    UnknownProperty { key: String },

    /// An array cannot grow to hold this index.
    #[error("index {index} is out of range")]
    IndexOutOfRange { index: usize },

    /// No method with this name.
    #[error("unknown method `{name}`")]
    UnknownMethod { name: String },

    /// The component has no render function.
    #[error("component has no render function")]
    MissingRender,

    /// A subscriber kept re-queueing itself within one flush.
    #[error("subscriber {id} exceeded {limit} updates in one flush, possible infinite loop")]
    UpdateLoop { id: SubscriberId, limit: usize },

    /// A subscriber's callback failed.
    #[error("subscriber {id} failed: {source}")]
    Evaluation {
        id: SubscriberId,
        #[source]
        source: Box<Error>,
    },

    /// The external tree rejected an operation.
    #[error("target rejected {op}: {reason}")]
    Target { op: &'static str, reason: String },

    /// A vnode was patched before it was materialized.
    #[error("vnode has no external handle")]
    MissingHandle,

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Failure raised by user code.
    #[error("{0}")]
    Callback(String),

    /// Several failures surfaced together.
    #[error("{} errors occurred: {}", .0.len(), join(.0))]
    Aggregate(Vec<Error>),
}

impl Error {
    /// Build a user-level failure from any displayable message.
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback(message.into())
    }

    /// Fold a list of errors into a single result.
    ///
    /// An empty list is success; a single error is returned as-is.
    pub fn collect(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Aggregate(errors)),
        }
    }
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
