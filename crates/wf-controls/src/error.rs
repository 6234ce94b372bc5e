//! Error types for control and rule operations.

use thiserror::Error;
use wf_network::NetworkError;

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// A control or rule with this name is already registered.
    #[error("Control or rule '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("No control or rule named '{name}'")]
    NotFound { name: String },

    /// A condition or action names an element that is not in the network.
    #[error("'{source_name}' references missing {kind} '{element}'")]
    DanglingReference {
        source_name: String,
        kind: &'static str,
        element: String,
    },

    /// The attribute exists but not for this element kind (e.g. level of a junction).
    #[error("'{source_name}' reads {attribute} of '{element}', which has no such attribute")]
    UnsupportedAttribute {
        source_name: String,
        element: String,
        attribute: &'static str,
    },

    /// A relative condition compares an element with itself.
    #[error("'{source_name}' compares '{element}' with itself")]
    SelfComparison { source_name: String, element: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Failed to apply action: {0}")]
    Network(#[from] NetworkError),
}
