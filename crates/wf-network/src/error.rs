//! Network construction and mutation errors.

use thiserror::Error;

pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Unknown {kind} '{name}'")]
    UnknownElement { kind: &'static str, name: String },

    #[error("Unknown {kind} id {index}")]
    UnknownId { kind: &'static str, index: u32 },

    #[error("Link '{link}' connects node '{node}' to itself")]
    SelfLoop { link: String, node: String },

    #[error("Node '{node}' is still connected to {links} link(s)")]
    NodeInUse { node: String, links: usize },

    #[error("Invalid {what} on '{element}': {reason}")]
    InvalidParameter {
        element: String,
        what: &'static str,
        reason: String,
    },

    #[error("Invalid curve '{curve}': {reason}")]
    InvalidCurve { curve: String, reason: String },

    #[error("Attribute {attribute} is not defined for '{element}'")]
    UnsupportedAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("Network has junctions but no tank or reservoir to fix the head")]
    NoFixedHead,
}

impl NetworkError {
    pub(crate) fn invalid(
        element: impl Into<String>,
        what: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        NetworkError::InvalidParameter {
            element: element.into(),
            what,
            reason: reason.into(),
        }
    }
}
