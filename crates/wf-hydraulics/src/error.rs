//! Equation builder errors.

use thiserror::Error;
use wf_aml::AmlError;
use wf_network::NetworkError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HydraulicsError {
    #[error("Model error: {0}")]
    Aml(#[from] AmlError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Invalid hydraulic option: {what}")]
    InvalidOption { what: &'static str },
}

pub type HydraulicsResult<T> = Result<T, HydraulicsError>;
