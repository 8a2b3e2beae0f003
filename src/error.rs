use thiserror::Error;

/// Invalid publisher settings, reported by [`crate::Builder`].
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("measurement name must not be empty")]
    EmptyMeasurement,
    #[error("tag `{key}={value}` needs a non-empty key and value")]
    InvalidTag { key: String, value: String },
    #[error("step must be a positive finite number, got {0}")]
    InvalidStep(f64),
    #[error("modulus must be a positive finite number, got {0}")]
    InvalidModulus(f64),
    #[error("{0:?} contains a control character")]
    ControlCharacter(String),
    #[error("invalid collector url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("can not open socket to collector `{addr}`: {reason}")]
    InvalidAddress { addr: String, reason: String },
}
