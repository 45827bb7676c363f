// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the sequence generator.

use std::fmt;

/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Generator error types.
#[derive(Debug)]
pub enum Error {
    /// Configuration error
    Config(String),
    /// Asset store error
    Asset(AssetError),
    /// Sampling error
    Sampling(SamplingError),
    /// Validation error
    Validation(ValidationError),
    /// Destination-format writer error
    Writer(String),
    /// A predefined generator failed
    Generation { name: String, message: String },
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Asset(e) => write!(f, "Asset error: {}", e),
            Error::Sampling(e) => write!(f, "Sampling error: {}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Writer(msg) => write!(f, "Writer error: {}", msg),
            Error::Generation { name, message } => {
                write!(f, "Generation of predefined sequence '{}' failed: {}", name, message)
            }
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Asset(e) => Some(e),
            Error::Sampling(e) => Some(e),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<AssetError> for Error {
    fn from(e: AssetError) -> Self {
        Error::Asset(e)
    }
}

impl From<SamplingError> for Error {
    fn from(e: SamplingError) -> Self {
        Error::Sampling(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Kind of stored asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Block,
    Ensemble,
    Sequence,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Block => write!(f, "block"),
            AssetKind::Ensemble => write!(f, "ensemble"),
            AssetKind::Sequence => write!(f, "sequence"),
        }
    }
}

/// Asset store errors.
#[derive(Debug)]
pub enum AssetError {
    /// No asset of this kind is stored under the name
    NotFound { kind: AssetKind, name: String },
    /// The asset map could not be written to durable storage
    Persistence(String),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound { kind, name } => write!(f, "No {} named '{}'", kind, name),
            AssetError::Persistence(msg) => write!(f, "Persistence failed: {}", msg),
        }
    }
}

impl std::error::Error for AssetError {}

/// Sampling errors.
#[derive(Debug)]
pub enum SamplingError {
    /// Declared channel counts disagree with the configured or element counts
    ChannelMismatch {
        context: String,
        expected_analog: usize,
        expected_digital: usize,
        found_analog: usize,
        found_digital: usize,
    },
    /// Another sampling operation is in progress
    Busy,
    /// An analog channel has no amplitude normalization entry
    MissingAmplitude(String),
    /// No writer is registered for the format key
    UnknownFormat(String),
    /// Sampling was cancelled between elements
    Cancelled,
}

impl fmt::Display for SamplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingError::ChannelMismatch {
                context,
                expected_analog,
                expected_digital,
                found_analog,
                found_digital,
            } => write!(
                f,
                "Channel mismatch in {}: expected ({} analog, {} digital), found ({} analog, {} digital)",
                context, expected_analog, expected_digital, found_analog, found_digital
            ),
            SamplingError::Busy => write!(f, "Generator is busy"),
            SamplingError::MissingAmplitude(channel) => {
                write!(f, "No amplitude defined for analog channel '{}'", channel)
            }
            SamplingError::UnknownFormat(format) => {
                write!(f, "No writer registered for format '{}'", format)
            }
            SamplingError::Cancelled => write!(f, "Sampling cancelled"),
        }
    }
}

impl std::error::Error for SamplingError {}

/// Validation errors.
#[derive(Debug)]
pub enum ValidationError {
    /// Field validation failed
    Field { field: String, message: String },
    /// Resource limit exceeded
    ResourceLimit {
        resource: String,
        limit: u64,
        requested: u64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Field { field, message } => {
                write!(f, "Field '{}': {}", field, message)
            }
            ValidationError::ResourceLimit {
                resource,
                limit,
                requested,
            } => {
                write!(
                    f,
                    "Resource limit exceeded for {}: limit={}, requested={}",
                    resource, limit, requested
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}
