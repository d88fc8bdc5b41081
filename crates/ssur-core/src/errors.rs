//! Structured error types shared across SSUR crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`SsurError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (dimensions, option names, paths).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the sampler.
///
/// None of these are retried: configuration problems abort before sampling,
/// numerical failures abort the current run because a corrupted likelihood
/// would bias every summary written afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SsurError {
    /// Unrecognised or unimplemented option combination.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// Inconsistent dimensions between inputs.
    #[error("data shape error: {0}")]
    DataShape(ErrorInfo),
    /// Factorisation or sampling failure.
    #[error("numerical error: {0}")]
    Numerical(ErrorInfo),
    /// Output sink or input file failure.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl SsurError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SsurError::Configuration(info)
            | SsurError::DataShape(info)
            | SsurError::Numerical(info)
            | SsurError::Io(info) => info,
        }
    }

    /// Shorthand for a configuration error without context.
    pub fn configuration(code: &str, message: impl Into<String>) -> Self {
        SsurError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a numerical error without context.
    pub fn numerical(code: &str, message: impl Into<String>) -> Self {
        SsurError::Numerical(ErrorInfo::new(code, message))
    }

    /// Wraps an I/O failure, recording the offending path.
    pub fn io(code: &str, err: impl ToString, path: impl ToString) -> Self {
        SsurError::Io(ErrorInfo::new(code, err.to_string()).with_context("path", path))
    }
}
