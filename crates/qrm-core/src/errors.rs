//! Structured error types shared across QRM crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`QrmError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (cell index, bitstring, sizes, etc.).
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

/// Canonical error type for the post-processing engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum QrmError {
    /// Invalid window, subsystem size, shot count or worker count.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Kernel binding or invocation errors.
    #[error("backend error: {0}")]
    Backend(ErrorInfo),
    /// Malformed histograms.
    #[error("data error: {0}")]
    Data(ErrorInfo),
    /// Failures raised while a cell was executing on a worker.
    #[error("worker error: {0}")]
    Worker(ErrorInfo),
    /// Serialization errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
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

impl QrmError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            QrmError::Config(info)
            | QrmError::Backend(info)
            | QrmError::Data(info)
            | QrmError::Worker(info)
            | QrmError::Serde(info) => info,
        }
    }

    fn info_mut(&mut self) -> &mut ErrorInfo {
        match self {
            QrmError::Config(info)
            | QrmError::Backend(info)
            | QrmError::Data(info)
            | QrmError::Worker(info)
            | QrmError::Serde(info) => info,
        }
    }

    /// Returns the histogram index recorded in the error context, if any.
    pub fn index(&self) -> Option<usize> {
        self.info()
            .context
            .get("index")
            .and_then(|raw| raw.parse().ok())
    }

    /// Adds a context entry to the payload, whatever the family.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.info_mut().context.insert(key.into(), value.to_string());
        self
    }

    /// Tags the error with the index of the histogram that produced it.
    ///
    /// An index that is already present is kept.
    pub fn at_index(mut self, index: usize) -> Self {
        self.info_mut()
            .context
            .entry("index".to_string())
            .or_insert_with(|| index.to_string());
        self
    }
}
