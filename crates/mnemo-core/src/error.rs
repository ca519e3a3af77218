// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Mnemo memory engine.
//!
//! Routine absence (unknown id, expired record) is never an error: stores and
//! the manager return `Option` or `bool` for it. Only collaborator failures,
//! capacity rejection, and configuration problems surface here.

use thiserror::Error;

use crate::record::MemoryKind;

/// The primary error type used across Mnemo stores, adapters, and the manager.
#[derive(Debug, Error)]
pub enum MnemoError {
    /// Configuration errors (invalid TOML, unknown backend, missing injected adapter).
    #[error("configuration error: {0}")]
    Config(String),

    /// A store refused a new record because it is full.
    #[error("{kind} store rejected record: capacity {capacity} reached")]
    CapacityRejected { kind: MemoryKind, capacity: usize },

    /// Embedding or summarization collaborator failure.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A provider call did not finish within its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The caller cancelled the operation before the provider answered.
    #[error("operation cancelled")]
    Cancelled,

    /// Persistence backend or filesystem errors.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The request itself is unusable (missing file, wrong kind for the operation).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MnemoError {
    /// Wrap a collaborator failure with a short description.
    pub fn provider(message: impl Into<String>) -> Self {
        MnemoError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap any storage-layer error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MnemoError::Storage {
            source: Box::new(source),
        }
    }

    /// True for errors that degrade an operation instead of aborting it:
    /// provider failures, timeouts, and cancellation.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            MnemoError::Provider { .. } | MnemoError::Timeout { .. } | MnemoError::Cancelled
        )
    }
}

impl From<std::io::Error> for MnemoError {
    fn from(err: std::io::Error) -> Self {
        MnemoError::storage(err)
    }
}
