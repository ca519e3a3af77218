// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by adapter traits and the memory engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    /// Combine two statuses, keeping the worse one.
    ///
    /// Messages of equally bad statuses are joined with `"; "`.
    pub fn merge(self, other: HealthStatus) -> HealthStatus {
        use HealthStatus::*;
        match (self, other) {
            (Unhealthy(a), Unhealthy(b)) => Unhealthy(format!("{a}; {b}")),
            (Unhealthy(a), _) | (_, Unhealthy(a)) => Unhealthy(a),
            (Degraded(a), Degraded(b)) => Degraded(format!("{a}; {b}")),
            (Degraded(a), _) | (_, Degraded(a)) => Degraded(a),
            (Healthy, Healthy) => Healthy,
        }
    }
}

/// Identifies the kind of collaborator plugged into the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Embedding,
    Summarization,
    Backend,
}

// --- Embedding types ---

/// Input for an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    /// Texts to embed, in order.
    pub texts: Vec<String>,
}

/// Output from an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// One vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    /// Dimension shared by every vector.
    pub dimensions: usize,
}

// --- Summarization types ---

/// A request to a summarization adapter.
#[derive(Debug, Clone)]
pub struct SummarizationRequest {
    pub text: String,
    pub max_length: usize,
    pub min_length: usize,
}
