// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as capacity lower bounds, unit-interval thresholds, and backend
//! prerequisites.

use crate::diagnostic::ConfigError;
use crate::model::{BackendKind, MnemoConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MnemoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let capacities = [
        ("memory.short_term_capacity", config.memory.short_term_capacity),
        ("memory.long_term_capacity", config.memory.long_term_capacity),
        ("memory.file_storage_capacity", config.memory.file_storage_capacity),
        ("recall.max_search_results", config.recall.max_search_results),
        ("embedding.dimension", config.embedding.dimension),
        ("embedding.batch_size", config.embedding.batch_size),
        ("summarization.num_sentences", config.summarization.num_sentences),
    ];
    for (key, value) in capacities {
        if value == 0 {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be at least 1"),
            });
        }
    }

    if config.embedding.cache_enabled && config.embedding.cache_size == 0 {
        errors.push(ConfigError::Validation {
            message: "embedding.cache_size must be at least 1 when the cache is enabled"
                .to_string(),
        });
    }

    if config.embedding.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "embedding.timeout_secs must be at least 1".to_string(),
        });
    }

    let unit_values = [
        ("recall.similarity_threshold", config.recall.similarity_threshold),
        ("forget.forget_threshold", config.forget.forget_threshold),
        ("forget.decay_rate", config.forget.decay_rate),
        ("forget.min_relevance", config.forget.min_relevance),
        (
            "forget.consolidation_threshold",
            config.forget.consolidation_threshold,
        ),
    ];
    for (key, value) in unit_values {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be between 0.0 and 1.0, got {value}"),
            });
        }
    }

    for (key, ttl) in [
        ("memory.short_term_ttl_days", config.memory.short_term_ttl_days),
        ("memory.long_term_ttl_days", config.memory.long_term_ttl_days),
    ] {
        if ttl == Some(0) {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be at least 1 when set"),
            });
        }
    }

    if config.summarization.min_length > config.summarization.max_length {
        errors.push(ConfigError::Validation {
            message: format!(
                "summarization.min_length ({}) must not exceed summarization.max_length ({})",
                config.summarization.min_length, config.summarization.max_length
            ),
        });
    }

    if config.storage.backend == BackendKind::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty for the sqlite backend".to_string(),
        });
    }

    if config.storage.backend.needs_connection_string()
        && config
            .storage
            .connection_string
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "storage.connection_string is required for the {} backend",
                config.storage.backend
            ),
        });
    }

    if config.storage.file_storage_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.file_storage_dir must not be empty".to_string(),
        });
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
