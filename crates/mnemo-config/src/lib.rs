// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Mnemo memory engine.
//!
//! A [`MnemoConfig`] is assembled from compiled defaults, the `mnemo.toml`
//! files returned by [`loader::search_paths`], and `MNEMO_*` environment
//! variables. Every section rejects unknown keys, and the result is then
//! checked by [`validation::validate_config`]. Both stages report through
//! [`ConfigError`], so a host can print every problem with [`render_errors`]
//! before building a memory manager.
//!
//! ```no_run
//! let config = match mnemo_config::load_and_validate() {
//!     Ok(config) => config,
//!     Err(errors) => {
//!         mnemo_config::render_errors(&errors);
//!         std::process::exit(2);
//!     }
//! };
//! assert!(config.memory.short_term_capacity >= 1);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{BackendKind, MnemoConfig};

/// Load from the standard files and environment, then validate.
pub fn load_and_validate() -> Result<MnemoConfig, Vec<ConfigError>> {
    checked(loader::load_config(), read_sources)
}

/// Validate configuration given as a TOML string. Nothing else is consulted.
pub fn load_and_validate_str(toml_content: &str) -> Result<MnemoConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Validate a successful load, or turn a figment failure into diagnostics
/// spanned against `sources`. Sources are read only on failure.
fn checked(
    loaded: Result<MnemoConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<MnemoConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Contents of every search-path file that exists, keyed by display path.
fn read_sources() -> Vec<(String, String)> {
    loader::search_paths()
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some((display_path(&path), content))
        })
        .collect()
}

fn display_path(path: &Path) -> String {
    if path.is_absolute() {
        return path.display().to_string();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path).display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}
