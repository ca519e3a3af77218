// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence backends.
//!
//! A backend is an extra candidate source and write sink next to the
//! in-process stores, never a replacement for them.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryBackend;
pub use sqlite::SqliteBackend;
