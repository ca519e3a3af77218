// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record fixtures.

use chrono::{Duration, Utc};

use mnemo_core::{MemoryKind, MemoryRecord};

/// A short-term record with the given id and content.
pub fn short_term(id: &str, content: &str) -> MemoryRecord {
    MemoryRecord::new(id, content, MemoryKind::ShortTerm)
}

/// A long-term record with the given id and content.
pub fn long_term(id: &str, content: &str) -> MemoryRecord {
    MemoryRecord::new(id, content, MemoryKind::LongTerm)
}

/// A long-term record carrying an explicit embedding.
pub fn embedded(id: &str, embedding: Vec<f32>) -> MemoryRecord {
    long_term(id, id).with_embedding(embedding)
}

/// A record created `days` days ago.
pub fn aged(id: &str, kind: MemoryKind, days: i64) -> MemoryRecord {
    MemoryRecord::new(id, id, kind).with_created_at(Utc::now() - Duration::days(days))
}

/// A record that expired one second ago.
pub fn expired(id: &str, kind: MemoryKind) -> MemoryRecord {
    MemoryRecord::new(id, id, kind).with_expires_at(Utc::now() - Duration::seconds(1))
}

/// A unit vector in 2-D with cosine `similarity` to `[1, 0]`.
pub fn unit_at(similarity: f32) -> Vec<f32> {
    let s = similarity.clamp(0.0, 1.0);
    vec![s, (1.0 - s * s).sqrt()]
}
