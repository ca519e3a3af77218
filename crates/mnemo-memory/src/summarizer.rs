// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summaries of record sets.
//!
//! A configured [`SummarizationAdapter`] is tried first; when it is absent or
//! fails, a deterministic extractive summary is used instead.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use mnemo_config::model::SummarizationConfig;
use mnemo_core::traits::SummarizationAdapter;
use mnemo_core::types::SummarizationRequest;
use mnemo_core::{MemoryRecord, MemorySummary, TimeRange};
use tracing::{debug, info, warn};

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "is",
    "was", "are", "were", "been", "be", "have", "has", "had", "it", "this", "that", "i", "you",
];

const KEY_PHRASE_COUNT: usize = 5;

pub struct Summarizer {
    provider: Option<Arc<dyn SummarizationAdapter>>,
    max_length: usize,
    min_length: usize,
    num_sentences: usize,
}

impl Summarizer {
    pub fn new(
        provider: Option<Arc<dyn SummarizationAdapter>>,
        config: &SummarizationConfig,
    ) -> Self {
        Self {
            provider,
            max_length: config.max_length,
            min_length: config.min_length,
            num_sentences: config.num_sentences,
        }
    }

    pub fn provider(&self) -> Option<&Arc<dyn SummarizationAdapter>> {
        self.provider.as_ref()
    }

    /// Summarize one text. Blank input yields an empty string.
    pub async fn summarize_text(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        if let Some(provider) = &self.provider {
            let request = SummarizationRequest {
                text: text.to_string(),
                max_length: self.max_length,
                min_length: self.min_length,
            };
            match provider.summarize(request).await {
                Ok(summary) => {
                    debug!(len = summary.len(), "provider summary");
                    return summary;
                }
                Err(err) => {
                    warn!(error = %err, "summarization provider failed; using extractive summary");
                }
            }
        }
        extractive_summary(text, self.num_sentences)
    }

    pub async fn batch_summarize(&self, texts: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.summarize_text(text).await);
        }
        out
    }

    /// Digest of `records`: summary text, sorted topics, key phrases, and
    /// the span of creation times.
    pub async fn summarize_memories(&self, records: &[MemoryRecord]) -> MemorySummary {
        if records.is_empty() {
            return MemorySummary::empty();
        }
        let combined = join_contents(records.iter());
        let summary_text = self.summarize_text(&combined).await;
        info!(count = records.len(), "summarized memories");
        MemorySummary {
            summary_text,
            num_memories: records.len(),
            topics: topics_of(records),
            key_phrases: key_phrases(&combined, KEY_PHRASE_COUNT),
            time_range: time_range_of(records),
        }
    }

    /// Summary of the records whose content or tags mention `topic`
    /// (case-insensitive).
    pub async fn summarize_by_topic(&self, records: &[MemoryRecord], topic: &str) -> MemorySummary {
        let needle = topic.to_lowercase();
        let relevant: Vec<MemoryRecord> = records
            .iter()
            .filter(|r| {
                r.content.to_lowercase().contains(&needle)
                    || r.tags.iter().any(|t| t.to_lowercase() == needle)
            })
            .cloned()
            .collect();
        if relevant.is_empty() {
            return MemorySummary {
                summary_text: format!("No memories found related to '{topic}'."),
                topics: vec![topic.to_string()],
                ..MemorySummary::empty()
            };
        }
        let combined = format!("Regarding {topic}: {}", join_contents(relevant.iter()));
        MemorySummary {
            summary_text: self.summarize_text(&combined).await,
            num_memories: relevant.len(),
            topics: vec![topic.to_string()],
            key_phrases: key_phrases(&combined, KEY_PHRASE_COUNT),
            time_range: time_range_of(&relevant),
        }
    }
}

fn join_contents<'a>(records: impl Iterator<Item = &'a MemoryRecord>) -> String {
    records
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn topics_of(records: &[MemoryRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn time_range_of(records: &[MemoryRecord]) -> Option<TimeRange> {
    let start = records.iter().map(|r| r.created_at).min()?;
    let end = records.iter().map(|r| r.created_at).max()?;
    Some(TimeRange { start, end })
}

/// Pick the `num_sentences` highest-scoring sentences, emitted in source order.
///
/// Sentences are split on `". "` and scored `len / (position + 1)`. Text
/// with no more sentences than requested is returned unchanged.
pub fn extractive_summary(text: &str, num_sentences: usize) -> String {
    let sentences: Vec<&str> = text.split(". ").collect();
    if sentences.len() <= num_sentences {
        return text.to_string();
    }

    let mut scored: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.len() as f64 / (i + 1) as f64))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut picked: Vec<usize> = scored.iter().take(num_sentences).map(|(i, _)| *i).collect();
    picked.sort_unstable();

    let mut summary = picked
        .iter()
        .map(|&i| sentences[i])
        .collect::<Vec<_>>()
        .join(". ");
    if !summary.ends_with('.') {
        summary.push('.');
    }
    summary
}

/// Most frequent non-stop-words, most frequent first; ties by first appearance.
pub fn key_phrases(text: &str, n: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let words = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()));
    for (position, word) in words.enumerate() {
        counts.entry(word).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(n).map(|(w, _, _)| w).collect()
}
