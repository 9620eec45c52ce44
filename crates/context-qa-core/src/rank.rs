//! Lexical relevance ranking with TF-IDF and cosine similarity.
//!
//! Given a [`SegmentCollection`] and a query, picks the single segment
//! whose TF-IDF vector points in the direction closest to the query's.
//! This is lexical matching only: no embeddings are involved.
//!
//! # Scoring Algorithm
//!
//! 1. Tokenize the query and every segment with [`tokenize`].
//! 2. Treat the query as document 0 and the segments as documents
//!    `1..=m`. `N = m + 1`.
//! 3. For each term, `df(t)` = number of those documents containing it and
//!    `idf(t) = ln((1 + N) / (1 + df(t))) + 1`.
//! 4. Weight each term of each document by `count × idf`.
//! 5. Cosine similarity between the query vector and each segment vector.
//!    If either vector has zero magnitude the similarity is `0.0`.
//! 6. Argmax over the scores; ties go to the lowest segment index.
//!
//! Vocabulary and IDF are rebuilt on every call because the query is part
//! of the corpus. Segment-side term counts do not depend on the query, so
//! a [`TermIndex`] can be built once per collection and reused.
//!
//! Term maps are `BTreeMap`s so that floating-point sums always run in the
//! same order: identical inputs give bit-identical scores.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::RetrievalError;
use crate::models::{Segment, SegmentCollection};

/// Tokens shorter than this (in chars) are dropped.
const MIN_TOKEN_CHARS: usize = 2;

type TermCounts = BTreeMap<String, u32>;

/// Split text into normalized terms.
///
/// Text is lowercased, then split into maximal runs of alphanumeric
/// characters and `_`. Runs shorter than two characters are discarded.
/// Query and segments always go through this same function.
///
/// ```rust
/// use context_qa_core::rank::tokenize;
///
/// assert_eq!(tokenize("Where's the DOG? (a)"), vec!["where", "the", "dog"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

fn term_counts(text: &str) -> TermCounts {
    let mut counts = TermCounts::new();
    for term in tokenize(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

/// Segment-side term counts for one [`SegmentCollection`].
///
/// Holds no IDF weights: those depend on the query and are recomputed by
/// [`TermIndex::scores`] on every call.
#[derive(Debug, Clone, Default)]
pub struct TermIndex {
    docs: Vec<TermCounts>,
}

impl TermIndex {
    pub fn build(segments: &SegmentCollection) -> Self {
        Self {
            docs: segments.iter().map(|s| term_counts(&s.text)).collect(),
        }
    }

    /// Number of segments indexed.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Distinct terms across all indexed segments.
    pub fn vocabulary_size(&self) -> usize {
        self.docs
            .iter()
            .flat_map(|doc| doc.keys().map(String::as_str))
            .collect::<BTreeSet<&str>>()
            .len()
    }

    /// Cosine similarity of `query` against every indexed segment, in
    /// segment order. Every score is finite and in `[0.0, 1.0]`.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let query_counts = term_counts(query);
        let corpus_size = (self.docs.len() + 1) as f64;

        let mut df: BTreeMap<&str, u32> = BTreeMap::new();
        for doc in std::iter::once(&query_counts).chain(self.docs.iter()) {
            for term in doc.keys() {
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }
        let idf = |term: &str| -> f64 {
            let df = df.get(term).copied().unwrap_or(0) as f64;
            ((1.0 + corpus_size) / (1.0 + df)).ln() + 1.0
        };

        let query_weights: BTreeMap<&str, f64> = query_counts
            .iter()
            .map(|(term, &count)| (term.as_str(), count as f64 * idf(term)))
            .collect();
        let query_norm = query_weights.values().map(|w| w * w).sum::<f64>().sqrt();

        self.docs
            .iter()
            .map(|doc| {
                let mut dot = 0.0f64;
                let mut norm_sq = 0.0f64;
                for (term, &count) in doc {
                    let weight = count as f64 * idf(term);
                    norm_sq += weight * weight;
                    if let Some(qw) = query_weights.get(term.as_str()) {
                        dot += weight * qw;
                    }
                }
                let denom = query_norm * norm_sq.sqrt();
                if denom < f64::EPSILON {
                    0.0
                } else {
                    dot / denom
                }
            })
            .collect()
    }
}

/// A segment chosen by the ranker, with its cosine score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked<'a> {
    pub segment: &'a Segment,
    pub score: f64,
}

/// Cosine score of every segment against `query`, in segment order.
pub fn score_segments(segments: &SegmentCollection, query: &str) -> Vec<f64> {
    TermIndex::build(segments).scores(query)
}

/// Pick the best segment for `query` using a prebuilt [`TermIndex`].
///
/// # Errors
///
/// [`RetrievalError::InvalidState`] when `segments` is empty or when
/// `index` was built from a different collection.
pub fn best_match_indexed<'a>(
    segments: &'a SegmentCollection,
    index: &TermIndex,
    query: &str,
) -> Result<Ranked<'a>, RetrievalError> {
    if segments.is_empty() {
        return Err(RetrievalError::InvalidState(
            "no segments loaded to rank".to_string(),
        ));
    }
    if index.len() != segments.len() {
        return Err(RetrievalError::InvalidState(format!(
            "term index covers {} segments, collection has {}",
            index.len(),
            segments.len()
        )));
    }

    let scores = index.scores(query);
    let (best, score) = argmax(&scores).ok_or_else(|| {
        RetrievalError::InvalidState("no segments loaded to rank".to_string())
    })?;

    let segment = segments.get(best).ok_or_else(|| {
        RetrievalError::InvalidState(format!("segment {} out of range", best))
    })?;
    Ok(Ranked { segment, score })
}

/// Pick the best segment for `query`, building the term index on the fly.
pub fn best_match<'a>(
    segments: &'a SegmentCollection,
    query: &str,
) -> Result<Ranked<'a>, RetrievalError> {
    best_match_indexed(segments, &TermIndex::build(segments), query)
}

/// Return the segment most relevant to `query`.
///
/// # Errors
///
/// [`RetrievalError::InvalidState`] when `segments` is empty. Callers
/// with no document loaded should skip ranking and use an empty context.
pub fn most_relevant<'a>(
    segments: &'a SegmentCollection,
    query: &str,
) -> Result<&'a Segment, RetrievalError> {
    best_match(segments, query).map(|ranked| ranked.segment)
}

/// Index and value of the first maximum. Strict `>` keeps the earliest
/// index on ties.
fn argmax(scores: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best
}
