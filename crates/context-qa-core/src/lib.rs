//! # Context QA Core
//!
//! Pure retrieval logic for Context QA: data models, the word-count
//! segmenter, the TF-IDF relevance ranker, and prompt assembly.
//!
//! This crate does no I/O. It has no tokio, HTTP, or filesystem
//! dependencies, so the same code runs inside the CLI, the HTTP server,
//! and unit tests unchanged.
//!
//! ```rust
//! use context_qa_core::rank::most_relevant;
//! use context_qa_core::segment::segment;
//!
//! let segments = segment("the cat sat on the mat the dog ran fast", 5).unwrap();
//! assert_eq!(segments.len(), 2);
//!
//! let best = most_relevant(&segments, "where is the dog").unwrap();
//! assert_eq!(best.index, 1);
//! ```

pub mod error;
pub mod models;
pub mod prompt;
pub mod rank;
pub mod segment;
