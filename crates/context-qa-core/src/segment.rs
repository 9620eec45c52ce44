//! Fixed-size word segmenter.
//!
//! Splits extracted document text into a [`SegmentCollection`] of
//! contiguous, non-overlapping word windows. Segments partition the word
//! sequence exactly: concatenating every segment's words in order gives
//! back the document's words.
//!
//! # Algorithm
//!
//! 1. Tokenize the text on Unicode whitespace into words `W` (length `n`).
//! 2. Emit `W[k*size .. min((k+1)*size, n)]` joined by single spaces for
//!    `k = 0 .. ceil(n/size) - 1`.
//! 3. Empty or whitespace-only text yields zero segments, not one empty
//!    segment.
//!
//! # Example
//!
//! ```rust
//! use context_qa_core::segment::segment;
//!
//! let segments = segment("one two three four five", 2).unwrap();
//! assert_eq!(segments.len(), 3);
//! assert_eq!(segments.get(2).unwrap().text, "five");
//! ```

use crate::error::RetrievalError;
use crate::models::{Segment, SegmentCollection};

/// Words per segment when no size is configured.
pub const DEFAULT_SEGMENT_SIZE: usize = 300;

/// Split `text` into segments of at most `size` words.
///
/// # Errors
///
/// Returns [`RetrievalError::InvalidArgument`] when `size` is zero.
pub fn segment(text: &str, size: usize) -> Result<SegmentCollection, RetrievalError> {
    if size == 0 {
        return Err(RetrievalError::InvalidArgument(
            "segment size must be > 0".to_string(),
        ));
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let segments = words
        .chunks(size)
        .enumerate()
        .map(|(index, window)| Segment {
            index,
            text: window.join(" "),
        })
        .collect();

    Ok(SegmentCollection::new(segments, size))
}
