//! Core data models shared by the segmenter, the ranker, and the
//! conversation layer.

use serde::{Deserialize, Serialize};

/// A contiguous slice of a document's words, rejoined with single spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in document order, starting at 0.
    pub index: usize,
    pub text: String,
}

impl Segment {
    /// Number of whitespace-separated words in the segment.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// The ordered segments of one document.
///
/// Built once per uploaded document by [`crate::segment::segment`] and
/// replaced wholesale when a new document arrives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SegmentCollection {
    segments: Vec<Segment>,
    size: usize,
}

impl SegmentCollection {
    pub(crate) fn new(segments: Vec<Segment>, size: usize) -> Self {
        Self { segments, size }
    }

    /// Words per segment this collection was built with.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn as_slice(&self) -> &[Segment] {
        &self.segments
    }

    /// Total words across all segments.
    pub fn word_count(&self) -> usize {
        self.segments.iter().map(Segment::word_count).sum()
    }
}

impl<'a> IntoIterator for &'a SegmentCollection {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Capitalized label used in the prompt transcript (`User`, `Assistant`).
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One message in a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
