//! Text segmentation.
//!
//! Input text is split into one segment per non-blank line. Blank and
//! whitespace-only lines are dropped and do not consume an index, so indices
//! are only stable for one revision of the text. Every cache keyed by segment
//! index must be invalidated when the text changes.

use serde::Serialize;

/// One non-empty, trimmed line of the input text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Segment {
    /// Zero-based position in the filtered sequence
    pub index: usize,
    /// Trimmed line text, never empty
    pub text: String,
}

impl Segment {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// 1-based line number as shown to users.
    #[inline]
    pub fn line_number(&self) -> usize {
        self.index + 1
    }
}

/// Split raw text into ordered segments.
///
/// Lines are split on `\n` and trimmed (which also removes a trailing `\r`).
///
/// # Example
///
/// ```rust
/// use linecast::core::segment::split_segments;
///
/// let segments = split_segments("a\n\nb\n  \nc");
/// let texts: Vec<_> = segments.iter().map(|s| (s.index, s.text.as_str())).collect();
/// assert_eq!(texts, vec![(0, "a"), (1, "b"), (2, "c")]);
/// ```
pub fn split_segments(text: &str) -> Vec<Segment> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| Segment::new(index, line))
        .collect()
}
