//! Character-range text edits over an original buffer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A half-open text range `[start, end)` in UTF-8 byte offsets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "invalid range: {start}..{end}");
        Self { start, end }
    }

    /// Creates a range from an offset and a length.
    pub fn at(offset: usize, length: usize) -> Self {
        Self::new(offset, offset + length)
    }

    pub fn empty(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Returns true if `other` lies within this range (improper subsets included).
    pub fn covers(self, other: TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns true if the two ranges share at least one character.
    pub fn overlaps(self, other: TextRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for TextRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A single replacement `(start, length, new_text)` over the original buffer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: TextRange,
    pub new_text: String,
    /// Edit group label, used for presentation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl TextEdit {
    pub fn replace(range: TextRange, text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: text.into(),
            group: None,
        }
    }

    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::replace(TextRange::empty(offset), text)
    }

    pub fn delete(range: TextRange) -> Self {
        Self::replace(range, String::new())
    }

    pub fn with_group(mut self, group: Option<String>) -> Self {
        self.group = group;
        self
    }

    pub fn offset(&self) -> usize {
        self.range.start
    }

    pub fn length(&self) -> usize {
        self.range.len()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("overlapping edits: {first} overlaps {second}")]
    OverlappingEdits { first: TextRange, second: TextRange },
    #[error("text edit range {range} is outside the buffer bounds (len={len})")]
    OutOfBounds { range: TextRange, len: usize },
    #[error("text edit range {range} does not fall on a character boundary")]
    NotCharBoundary { range: TextRange },
}

/// A normalized set of edits for one buffer.
///
/// Edits are sorted by position and never overlap. Insertions at the same offset keep
/// the order in which they were added.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEditSet {
    edits: Vec<TextEdit>,
}

impl TextEditSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set and rejects overlapping entries.
    pub fn from_edits(mut edits: Vec<TextEdit>) -> Result<Self, EditError> {
        // Stable sort: zero-length insertions sort before a replacement starting at the
        // same offset and keep their relative order.
        edits.sort_by(|a, b| {
            a.range
                .start
                .cmp(&b.range.start)
                .then_with(|| a.range.len().cmp(&b.range.len()))
        });
        edits.dedup_by(|b, a| a.range == b.range && a.new_text == b.new_text && !a.range.is_empty());

        let mut prev: Option<TextRange> = None;
        for edit in &edits {
            if let Some(prev_range) = prev
                && edit.range.start < prev_range.end
            {
                return Err(EditError::OverlappingEdits {
                    first: prev_range,
                    second: edit.range,
                });
            }
            if !edit.range.is_empty() || prev.is_none_or(|p| p.end <= edit.range.start) {
                prev = Some(edit.range);
            }
        }

        Ok(Self { edits })
    }

    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Applies the edits to `original` and returns the modified text.
    pub fn apply(&self, original: &str) -> Result<String, EditError> {
        let mut out = String::with_capacity(original.len());
        let mut cursor = 0;
        for edit in &self.edits {
            let range = edit.range;
            if range.end > original.len() {
                return Err(EditError::OutOfBounds {
                    range,
                    len: original.len(),
                });
            }
            if !original.is_char_boundary(range.start) || !original.is_char_boundary(range.end) {
                return Err(EditError::NotCharBoundary { range });
            }
            out.push_str(&original[cursor..range.start]);
            out.push_str(&edit.new_text);
            cursor = range.end;
        }
        out.push_str(&original[cursor..]);
        Ok(out)
    }
}

impl IntoIterator for TextEditSet {
    type Item = TextEdit;
    type IntoIter = std::vec::IntoIter<TextEdit>;

    fn into_iter(self) -> Self::IntoIter {
        self.edits.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sorted_edits() {
        let set = TextEditSet::from_edits(vec![
            TextEdit::replace(TextRange::new(6, 11), "there"),
            TextEdit::insert(0, ">> "),
        ])
        .unwrap();
        assert_eq!(set.apply("hello world").unwrap(), ">> hello there");
    }

    #[test]
    fn test_rejects_overlap() {
        let err = TextEditSet::from_edits(vec![
            TextEdit::replace(TextRange::new(0, 5), "a"),
            TextEdit::replace(TextRange::new(3, 8), "b"),
        ])
        .unwrap_err();
        assert!(matches!(err, EditError::OverlappingEdits { .. }));
    }

    #[test]
    fn test_insert_before_replacement_at_same_offset() {
        let set = TextEditSet::from_edits(vec![
            TextEdit::delete(TextRange::new(0, 3)),
            TextEdit::insert(0, "x"),
            TextEdit::insert(0, "y"),
        ])
        .unwrap();
        assert_eq!(set.apply("abcdef").unwrap(), "xydef");
    }

    #[test]
    fn test_adjacent_edits_do_not_overlap() {
        let set = TextEditSet::from_edits(vec![
            TextEdit::replace(TextRange::new(0, 2), "A"),
            TextEdit::replace(TextRange::new(2, 4), "B"),
        ])
        .unwrap();
        assert_eq!(set.apply("abcd").unwrap(), "AB");
    }

    #[test]
    fn test_out_of_bounds() {
        let set = TextEditSet::from_edits(vec![TextEdit::delete(TextRange::new(2, 10))]).unwrap();
        assert!(matches!(
            set.apply("abc"),
            Err(EditError::OutOfBounds { .. })
        ));
    }
}
