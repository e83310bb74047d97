//! Half-open offset intervals over one document snapshot.

use std::fmt;

/// Byte interval `[start, end)` into the text of a single document revision.
///
/// Ranges from different revisions must never be compared directly; map them
/// through the document's edit log first (see `Document::map_range`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct TextRange {
    /// Exclusive end offset.
    end: usize,
    /// Inclusive start offset.
    start: usize,
}

impl TextRange {
    /// Range of `len` bytes starting at `start`.
    ///
    /// # Panics
    ///
    /// Panics if `start + len` overflows.
    pub fn at(start: usize, len: usize) -> Self {
        let Some(end) = start.checked_add(len) else {
            panic!("text range overflow: {start} + {len}");
        };
        return Self { end, start };
    }

    /// Whether `offset` lies inside the range. The end boundary counts as
    /// inside so a caret placed right after a word still hits it.
    pub const fn contains(&self, offset: usize) -> bool {
        return self.start <= offset && offset <= self.end;
    }

    /// Exclusive end offset.
    pub const fn end(&self) -> usize {
        return self.end;
    }

    /// Overlap of two ranges, if they share at least one position.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start > end {
            return None;
        }
        return Some(Self { end, start });
    }

    /// True when `start == end`.
    pub const fn is_empty(&self) -> bool {
        return self.start == self.end;
    }

    /// Length in bytes.
    pub const fn len(&self) -> usize {
        return self.end.saturating_sub(self.start);
    }

    /// Create a range from explicit offsets.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`. An inverted range is a programming error and
    /// must not be silently repaired.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "invalid text range: start {start} > end {end}");
        return Self { end, start };
    }

    /// Move both ends right by `offset`.
    ///
    /// # Panics
    ///
    /// Panics if either end overflows.
    pub fn shift_right(&self, offset: usize) -> Self {
        let (Some(start), Some(end)) = (self.start.checked_add(offset), self.end.checked_add(offset))
        else {
            panic!("text range overflow shifting {self} by {offset}");
        };
        return Self { end, start };
    }

    /// Move both ends by a signed delta. `None` if the start would become negative.
    pub fn shifted(&self, delta: isize) -> Option<Self> {
        let start = self.start.checked_add_signed(delta)?;
        let end = self.end.checked_add_signed(delta)?;
        return Some(Self { end, start });
    }

    /// Inclusive start offset.
    pub const fn start(&self) -> usize {
        return self.start;
    }

    /// The slice of `text` covered by this range.
    ///
    /// `None` if the range runs past the end of `text` or splits a character.
    pub fn substring<'a>(&self, text: &'a str) -> Option<&'a str> {
        return text.get(self.start..self.end);
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}..{}", self.start, self.end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_right_moves_both_ends() {
        let range = TextRange::new(2, 5).shift_right(10);
        assert_eq!(range, TextRange::new(12, 15));
    }

    #[test]
    fn shifted_rejects_negative_start() {
        assert_eq!(TextRange::new(2, 5).shifted(-3), None);
        assert_eq!(TextRange::new(2, 5).shifted(-2), Some(TextRange::new(0, 3)));
    }

    #[test]
    fn substring_checks_bounds() {
        assert_eq!(TextRange::new(2, 5).substring("# Title"), Some("Tit"));
        assert_eq!(TextRange::new(2, 9).substring("# Title"), None);
    }

    #[test]
    fn substring_rejects_split_characters() {
        // "é" is two bytes.
        assert_eq!(TextRange::new(0, 1).substring("é"), None);
        assert_eq!(TextRange::new(0, 2).substring("é"), Some("é"));
    }

    #[test]
    fn intersect_overlapping_and_disjoint() {
        let a = TextRange::new(0, 5);
        assert_eq!(a.intersect(&TextRange::new(3, 8)), Some(TextRange::new(3, 5)));
        assert_eq!(a.intersect(&TextRange::new(5, 8)), Some(TextRange::new(5, 5)));
        assert_eq!(a.intersect(&TextRange::new(6, 8)), None);
    }

    #[test]
    fn contains_includes_end_boundary() {
        let range = TextRange::new(3, 6);
        assert!(range.contains(3));
        assert!(range.contains(6));
        assert!(!range.contains(7));
    }

    #[test]
    #[should_panic(expected = "invalid text range")]
    fn inverted_range_panics() {
        let _range = TextRange::new(5, 2);
    }
}
