//! Positions and ranges in loaded files.

use std::fmt;
use std::ops::Range;

use crate::files::FileId;

/// Byte offsets into source files.
pub type BytePos = u32;

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ByteRange {
    start: BytePos,
    end: BytePos,
}

impl fmt::Debug for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteRange({}..{})", self.start, self.end)
    }
}

impl ByteRange {
    pub const fn new(start: BytePos, end: BytePos) -> ByteRange {
        ByteRange { start, end }
    }

    /// Build a range from `usize` offsets, saturating at [`BytePos::MAX`].
    pub fn from_offsets(start: usize, end: usize) -> ByteRange {
        let clamp = |pos: usize| BytePos::try_from(pos).unwrap_or(BytePos::MAX);
        ByteRange::new(clamp(start), clamp(end))
    }

    pub const fn start(&self) -> BytePos {
        self.start
    }

    pub const fn end(&self) -> BytePos {
        self.end
    }

    /// Shift the range forward, used for ranges relative to an embedded
    /// piece of text such as a template inside a schema file.
    pub fn shift(self, offset: BytePos) -> ByteRange {
        ByteRange::new(
            self.start.saturating_add(offset),
            self.end.saturating_add(offset),
        )
    }
}

impl From<ByteRange> for Range<usize> {
    fn from(range: ByteRange) -> Self {
        (range.start as usize)..(range.end as usize)
    }
}

/// Byte ranges in a specific file.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct FileRange {
    file_id: FileId,
    byte_range: ByteRange,
}

impl fmt::Debug for FileRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FileRange({}, {}..{})",
            self.file_id, self.byte_range.start, self.byte_range.end
        )
    }
}

impl FileRange {
    pub const fn new(file_id: FileId, byte_range: ByteRange) -> FileRange {
        FileRange {
            file_id,
            byte_range,
        }
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub const fn byte_range(&self) -> ByteRange {
        self.byte_range
    }

    pub const fn start(&self) -> BytePos {
        self.byte_range.start
    }

    pub const fn end(&self) -> BytePos {
        self.byte_range.end
    }
}

impl From<FileRange> for Range<usize> {
    fn from(file_range: FileRange) -> Self {
        file_range.byte_range.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// `FileRange` is stored on every message. Ensure it doesn't grow accidentally.
    fn file_range_size() {
        assert_eq!(std::mem::size_of::<FileRange>(), 12);
        assert_eq!(std::mem::size_of::<Option<FileRange>>(), 12);
    }

    #[test]
    fn shift_moves_both_ends() {
        let range = ByteRange::new(2, 5).shift(10);
        assert_eq!(range, ByteRange::new(12, 15));
        assert_eq!(Range::<usize>::from(range), 12..15);
    }

    #[test]
    fn from_offsets_saturates() {
        let range = ByteRange::from_offsets(1, usize::MAX);
        assert_eq!(range.start(), 1);
        assert_eq!(range.end(), BytePos::MAX);
    }
}
