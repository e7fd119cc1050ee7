//! The file database used when reporting diagnostics.
//!
//! Both C inputs and dynamic schema files are loaded here so that
//! diagnostics can point into either of them.

use std::fmt;
use std::num::NonZeroU32;
use std::ops::Range;

use codespan_reporting::files::{Error, SimpleFile};

/// File id.
// `NonZeroU32` keeps `Option<FileRange>` the same size as `FileRange`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FileId(NonZeroU32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<u32> for FileId {
    type Error = <NonZeroU32 as TryFrom<u32>>::Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(FileId(NonZeroU32::try_from(value)?))
    }
}

impl From<FileId> for usize {
    fn from(value: FileId) -> Self {
        value.0.get() as Self
    }
}

pub struct Files {
    files: Vec<SimpleFile<String, String>>,
}

impl Files {
    /// Create an empty file database.
    pub fn new() -> Files {
        Files { files: Vec::new() }
    }

    /// Add a file to the database, returning the id used to refer to it.
    pub fn add(&mut self, name: String, source: String) -> FileId {
        self.files.push(SimpleFile::new(name, source));
        // File ids start at one, so the length after pushing is the new id
        let len = u32::try_from(self.files.len())
            .expect("too many files (maximum amount of files is `u32::MAX`)");
        FileId::try_from(len).expect("file length is non-zero after a push")
    }

    pub fn get(&self, file_id: FileId) -> Result<&SimpleFile<String, String>, Error> {
        let index = usize::from(file_id) - 1;
        self.files.get(index).ok_or(Error::FileMissing)
    }

    /// The source text of a file, or the empty string for unknown ids.
    pub fn source(&self, file_id: FileId) -> &str {
        self.get(file_id).map_or("", |file| file.source().as_str())
    }

    /// The name a file was loaded under, usually its path.
    pub fn name(&self, file_id: FileId) -> &str {
        self.get(file_id).map_or("", |file| file.name().as_str())
    }
}

impl Default for Files {
    fn default() -> Self {
        Files::new()
    }
}

impl<'a> codespan_reporting::files::Files<'a> for Files {
    type FileId = FileId;
    type Name = &'a str;
    type Source = &'a str;

    fn name(&'a self, file_id: FileId) -> Result<&'a str, Error> {
        Ok(self.get(file_id)?.name().as_str())
    }

    fn source(&'a self, file_id: FileId) -> Result<&'a str, Error> {
        Ok(self.get(file_id)?.source().as_str())
    }

    fn line_index(&'a self, file_id: FileId, byte_index: usize) -> Result<usize, Error> {
        self.get(file_id)?.line_index((), byte_index)
    }

    fn line_range(&'a self, file_id: FileId, line_index: usize) -> Result<Range<usize>, Error> {
        self.get(file_id)?.line_range((), line_index)
    }
}

#[cfg(test)]
mod tests {
    use codespan_reporting::files::Files as _;

    use super::*;

    #[test]
    fn ids_start_at_one() {
        let mut files = Files::new();
        let first = files.add("a.h".to_owned(), String::new());
        let second = files.add("b.bks".to_owned(), "name".to_owned());

        assert_eq!(usize::from(first), 1);
        assert_eq!(usize::from(second), 2);
        assert_eq!(Files::name(&files, second), "b.bks");
        assert_eq!(Files::source(&files, second), "name");
    }

    #[test]
    fn unknown_ids() {
        let files = Files::new();
        let file_id = FileId::try_from(3).unwrap();

        assert_eq!(Files::source(&files, file_id), "");
        assert!(matches!(files.get(file_id), Err(Error::FileMissing)));
        assert!(files.line_index(file_id, 0).is_err());
    }
}
