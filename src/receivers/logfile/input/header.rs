// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// The leading bytes of a file. Two handles whose prefixes differ refer to
/// different files even when their lengths agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPrefix {
    bytes: Vec<u8>,
}

impl HeaderPrefix {
    /// Read up to `size` bytes from the start of the file. Leaves the
    /// position wherever the read stopped.
    pub fn read_from(file: &mut File, size: usize) -> io::Result<Self> {
        file.seek(SeekFrom::Start(0))?;

        let mut bytes = Vec::with_capacity(size);
        file.by_ref().take(size as u64).read_to_end(&mut bytes)?;

        Ok(Self { bytes })
    }

    /// Like [`HeaderPrefix::read_from`], but restores the original position
    /// whether or not the read succeeded.
    pub fn read_preserving_position(file: &mut File, size: usize) -> io::Result<Self> {
        let position = file.stream_position()?;
        let result = Self::read_from(file, size);
        file.seek(SeekFrom::Start(position))?;
        result
    }

    /// Read the prefix through a fresh handle on `path`.
    pub fn read_path(path: &Path, size: usize) -> io::Result<Self> {
        let mut file = File::open(path)?;
        Self::read_from(&mut file, size)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_prefix_truncates_to_size() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let prefix = HeaderPrefix::read_path(file.path(), 5).unwrap();
        assert_eq!(prefix.bytes(), b"hello");

        let prefix = HeaderPrefix::read_path(file.path(), 256).unwrap();
        assert_eq!(prefix.len(), 11);
    }

    #[test]
    fn test_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let prefix = HeaderPrefix::read_path(file.path(), 16).unwrap();
        assert!(prefix.is_empty());
    }

    #[test]
    fn test_position_is_restored() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let mut handle = file.reopen().unwrap();
        handle.seek(SeekFrom::Start(7)).unwrap();

        let prefix = HeaderPrefix::read_preserving_position(&mut handle, 4).unwrap();
        assert_eq!(prefix.bytes(), b"0123");
        assert_eq!(handle.stream_position().unwrap(), 7);
    }

    #[test]
    fn test_different_content_same_length() {
        let mut a = NamedTempFile::new().unwrap();
        a.write_all(b"first line\n").unwrap();
        let mut b = NamedTempFile::new().unwrap();
        b.write_all(b"other line\n").unwrap();

        let pa = HeaderPrefix::read_path(a.path(), 256).unwrap();
        let pb = HeaderPrefix::read_path(b.path(), 256).unwrap();
        assert_ne!(pa, pb);
        assert_eq!(pa.len(), pb.len());
    }
}
