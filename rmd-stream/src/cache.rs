//! On-disk string-array cache.
//!
//! Archive readers reconstruct large name tables from raw name blobs; the
//! result is memoized in a compact `index -> string` file so later sessions
//! skip the rebuild. Format:
//!
//! ```text
//! [count: u32le] [len_0: u32le .. len_{count-1}: u32le] [utf8 bytes, concatenated]
//! ```
//!
//! Keys are dense `0..count-1`, so the in-memory form is a `Vec<String>`.
//! Writes replace the whole file; readers that find a missing or torn file
//! rebuild from scratch.

use std::fs;
use std::path::Path;

use crate::error::{Result, StreamError};

pub struct StringCacheFile;

impl StringCacheFile {
    /// Serialize `strings` to `path`, replacing any previous content.
    pub fn write(path: &Path, strings: &[String]) -> Result<()> {
        let mut lens = Vec::with_capacity(4 * strings.len());
        let mut bodies = Vec::new();
        for s in strings {
            lens.extend_from_slice(&(s.len() as u32).to_le_bytes());
            bodies.extend_from_slice(s.as_bytes());
        }
        let mut out = Vec::with_capacity(4 + lens.len() + bodies.len());
        out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
        out.extend_from_slice(&lens);
        out.extend_from_slice(&bodies);
        fs::write(path, out)?;
        Ok(())
    }

    /// Read a cache file back into its string vector.
    pub fn read(path: &Path) -> Result<Vec<String>> {
        let data = fs::read(path)?;
        let malformed = |reason: &str| StreamError::MalformedCache {
            path: path.to_path_buf(),
            reason: reason.to_owned(),
        };

        if data.len() < 4 {
            return Err(malformed("missing count word"));
        }
        let count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let lens_end = 4 + 4 * count;
        if data.len() < lens_end {
            return Err(malformed("length table truncated"));
        }

        let mut strings = Vec::with_capacity(count);
        let mut cursor = lens_end;
        for i in 0..count {
            let at = 4 + 4 * i;
            let len = u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
                as usize;
            let end = cursor
                .checked_add(len)
                .filter(|end| *end <= data.len())
                .ok_or_else(|| malformed("string body truncated"))?;
            let body = String::from_utf8(data[cursor..end].to_vec())
                .map_err(|_| malformed("string body is not UTF-8"))?;
            strings.push(body);
            cursor = end;
        }
        Ok(strings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn roundtrip_basic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.strarray_fldr");
        let names = vec![
            String::new(),
            "data".to_owned(),
            "textures/αβ".to_owned(),
        ];
        StringCacheFile::write(&path, &names).unwrap();
        assert_eq!(StringCacheFile::read(&path).unwrap(), names);
    }

    #[test]
    fn overwrite_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.strarray_file");
        StringCacheFile::write(&path, &["long entry that will vanish".to_owned()]).unwrap();
        StringCacheFile::write(&path, &["x".to_owned()]).unwrap();
        assert_eq!(StringCacheFile::read(&path).unwrap(), vec!["x".to_owned()]);
    }

    #[test]
    fn torn_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.strarray_arch");
        std::fs::write(&path, [9, 0, 0, 0, 1]).unwrap();
        assert!(StringCacheFile::read(&path).is_err());
    }

    proptest! {
        #[test]
        fn roundtrip_any_utf8(names in proptest::collection::vec(".*", 0..24)) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("prop.strarray");
            let names: Vec<String> = names;
            StringCacheFile::write(&path, &names).unwrap();
            prop_assert_eq!(StringCacheFile::read(&path).unwrap(), names);
        }
    }
}
