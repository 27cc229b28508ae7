//! Back-scan for trailing null-terminated string arrays.
//!
//! Streamed-resource bins end with a name array preceded by its own size as
//! a little-endian word. When the per-resource metadata length is unknown the
//! array start has to be recovered from the tail: find a word whose value
//! equals its distance from the end, then confirm the region splits into the
//! expected number of null-terminated strings.

use tracing::debug;

use crate::error::{Result, StreamError};

/// Locate the size of the trailing name array holding exactly `name_count`
/// null-terminated strings. Returns the distance from the end of `data` to
/// the first name byte.
pub fn find_nts_array_start(name_count: usize, data: &[u8]) -> Result<usize> {
    let len = data.len();
    for tail in 0..len.saturating_sub(4) {
        let word_start = len - tail - 4;
        let candidate = u32::from_le_bytes([
            data[word_start],
            data[word_start + 1],
            data[word_start + 2],
            data[word_start + 3],
        ]) as usize;
        if candidate != tail {
            continue;
        }
        debug!(size = tail, "name-array size candidate");
        if counts_nts(&data[len - tail..], name_count) {
            return Ok(tail);
        }
        // Collisions happen; keep scanning.
        debug!(size = tail, "name-array candidate rejected");
    }
    Err(StreamError::NtsArrayNotFound { count: name_count })
}

/// True when `region` is exactly `expected` null-terminated strings.
fn counts_nts(region: &[u8], expected: usize) -> bool {
    if region.last() != Some(&0) {
        return false;
    }
    region.iter().filter(|b| **b == 0).count() == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build(names: &[&str], padding: usize) -> Vec<u8> {
        let mut tail = Vec::new();
        for name in names {
            tail.extend_from_slice(name.as_bytes());
            tail.push(0);
        }
        let mut data = vec![0xAA; padding];
        data.extend_from_slice(&(tail.len() as u32).to_le_bytes());
        data.extend_from_slice(&tail);
        data
    }

    #[test]
    fn finds_simple_array() {
        let data = build(&["alpha.tex", "beta.tex"], 32);
        let size = find_nts_array_start(2, &data).unwrap();
        assert_eq!(size, "alpha.tex\0beta.tex\0".len());
    }

    #[test]
    fn wrong_count_fails() {
        let data = build(&["only.one"], 16);
        assert!(find_nts_array_start(3, &data).is_err());
    }
}
