//! Hex/ASCII rendering of byte runs for decode diagnostics.

/// Render bytes in 4-byte groups: `__` for NUL, the glyph for printable
/// ASCII, two-digit hex otherwise.
pub fn dump(data: &[u8]) -> String {
    data.chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .map(|b| glyph(*b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// As [`dump`] but capped at `limit` bytes, with a trailing marker when cut.
pub fn dump_truncated(data: &[u8], limit: usize) -> String {
    if data.len() <= limit {
        dump(data)
    } else {
        format!("{} ..", dump(&data[..limit]))
    }
}

fn glyph(byte: u8) -> String {
    match byte {
        0 => "__".to_owned(),
        0x21..=0x7E => format!("{} ", byte as char),
        other => format!("{other:02x}"),
    }
}

/// Byte count as a short human-readable figure, e.g. `1.5 MB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value > 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", (value * 100.0).round() / 100.0, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn groups_of_four() {
        assert_eq!(dump(&[0, b'A', 0xEF, 0xBE, 0x01]), "__ A  ef be | 01");
    }

    #[test]
    fn truncation_marker() {
        let out = dump_truncated(&[1u8; 64], 8);
        assert!(out.ends_with(".."));
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3 MB");
    }
}
