//! First-generation record layouts.
//!
//! A `.bin` sidecar's folder and file records come in five layouts keyed by
//! the header's minor version. They share one field order and differ in
//! byte order, pointer width, interior padding, and whether file records
//! carry a write time.

use rmd_stream::Endian;

/// Record layout of one v1.x minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub endian: Endian,
    /// Width of the next/parent/name-offset words in bytes.
    pub word: usize,
    /// Four alignment bytes follow each 4-byte CRC/flag field.
    pub padded: bool,
    pub has_write_time: bool,
}

impl RecordLayout {
    /// Layout for a resolved minor version, after minor-2 disambiguation.
    pub fn for_minor(minor: u32) -> Option<RecordLayout> {
        let layout = match minor {
            2 => RecordLayout {
                endian: Endian::Little,
                word: 4,
                padded: false,
                has_write_time: false,
            },
            3 => RecordLayout {
                endian: Endian::Big,
                word: 8,
                padded: true,
                has_write_time: false,
            },
            7 => RecordLayout {
                endian: Endian::Little,
                word: 4,
                padded: false,
                has_write_time: true,
            },
            8 | 9 => RecordLayout {
                endian: Endian::Little,
                word: 8,
                padded: false,
                has_write_time: true,
            },
            _ => return None,
        };
        Some(layout)
    }

    fn pad(&self) -> usize {
        if self.padded { 4 } else { 0 }
    }

    /// Bytes of the shared record prefix: crc, next, parent, flags,
    /// name offset.
    pub fn prefix_len(&self) -> usize {
        4 + self.pad() + 2 * self.word + 4 + self.pad() + self.word
    }

    /// Folder record size: prefix plus two first-child words.
    pub fn folder_len(&self) -> usize {
        self.prefix_len() + 2 * self.word
    }

    /// File record size: prefix, offset, size, data CRC, optional padding
    /// and write time.
    pub fn file_len(&self) -> usize {
        self.prefix_len()
            + 16
            + 4
            + self.pad()
            + if self.has_write_time { 8 } else { 0 }
    }
}

/// Expected filesystem-array span for the compact minor-2 layout. The
/// minor-2 header is ambiguous; when this does not match the actual span the
/// archive is really minor 3.
pub fn minor2_span(folder_count: usize, file_count: usize) -> usize {
    let layout = RecordLayout {
        endian: Endian::Little,
        word: 4,
        padded: false,
        has_write_time: false,
    };
    layout.folder_len() * folder_count + layout.file_len() * file_count
}
