//! First-generation reader: `.rmdp` content shard + `.bin` table sidecar.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use rmd_stream::{ByteStream, Endian, StringCacheFile};

use crate::error::{PackError, Result};
use crate::layout::{RecordLayout, minor2_span};
use crate::reader::NameKind;

/// Shared prefix of folder and file records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VfsFields {
    pub name_crc: [u8; 4],
    pub next_id: i64,
    pub parent_idx: i64,
    pub flags: [u8; 4],
    /// Offset into the trailing name blob; -1 means the empty name.
    pub name_offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderRec {
    pub index: usize,
    pub vfs: VfsFields,
    pub first_child_folder: i64,
    pub first_child_file: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRec {
    pub index: usize,
    pub vfs: VfsFields,
    /// Byte offset of the file body inside the `.rmdp`.
    pub offset: u64,
    pub size: u64,
    pub data_crc: [u8; 4],
    /// Present for minors 7/8/9 only.
    pub write_time: Option<i64>,
}

impl FolderRec {
    pub fn parent_idx(&self) -> i64 {
        self.vfs.parent_idx
    }
}

impl FileRec {
    pub fn parent_idx(&self) -> i64 {
        self.vfs.parent_idx
    }
}

fn read_vfs(stream: &mut ByteStream, layout: RecordLayout) -> Result<VfsFields> {
    let name_crc = stream.read_array::<4>()?;
    if layout.padded {
        stream.skip(4)?;
    }
    let next_id = stream.int_with(layout.word, layout.endian)?;
    let parent_idx = stream.int_with(layout.word, layout.endian)?;
    let flags = stream.read_array::<4>()?;
    if layout.padded {
        stream.skip(4)?;
    }
    let name_offset = stream.int_with(layout.word, layout.endian)?;
    Ok(VfsFields {
        name_crc,
        next_id,
        parent_idx,
        flags,
        name_offset,
    })
}

fn read_folder(stream: &mut ByteStream, layout: RecordLayout, index: usize) -> Result<FolderRec> {
    let vfs = read_vfs(stream, layout)?;
    let first_child_folder = stream.int_with(layout.word, layout.endian)?;
    let first_child_file = stream.int_with(layout.word, layout.endian)?;
    Ok(FolderRec {
        index,
        vfs,
        first_child_folder,
        first_child_file,
    })
}

fn read_file(stream: &mut ByteStream, layout: RecordLayout, index: usize) -> Result<FileRec> {
    let vfs = read_vfs(stream, layout)?;
    let offset = stream.uint_with(8, layout.endian)?;
    let size = stream.uint_with(8, layout.endian)?;
    let data_crc = stream.read_array::<4>()?;
    if layout.padded {
        stream.skip(4)?;
    }
    let write_time = if layout.has_write_time {
        Some(stream.int_with(8, layout.endian)?)
    } else {
        None
    };
    Ok(FileRec {
        index,
        vfs,
        offset,
        size,
        data_crc,
        write_time,
    })
}

#[derive(Debug)]
pub struct ReaderV1 {
    /// The `.rmdp` content shard.
    pub path: PathBuf,
    pub bin_path: PathBuf,
    /// Sibling `.packmeta`, which may or may not exist.
    pub meta_path: PathBuf,
    pub cache_dir: PathBuf,

    pub version_minor: u32,
    /// Filesystem prefix, e.g. `d:`.
    pub prefix: String,
    /// 120 bytes of header data with no known schema, kept verbatim.
    pub unknown_header: Vec<u8>,
    pub names_size: usize,
    /// Byte offset where the header ends and the record arrays begin.
    pub header_end: usize,
    /// Byte offset of the name blob (`len - names_size`).
    pub names_start: usize,

    pub folders: Vec<FolderRec>,
    pub files: Vec<FileRec>,
    pub root_folders: Vec<FolderRec>,
    pub root_files: Vec<FileRec>,
}

impl ReaderV1 {
    pub fn open(cache_dir: PathBuf, rmdp_path: &Path) -> Result<ReaderV1> {
        let bin_path = rmdp_path.with_extension("bin");
        let meta_path = rmdp_path.with_extension("packmeta");

        check_nonempty(rmdp_path, PackError::ArchiveMissing, PackError::ArchiveEmpty)?;
        check_nonempty(&bin_path, PackError::SidecarMissing, PackError::SidecarEmpty)?;

        let mut stream = ByteStream::from_path(&bin_path)?;
        // First byte selects the byte order of every following header read.
        if stream.boolean()? {
            stream.endian = Endian::Big;
        }
        let mut version_minor = stream.u32()?;
        let folder_count = stream.u32()? as usize;
        let file_count = stream.u32()? as usize;
        let (root_folder_count, root_file_count) = match version_minor {
            2 | 3 => (0, 0),
            7 | 8 | 9 => (stream.u32()? as usize, stream.u32()? as usize),
            other => return Err(PackError::UnknownMinor(other)),
        };
        let names_size = stream.u32()? as usize;
        let names_start = stream.len() - names_size;
        let prefix = stream.nts(8)?;
        let unknown_header = stream.read_vec(120)?;
        let header_end = stream.tell();

        if version_minor == 2 {
            // The minor-2 header is ambiguous between the compact and the
            // wide layout; the filesystem-array span tells them apart.
            let resolved = if minor2_span(folder_count, file_count) == names_start - header_end {
                2
            } else {
                3
            };
            info!(
                folder_count,
                file_count, header_end, names_start, resolved, "minor-2 layout decision"
            );
            version_minor = resolved;
        }

        let layout =
            RecordLayout::for_minor(version_minor).ok_or(PackError::UnknownMinor(version_minor))?;
        // Record arrays follow the ambient header byte order only through
        // the layout table.
        let mut folders = Vec::with_capacity(folder_count);
        for index in 0..folder_count {
            folders.push(read_folder(&mut stream, layout, index)?);
        }
        let mut files = Vec::with_capacity(file_count);
        for index in 0..file_count {
            files.push(read_file(&mut stream, layout, index)?);
        }
        let mut root_folders = Vec::with_capacity(root_folder_count);
        for index in 0..root_folder_count {
            root_folders.push(read_folder(&mut stream, layout, index)?);
        }
        let mut root_files = Vec::with_capacity(root_file_count);
        for index in 0..root_file_count {
            root_files.push(read_file(&mut stream, layout, index)?);
        }

        debug!(
            path = %rmdp_path.display(),
            minor = version_minor,
            folders = folders.len(),
            files = files.len(),
            "opened v1 archive"
        );

        Ok(ReaderV1 {
            path: rmdp_path.to_path_buf(),
            bin_path,
            meta_path,
            cache_dir,
            version_minor,
            prefix,
            unknown_header,
            names_size,
            header_end,
            names_start,
            folders,
            files,
            root_folders,
            root_files,
        })
    }

    /// Build one name dictionary from the `.bin` name blob, memoized on
    /// disk. A missing or torn cache file triggers a rebuild.
    pub fn name_table(&self, kind: NameKind) -> Result<Vec<String>> {
        let name_offsets: Vec<i64> = match kind {
            NameKind::Folder => self.folders.iter().map(|f| f.vfs.name_offset).collect(),
            NameKind::File => self.files.iter().map(|f| f.vfs.name_offset).collect(),
            NameKind::Archive | NameKind::MetadataType => Vec::new(),
        };

        let cache = self.strarray_path(kind);
        if cache.is_file() {
            match StringCacheFile::read(&cache) {
                Ok(names) if names.len() == name_offsets.len() => return Ok(names),
                Ok(_) | Err(_) => {
                    debug!(cache = %cache.display(), "stale name cache, rebuilding");
                }
            }
        }

        let mut stream = ByteStream::from_path(&self.bin_path)?;
        let mut names = Vec::with_capacity(name_offsets.len());
        for offset in name_offsets {
            if offset == -1 {
                names.push(String::new());
            } else {
                names.push(stream.nts_at(self.names_start + offset as usize, 1)?);
            }
        }
        StringCacheFile::write(&cache, &names)?;
        Ok(StringCacheFile::read(&cache)?)
    }

    fn strarray_path(&self, kind: NameKind) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.cache_dir
            .join(format!("{stem}.strarray_{}", kind.tag()))
    }

    /// Whether a `.packmeta` sidecar is present next to the archive.
    pub fn has_packmeta(&self) -> bool {
        self.meta_path.is_file()
    }
}

fn check_nonempty(
    path: &Path,
    missing: fn(PathBuf) -> PackError,
    empty: fn(PathBuf) -> PackError,
) -> Result<()> {
    if !path.is_file() {
        return Err(missing(path.to_path_buf()));
    }
    if std::fs::metadata(path)?.len() == 0 {
        return Err(empty(path.to_path_buf()));
    }
    Ok(())
}
