//! The unified virtual filesystem over both archive generations.
//!
//! [`Admin`] binds one archive path to its [`Instance`] and lazily builds
//! three views: [`TreeAdmin`] (folders and files with navigation),
//! [`DataAdmin`] (chunks and archive shards, chunk-assembled reads, export
//! caching), and [`MetaAdmin`] (the generation-specific metadata surface).
//! Entities reference each other by integer index only; every lookup goes
//! through the owning admin.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use rmd_stream::ByteStream;

use crate::error::{PackError, Result};
use crate::instance::Instance;
use crate::reader::{NameKind, Reader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    /// Prefix the reader's filesystem prefix.
    Std,
    /// Ancestor names only.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub index: usize,
    /// -1 encodes a root; a folder that names itself as parent is also a
    /// root.
    pub parent_idx: i64,
    pub next_id: i64,
    pub name: String,
    pub file_index: i64,
    pub file_count: usize,
    pub next_count: usize,
    pub first_child_folder: i64,
    pub first_child_file: i64,
    pub child_folders: Vec<usize>,
    pub child_files: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub index: usize,
    pub parent_idx: i64,
    pub next_id: i64,
    pub name: String,
    /// Declared size of the assembled file.
    pub logical_size: u64,
    pub metadata_offset: u64,
    pub metadata_size: usize,
    /// Indices into the owning [`DataAdmin`]'s chunk table.
    pub chunk_ids: Vec<usize>,
    /// v1 archives carry a CRC of the file body; v2 archives do not.
    pub data_crc: Option<[u8; 4]>,
    pub write_time: Option<i64>,
}

impl File {
    pub fn extension(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lz4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub compression: Compression,
    pub archive_idx: usize,
    pub offset: u64,
    pub decompressed_size: u64,
    pub compressed_size: u64,
}

impl Chunk {
    /// Bytes the chunk occupies inside its archive shard.
    pub fn stored_size(&self) -> u64 {
        match self.compression {
            Compression::None => self.decompressed_size,
            Compression::Lz4 => self.compressed_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRef {
    pub index: usize,
    pub path: PathBuf,
    pub hash: Option<u64>,
}

/// Folder and file tables with navigation and path composition.
pub struct TreeAdmin {
    pub folders: Vec<Folder>,
    pub files: Vec<File>,
    pub prefix: String,
}

impl TreeAdmin {
    pub fn folder(&self, index: usize) -> Result<&Folder> {
        self.folders.get(index).ok_or(PackError::IndexOutOfRange {
            what: "folder",
            index: index as i64,
        })
    }

    pub fn file(&self, index: usize) -> Result<&File> {
        self.files.get(index).ok_or(PackError::IndexOutOfRange {
            what: "file",
            index: index as i64,
        })
    }

    /// Parent folder, unless the folder is a root (explicitly, or by naming
    /// itself).
    pub fn folder_parent(&self, index: usize) -> Result<Option<usize>> {
        let folder = self.folder(index)?;
        if folder.parent_idx == -1 || folder.parent_idx == index as i64 {
            return Ok(None);
        }
        Ok(Some(folder.parent_idx as usize))
    }

    pub fn file_parent(&self, index: usize) -> Result<Option<usize>> {
        let file = self.file(index)?;
        if file.parent_idx == -1 {
            return Ok(None);
        }
        Ok(Some(file.parent_idx as usize))
    }

    pub fn folder_depth(&self, index: usize) -> Result<usize> {
        let mut depth = 0;
        let mut cursor = index;
        while let Some(parent) = self.folder_parent(cursor)? {
            depth += 1;
            cursor = parent;
        }
        Ok(depth)
    }

    /// Ancestor folder names from the root down to `index` inclusive.
    fn ancestry(&self, index: usize) -> Result<Vec<&str>> {
        let mut names = vec![self.folder(index)?.name.as_str()];
        let mut cursor = index;
        while let Some(parent) = self.folder_parent(cursor)? {
            names.push(self.folder(parent)?.name.as_str());
            cursor = parent;
        }
        names.reverse();
        Ok(names)
    }

    pub fn folder_path(&self, index: usize, mode: PathMode) -> Result<String> {
        let raw = self.ancestry(index)?.join("/");
        Ok(match mode {
            PathMode::Raw => raw,
            PathMode::Std => format!("{}/{raw}", self.prefix),
        })
    }

    pub fn file_path(&self, index: usize, mode: PathMode) -> Result<String> {
        let file = self.file(index)?;
        let raw = match self.file_parent(index)? {
            Some(parent) => format!("{}/{}", self.folder_path(parent, PathMode::Raw)?, file.name),
            None => file.name.clone(),
        };
        Ok(match mode {
            PathMode::Raw => raw,
            PathMode::Std => format!("{}/{raw}", self.prefix),
        })
    }

    /// Next sibling folder, following the stored chain.
    pub fn folder_next(&self, index: usize) -> Result<Option<&Folder>> {
        let folder = self.folder(index)?;
        if folder.next_id == -1 || folder.next_id as usize >= self.folders.len() {
            return Ok(None);
        }
        Ok(Some(self.folder(folder.next_id as usize)?))
    }

    /// Next sibling file.
    pub fn file_next(&self, index: usize) -> Result<Option<&File>> {
        let file = self.file(index)?;
        if file.next_id == -1 || file.next_id as usize >= self.files.len() {
            return Ok(None);
        }
        Ok(Some(self.file(file.next_id as usize)?))
    }

    /// Every file reachable under a folder, depth first.
    pub fn nested_files(&self, index: usize) -> Result<Vec<usize>> {
        let folder = self.folder(index)?;
        let mut out = folder.child_files.clone();
        for child in &folder.child_folders {
            out.extend(self.nested_files(*child)?);
        }
        Ok(out)
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.logical_size).sum()
    }
}

/// Chunk and archive tables plus content reads.
pub struct DataAdmin {
    pub chunks: Vec<Chunk>,
    pub archives: Vec<ArchiveRef>,
    pub export_dir: PathBuf,
}

impl DataAdmin {
    pub fn chunk(&self, index: usize) -> Result<&Chunk> {
        self.chunks.get(index).ok_or(PackError::IndexOutOfRange {
            what: "chunk",
            index: index as i64,
        })
    }

    pub fn archive(&self, index: usize) -> Result<&ArchiveRef> {
        self.archives.get(index).ok_or(PackError::IndexOutOfRange {
            what: "archive",
            index: index as i64,
        })
    }

    /// Read one chunk out of its archive shard, inflating as needed. The
    /// result is exactly `decompressed_size` bytes.
    pub fn read_chunk(&self, index: usize) -> Result<Vec<u8>> {
        let chunk = *self.chunk(index)?;
        let archive = self.archive(chunk.archive_idx)?;

        let handle = fs::File::open(&archive.path)
            .map_err(|_| PackError::ArchiveMissing(archive.path.clone()))?;
        // Shards run to gigabytes; map them instead of reading.
        let map = unsafe { Mmap::map(&handle)? };
        let needed = chunk.offset + chunk.stored_size();
        if needed > map.len() as u64 {
            return Err(PackError::ChunkOutOfRange {
                path: archive.path.clone(),
                offset: chunk.offset,
                size: chunk.stored_size(),
                len: map.len() as u64,
            });
        }

        let mut stream = ByteStream::new(&map);
        Ok(stream.read_lz4_block(
            chunk.compressed_size as usize,
            chunk.decompressed_size as usize,
            chunk.compression == Compression::Lz4,
            Some(chunk.offset as usize),
        )?)
    }

    /// Assemble a file by concatenating its chunk reads.
    pub fn read_file(&self, file: &File) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for id in &file.chunk_ids {
            out.extend_from_slice(&self.read_chunk(*id)?);
        }
        Ok(out)
    }

    /// Chunks stored inside one archive shard.
    pub fn archive_chunks(&self, archive_idx: usize) -> impl Iterator<Item = &Chunk> {
        self.chunks
            .iter()
            .filter(move |chunk| chunk.archive_idx == archive_idx)
    }

    /// Export destination for a raw path; `:` is not portable and becomes
    /// `_`. Parent directories are created eagerly.
    pub fn export_path(&self, raw_path: &str) -> Result<PathBuf> {
        let sanitized = raw_path.replace(':', "_");
        let path = self.export_dir.join(sanitized);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }
}

/// Generation-specific metadata surface.
pub struct MetaAdmin {
    /// v1 only: the sibling `.packmeta`, when present.
    pub packmeta_path: Option<PathBuf>,
    /// v2 only: metadata-type names from the TOC.
    pub metadata_types: Vec<String>,
}

impl MetaAdmin {
    /// Slice the v1 metadata sidecar at absolute byte offsets. Empty when
    /// there is no sidecar.
    pub fn get(&self, offset: usize, size: usize) -> Result<Vec<u8>> {
        let Some(path) = &self.packmeta_path else {
            return Ok(Vec::new());
        };
        let mut stream = ByteStream::from_path(path)?;
        Ok(stream.read_at(offset, size)?.to_vec())
    }
}

/// Counts and sizes of one opened archive, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSummary {
    pub name: String,
    pub version: String,
    pub folders: usize,
    pub files: usize,
    pub chunks: usize,
    pub archives: usize,
    /// On-disk size of the TOC/archive entry itself.
    pub archive_size: u64,
    /// Sum of logical file sizes.
    pub content_size: u64,
}

impl std::fmt::Display for AdminSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {} folders, {} files, {} in {} chunks across {} archives",
            self.name,
            self.version,
            self.folders,
            self.files,
            rmd_stream::human_size(self.content_size),
            self.chunks,
            self.archives,
        )
    }
}

type ProgressFn = Box<dyn Fn(&str) + Send>;

/// Binding of one archive entry to its instance; owns the reader and the
/// derived views.
pub struct Admin {
    pub instance: Instance,
    pub path: PathBuf,
    reader: Option<Reader>,
    tree: Option<TreeAdmin>,
    data: Option<DataAdmin>,
    meta: Option<MetaAdmin>,
    progress: Option<ProgressFn>,
}

impl Admin {
    pub fn new(instance: Instance, path: PathBuf) -> Admin {
        Admin {
            instance,
            path,
            reader: None,
            tree: None,
            data: None,
            meta: None,
            progress: None,
        }
    }

    /// Register a coarse progress callback, invoked at stage boundaries.
    pub fn set_progress(&mut self, progress: ProgressFn) {
        self.progress = Some(progress);
    }

    fn report(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress(message);
        }
    }

    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Drop the reader and every derived view; the next access rebuilds.
    pub fn invalidate(&mut self) {
        self.reader = None;
        self.tree = None;
        self.data = None;
        self.meta = None;
    }

    pub fn reader(&mut self) -> Result<&mut Reader> {
        if self.reader.is_none() {
            self.report("opening reader");
            self.reader = Some(Reader::open(&self.instance, &self.path)?);
        }
        self.reader
            .as_mut()
            .ok_or(PackError::ViewUnavailable("reader"))
    }

    pub fn tree(&mut self) -> Result<&TreeAdmin> {
        if self.tree.is_none() {
            self.report("building filesystem tree");
            let built = self.build_tree()?;
            self.tree = Some(built);
        }
        self.tree.as_ref().ok_or(PackError::ViewUnavailable("tree"))
    }

    pub fn data(&mut self) -> Result<&DataAdmin> {
        if self.data.is_none() {
            self.report("building data tables");
            let built = self.build_data()?;
            self.data = Some(built);
        }
        self.data.as_ref().ok_or(PackError::ViewUnavailable("data"))
    }

    pub fn meta(&mut self) -> Result<&MetaAdmin> {
        if self.meta.is_none() {
            let built = self.build_meta()?;
            self.meta = Some(built);
        }
        self.meta.as_ref().ok_or(PackError::ViewUnavailable("meta"))
    }

    fn build_tree(&mut self) -> Result<TreeAdmin> {
        let reader = self.reader()?;
        let folder_names = reader.name_table(NameKind::Folder)?;
        let file_names = reader.name_table(NameKind::File)?;
        let relmap_dirs = reader.relmap_dirs()?;
        let relmap_files = reader.relmap_files()?;
        let prefix = reader.prefix().to_owned();

        let name_of = |names: &[String], index: usize| -> String {
            names.get(index).cloned().unwrap_or_default()
        };
        let children =
            |map: &HashMap<i64, Vec<usize>>, index: usize| map.get(&(index as i64)).cloned().unwrap_or_default();

        let (folders, files) = match reader {
            Reader::V1(r) => {
                let folders = r
                    .folders
                    .iter()
                    .map(|rec| {
                        let child_folders = children(&relmap_dirs, rec.index);
                        let child_files = children(&relmap_files, rec.index);
                        Folder {
                            index: rec.index,
                            parent_idx: rec.vfs.parent_idx,
                            next_id: rec.vfs.next_id,
                            name: name_of(&folder_names, rec.index),
                            file_index: rec.index as i64,
                            file_count: child_files.len(),
                            next_count: child_folders.len() + child_files.len(),
                            first_child_folder: rec.first_child_folder,
                            first_child_file: rec.first_child_file,
                            child_folders,
                            child_files,
                        }
                    })
                    .collect::<Vec<_>>();
                let files = r
                    .files
                    .iter()
                    .map(|rec| File {
                        index: rec.index,
                        parent_idx: rec.vfs.parent_idx,
                        next_id: rec.vfs.next_id,
                        name: name_of(&file_names, rec.index),
                        logical_size: rec.size,
                        metadata_offset: 0,
                        metadata_size: 0,
                        chunk_ids: vec![rec.index],
                        data_crc: Some(rec.data_crc),
                        write_time: rec.write_time,
                    })
                    .collect::<Vec<_>>();
                (folders, files)
            }
            Reader::V2(r) => {
                let file_total = r.files()?.len();
                let folders = r
                    .folders()?
                    .iter()
                    .map(|rec| {
                        let child_folders = children(&relmap_dirs, rec.index);
                        let child_files = children(&relmap_files, rec.index);
                        Folder {
                            index: rec.index,
                            parent_idx: rec.parent_idx(),
                            next_id: i64::from(rec.next_id),
                            name: name_of(&folder_names, rec.index),
                            file_index: i64::from(rec.file_index),
                            file_count: rec.file_count as usize,
                            next_count: rec.next_count as usize,
                            first_child_folder: child_folders.first().map_or(-1, |i| *i as i64),
                            first_child_file: child_files.first().map_or(-1, |i| *i as i64),
                            child_folders,
                            child_files,
                        }
                    })
                    .collect::<Vec<_>>();
                let files = r
                    .files()?
                    .iter()
                    .map(|rec| File {
                        index: rec.index,
                        parent_idx: rec.parent_idx(),
                        next_id: if rec.index + 1 < file_total {
                            rec.index as i64 + 1
                        } else {
                            -1
                        },
                        name: name_of(&file_names, rec.index),
                        logical_size: u64::from(rec.size),
                        metadata_offset: u64::from(rec.metadata.offset),
                        metadata_size: rec.metadata.size as usize,
                        chunk_ids: rec.chunk_ids(),
                        data_crc: None,
                        write_time: None,
                    })
                    .collect::<Vec<_>>();
                (folders, files)
            }
        };

        debug!(
            folders = folders.len(),
            files = files.len(),
            "filesystem tree built"
        );
        Ok(TreeAdmin {
            folders,
            files,
            prefix,
        })
    }

    fn build_data(&mut self) -> Result<DataAdmin> {
        let export_dir = self.instance.export_dir(&self.path);
        let reader = self.reader()?;
        let (chunks, archives) = match reader {
            Reader::V1(r) => {
                let chunks = r
                    .files
                    .iter()
                    .map(|rec| Chunk {
                        index: rec.index,
                        compression: Compression::None,
                        archive_idx: 0,
                        offset: rec.offset,
                        decompressed_size: rec.size,
                        compressed_size: 0,
                    })
                    .collect::<Vec<_>>();
                let archives = vec![ArchiveRef {
                    index: 0,
                    path: r.path.clone(),
                    hash: None,
                }];
                (chunks, archives)
            }
            Reader::V2(r) => {
                let chunks = r
                    .chunks()?
                    .iter()
                    .map(|rec| Chunk {
                        index: rec.index,
                        compression: if rec.lz4 {
                            Compression::Lz4
                        } else {
                            Compression::None
                        },
                        archive_idx: rec.archive_idx as usize,
                        offset: rec.offset,
                        decompressed_size: u64::from(rec.decompressed),
                        compressed_size: u64::from(rec.compressed),
                    })
                    .collect::<Vec<_>>();
                let paths = r.name_table(NameKind::Archive)?;
                let base = r.path.parent().map(Path::to_path_buf).unwrap_or_default();
                let archives = r
                    .archives()?
                    .iter()
                    .map(|rec| ArchiveRef {
                        index: rec.index,
                        path: base.join(paths.get(rec.index).map(String::as_str).unwrap_or("")),
                        hash: Some(rec.hash),
                    })
                    .collect::<Vec<_>>();
                (chunks, archives)
            }
        };
        Ok(DataAdmin {
            chunks,
            archives,
            export_dir,
        })
    }

    fn build_meta(&mut self) -> Result<MetaAdmin> {
        let reader = self.reader()?;
        Ok(match reader {
            Reader::V1(r) => MetaAdmin {
                packmeta_path: r.has_packmeta().then(|| r.meta_path.clone()),
                metadata_types: Vec::new(),
            },
            Reader::V2(r) => MetaAdmin {
                packmeta_path: None,
                metadata_types: r.name_table(NameKind::MetadataType)?,
            },
        })
    }

    /// Assembled content of one file. The first call writes the export file;
    /// later calls reread it from disk.
    pub fn file_data(&mut self, index: usize) -> Result<Vec<u8>> {
        let raw_path = self.tree()?.file_path(index, PathMode::Raw)?;
        let export = self.data()?.export_path(&raw_path)?;
        if !export.is_file() {
            let file = self.tree()?.file(index)?.clone();
            let bytes = self.data()?.read_file(&file)?;
            fs::write(&export, bytes)?;
        }
        Ok(fs::read(export)?)
    }

    /// One-line description of the opened archive.
    pub fn summary(&mut self) -> Result<AdminSummary> {
        let name = self.name();
        let version = self.reader()?.version();
        let archive_size = std::fs::metadata(&self.path)?.len();
        let tree = self.tree()?;
        let (folders, files, content_size) =
            (tree.folders.len(), tree.files.len(), tree.total_size());
        let data = self.data()?;
        let (chunks, archives) = (data.chunks.len(), data.archives.len());
        Ok(AdminSummary {
            name,
            version,
            folders,
            files,
            chunks,
            archives,
            archive_size,
            content_size,
        })
    }

    /// Occurrence count of file extensions across the tree.
    pub fn extensions(&mut self) -> Result<HashMap<String, usize>> {
        let tree = self.tree()?;
        let mut out = HashMap::new();
        for file in &tree.files {
            *out.entry(file.extension().to_owned()).or_insert(0) += 1;
        }
        Ok(out)
    }
}
