//! Second-generation reader: `.rmdtoc` master table + archive shards.
//!
//! The TOC file is a small header of offset/size slices over one logical
//! blob that is stored as a chain of LZ4 blocks. The blob is inflated once
//! and cached on disk; every table (folders, files, chunks, archives,
//! metadata-type names, string blob) is then sliced out of it on first
//! access.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use rmd_stream::{ByteStream, StringCacheFile};

use crate::error::{PackError, Result};
use crate::reader::NameKind;

/// Offset/size pair used throughout the TOC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OfSz {
    pub offset: u32,
    pub size: u32,
}

impl OfSz {
    fn read(stream: &mut ByteStream) -> Result<OfSz> {
        Ok(OfSz {
            offset: stream.u32()?,
            size: stream.u32()?,
        })
    }
}

/// Record sizes inside the decompressed TOC.
pub const ARCH_RECORD: usize = 16;
pub const FOLDER_RECORD: usize = 28;
pub const FILE_RECORD: usize = 32;
pub const CHUNK_RECORD: usize = 16;

/// The `.rmdtoc` header: magic, version, and the table slices in fixed
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocTable {
    pub version: u32,
    /// Chunk records describing the compressed TOC itself (byte-sized).
    pub tabl: OfSz,
    pub arch: OfSz,
    pub fldr: OfSz,
    pub file: OfSz,
    pub stng: OfSz,
    pub mdty: OfSz,
    pub mtdt: OfSz,
    /// Unused slices, carried but never dereferenced.
    pub unk0: OfSz,
    pub unk1: OfSz,
    /// Content chunk records (byte-sized).
    pub chnk: OfSz,
}

impl TocTable {
    pub fn parse(stream: &mut ByteStream) -> Result<TocTable> {
        let magic = stream.string(4)?;
        if magic != "COTR" {
            return Err(PackError::BadMagic {
                expected: "COTR".to_owned(),
                found: magic,
            });
        }
        Ok(TocTable {
            version: stream.u32()?,
            tabl: OfSz::read(stream)?,
            arch: OfSz::read(stream)?,
            fldr: OfSz::read(stream)?,
            file: OfSz::read(stream)?,
            stng: OfSz::read(stream)?,
            mdty: OfSz::read(stream)?,
            mtdt: OfSz::read(stream)?,
            unk0: OfSz::read(stream)?,
            unk1: OfSz::read(stream)?,
            chnk: OfSz::read(stream)?,
        })
    }

    /// Size the decompressed TOC must come out to, rounded up to 8.
    pub fn decompressed_size(&self) -> usize {
        let sum = self.arch.size as usize * ARCH_RECORD
            + self.fldr.size as usize * FOLDER_RECORD
            + self.file.size as usize * FILE_RECORD
            + self.mdty.size as usize * 8
            + self.chnk.size as usize
            + self.stng.size as usize
            + self.mtdt.size as usize;
        sum.div_ceil(8) * 8
    }
}

/// 16-byte chunk record, used both for the TOC's own blocks and for content
/// chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRec {
    pub index: usize,
    pub lz4: bool,
    pub archive_idx: u16,
    /// 40-bit byte offset into the owning archive shard.
    pub offset: u64,
    pub decompressed: u32,
    pub compressed: u32,
}

impl ChunkRec {
    fn read(stream: &mut ByteStream, index: usize) -> Result<ChunkRec> {
        let lz4 = stream.boolean()?;
        let archive_idx = stream.u16()?;
        let offset = stream.uint(5)?;
        let decompressed = stream.u32()?;
        let compressed = stream.u32()?;
        Ok(ChunkRec {
            index,
            lz4,
            archive_idx,
            offset,
            decompressed,
            compressed,
        })
    }

    /// Parse a byte-sized run of chunk records at `slice`.
    fn read_table(stream: &mut ByteStream, slice: OfSz) -> Result<Vec<ChunkRec>> {
        stream.seek(i64::from(slice.offset), rmd_stream::Whence::Start)?;
        let count = slice.size as usize / CHUNK_RECORD;
        let mut out = Vec::with_capacity(count);
        for index in 0..count {
            out.push(ChunkRec::read(stream, index)?);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocFolder {
    pub index: usize,
    pub parent: u32,
    pub next_id: u32,
    pub next_count: u32,
    pub file_index: u32,
    pub file_count: u32,
    pub name: OfSz,
}

impl TocFolder {
    /// Parent index with the all-ones root sentinel mapped to -1.
    pub fn parent_idx(&self) -> i64 {
        i64::from(self.parent as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocFile {
    pub index: usize,
    /// Byte range into the chunk-record array; `offset / 16` is the first
    /// chunk index.
    pub chunks: OfSz,
    pub parent: u32,
    pub name: OfSz,
    pub size: u32,
    pub metadata: OfSz,
}

impl TocFile {
    pub fn parent_idx(&self) -> i64 {
        i64::from(self.parent as i32)
    }

    /// Indices into the chunk table covered by this file.
    pub fn chunk_ids(&self) -> Vec<usize> {
        (self.chunks.offset as usize..(self.chunks.offset + self.chunks.size) as usize)
            .step_by(CHUNK_RECORD)
            .map(|byte| byte / CHUNK_RECORD)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveRec {
    pub index: usize,
    /// Path into the string blob, relative to the TOC's directory.
    pub path: OfSz,
    pub hash: u64,
}

#[derive(Debug)]
pub struct ReaderV2 {
    pub path: PathBuf,
    pub cache_dir: PathBuf,
    pub table: TocTable,
    /// Cached decompressed TOC.
    pub toc_path: PathBuf,

    toc: Option<Vec<u8>>,
    folders: Option<Vec<TocFolder>>,
    files: Option<Vec<TocFile>>,
    chunks: Option<Vec<ChunkRec>>,
    archives: Option<Vec<ArchiveRec>>,
    mdty: Option<Vec<OfSz>>,
}

impl ReaderV2 {
    pub fn open(cache_dir: PathBuf, path: &Path) -> Result<ReaderV2> {
        let mut stream = ByteStream::from_path(path)?;
        let table = TocTable::parse(&mut stream)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let toc_path = cache_dir.join(format!("{stem}.rmdtoc_decompressed"));

        let predicted = table.decompressed_size();
        let reuse = match std::fs::metadata(&toc_path) {
            Ok(meta) if meta.len() as usize == predicted => true,
            Ok(meta) => {
                info!(
                    existing = meta.len(),
                    predicted, "cached TOC size mismatch, rebuilding"
                );
                false
            }
            Err(_) => false,
        };
        if !reuse {
            let blocks = ChunkRec::read_table(&mut stream, table.tabl)?;
            info!(chunks = blocks.len(), "decompressing TOC");
            let mut toc = Vec::with_capacity(predicted);
            for block in blocks {
                toc.extend_from_slice(&stream.read_lz4_block(
                    block.compressed as usize,
                    block.decompressed as usize,
                    block.lz4,
                    Some(block.offset as usize),
                )?);
            }
            std::fs::write(&toc_path, &toc)?;
        }

        Ok(ReaderV2 {
            path: path.to_path_buf(),
            cache_dir,
            table,
            toc_path,
            toc: None,
            folders: None,
            files: None,
            chunks: None,
            archives: None,
            mdty: None,
        })
    }

    fn toc(&mut self) -> Result<&[u8]> {
        if self.toc.is_none() {
            self.toc = Some(std::fs::read(&self.toc_path)?);
        }
        self.toc
            .as_deref()
            .ok_or(PackError::ViewUnavailable("toc"))
    }

    pub fn folders(&mut self) -> Result<&[TocFolder]> {
        if self.folders.is_none() {
            let slice = self.table.fldr;
            let toc = self.toc()?;
            let mut stream = ByteStream::new(toc);
            stream.seek(i64::from(slice.offset), rmd_stream::Whence::Start)?;
            let mut out = Vec::with_capacity(slice.size as usize);
            for index in 0..slice.size as usize {
                out.push(TocFolder {
                    index,
                    parent: stream.u32()?,
                    next_id: stream.u32()?,
                    next_count: stream.u32()?,
                    file_index: stream.u32()?,
                    file_count: stream.u32()?,
                    name: OfSz::read(&mut stream)?,
                });
            }
            debug!(count = out.len(), "parsed TOC folder table");
            self.folders = Some(out);
        }
        self.folders
            .as_deref()
            .ok_or(PackError::ViewUnavailable("folders"))
    }

    pub fn files(&mut self) -> Result<&[TocFile]> {
        if self.files.is_none() {
            let slice = self.table.file;
            let toc = self.toc()?;
            let mut stream = ByteStream::new(toc);
            stream.seek(i64::from(slice.offset), rmd_stream::Whence::Start)?;
            let mut out = Vec::with_capacity(slice.size as usize);
            for index in 0..slice.size as usize {
                out.push(TocFile {
                    index,
                    chunks: OfSz::read(&mut stream)?,
                    parent: stream.u32()?,
                    name: OfSz::read(&mut stream)?,
                    size: stream.u32()?,
                    metadata: OfSz::read(&mut stream)?,
                });
            }
            debug!(count = out.len(), "parsed TOC file table");
            self.files = Some(out);
        }
        self.files
            .as_deref()
            .ok_or(PackError::ViewUnavailable("files"))
    }

    pub fn chunks(&mut self) -> Result<&[ChunkRec]> {
        if self.chunks.is_none() {
            let slice = self.table.chnk;
            let toc = self.toc()?;
            let mut stream = ByteStream::new(toc);
            let out = ChunkRec::read_table(&mut stream, slice)?;
            debug!(count = out.len(), "parsed TOC chunk table");
            self.chunks = Some(out);
        }
        self.chunks
            .as_deref()
            .ok_or(PackError::ViewUnavailable("chunks"))
    }

    pub fn archives(&mut self) -> Result<&[ArchiveRec]> {
        if self.archives.is_none() {
            let slice = self.table.arch;
            let toc = self.toc()?;
            let mut stream = ByteStream::new(toc);
            stream.seek(i64::from(slice.offset), rmd_stream::Whence::Start)?;
            let mut out = Vec::with_capacity(slice.size as usize);
            for index in 0..slice.size as usize {
                out.push(ArchiveRec {
                    index,
                    path: OfSz::read(&mut stream)?,
                    hash: stream.u64()?,
                });
            }
            self.archives = Some(out);
        }
        self.archives
            .as_deref()
            .ok_or(PackError::ViewUnavailable("archives"))
    }

    /// Metadata-type name slices into the string blob.
    pub fn mdty(&mut self) -> Result<&[OfSz]> {
        if self.mdty.is_none() {
            let slice = self.table.mdty;
            let toc = self.toc()?;
            let mut stream = ByteStream::new(toc);
            stream.seek(i64::from(slice.offset), rmd_stream::Whence::Start)?;
            let mut out = Vec::with_capacity(slice.size as usize);
            for _ in 0..slice.size as usize {
                out.push(OfSz::read(&mut stream)?);
            }
            self.mdty = Some(out);
        }
        self.mdty
            .as_deref()
            .ok_or(PackError::ViewUnavailable("mdty"))
    }

    /// The raw string blob.
    pub fn stng(&mut self) -> Result<Vec<u8>> {
        let slice = self.table.stng;
        let toc = self.toc()?;
        let mut stream = ByteStream::new(toc);
        Ok(stream
            .read_at(slice.offset as usize, slice.size as usize)?
            .to_vec())
    }

    /// The raw metadata blob referenced by file records.
    pub fn mtdt(&mut self) -> Result<Vec<u8>> {
        let slice = self.table.mtdt;
        let toc = self.toc()?;
        let mut stream = ByteStream::new(toc);
        Ok(stream
            .read_at(slice.offset as usize, slice.size as usize)?
            .to_vec())
    }

    /// Build one name dictionary by dereferencing name slices into the
    /// string blob, memoized on disk.
    pub fn name_table(&mut self, kind: NameKind) -> Result<Vec<String>> {
        let slices: Vec<OfSz> = match kind {
            NameKind::Folder => self.folders()?.iter().map(|f| f.name).collect(),
            NameKind::File => self.files()?.iter().map(|f| f.name).collect(),
            NameKind::Archive => self.archives()?.iter().map(|a| a.path).collect(),
            NameKind::MetadataType => self.mdty()?.to_vec(),
        };

        let cache = self.strarray_path(kind);
        if cache.is_file() {
            match StringCacheFile::read(&cache) {
                Ok(names) if names.len() == slices.len() => return Ok(names),
                Ok(_) | Err(_) => {
                    debug!(cache = %cache.display(), "stale name cache, rebuilding");
                }
            }
        }

        let stng = self.stng()?;
        let mut stream = ByteStream::new(&stng);
        let mut names = Vec::with_capacity(slices.len());
        for slice in slices {
            stream.seek(i64::from(slice.offset), rmd_stream::Whence::Start)?;
            names.push(stream.string(slice.size as usize)?);
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
}
