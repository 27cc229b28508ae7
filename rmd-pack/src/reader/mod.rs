//! Generation-specific archive readers behind one enum.

pub mod v1;
pub mod v2;

use std::collections::HashMap;
use std::path::Path;

use crate::error::{PackError, Result};
use crate::instance::Instance;

pub use v1::ReaderV1;
pub use v2::ReaderV2;

/// Which name dictionary to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Folder,
    File,
    Archive,
    MetadataType,
}

impl NameKind {
    /// Cache-file suffix for this dictionary.
    pub fn tag(self) -> &'static str {
        match self {
            NameKind::Folder => "fldr",
            NameKind::File => "file",
            NameKind::Archive => "arch",
            NameKind::MetadataType => "mdty",
        }
    }
}

/// A parsed archive of either generation.
#[derive(Debug)]
pub enum Reader {
    V1(ReaderV1),
    V2(ReaderV2),
}

impl Reader {
    /// Open the reader matching the path's extension. The instance supplies
    /// the cache directory, which is created here.
    pub fn open(instance: &Instance, path: &Path) -> Result<Reader> {
        let cache_dir = instance.cache_dir(path);
        std::fs::create_dir_all(&cache_dir)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("rmdp") => Ok(Reader::V1(ReaderV1::open(cache_dir, path)?)),
            Some("rmdtoc") => Ok(Reader::V2(ReaderV2::open(cache_dir, path)?)),
            _ => Err(PackError::UnsupportedExtension(path.to_path_buf())),
        }
    }

    pub fn version_major(&self) -> u32 {
        match self {
            Reader::V1(_) => 1,
            Reader::V2(_) => 2,
        }
    }

    pub fn version_minor(&self) -> u32 {
        match self {
            Reader::V1(r) => r.version_minor,
            Reader::V2(r) => r.table.version,
        }
    }

    pub fn version(&self) -> String {
        format!("v{}.{}", self.version_major(), self.version_minor())
    }

    /// Filesystem prefix prepended to standard-mode paths. Empty for v2.
    pub fn prefix(&self) -> &str {
        match self {
            Reader::V1(r) => &r.prefix,
            Reader::V2(_) => "",
        }
    }

    pub fn folder_count(&self) -> usize {
        match self {
            Reader::V1(r) => r.folders.len(),
            Reader::V2(r) => r.table.fldr.size as usize,
        }
    }

    pub fn file_count(&self) -> usize {
        match self {
            Reader::V1(r) => r.files.len(),
            Reader::V2(r) => r.table.file.size as usize,
        }
    }

    /// `parent folder index -> child folder indices`, skipping roots.
    pub fn relmap_dirs(&mut self) -> Result<HashMap<i64, Vec<usize>>> {
        let parents: Vec<i64> = match self {
            Reader::V1(r) => r.folders.iter().map(|f| f.parent_idx()).collect(),
            Reader::V2(r) => r.folders()?.iter().map(|f| f.parent_idx()).collect(),
        };
        let mut map: HashMap<i64, Vec<usize>> = HashMap::new();
        for (index, parent) in parents.into_iter().enumerate() {
            if parent != -1 && parent != index as i64 {
                map.entry(parent).or_default().push(index);
            }
        }
        Ok(map)
    }

    /// `parent folder index -> child file indices`.
    pub fn relmap_files(&mut self) -> Result<HashMap<i64, Vec<usize>>> {
        let parents: Vec<i64> = match self {
            Reader::V1(r) => r.files.iter().map(|f| f.parent_idx()).collect(),
            Reader::V2(r) => r.files()?.iter().map(|f| f.parent_idx()).collect(),
        };
        let mut map: HashMap<i64, Vec<usize>> = HashMap::new();
        for (index, parent) in parents.into_iter().enumerate() {
            map.entry(parent).or_default().push(index);
        }
        Ok(map)
    }

    /// Build (or load from cache) one name dictionary.
    pub fn name_table(&mut self, kind: NameKind) -> Result<Vec<String>> {
        match self {
            Reader::V1(r) => r.name_table(kind),
            Reader::V2(r) => r.name_table(kind),
        }
    }
}
