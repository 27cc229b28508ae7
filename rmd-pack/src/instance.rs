//! Game-installation instances.
//!
//! An instance names one installed game: a short key, a display name, a
//! version tag, and the three directories the toolkit works against. How
//! instances are persisted (the host application keeps them in config
//! files) is not this crate's concern; the struct is the whole interface.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// One game installation.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Short identifier, e.g. `AW1`. Partitions cache and export trees.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Version tag, e.g. `latest`.
    pub version: String,
    /// Installation root that is scanned for archives.
    pub root: PathBuf,
    /// App-level cache directory.
    pub cache_root: PathBuf,
    /// App-level export directory.
    pub export_root: PathBuf,
}

impl Instance {
    /// Every non-empty `.rmdp`/`.rmdtoc` under the root, sorted for stable
    /// listings.
    pub fn archive_entries(&self) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                matches!(
                    e.path().extension().and_then(|ext| ext.to_str()),
                    Some("rmdp" | "rmdtoc")
                )
            })
            .filter(|e| e.metadata().map(|m| m.len() != 0).unwrap_or(false))
            .map(|e| e.into_path())
            .collect();
        entries.sort();
        entries
    }

    /// Cache directory for one archive: `{cache}/{key}/{stem}`.
    pub fn cache_dir(&self, archive: &Path) -> PathBuf {
        self.cache_root.join(&self.key).join(stem_of(archive))
    }

    /// Export directory for one archive: `{export}/{key}/{stem}`.
    pub fn export_dir(&self, archive: &Path) -> PathBuf {
        self.export_root.join(&self.key).join(stem_of(archive))
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn instance(root: &Path) -> Instance {
        Instance {
            key: "AW1".to_owned(),
            name: "Alan Wake".to_owned(),
            version: "latest".to_owned(),
            root: root.to_path_buf(),
            cache_root: root.join("cache"),
            export_root: root.join("export"),
        }
    }

    #[test]
    fn scans_for_archives() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("data")).unwrap();
        std::fs::write(root.join("data/pack.rmdp"), b"x").unwrap();
        std::fs::write(root.join("data/pack.bin"), b"x").unwrap();
        std::fs::write(root.join("data/empty.rmdp"), b"").unwrap();
        std::fs::write(root.join("toc.rmdtoc"), b"x").unwrap();

        let inst = instance(root);
        let entries = inst.archive_entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].ends_with("data/pack.rmdp"));
        assert!(entries[1].ends_with("toc.rmdtoc"));
    }

    #[test]
    fn cache_and_export_partitioning() {
        let dir = tempfile::tempdir().unwrap();
        let inst = instance(dir.path());
        let archive = dir.path().join("data/pack.rmdp");
        assert_eq!(
            inst.cache_dir(&archive),
            dir.path().join("cache").join("AW1").join("pack")
        );
        assert_eq!(
            inst.export_dir(&archive),
            dir.path().join("export").join("AW1").join("pack")
        );
    }
}
