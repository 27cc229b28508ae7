//! End-to-end tests over synthetic first-generation archives.

use std::path::Path;

use pretty_assertions::assert_eq;

use rmd_pack::{Admin, Compression, Instance, PathMode, Reader};

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

/// Little-endian minor-7 folder record (28 bytes).
fn folder_le7(next: i32, parent: i32, name_offset: i32, fc_d: i32, fc_f: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(28);
    out.extend_from_slice(&[0u8; 4]); // name crc
    out.extend_from_slice(&next.to_le_bytes());
    out.extend_from_slice(&parent.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]); // flags
    out.extend_from_slice(&name_offset.to_le_bytes());
    out.extend_from_slice(&fc_d.to_le_bytes());
    out.extend_from_slice(&fc_f.to_le_bytes());
    out
}

/// Little-endian minor-7 file record (48 bytes).
fn file_le7(
    next: i32,
    parent: i32,
    name_offset: i32,
    offset: u64,
    size: u64,
    crc: [u8; 4],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(48);
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&next.to_le_bytes());
    out.extend_from_slice(&parent.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&name_offset.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&crc);
    out.extend_from_slice(&7i64.to_le_bytes()); // write time
    out
}

/// The minor-7 fixture from the design notes: 3 folders, 5 files,
/// names_size 64, root folder "root".
fn build_v1_minor7(dir: &Path) {
    let mut names = Vec::new();
    let mut offsets = Vec::new();
    for name in ["root", "a", "b", "f1.bin", "f2.bin", "f3.bin", "f4.bin", "f5.bin"] {
        offsets.push(names.len() as i32);
        names.extend_from_slice(name.as_bytes());
        names.push(0);
    }
    names.resize(64, 0);

    let mut bin = Vec::new();
    bin.push(0); // little-endian
    bin.extend_from_slice(&7u32.to_le_bytes());
    bin.extend_from_slice(&3u32.to_le_bytes()); // folders
    bin.extend_from_slice(&5u32.to_le_bytes()); // files
    bin.extend_from_slice(&0u32.to_le_bytes()); // root folders
    bin.extend_from_slice(&0u32.to_le_bytes()); // root files
    bin.extend_from_slice(&(names.len() as u32).to_le_bytes());
    bin.extend_from_slice(b"d:\0\0\0\0\0\0"); // prefix, 8 bytes
    bin.extend_from_slice(&[0u8; 120]); // unknown header block

    bin.extend_from_slice(&folder_le7(-1, -1, offsets[0], 1, -1));
    bin.extend_from_slice(&folder_le7(2, 0, offsets[1], -1, 0));
    bin.extend_from_slice(&folder_le7(-1, 0, offsets[2], -1, 2));

    let file_parents = [1, 1, 2, 2, 0];
    let mut rmdp = Vec::new();
    for (i, parent) in file_parents.iter().enumerate() {
        let body = vec![0xA0 + i as u8; 16];
        let crc = [i as u8; 4];
        bin.extend_from_slice(&file_le7(
            -1,
            *parent,
            offsets[3 + i],
            rmdp.len() as u64,
            body.len() as u64,
            crc,
        ));
        rmdp.extend_from_slice(&body);
    }

    bin.extend_from_slice(&names);
    std::fs::write(dir.join("pack.bin"), bin).unwrap();
    std::fs::write(dir.join("pack.rmdp"), rmdp).unwrap();
}

#[test]
fn minor7_tree_and_data() {
    let dir = tempfile::tempdir().unwrap();
    build_v1_minor7(dir.path());
    let inst = instance(dir.path());

    let mut admin = Admin::new(inst, dir.path().join("pack.rmdp"));
    {
        let tree = admin.tree().unwrap();
        assert_eq!(tree.folders.len(), 3);
        assert_eq!(tree.files.len(), 5);
        assert_eq!(tree.prefix, "d:");

        let root = tree.folder(0).unwrap();
        assert_eq!(root.parent_idx, -1);
        assert_eq!(root.name, "root");
        assert_eq!(tree.folder_parent(0).unwrap(), None);
        assert_eq!(root.child_folders, vec![1, 2]);
        assert_eq!(root.child_files, vec![4]);

        // Parent/child agreement for every entity.
        for folder in &tree.folders {
            if let Some(parent) = tree.folder_parent(folder.index).unwrap() {
                assert!(tree.folder(parent).unwrap().child_folders.contains(&folder.index));
            }
        }
        for file in &tree.files {
            let parent = tree.file_parent(file.index).unwrap().unwrap();
            assert!(tree.folder(parent).unwrap().child_files.contains(&file.index));
        }

        // File CRCs come from byte 36 of each record.
        for (i, file) in tree.files.iter().enumerate() {
            assert_eq!(file.data_crc, Some([i as u8; 4]));
            assert_eq!(file.write_time, Some(7));
        }

        assert_eq!(tree.file_path(0, PathMode::Raw).unwrap(), "root/a/f1.bin");
        assert_eq!(tree.file_path(0, PathMode::Std).unwrap(), "d:/root/a/f1.bin");
        assert_eq!(tree.folder_depth(2).unwrap(), 1);
        assert_eq!(tree.nested_files(0).unwrap().len(), 5);
        assert_eq!(tree.total_size(), 80);
    }

    {
        let data = admin.data().unwrap();
        assert_eq!(data.chunks.len(), 5);
        assert_eq!(data.archives.len(), 1);
        for chunk in &data.chunks {
            assert_eq!(chunk.compression, Compression::None);
            assert_eq!(chunk.archive_idx, 0);
            // Uncompressed chunks read back exactly decompressed_size bytes.
            let bytes = data.read_chunk(chunk.index).unwrap();
            assert_eq!(bytes.len() as u64, chunk.decompressed_size);
        }
        assert_eq!(data.read_chunk(2).unwrap(), vec![0xA2; 16]);
    }

    // Chunk sum equals the file's logical size (single chunk in v1).
    {
        let tree = admin.tree().unwrap();
        let files: Vec<_> = tree.files.clone();
        let data = admin.data().unwrap();
        for file in &files {
            let sum: u64 = file
                .chunk_ids
                .iter()
                .map(|id| data.chunk(*id).unwrap().decompressed_size)
                .sum();
            assert_eq!(sum, file.logical_size);
        }
    }

    // Metadata surface: no sidecar on disk.
    assert!(admin.meta().unwrap().packmeta_path.is_none());
    assert_eq!(admin.meta().unwrap().get(0, 4).unwrap(), Vec::<u8>::new());

    // Extension census.
    let ext = admin.extensions().unwrap();
    assert_eq!(ext.get("bin"), Some(&5));
}

#[test]
fn export_writes_once_then_rereads() {
    let dir = tempfile::tempdir().unwrap();
    build_v1_minor7(dir.path());
    let inst = instance(dir.path());

    let mut admin = Admin::new(inst, dir.path().join("pack.rmdp"));
    let first = admin.file_data(0).unwrap();
    assert_eq!(first, vec![0xA0; 16]);

    let export = dir
        .path()
        .join("export/AW1/pack/root/a/f1.bin");
    assert!(export.is_file());

    // Replace the export; the admin must reread it rather than reassemble.
    std::fs::write(&export, b"patched").unwrap();
    assert_eq!(admin.file_data(0).unwrap(), b"patched");
}

#[test]
fn name_dictionaries_are_cached() {
    let dir = tempfile::tempdir().unwrap();
    build_v1_minor7(dir.path());
    let inst = instance(dir.path());

    let mut admin = Admin::new(inst, dir.path().join("pack.rmdp"));
    admin.tree().unwrap();
    let cache_dir = dir.path().join("cache/AW1/pack");
    assert!(cache_dir.join("pack.strarray_fldr").is_file());
    assert!(cache_dir.join("pack.strarray_file").is_file());

    // A torn cache file is rebuilt, not trusted.
    std::fs::write(cache_dir.join("pack.strarray_fldr"), [1, 2]).unwrap();
    admin.invalidate();
    let tree = admin.tree().unwrap();
    assert_eq!(tree.folder(0).unwrap().name, "root");
}

#[test]
fn summary_and_sibling_navigation() {
    let dir = tempfile::tempdir().unwrap();
    build_v1_minor7(dir.path());
    let inst = instance(dir.path());

    let mut admin = Admin::new(inst, dir.path().join("pack.rmdp"));
    let summary = admin.summary().unwrap();
    assert_eq!(summary.name, "pack");
    assert_eq!(summary.version, "v1.7");
    assert_eq!(summary.folders, 3);
    assert_eq!(summary.files, 5);
    assert_eq!(summary.chunks, 5);
    assert_eq!(summary.archives, 1);
    assert_eq!(summary.content_size, 80);
    assert!(summary.to_string().contains("80 B"));

    let tree = admin.tree().unwrap();
    assert_eq!(tree.folder_next(1).unwrap().map(|f| f.index), Some(2));
    assert_eq!(tree.folder_next(2).unwrap().map(|f| f.index), None);
    assert!(tree.file_next(0).unwrap().is_none());

    let data = admin.data().unwrap();
    assert_eq!(data.archive_chunks(0).count(), 5);
}

#[test]
fn missing_sidecar_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lone.rmdp"), b"x").unwrap();
    let inst = instance(dir.path());
    let err = Reader::open(&inst, &dir.path().join("lone.rmdp")).unwrap_err();
    assert!(matches!(err, rmd_pack::PackError::SidecarMissing(_)));
}

/// Big-endian wide-record builder used by the disambiguation test. Header
/// still claims minor 2.
fn build_v1_ambiguous(dir: &Path, actually_wide: bool) {
    let mut names = Vec::new();
    for name in ["root", "f.dat"] {
        names.extend_from_slice(name.as_bytes());
        names.push(0);
    }

    let mut bin: Vec<u8> = Vec::new();
    let folder_count = 1u32;
    let file_count = 1u32;

    if actually_wide {
        // Big-endian header, wide padded records (minor-3 layout).
        bin.push(1);
        bin.extend_from_slice(&2u32.to_be_bytes());
        bin.extend_from_slice(&folder_count.to_be_bytes());
        bin.extend_from_slice(&file_count.to_be_bytes());
        bin.extend_from_slice(&(names.len() as u32).to_be_bytes());
        bin.extend_from_slice(b"d:\0\0\0\0\0\0");
        bin.extend_from_slice(&[0u8; 120]);

        // Folder: crc, pad, next, parent, flags, pad, name offset, children.
        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&(-1i64).to_be_bytes());
        bin.extend_from_slice(&(-1i64).to_be_bytes());
        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&0i64.to_be_bytes());
        bin.extend_from_slice(&(-1i64).to_be_bytes());
        bin.extend_from_slice(&0i64.to_be_bytes());

        // File: prefix, offset, size, crc, pad.
        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&(-1i64).to_be_bytes());
        bin.extend_from_slice(&0i64.to_be_bytes());
        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&5i64.to_be_bytes());
        bin.extend_from_slice(&0u64.to_be_bytes());
        bin.extend_from_slice(&4u64.to_be_bytes());
        bin.extend_from_slice(&[9u8; 4]);
        bin.extend_from_slice(&[0u8; 4]);
    } else {
        // Little-endian compact records (true minor 2).
        bin.push(0);
        bin.extend_from_slice(&2u32.to_le_bytes());
        bin.extend_from_slice(&folder_count.to_le_bytes());
        bin.extend_from_slice(&file_count.to_le_bytes());
        bin.extend_from_slice(&(names.len() as u32).to_le_bytes());
        bin.extend_from_slice(b"d:\0\0\0\0\0\0");
        bin.extend_from_slice(&[0u8; 120]);

        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&(-1i32).to_le_bytes());
        bin.extend_from_slice(&(-1i32).to_le_bytes());
        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&0i32.to_le_bytes());
        bin.extend_from_slice(&(-1i32).to_le_bytes());
        bin.extend_from_slice(&0i32.to_le_bytes());

        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&(-1i32).to_le_bytes());
        bin.extend_from_slice(&0i32.to_le_bytes());
        bin.extend_from_slice(&[0u8; 4]);
        bin.extend_from_slice(&5i32.to_le_bytes());
        bin.extend_from_slice(&0u64.to_le_bytes());
        bin.extend_from_slice(&4u64.to_le_bytes());
        bin.extend_from_slice(&[9u8; 4]);
    }

    bin.extend_from_slice(&names);
    std::fs::write(dir.join("old.bin"), bin).unwrap();
    std::fs::write(dir.join("old.rmdp"), vec![0u8; 4]).unwrap();
}

#[test]
fn minor2_span_disambiguation() {
    // Compact span matches: stays minor 2.
    let dir = tempfile::tempdir().unwrap();
    build_v1_ambiguous(dir.path(), false);
    let inst = instance(dir.path());
    let reader = Reader::open(&inst, &dir.path().join("old.rmdp")).unwrap();
    assert_eq!(reader.version(), "v1.2");

    // Wide records: the span check promotes to minor 3.
    let dir = tempfile::tempdir().unwrap();
    build_v1_ambiguous(dir.path(), true);
    let inst = instance(dir.path());
    let mut reader = Reader::open(&inst, &dir.path().join("old.rmdp")).unwrap();
    assert_eq!(reader.version(), "v1.3");
    match &reader {
        Reader::V1(r) => {
            assert_eq!(r.files[0].size, 4);
            assert_eq!(r.files[0].data_crc, [9u8; 4]);
            assert_eq!(r.files[0].write_time, None);
        }
        Reader::V2(_) => panic!("expected a v1 reader"),
    }
    let names = reader.name_table(rmd_pack::NameKind::File).unwrap();
    assert_eq!(names, vec!["f.dat".to_owned()]);
}
