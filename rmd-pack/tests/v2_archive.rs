//! End-to-end tests over a synthetic second-generation archive.

use std::path::Path;

use pretty_assertions::assert_eq;

use rmd_pack::{Admin, Compression, Instance, PathMode};

fn instance(root: &Path) -> Instance {
    Instance {
        key: "CTL".to_owned(),
        name: "Control".to_owned(),
        version: "latest".to_owned(),
        root: root.to_path_buf(),
        cache_root: root.join("cache"),
        export_root: root.join("export"),
    }
}

fn ofsz(offset: u32, size: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&offset.to_le_bytes());
    out[4..].copy_from_slice(&size.to_le_bytes());
    out
}

fn chunk_record(lz4: bool, archive: u16, offset: u64, decompressed: u32, compressed: u32) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0] = u8::from(lz4);
    out[1..3].copy_from_slice(&archive.to_le_bytes());
    out[3..8].copy_from_slice(&offset.to_le_bytes()[..5]);
    out[8..12].copy_from_slice(&decompressed.to_le_bytes());
    out[12..16].copy_from_slice(&compressed.to_le_bytes());
    out
}

struct Fixture {
    rmdtoc: Vec<u8>,
    shard: Vec<u8>,
    shard_name: &'static str,
    toc_len: usize,
    file1_body: Vec<u8>,
}

/// One archive shard, two folders, two files. The first file's chunk is
/// stored raw, the second LZ4-compressed.
fn build_v2() -> Fixture {
    let shard_name = "pack_000.rmdar";

    // String blob: names referenced by OfSz slices.
    let mut stng = Vec::new();
    let slice_of = |text: &str, stng: &mut Vec<u8>| {
        let offset = stng.len() as u32;
        stng.extend_from_slice(text.as_bytes());
        ofsz(offset, text.len() as u32)
    };
    let s_root = slice_of("root", &mut stng);
    let s_sub = slice_of("sub", &mut stng);
    let s_one = slice_of("one.bin", &mut stng);
    let s_two = slice_of("two.bin", &mut stng);
    let s_arch = slice_of(shard_name, &mut stng);
    let s_mdty = slice_of("r::FileInfoMetadata", &mut stng);
    // Keep the blob-and-tail region 8-aligned so the produced TOC length
    // equals the predicted one.
    while (stng.len() + 8) % 8 != 0 {
        stng.push(0);
    }

    // Archive shard: chunk 0 raw at 0, chunk 1 LZ4 at 16.
    let file0_body = vec![0x11u8; 16];
    let file1_body: Vec<u8> = (0u8..64).collect();
    let compressed = lz4_flex::block::compress(&file1_body);
    let mut shard = Vec::new();
    shard.extend_from_slice(&file0_body);
    let chunk1_offset = shard.len() as u64;
    shard.extend_from_slice(&compressed);

    // Decompressed TOC, laid out table by table.
    let mut toc = Vec::new();
    // arch (offset 0): path + hash.
    toc.extend_from_slice(&s_arch);
    toc.extend_from_slice(&0xFEEDFACE_u64.to_le_bytes());
    // fldr (offset 16): root and one child.
    let fldr_offset = toc.len() as u32;
    for (parent, next_id, next_count, file_index, file_count, name) in [
        (0xFFFFFFFF_u32, 0u32, 2u32, 0u32, 1u32, s_root),
        (0, 0, 1, 1, 1, s_sub),
    ] {
        toc.extend_from_slice(&parent.to_le_bytes());
        toc.extend_from_slice(&next_id.to_le_bytes());
        toc.extend_from_slice(&next_count.to_le_bytes());
        toc.extend_from_slice(&file_index.to_le_bytes());
        toc.extend_from_slice(&file_count.to_le_bytes());
        toc.extend_from_slice(&name);
    }
    // file (offset 72): chunk ranges are byte ranges into the chunk table.
    let file_offset = toc.len() as u32;
    for (chunks, parent, name, size) in [
        (ofsz(0, 16), 0u32, s_one, file0_body.len() as u32),
        (ofsz(16, 16), 1, s_two, file1_body.len() as u32),
    ] {
        toc.extend_from_slice(&chunks);
        toc.extend_from_slice(&parent.to_le_bytes());
        toc.extend_from_slice(&name);
        toc.extend_from_slice(&size.to_le_bytes());
        toc.extend_from_slice(&ofsz(0, 0));
    }
    // mdty (offset 136): one name slice.
    let mdty_offset = toc.len() as u32;
    toc.extend_from_slice(&s_mdty);
    // chnk (offset 144).
    let chnk_offset = toc.len() as u32;
    toc.extend_from_slice(&chunk_record(false, 0, 0, file0_body.len() as u32, 0));
    toc.extend_from_slice(&chunk_record(
        true,
        0,
        chunk1_offset,
        file1_body.len() as u32,
        compressed.len() as u32,
    ));
    // stng, then an 8-byte mtdt blob.
    let stng_offset = toc.len() as u32;
    toc.extend_from_slice(&stng);
    let mtdt_offset = toc.len() as u32;
    toc.extend_from_slice(&[0u8; 8]);

    // The TOC travels as two blocks: the first LZ4-compressed, the second
    // raw.
    let split = 64;
    let block0 = lz4_flex::block::compress(&toc[..split]);
    let block1 = &toc[split..];

    let header_len = 4 + 4 + 10 * 8;
    let tabl_offset = header_len as u32;
    let blocks_start = tabl_offset + 32;

    let mut rmdtoc = Vec::new();
    rmdtoc.extend_from_slice(b"COTR");
    rmdtoc.extend_from_slice(&9u32.to_le_bytes());
    rmdtoc.extend_from_slice(&ofsz(tabl_offset, 32)); // tabl
    rmdtoc.extend_from_slice(&ofsz(0, 1)); // arch
    rmdtoc.extend_from_slice(&ofsz(fldr_offset, 2)); // fldr
    rmdtoc.extend_from_slice(&ofsz(file_offset, 2)); // file
    rmdtoc.extend_from_slice(&ofsz(stng_offset, stng.len() as u32)); // stng
    rmdtoc.extend_from_slice(&ofsz(mdty_offset, 1)); // mdty
    rmdtoc.extend_from_slice(&ofsz(mtdt_offset, 8)); // mtdt
    rmdtoc.extend_from_slice(&ofsz(0, 0)); // unk0
    rmdtoc.extend_from_slice(&ofsz(0, 0)); // unk1
    rmdtoc.extend_from_slice(&ofsz(chnk_offset, 32)); // chnk

    rmdtoc.extend_from_slice(&chunk_record(
        true,
        0,
        u64::from(blocks_start),
        split as u32,
        block0.len() as u32,
    ));
    rmdtoc.extend_from_slice(&chunk_record(
        false,
        0,
        u64::from(blocks_start) + block0.len() as u64,
        (toc.len() - split) as u32,
        0,
    ));
    rmdtoc.extend_from_slice(&block0);
    rmdtoc.extend_from_slice(block1);

    Fixture {
        rmdtoc,
        shard,
        shard_name,
        toc_len: toc.len(),
        file1_body,
    }
}

fn write_fixture(dir: &Path, fixture: &Fixture) {
    std::fs::write(dir.join("world.rmdtoc"), &fixture.rmdtoc).unwrap();
    std::fs::write(dir.join(fixture.shard_name), &fixture.shard).unwrap();
}

#[test]
fn toc_decompression_and_tables() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = build_v2();
    write_fixture(dir.path(), &fixture);
    let inst = instance(dir.path());

    let mut admin = Admin::new(inst, dir.path().join("world.rmdtoc"));
    {
        let tree = admin.tree().unwrap();
        assert_eq!(tree.folders.len(), 2);
        assert_eq!(tree.files.len(), 2);
        assert_eq!(tree.prefix, "");

        let root = tree.folder(0).unwrap();
        assert_eq!(root.parent_idx, -1);
        assert_eq!(root.name, "root");
        assert_eq!(root.file_count, 1);
        assert_eq!(root.child_folders, vec![1]);

        let sub = tree.folder(1).unwrap();
        assert_eq!(sub.parent_idx, 0);
        assert_eq!(sub.name, "sub");

        assert_eq!(tree.file_path(1, PathMode::Raw).unwrap(), "root/sub/two.bin");
        // v2 has no prefix; std mode only adds the slash.
        assert_eq!(tree.file_path(1, PathMode::Std).unwrap(), "/root/sub/two.bin");

        for file in &tree.files {
            assert!(file.data_crc.is_none());
        }
        assert_eq!(tree.files[1].chunk_ids, vec![1]);
    }

    // The cached decompressed TOC has the predicted size.
    let toc_cache = dir.path().join("cache/CTL/world/world.rmdtoc_decompressed");
    assert_eq!(
        std::fs::metadata(&toc_cache).unwrap().len() as usize,
        fixture.toc_len
    );

    {
        let data = admin.data().unwrap();
        assert_eq!(data.archives.len(), 1);
        assert_eq!(data.archives[0].hash, Some(0xFEEDFACE));
        assert!(data.archives[0].path.ends_with(fixture.shard_name));

        assert_eq!(data.chunks.len(), 2);
        assert_eq!(data.chunks[0].compression, Compression::None);
        assert_eq!(data.chunks[1].compression, Compression::Lz4);

        // LZ4 chunks inflate to exactly their declared size.
        let inflated = data.read_chunk(1).unwrap();
        assert_eq!(inflated, fixture.file1_body);
        assert_eq!(data.read_chunk(0).unwrap(), vec![0x11u8; 16]);
    }

    // Chunk sums equal logical sizes.
    {
        let files = admin.tree().unwrap().files.clone();
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

    // v2 metadata surface is the type-name list.
    let meta = admin.meta().unwrap();
    assert!(meta.packmeta_path.is_none());
    assert_eq!(meta.metadata_types, vec!["r::FileInfoMetadata".to_owned()]);

    // Assembled file content via the export path.
    let body = admin.file_data(1).unwrap();
    assert_eq!(body, fixture.file1_body);
    assert!(dir
        .path()
        .join("export/CTL/world/root/sub/two.bin")
        .is_file());
}

#[test]
fn cached_toc_of_predicted_size_skips_decompression() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = build_v2();
    write_fixture(dir.path(), &fixture);
    let inst = instance(dir.path());

    // First open produces the cache.
    let mut admin = Admin::new(inst.clone(), dir.path().join("world.rmdtoc"));
    admin.tree().unwrap();
    let toc_cache = dir.path().join("cache/CTL/world/world.rmdtoc_decompressed");
    let cached = std::fs::read(&toc_cache).unwrap();

    // Corrupt the compressed blocks inside the TOC file. With a cache of
    // exactly the predicted size present, the reader must not touch them.
    let mut corrupted = fixture.rmdtoc.clone();
    let tail = corrupted.len() - 8;
    corrupted[tail..].fill(0xFF);
    std::fs::write(dir.path().join("world.rmdtoc"), &corrupted).unwrap();

    let mut admin = Admin::new(inst.clone(), dir.path().join("world.rmdtoc"));
    let tree = admin.tree().unwrap();
    assert_eq!(tree.folders.len(), 2);
    assert_eq!(std::fs::read(&toc_cache).unwrap(), cached);

    // A cache of the wrong size is rebuilt from the archive.
    std::fs::write(&toc_cache, [0u8; 3]).unwrap();
    std::fs::write(dir.path().join("world.rmdtoc"), &fixture.rmdtoc).unwrap();
    let mut admin = Admin::new(inst, dir.path().join("world.rmdtoc"));
    admin.tree().unwrap();
    assert_eq!(std::fs::read(&toc_cache).unwrap(), cached);
}

#[test]
fn wrong_magic_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let inst = instance(dir.path());
    std::fs::write(dir.path().join("bad.rmdtoc"), b"RTOC\0\0\0\0").unwrap();
    let err = rmd_pack::Reader::open(&inst, &dir.path().join("bad.rmdtoc")).unwrap_err();
    assert!(matches!(err, rmd_pack::PackError::BadMagic { .. }));
}
