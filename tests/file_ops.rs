//! Integration test: compress a tree, serve the archive, delete the sources.

use filekit::{
    ArchiveReader, CompressOptions, DownloadPolicy, FileError, MemoryResponse, WriterSink, clean,
    compress, delete, download,
};
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, data: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

#[tokio::test]
async fn compress_serve_and_delete_round_trip() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("export");
    write(&src.join("a.txt"), b"first file");
    write(&src.join("sub/b.txt"), b"second file");
    let archive = dir.path().join("out.zip");

    let summary = compress(&src, &archive, &CompressOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.entries, 2);

    // Serve the archive into a file, deleting it afterwards
    let served = dir.path().join("served.zip");
    let file = tokio::fs::File::create(&served).await.unwrap();
    let mut sink = WriterSink::new(file);
    let bytes = download(&archive, "out.zip", true, &mut sink, &DownloadPolicy::default())
        .await
        .unwrap();
    assert_eq!(bytes, summary.archive_size);
    assert_eq!(
        sink.head().header("Content-Disposition"),
        Some("attachment;fileName=out.zip")
    );
    drop(sink);
    assert!(!archive.exists());

    let mut reader = ArchiveReader::open(&served).await.unwrap();
    assert_eq!(reader.names(), vec!["a.txt", "sub/b.txt"]);
    assert_eq!(
        reader.read_by_name("sub/b.txt").await.unwrap(),
        b"second file"
    );

    delete(&src).await.unwrap();
    assert!(!src.exists());
    // Deleting again is a no-op
    delete(&src).await.unwrap();
}

#[tokio::test]
async fn archive_of_tree_serves_only_allowed_names() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("data");
    write(&src.join("rows.csv"), b"a,b\n1,2\n");
    let archive = dir.path().join("data.bin");
    compress(&src, &archive, &CompressOptions::default())
        .await
        .unwrap();

    let mut sink = MemoryResponse::new();
    let err = download(&archive, "data.bin", false, &mut sink, &DownloadPolicy::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, FileError::UnsupportedType { .. }));
    assert!(archive.exists());

    // Same bytes under an allowed display name
    download(&archive, "data.zip", false, &mut sink, &DownloadPolicy::default())
        .await
        .unwrap();
    assert_eq!(sink.body, std::fs::read(&archive).unwrap());
}

#[tokio::test]
async fn clean_then_compress_empty_directory() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("work");
    write(&src.join("x/y/z.txt"), b"z");
    write(&src.join("top.txt"), b"t");

    clean(&src).await.unwrap();
    assert!(src.is_dir());

    let archive = dir.path().join("empty.zip");
    let summary = compress(&src, &archive, &CompressOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.entries, 0);
    let reader = ArchiveReader::open(&archive).await.unwrap();
    assert!(reader.entries().is_empty());
}
