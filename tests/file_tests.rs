mod common;

use anyhow::Result;
use bucketfs::error::ConnectionError;
use bucketfs::{Error, FilesystemError, RangeError, RemoteFilesystem};
use bytes::Bytes;
use common::fixtures::{payload, seed_files};
use common::{setup, BUCKET};
use futures::StreamExt;
use tokio_test::assert_err;

#[tokio::test]
async fn test_write_then_read() -> Result<()> {
    let (conn, fs) = setup();
    let file = fs.file("/notes/today.txt")?;

    let mut written = file.write("buy milk", &mime::TEXT_PLAIN).await?;
    assert_eq!(written.path(), "/notes/today.txt");
    assert_eq!(written.read_to_bytes(None, None).await?, Bytes::from_static(b"buy milk"));
    assert_eq!(written.length().await?, 8);

    let metadata = written.metadata().await?;
    assert_eq!(metadata.content_type.as_deref(), Some("text/plain"));
    assert_eq!(metadata.size, Some(8));
    assert_eq!(conn.get_call_count("upload_object"), 1);
    Ok(())
}

#[tokio::test]
async fn test_write_overwrites() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("a.txt", "old content")]);

    fs.file("/a.txt")?.write("new", &mime::TEXT_PLAIN).await?;
    assert_eq!(conn.contents(BUCKET, "a.txt").unwrap(), Bytes::from_static(b"new"));
    Ok(())
}

#[tokio::test]
async fn test_ranged_reads() -> Result<()> {
    let (conn, fs) = setup();
    let data = payload(64);
    conn.insert_object(BUCKET, "data.bin", data.clone(), &mime::APPLICATION_OCTET_STREAM);
    let file = fs.file("/data.bin")?;

    assert_eq!(file.read_to_bytes(Some(10), None).await?, data.slice(0..10));
    assert_eq!(file.read_to_bytes(Some(10), Some(20)).await?, data.slice(10..20));
    assert_eq!(file.read_to_bytes(None, None).await?, data);
    Ok(())
}

#[tokio::test]
async fn test_read_streams_in_chunks() -> Result<()> {
    let (conn, fs) = setup();
    let data = payload(10_000);
    conn.insert_object(BUCKET, "large.bin", data.clone(), &mime::APPLICATION_OCTET_STREAM);

    let mut stream = fs.file("/large.bin")?.read(None, None).await?;
    let mut chunks = 0;
    let mut total = 0;
    while let Some(chunk) = stream.next().await {
        total += chunk?.len();
        chunks += 1;
    }
    assert_eq!(total, data.len());
    assert!(chunks > 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_ranges() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("a.txt", "0123456789")]);
    let file = fs.file("/a.txt")?;

    for (start, end) in [(5, 5), (5, 3)] {
        let err = file.read(Some(start), Some(end)).await.err().unwrap();
        assert!(matches!(err, Error::Range(RangeError::EndNotAfterStart { .. })));
    }
    assert_eq!(conn.get_call_count("download_object"), 0);
    Ok(())
}

#[tokio::test]
async fn test_read_missing_file() -> Result<()> {
    let (_, fs) = setup();
    let err = fs.file("/nope.txt")?.read(None, None).await.err().unwrap();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_copy_to() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("src.txt", "payload")]);

    let source = fs.file("/src.txt")?;
    let copy = source.copy_to(&fs.file("/backup/dst.txt")?).await?;
    assert_eq!(copy.path(), "/backup/dst.txt");
    assert_eq!(copy.read_to_bytes(None, None).await?, Bytes::from_static(b"payload"));
    assert!(source.exists().await?);
    Ok(())
}

#[tokio::test]
async fn test_copy_to_existing_destination_fails() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("src.txt", "a"), ("dst.txt", "b")]);

    let err = assert_err!(fs.file("/src.txt")?.copy_to(&fs.file("/dst.txt")?).await);
    assert_eq!(
        err.as_filesystem(),
        Some(&FilesystemError::DestinationExists("/dst.txt".to_string()))
    );
    assert_eq!(conn.get_call_count("copy_object"), 0);
    assert_eq!(conn.contents(BUCKET, "dst.txt").unwrap(), Bytes::from_static(b"b"));
    Ok(())
}

#[tokio::test]
async fn test_copy_across_buckets() -> Result<()> {
    let (conn, fs) = setup();
    let archive = RemoteFilesystem::new(conn.clone(), "archive");
    seed_files(&conn, BUCKET, &[("report.txt", "numbers")]);

    let copy = fs.file("/report.txt")?.copy_to(&archive.file("/2024/report.txt")?).await?;
    assert_eq!(copy.filesystem(), &archive);
    assert_eq!(conn.object_keys("archive"), vec!["2024/report.txt"]);
    Ok(())
}

#[tokio::test]
async fn test_move_to() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("old.txt", "content")]);

    let moved = fs.file("/old.txt")?.move_to(&fs.file("/new.txt")?).await?;
    assert_eq!(moved.path(), "/new.txt");
    assert_eq!(conn.object_keys(BUCKET), vec!["new.txt"]);
    Ok(())
}

#[tokio::test]
async fn test_move_leaves_copy_when_delete_fails() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("old.txt", "content")]);
    conn.make_operation_fail_for("delete_object", "old.txt");

    let err = assert_err!(fs.file("/old.txt")?.move_to(&fs.file("/new.txt")?).await);
    assert!(matches!(err, Error::Connection(ConnectionError::Status { .. })));
    assert_eq!(conn.object_keys(BUCKET), vec!["new.txt", "old.txt"]);
    Ok(())
}

#[tokio::test]
async fn test_delete_file() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("a.txt", "x")]);

    let deleted = fs.entry("/a.txt")?.delete(false).await?;
    assert!(!deleted.is_folder());
    assert!(!deleted.exists().await?);

    let err = assert_err!(fs.file("/a.txt")?.delete().await);
    assert!(err.is_not_found());
    Ok(())
}
