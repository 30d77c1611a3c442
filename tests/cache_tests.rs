mod common;

use anyhow::Result;
use common::fixtures::{seed_files, seed_folders};
use common::{setup, BUCKET};
use std::collections::HashMap;

#[tokio::test]
async fn test_property_reads_are_served_from_cache() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("a.txt", "x")]);
    fs.file("/a.txt")?.set_property("owner", "alice").await?;
    conn.reset_call_counters();

    let mut file = fs.file("/a.txt")?;
    assert!(!file.cache().is_populated());
    assert_eq!(file.get_property("owner").await?.as_deref(), Some("alice"));
    assert_eq!(conn.get_call_count("get_object"), 1);

    // Populated cache answers for present and absent keys alike.
    assert_eq!(file.get_property("owner").await?.as_deref(), Some("alice"));
    assert_eq!(file.get_property("missing").await?, None);
    assert_eq!(conn.get_call_count("get_object"), 1);
    Ok(())
}

#[tokio::test]
async fn test_set_property_replaces_cache_with_server_answer() -> Result<()> {
    let (conn, fs) = setup();
    seed_folders(&conn, BUCKET, &["docs/"]);

    let mut folder = fs.folder("/docs/")?;
    folder.set_property("owner", "alice").await?;
    folder.set_property("color", "blue").await?;
    conn.reset_call_counters();

    let expected: HashMap<String, String> = [("owner", "alice"), ("color", "blue")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(folder.cache().values(), Some(&expected));
    assert_eq!(folder.properties().await?, expected);
    assert_eq!(conn.get_call_count("get_object"), 0);
    Ok(())
}

#[tokio::test]
async fn test_instances_do_not_share_cache() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("a.txt", "x")]);

    let mut writer = fs.file("/a.txt")?;
    let mut reader = fs.file("/a.txt")?;
    writer.set_property("stage", "draft").await?;
    assert_eq!(reader.get_property("stage").await?.as_deref(), Some("draft"));

    writer.set_property("stage", "final").await?;
    assert_eq!(reader.get_property("stage").await?.as_deref(), Some("draft"));

    reader.invalidate_cache();
    assert_eq!(reader.get_property("stage").await?.as_deref(), Some("final"));

    // Identity ignores what each instance has cached.
    assert_eq!(writer, reader);
    Ok(())
}

#[tokio::test]
async fn test_clone_starts_with_empty_cache() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("a.txt", "x")]);

    let mut file = fs.file("/a.txt")?;
    file.set_property("k", "v").await?;
    assert!(file.cache().is_populated());

    let copy = file.clone();
    assert_eq!(copy, file);
    assert!(!copy.cache().is_populated());
    Ok(())
}

#[tokio::test]
async fn test_metadata_fetch_replaces_cache() -> Result<()> {
    let (conn, fs) = setup();
    seed_files(&conn, BUCKET, &[("a.txt", "x")]);
    fs.file("/a.txt")?.set_property("owner", "bob").await?;

    let mut entry = fs.entry("/a.txt")?;
    let metadata = entry.metadata().await?;
    assert_eq!(metadata.name, "a.txt");
    assert_eq!(metadata.size, Some(1));

    conn.reset_call_counters();
    assert_eq!(entry.get_property("owner").await?.as_deref(), Some("bob"));
    assert_eq!(conn.get_call_count("get_object"), 0);
    Ok(())
}

#[tokio::test]
async fn test_property_of_missing_entry_fails() -> Result<()> {
    let (_, fs) = setup();

    let mut file = fs.file("/ghost.txt")?;
    let err = file.get_property("owner").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!file.cache().is_populated());

    let err = file.set_property("owner", "nobody").await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}
