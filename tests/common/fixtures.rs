use bucketfs::MemoryConnection;
use bytes::Bytes;

/// Store a zero-length folder marker for every folder key given.
pub fn seed_folders(conn: &MemoryConnection, bucket: &str, keys: &[&str]) {
    for key in keys {
        assert!(key.ends_with('/'), "folder key must end with '/': {}", key);
        conn.insert_object(bucket, key, Bytes::new(), &mime::APPLICATION_OCTET_STREAM);
    }
}

/// Store text files as `(key, content)` pairs.
pub fn seed_files(conn: &MemoryConnection, bucket: &str, files: &[(&str, &str)]) {
    for (key, content) in files {
        conn.insert_object(
            bucket,
            key,
            Bytes::copy_from_slice(content.as_bytes()),
            &mime::TEXT_PLAIN,
        );
    }
}

/// Deterministic binary payload of `len` bytes.
pub fn payload(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

/// A small tree:
///
/// ```text
/// /docs/
/// /docs/a.txt
/// /docs/reports/
/// /docs/reports/q1.txt
/// /docs/reports/q2.txt
/// /readme.txt
/// ```
pub fn seed_tree(conn: &MemoryConnection, bucket: &str) {
    seed_folders(conn, bucket, &["docs/", "docs/reports/"]);
    seed_files(
        conn,
        bucket,
        &[
            ("docs/a.txt", "alpha"),
            ("docs/reports/q1.txt", "first quarter"),
            ("docs/reports/q2.txt", "second quarter"),
            ("readme.txt", "hello"),
        ],
    );
}
