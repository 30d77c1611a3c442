#![allow(dead_code)]

pub mod fixtures;

use bucketfs::{MemoryConnection, RemoteFilesystem};
use std::sync::Arc;

pub const BUCKET: &str = "test-bucket";

/// Install the test logger once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fresh in-memory store and a filesystem over [`BUCKET`].
pub fn setup() -> (Arc<MemoryConnection>, RemoteFilesystem) {
    init_logging();
    let conn = Arc::new(MemoryConnection::new());
    let fs = RemoteFilesystem::new(conn.clone(), BUCKET);
    (conn, fs)
}
