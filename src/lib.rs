//! Path-addressed folders and files over a flat object store
//!
//! A [`RemoteFilesystem`] binds a bucket to a [`Connection`]. Entries are
//! obtained from it by path: paths ending in `/` are folders, anything else
//! is a file. Folders are zero-length marker objects; files are plain objects.

pub mod cache;
pub mod config;
pub mod connection;
pub mod entry;
pub mod error;
pub mod filesystem;
pub mod path;
pub mod range;
pub mod token;
pub mod upload;

// Re-export main types
pub use cache::EntryCache;
pub use config::Settings;
pub use connection::{Connection, MemoryConnection, ObjectMetadata};
pub use entry::{RemoteEntry, RemoteFile, RemoteFolder};
pub use error::{Error, FilesystemError, PathError, RangeError, Result, TokenSerializationError};
pub use filesystem::RemoteFilesystem;
pub use range::ByteRange;
pub use token::ResumeToken;
pub use upload::{ResumableUpload, UploadStep};
