//! File system operations abstraction for testing
//!
//! This module provides a trait-based abstraction over the local file
//! operations the walkthrough performs, so the workflow can run against the
//! real disk or the in-memory [`MemoryFileSystem`], and be mocked in tests
//! using the `mockall` crate.
//!
//! # Examples
//!
//! ```rust,no_run
//! use blob_walkthrough::fs::{FileSystemOperations, StandardFileSystem};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let fs_ops: Arc<dyn FileSystemOperations> = Arc::new(StandardFileSystem);
//!
//!     fs_ops.create_dir_all(Path::new("data")).await?;
//!     fs_ops.write(Path::new("data/hello.txt"), "Hello, World!").await?;
//!
//!     if fs_ops.exists(Path::new("data/hello.txt")) {
//!         println!("File was created successfully");
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::io;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

mod memory;

pub use memory::MemoryFileSystem;

/// Readable file content
pub type FileReader = Box<dyn AsyncRead + Send + Unpin>;
/// Writable file sink
pub type FileWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Trait for file system operations that can be mocked in tests
///
/// Errors are plain OS-level `io::Error`s so callers can report them as-is.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait::async_trait]
pub trait FileSystemOperations: Send + Sync {
    /// Create a directory and all its parent directories
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Write text to a file, creating or truncating it
    ///
    /// # Arguments
    /// * `path` - The file path to write to
    /// * `contents` - The text to write to the file
    async fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Open an existing file for reading
    async fn open_read(&self, path: &Path) -> io::Result<FileReader>;

    /// Open a file for writing, replacing any existing content
    async fn open_write(&self, path: &Path) -> io::Result<FileWriter>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;
}

/// Standard implementation that uses actual file system operations
///
/// This is the production implementation of `FileSystemOperations`. Use
/// `MemoryFileSystem` or `MockFileSystemOperations` in tests.
pub struct StandardFileSystem;

#[async_trait::async_trait]
impl FileSystemOperations for StandardFileSystem {
    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn open_read(&self, path: &Path) -> io::Result<FileReader> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    async fn open_write(&self, path: &Path) -> io::Result<FileWriter> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Box::new(file))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
