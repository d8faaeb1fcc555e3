// In-memory file system - no side effects on disk

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

use super::{FileReader, FileSystemOperations, FileWriter};

type FileData = Arc<Mutex<Vec<u8>>>;

/// File system kept entirely in memory
///
/// Writers opened with `open_write` append straight into the stored file,
/// so content is visible as soon as it is written.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, FileData>>>,
    dirs: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content of a file
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        let files = lock(&self.files);
        files.get(path).map(|data| lock(data).clone())
    }

    pub fn file_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = lock(&self.files).keys().cloned().collect();
        paths.sort();
        paths
    }

    fn entry(&self, path: &Path) -> FileData {
        let mut files = lock(&self.files);
        let data = files
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())));
        lock(data).clear();
        Arc::clone(data)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl FileSystemOperations for MemoryFileSystem {
    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut dirs = lock(&self.dirs);
        for ancestor in path.ancestors() {
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    async fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let data = self.entry(path);
        lock(&data).extend_from_slice(contents.as_bytes());
        Ok(())
    }

    async fn open_read(&self, path: &Path) -> io::Result<FileReader> {
        let contents = self.contents(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })?;
        Ok(Box::new(io::Cursor::new(contents)))
    }

    async fn open_write(&self, path: &Path) -> io::Result<FileWriter> {
        Ok(Box::new(MemoryFileWriter {
            target: self.entry(path),
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path) || lock(&self.dirs).contains(path)
    }
}

struct MemoryFileWriter {
    target: FileData,
}

impl AsyncWrite for MemoryFileWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        lock(&self.target).extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
