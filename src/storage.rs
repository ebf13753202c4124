//! File storage behind the image pipeline
//!
//! Decoders only need a readable, seekable stream and the snapshot writer
//! only needs a writable one, so the flash filesystem on the device and a
//! plain directory or an in-memory map on the host are interchangeable.
//! Closing a stream is dropping it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Open, create and probe files by absolute path (`/photo.bmp`)
pub trait Storage {
    /// Stream returned by [`Storage::open`]
    type Reader: Read + Seek;
    /// Stream returned by [`Storage::create`]
    type Writer: Write;

    /// Open an existing file for reading
    fn open(&self, path: &str) -> io::Result<Self::Reader>;

    /// Create or truncate a file for writing
    fn create(&self, path: &str) -> io::Result<Self::Writer>;

    /// Whether a file exists at `path`
    fn exists(&self, path: &str) -> bool;
}

/// Files under a directory, e.g. the SPIFFS mount point
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Resolve every path relative to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStorage { root: root.into() }
    }

    /// Directory all paths are resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Storage for FsStorage {
    type Reader = File;
    type Writer = BufWriter<File>;

    fn open(&self, path: &str) -> io::Result<File> {
        File::open(self.resolve(path))
    }

    fn create(&self, path: &str) -> io::Result<BufWriter<File>> {
        File::create(self.resolve(path)).map(BufWriter::new)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }
}

type FileMap = Rc<RefCell<HashMap<String, Vec<u8>>>>;

/// In-memory files. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    files: FileMap,
}

fn key(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

impl MemStorage {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(key(path), contents.into());
    }

    /// Copy of a file's contents
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(&key(path)).cloned()
    }

    /// Delete a file, returning its contents
    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow_mut().remove(&key(path))
    }

    /// Stored paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.borrow().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Storage for MemStorage {
    type Reader = Cursor<Vec<u8>>;
    type Writer = MemWriter;

    fn open(&self, path: &str) -> io::Result<Cursor<Vec<u8>>> {
        self.get(path).map(Cursor::new).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path))
        })
    }

    fn create(&self, path: &str) -> io::Result<MemWriter> {
        let path = key(path);
        self.files.borrow_mut().insert(path.clone(), Vec::new());
        Ok(MemWriter {
            path,
            buffer: Vec::new(),
            files: Rc::clone(&self.files),
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(&key(path))
    }
}

/// Buffers writes and publishes them to the shared map on flush and drop
#[derive(Debug)]
pub struct MemWriter {
    path: String,
    buffer: Vec<u8>,
    files: FileMap,
}

impl MemWriter {
    fn commit(&self) {
        self.files
            .borrow_mut()
            .insert(self.path.clone(), self.buffer.clone());
    }
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Drop for MemWriter {
    fn drop(&mut self) {
        self.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_paths_are_normalized() {
        let storage = MemStorage::new();
        storage.insert("photo.bmp", vec![1, 2, 3]);
        assert!(storage.exists("/photo.bmp"));
        assert_eq!(storage.get("/photo.bmp"), Some(vec![1, 2, 3]));
        assert_eq!(storage.paths(), vec!["/photo.bmp".to_string()]);
    }

    #[test]
    fn mem_open_missing_is_not_found() {
        let storage = MemStorage::new();
        let err = storage.open("/nope.png").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn mem_writer_commits_on_drop() {
        let storage = MemStorage::new();
        {
            let mut writer = storage.create("/out.bmp").unwrap();
            writer.write_all(b"BM").unwrap();
        }
        assert_eq!(storage.get("/out.bmp"), Some(b"BM".to_vec()));
    }

    #[test]
    fn mem_clones_share_files() {
        let storage = MemStorage::new();
        let other = storage.clone();
        other.insert("/a.png", vec![0]);
        assert!(storage.exists("/a.png"));
        assert_eq!(storage.remove("/a.png"), Some(vec![0]));
        assert!(!other.exists("/a.png"));
    }

    #[test]
    fn fs_storage_resolves_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        {
            let mut writer = storage.create("/snap.bmp").unwrap();
            writer.write_all(&[9, 8, 7]).unwrap();
            writer.flush().unwrap();
        }
        assert!(dir.path().join("snap.bmp").is_file());
        assert!(storage.exists("snap.bmp"));
        let mut contents = Vec::new();
        storage
            .open("/snap.bmp")
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        assert_eq!(contents, vec![9, 8, 7]);
        assert!(!storage.exists("/missing.bmp"));
    }
}
