//! In-memory filesystem behind the simulated host
//!
//! Flat map from absolute path to node, the same shape the host's VFS
//! exposes to applets. Failures are reported as host error codes so the
//! simulated primitives can load them straight into the error register.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::abi::errno::{EEXIST, EFBIG, EIO, EISDIR, ENOENT, ENOTDIR};

/// Result of a filesystem operation; the error is a host errno value
pub type FsResult<T> = Result<T, i32>;

pub const DEFAULT_FILE_MODE: u32 = 0o644;
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Largest file the simulated filesystem will grow to
pub const MAX_FILE_SIZE: u64 = 1 << 30;

fn default_file_mode() -> u32 {
    DEFAULT_FILE_MODE
}

fn default_dir_mode() -> u32 {
    DEFAULT_DIR_MODE
}

/// A stored file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    File {
        #[serde(default)]
        data: Vec<u8>,
        #[serde(default = "default_file_mode")]
        mode: u32,
    },
    Directory {
        #[serde(default = "default_dir_mode")]
        mode: u32,
    },
}

impl Node {
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    pub fn mode(&self) -> u32 {
        match self {
            Node::File { mode, .. } | Node::Directory { mode } => *mode,
        }
    }
}

/// Serializable image of the whole filesystem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsSnapshot {
    pub nodes: BTreeMap<String, Node>,
}

/// In-memory filesystem
#[derive(Debug, Clone)]
pub struct MemoryFs {
    /// All files and directories, keyed by normalized absolute path
    nodes: HashMap<String, Node>,
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut fs = Self {
            nodes: HashMap::new(),
        };
        // Root directory always exists
        fs.nodes.insert(
            "/".to_string(),
            Node::Directory {
                mode: DEFAULT_DIR_MODE,
            },
        );
        fs
    }

    /// Resolve `path` against `cwd`, folding `.` and `..`
    ///
    /// The empty path resolves to nothing, as on POSIX hosts.
    pub fn resolve(cwd: &str, path: &str) -> Option<String> {
        if path.is_empty() {
            return None;
        }
        let mut parts: Vec<&str> = Vec::new();
        let joined;
        let full = if path.starts_with('/') {
            path
        } else {
            joined = format!("{}/{}", cwd, path);
            &joined
        };
        for part in full.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                p => parts.push(p),
            }
        }
        Some(format!("/{}", parts.join("/")))
    }

    /// Parent directory of a normalized path
    fn parent_path(path: &str) -> Option<&str> {
        if path == "/" {
            return None;
        }
        let idx = path.rfind('/')?;
        Some(if idx == 0 { "/" } else { &path[..idx] })
    }

    /// The parent must exist and be a directory
    fn check_parent(&self, path: &str) -> FsResult<()> {
        match Self::parent_path(path).and_then(|p| self.nodes.get(p)) {
            Some(node) if node.is_dir() => Ok(()),
            Some(_) => Err(ENOTDIR),
            None => Err(ENOENT),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.nodes.get(path).is_some_and(Node::is_dir)
    }

    /// File contents, if `path` is a file
    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        match self.nodes.get(path) {
            Some(Node::File { data, .. }) => Some(data),
            _ => None,
        }
    }

    pub fn create_file(&mut self, path: &str, mode: u32) -> FsResult<()> {
        if self.nodes.contains_key(path) {
            return Err(EEXIST);
        }
        self.check_parent(path)?;
        self.nodes.insert(
            path.to_string(),
            Node::File {
                data: Vec::new(),
                mode,
            },
        );
        Ok(())
    }

    pub fn create_dir(&mut self, path: &str, mode: u32) -> FsResult<()> {
        if self.nodes.contains_key(path) {
            return Err(EEXIST);
        }
        self.check_parent(path)?;
        self.nodes.insert(path.to_string(), Node::Directory { mode });
        Ok(())
    }

    /// Create `path` and any missing ancestors
    pub fn create_dir_all(&mut self, path: &str) -> FsResult<()> {
        if self.is_dir(path) {
            return Ok(());
        }
        if let Some(parent) = Self::parent_path(path) {
            self.create_dir_all(parent)?;
        }
        self.create_dir(path, DEFAULT_DIR_MODE)
    }

    /// Replace the whole contents of `path`, creating ancestors
    pub fn put_file(&mut self, path: &str, data: &[u8]) -> FsResult<()> {
        if let Some(parent) = Self::parent_path(path) {
            self.create_dir_all(parent)?;
        }
        match self.nodes.get_mut(path) {
            Some(Node::File { data: existing, .. }) => {
                *existing = data.to_vec();
                Ok(())
            }
            Some(Node::Directory { .. }) => Err(EISDIR),
            None => {
                self.nodes.insert(
                    path.to_string(),
                    Node::File {
                        data: data.to_vec(),
                        mode: DEFAULT_FILE_MODE,
                    },
                );
                Ok(())
            }
        }
    }

    pub fn truncate(&mut self, path: &str) -> FsResult<()> {
        match self.nodes.get_mut(path) {
            Some(Node::File { data, .. }) => {
                data.clear();
                Ok(())
            }
            Some(Node::Directory { .. }) => Err(EISDIR),
            None => Err(ENOENT),
        }
    }

    pub fn remove_file(&mut self, path: &str) -> FsResult<()> {
        match self.nodes.get(path) {
            Some(Node::File { .. }) => {
                self.nodes.remove(path);
                Ok(())
            }
            Some(Node::Directory { .. }) => Err(EISDIR),
            None => Err(ENOENT),
        }
    }

    pub fn len(&self, path: &str) -> FsResult<u64> {
        match self.nodes.get(path) {
            Some(Node::File { data, .. }) => Ok(data.len() as u64),
            Some(Node::Directory { .. }) => Err(EISDIR),
            None => Err(ENOENT),
        }
    }

    /// Copy out bytes starting at `position`
    ///
    /// A file removed while still open reads as empty, and so does any
    /// position at or past the end.
    pub fn read_at(&self, path: &str, position: u64, buf: &mut [u8]) -> usize {
        let Some(Node::File { data, .. }) = self.nodes.get(path) else {
            return 0;
        };
        let Some(position) = usize::try_from(position).ok().filter(|&p| p < data.len()) else {
            return 0;
        };
        let to_read = buf.len().min(data.len() - position);
        buf[..to_read].copy_from_slice(&data[position..position + to_read]);
        to_read
    }

    /// Write `buf` at `position`, zero-filling any gap
    ///
    /// Fails with `EFBIG` when the file would end past [`MAX_FILE_SIZE`].
    pub fn write_at(&mut self, path: &str, position: u64, buf: &[u8]) -> FsResult<usize> {
        let Some(Node::File { data, .. }) = self.nodes.get_mut(path) else {
            return Err(EIO);
        };
        let end = position
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= MAX_FILE_SIZE)
            .ok_or(EFBIG)?;
        let (position, end) = (position as usize, end as usize);
        if end > data.len() {
            data.resize(end, 0);
        }
        data[position..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    pub fn snapshot(&self) -> FsSnapshot {
        FsSnapshot {
            nodes: self
                .nodes
                .iter()
                .map(|(p, n)| (p.clone(), n.clone()))
                .collect(),
        }
    }

    /// Rebuild from a snapshot; paths are normalized and the root is
    /// always present
    pub fn from_snapshot(snapshot: FsSnapshot) -> Self {
        let mut fs = Self::new();
        for (path, node) in snapshot.nodes {
            if let Some(path) = Self::resolve("/", &path) {
                fs.nodes.insert(path, node);
            }
        }
        if !fs.is_dir("/") {
            fs.nodes.insert(
                "/".to_string(),
                Node::Directory {
                    mode: DEFAULT_DIR_MODE,
                },
            );
        }
        fs
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let snapshot: FsSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(MemoryFs::resolve("/", "a/b"), Some("/a/b".to_string()));
        assert_eq!(MemoryFs::resolve("/tmp", "x.txt"), Some("/tmp/x.txt".to_string()));
        assert_eq!(MemoryFs::resolve("/tmp", "/etc//hosts/"), Some("/etc/hosts".to_string()));
        assert_eq!(MemoryFs::resolve("/a/b", "../c/./d"), Some("/a/c/d".to_string()));
        assert_eq!(MemoryFs::resolve("/", ".."), Some("/".to_string()));
        assert_eq!(MemoryFs::resolve("/tmp", ""), None);
    }

    #[test]
    fn test_basic_file_ops() {
        let mut fs = MemoryFs::new();
        fs.create_file("/test.txt", 0o600).unwrap();
        assert_eq!(fs.write_at("/test.txt", 0, b"hello world"), Ok(11));

        let mut buf = [0u8; 11];
        assert_eq!(fs.read_at("/test.txt", 0, &mut buf), 11);
        assert_eq!(&buf, b"hello world");
        assert_eq!(fs.get("/test.txt").unwrap().mode(), 0o600);
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let mut fs = MemoryFs::new();
        fs.create_file("/f", DEFAULT_FILE_MODE).unwrap();
        fs.write_at("/f", 3, b"x").unwrap();
        assert_eq!(fs.contents("/f"), Some(&b"\0\0\0x"[..]));
    }

    #[test]
    fn test_read_past_end_is_empty() {
        let mut fs = MemoryFs::new();
        fs.put_file("/f", b"abc").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(fs.read_at("/f", 3, &mut buf), 0);
        assert_eq!(fs.read_at("/f", 10, &mut buf), 0);
        assert_eq!(fs.read_at("/f", u64::MAX, &mut buf), 0);
        assert_eq!(fs.read_at("/f", 1, &mut buf), 2);
        assert_eq!(&buf[..2], b"bc");
    }

    #[test]
    fn test_write_beyond_size_limit() {
        let mut fs = MemoryFs::new();
        fs.create_file("/f", DEFAULT_FILE_MODE).unwrap();

        assert_eq!(fs.write_at("/f", u64::MAX, b"x"), Err(EFBIG));
        assert_eq!(fs.write_at("/f", MAX_FILE_SIZE, b"x"), Err(EFBIG));
        assert_eq!(fs.len("/f"), Ok(0));
    }

    #[test]
    fn test_create_requires_parent() {
        let mut fs = MemoryFs::new();
        assert_eq!(fs.create_file("/missing/f", DEFAULT_FILE_MODE), Err(ENOENT));
        fs.create_file("/plain", DEFAULT_FILE_MODE).unwrap();
        assert_eq!(fs.create_dir("/plain/sub", DEFAULT_DIR_MODE), Err(ENOTDIR));
    }

    #[test]
    fn test_remove_file_rejects_directory() {
        let mut fs = MemoryFs::new();
        fs.create_dir("/d", DEFAULT_DIR_MODE).unwrap();
        assert_eq!(fs.remove_file("/d"), Err(EISDIR));
        assert_eq!(fs.remove_file("/nothing"), Err(ENOENT));
    }

    #[test]
    fn test_create_dir_all() {
        let mut fs = MemoryFs::new();
        fs.create_dir_all("/a/b/c").unwrap();
        assert!(fs.is_dir("/a"));
        assert!(fs.is_dir("/a/b/c"));
        fs.create_dir_all("/a/b/c").unwrap();
    }

    #[test]
    fn test_fs_snapshot_roundtrip() {
        let mut fs = MemoryFs::new();
        fs.put_file("/home/user/test.txt", b"hello persistence").unwrap();

        let json = fs.to_json().unwrap();
        let restored = MemoryFs::from_json(&json).unwrap();

        assert!(restored.is_dir("/home/user"));
        assert_eq!(restored.len("/home/user/test.txt"), Ok(17));
    }

    #[test]
    fn test_snapshot_defaults_and_root() {
        let json = r#"{ "nodes": { "/flash/": { "kind": "directory" },
                                   "/flash/a.txt": { "kind": "file", "data": [104, 105] } } }"#;
        let fs = MemoryFs::from_json(json).unwrap();
        assert!(fs.is_dir("/"));
        assert!(fs.is_dir("/flash"));
        assert_eq!(fs.contents("/flash/a.txt"), Some(&b"hi"[..]));
        assert_eq!(fs.get("/flash/a.txt").unwrap().mode(), DEFAULT_FILE_MODE);
    }
}
