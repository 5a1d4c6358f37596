// src/fs/mock.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use parking_lot::Mutex;

use super::FileSystem;

#[derive(Debug, Clone)]
enum MockEntry {
    File(Vec<u8>),
    Dir(BTreeSet<String>),
}

#[derive(Debug, Default)]
struct MockState {
    entries: BTreeMap<PathBuf, MockEntry>,
    reads: HashMap<PathBuf, usize>,
}

/// In-memory file tree for tests.
///
/// Parent directories are created implicitly. Every successful read is
/// counted per path, so tests can assert how often a file was scanned.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut state = self.state.lock();
        if let Some(parent) = path.parent() {
            ensure_dir(&mut state.entries, parent);
            link_child(&mut state.entries, parent, path);
        }
        state
            .entries
            .insert(path.to_path_buf(), MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock();
        ensure_dir(&mut state.entries, path.as_ref());
    }

    /// Remove a file or a whole directory subtree.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut state = self.state.lock();
        if state.entries.remove(path).is_none() {
            return false;
        }
        state.entries.retain(|p, _| !p.starts_with(path));
        if let Some(parent) = path.parent() {
            if let (Some(MockEntry::Dir(children)), Some(name)) =
                (state.entries.get_mut(parent), path.file_name())
            {
                children.remove(&*name.to_string_lossy());
            }
        }
        true
    }

    /// Successful reads of `path` so far.
    pub fn reads(&self, path: impl AsRef<Path>) -> usize {
        self.state
            .lock()
            .reads
            .get(path.as_ref())
            .copied()
            .unwrap_or(0)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        let content = match state.entries.get(path) {
            Some(MockEntry::File(content)) => content.clone(),
            Some(MockEntry::Dir(_)) => return Err(anyhow!("Is a directory: {:?}", path)),
            None => return Err(anyhow!("File not found: {:?}", path)),
        };
        *state.reads.entry(path.to_path_buf()).or_default() += 1;
        Ok(content)
    }
}

fn ensure_dir(entries: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
    if entries.contains_key(path) {
        return;
    }
    entries.insert(path.to_path_buf(), MockEntry::Dir(BTreeSet::new()));
    if let Some(parent) = path.parent() {
        ensure_dir(entries, parent);
        link_child(entries, parent, path);
    }
}

fn link_child(entries: &mut BTreeMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
    if let (Some(MockEntry::Dir(children)), Some(name)) =
        (entries.get_mut(parent), child.file_name())
    {
        children.insert(name.to_string_lossy().into_owned());
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8 in {:?}: {}", path, e))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.read_bytes(path)?)))
    }

    fn exists(&self, path: &Path) -> bool {
        self.state.lock().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.state.lock().entries.get(path), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.state.lock().entries.get(path), Some(MockEntry::Dir(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.state.lock().entries.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_are_created_and_listed_sorted() {
        let fs = MockFileSystem::new();
        fs.add_file("/src/foo/b.go", "package foo");
        fs.add_file("/src/foo/a.go", "package foo");

        assert!(fs.is_dir(Path::new("/src")));
        assert!(fs.is_dir(Path::new("/src/foo")));
        assert_eq!(
            fs.read_dir(Path::new("/src/foo")).unwrap(),
            vec![PathBuf::from("/src/foo/a.go"), PathBuf::from("/src/foo/b.go")]
        );
    }

    #[test]
    fn reads_are_counted() {
        let fs = MockFileSystem::new();
        fs.add_file("/src/foo/a.go", "package foo");
        assert_eq!(fs.reads("/src/foo/a.go"), 0);
        fs.read_to_string(Path::new("/src/foo/a.go")).unwrap();
        let mut buf = Vec::new();
        fs.open_read(Path::new("/src/foo/a.go"))
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(fs.reads("/src/foo/a.go"), 2);
    }

    #[test]
    fn remove_drops_subtree_and_parent_link() {
        let fs = MockFileSystem::new();
        fs.add_file("/src/foo/a.go", "package foo");
        fs.add_file("/src/bar/b.go", "package bar");
        assert!(fs.remove("/src/foo"));
        assert!(!fs.exists(Path::new("/src/foo/a.go")));
        assert_eq!(
            fs.read_dir(Path::new("/src")).unwrap(),
            vec![PathBuf::from("/src/bar")]
        );
    }
}
