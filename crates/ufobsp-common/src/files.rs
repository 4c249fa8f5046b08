// files.rs — game data file access
//
// Map tiles and textures are addressed by game paths like `maps/town.bsp`.
// A `FileSystem` resolves those against an ordered list of directories;
// the most recently added directory is searched first.

use crate::common::{com_dprintf, com_printf};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Anything that can hand out the bytes of a game path.
pub trait FileLoader {
    /// Whole contents of `path`, or `None` when it is not found.
    fn load_file(&self, path: &str) -> Option<Vec<u8>>;

    fn file_exists(&self, path: &str) -> bool {
        self.load_file(path).is_some()
    }
}

/// In-memory loader, used by tests and tools that build tiles on the fly.
impl FileLoader for HashMap<String, Vec<u8>> {
    fn load_file(&self, path: &str) -> Option<Vec<u8>> {
        self.get(path).cloned()
    }

    fn file_exists(&self, path: &str) -> bool {
        self.contains_key(path)
    }
}

#[derive(Debug, Default)]
pub struct FileSystem {
    search_paths: Vec<PathBuf>,
}

impl FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory to the front of the search order.
    pub fn add_search_dir(&mut self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref().to_path_buf();
        if self.search_paths.contains(&dir) {
            return;
        }
        com_dprintf(&format!("Added search path {}\n", dir.display()));
        self.search_paths.insert(0, dir);
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Resolve a game path to the first existing file on disk.
    pub fn find_file(&self, path: &str) -> Option<PathBuf> {
        // game paths never climb out of the search directories
        if path.contains("..") || path.starts_with('/') || path.starts_with('\\') {
            com_printf(&format!("refusing to open {}\n", path));
            return None;
        }

        for dir in &self.search_paths {
            let netpath = dir.join(path);
            if netpath.is_file() {
                com_dprintf(&format!("FindFile: {}\n", netpath.display()));
                return Some(netpath);
            }
        }

        com_dprintf(&format!("FindFile: can't find {}\n", path));
        None
    }

    /// Print the current search order.
    pub fn path_f(&self) {
        com_printf("Current search path:\n");
        for sp in &self.search_paths {
            com_printf(&format!("{}\n", sp.display()));
        }
    }
}

impl FileLoader for FileSystem {
    fn load_file(&self, path: &str) -> Option<Vec<u8>> {
        let netpath = self.find_file(path)?;
        match fs::read(&netpath) {
            Ok(buf) => Some(buf),
            Err(e) => {
                com_printf(&format!("FS_LoadFile: read error on {}: {}\n", netpath.display(), e));
                None
            }
        }
    }

    fn file_exists(&self, path: &str) -> bool {
        self.find_file(path).is_some()
    }
}

// ============================================================
// Tests
// ============================================================
