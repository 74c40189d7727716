//! Normalized key → on-disk asset map.
//!
//! Filled once per generation by the corpus walker, in discovery order.
//! File assets and directory assets are kept apart and a lookup names the
//! kind it wants. A directory entry exists for every directory that
//! directly contains at least one accepted file.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::normalize::{normalized_key, parent_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetEntry {
    pub key: String,
    /// Path relative to the corpus root, `/`-separated, original casing.
    pub relative: String,
    pub actual_path: PathBuf,
    pub kind: AssetKind,
    /// Body files in reading order. A file asset is its own single part.
    pub parts: Vec<PathBuf>,
}

/// Two discovered paths folded to the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct Ambiguity {
    pub key: String,
    pub kept: PathBuf,
    pub ignored: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct PathMap {
    files: Vec<AssetEntry>,
    file_index: HashMap<String, usize>,
    dirs: Vec<AssetEntry>,
    dir_index: HashMap<String, usize>,
    shadowed_dirs: HashSet<PathBuf>,
}

impl PathMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a discovered file. The first path for a key wins.
    ///
    /// Directories collide the same way: when the file's directory folds to
    /// a key already held by a differently-cased directory, the file keeps
    /// its own entry but is not added to the first directory's parts, and
    /// the collision is returned.
    pub fn insert_file(&mut self, relative: &str, actual_path: PathBuf) -> Result<(), Ambiguity> {
        let key = normalized_key(relative);
        if let Some(&existing) = self.file_index.get(&key) {
            return Err(Ambiguity {
                key,
                kept: self.files[existing].actual_path.clone(),
                ignored: actual_path,
            });
        }

        let mut dir_collision = None;
        if let (Some(dir_key), Some(parent)) = (parent_key(&key), actual_path.parent()) {
            match self.dir_index.get(dir_key) {
                Some(&idx) if self.dirs[idx].actual_path != parent => {
                    // Reported once per shadowed directory.
                    if self.shadowed_dirs.insert(parent.to_path_buf()) {
                        dir_collision = Some(Ambiguity {
                            key: dir_key.to_string(),
                            kept: self.dirs[idx].actual_path.clone(),
                            ignored: parent.to_path_buf(),
                        });
                    }
                }
                Some(&idx) => {
                    self.dirs[idx].parts.push(actual_path.clone());
                    self.dirs[idx].parts.sort();
                }
                None => {
                    let dir_relative = relative
                        .replace('\\', "/")
                        .rsplit_once('/')
                        .map(|(d, _)| d.to_string())
                        .unwrap_or_default();
                    self.dir_index.insert(dir_key.to_string(), self.dirs.len());
                    self.dirs.push(AssetEntry {
                        key: dir_key.to_string(),
                        relative: dir_relative,
                        actual_path: parent.to_path_buf(),
                        kind: AssetKind::Directory,
                        parts: vec![actual_path.clone()],
                    });
                }
            }
        }

        self.file_index.insert(key.clone(), self.files.len());
        self.files.push(AssetEntry {
            key,
            relative: relative.replace('\\', "/"),
            parts: vec![actual_path.clone()],
            actual_path,
            kind: AssetKind::File,
        });
        match dir_collision {
            Some(ambiguity) => Err(ambiguity),
            None => Ok(()),
        }
    }

    /// Asset of the given kind for a normalized key.
    pub fn get(&self, key: &str, kind: AssetKind) -> Option<&AssetEntry> {
        match kind {
            AssetKind::File => self.get_file(key),
            AssetKind::Directory => self.get_dir(key),
        }
    }

    pub fn get_file(&self, key: &str) -> Option<&AssetEntry> {
        self.file_index.get(key).map(|&i| &self.files[i])
    }

    pub fn get_dir(&self, key: &str) -> Option<&AssetEntry> {
        self.dir_index.get(key).map(|&i| &self.dirs[i])
    }

    /// File entries below `prefix` (a normalized key), in discovery order.
    pub fn files_under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a AssetEntry> + 'a {
        self.files.iter().filter(move |e| is_under(&e.key, prefix))
    }

    /// Directory entries below `prefix`, in discovery order.
    pub fn dirs_under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a AssetEntry> + 'a {
        self.dirs.iter().filter(move |e| is_under(&e.key, prefix))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_under(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}
