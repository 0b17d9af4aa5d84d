//! Depth-first enumeration of the regular files under a local root.

use crate::error::{S3fsError, S3fsResult};
use std::fs::{self, FileType};
use std::path::{Path, PathBuf};

/// Configures a scan of one local tree.
#[derive(Clone, Debug)]
pub struct DirectoryScanner {
    root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl DirectoryScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded: Vec::new(),
        }
    }

    /// Skips `dir` and everything under it, e.g. a private root nested in
    /// the public one. Directories that do not exist are ignored.
    pub fn with_excluded(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    /// Starts the traversal. Fails when the root is missing, is not a
    /// directory, or cannot be listed.
    pub fn scan(&self) -> S3fsResult<DirectoryScan> {
        let root = fs::canonicalize(&self.root).map_err(|e| S3fsError::scan(&self.root, e))?;
        if !root.is_dir() {
            return Err(S3fsError::scan(&root, "not a directory"));
        }

        let excluded = self
            .excluded
            .iter()
            .filter_map(|dir| fs::canonicalize(dir).ok())
            .collect();

        let entries = read_sorted(&root)?;
        Ok(DirectoryScan {
            root,
            excluded,
            stack: vec![entries.into_iter()],
        })
    }
}

/// Scans `root` with no exclusions.
pub fn scan(root: impl AsRef<Path>) -> S3fsResult<DirectoryScan> {
    DirectoryScanner::new(root.as_ref()).scan()
}

/// Lazy depth-first walk yielding absolute file paths.
///
/// Sub-directories are read when the walk reaches them. A directory that
/// cannot be read yields one `Err` and ends the walk.
pub struct DirectoryScan {
    root: PathBuf,
    excluded: Vec<PathBuf>,
    stack: Vec<std::vec::IntoIter<(PathBuf, FileType)>>,
}

impl DirectoryScan {
    /// Canonical root the yielded paths live under.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Iterator for DirectoryScan {
    type Item = S3fsResult<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some((path, file_type)) = frame.next() else {
                self.stack.pop();
                continue;
            };

            if file_type.is_dir() {
                if self.excluded.iter().any(|dir| dir == &path) {
                    continue;
                }
                match read_sorted(&path) {
                    Ok(children) => self.stack.push(children.into_iter()),
                    Err(e) => {
                        self.stack.clear();
                        return Some(Err(e));
                    }
                }
                continue;
            }

            if file_type.is_file() {
                return Some(Ok(path));
            }

            // Symlinks count when they resolve to a regular file; linked
            // directories are not followed.
            if file_type.is_symlink() && fs::metadata(&path).is_ok_and(|m| m.is_file()) {
                return Some(Ok(path));
            }
        }
    }
}

fn read_sorted(dir: &Path) -> S3fsResult<Vec<(PathBuf, FileType)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| S3fsError::scan(dir, e))? {
        let entry = entry.map_err(|e| S3fsError::scan(dir, e))?;
        let name = entry.file_name();
        if name == "." || name == ".." {
            continue;
        }
        let file_type = entry
            .file_type()
            .map_err(|e| S3fsError::scan(entry.path(), e))?;
        entries.push((entry.path(), file_type));
    }
    entries.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(entries)
}
