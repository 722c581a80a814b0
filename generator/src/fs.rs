//! In-memory output tree and its atomic flush to disk.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::error::Error;

/// One emitted file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Relative to the commit root.
    pub path: PathBuf,
    pub data: Vec<u8>,
    /// Name of the emitter that produced the file.
    pub from: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>, data: impl Into<Vec<u8>>, from: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            from: from.into(),
        }
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VirtualFs {
    files: IndexMap<PathBuf, GeneratedFile>,
}

impl VirtualFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, rejecting a path that is already taken.
    pub fn add(&mut self, file: GeneratedFile) -> Result<(), Error> {
        if let Some(existing) = self.files.get(&file.path) {
            return Err(Error::DuplicatePath {
                path: file.path,
                first: existing.from.clone(),
                second: file.from,
            });
        }
        self.files.insert(file.path.clone(), file);
        Ok(())
    }

    pub fn merge(&mut self, other: VirtualFs) -> Result<(), Error> {
        for (_, file) in other.files {
            self.add(file)?;
        }
        Ok(())
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&GeneratedFile> {
        self.files.get(path.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes every file under `root`, all or nothing.
    ///
    /// Files are staged in a scratch directory inside `root` first so the
    /// final moves are same-filesystem renames. If a move fails, the files
    /// already moved are rolled back to their previous contents and the
    /// directories created for them are removed again.
    pub fn commit(&self, root: impl AsRef<Path>) -> Result<(), Error> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(Error::commit(root))?;

        for file in self.iter() {
            check_relative(&file.path)?;
        }

        let staging = tempfile::Builder::new()
            .prefix(".schemagen-")
            .tempdir_in(root)
            .map_err(Error::commit(root))?;
        let backups = staging.path().join("backup");

        let mut staged = Vec::with_capacity(self.len());
        for (i, file) in self.iter().enumerate() {
            let path = staging.path().join(format!("{i}"));
            fs::write(&path, &file.data).map_err(Error::commit(&file.path))?;
            staged.push((path, file));
        }
        fs::create_dir_all(&backups).map_err(Error::commit(&backups))?;

        let mut tx = Transaction::new(root, &backups);
        for (i, (from, file)) in staged.iter().enumerate() {
            if let Err(source) = tx.place(i, from, &file.path) {
                warn!(path = %file.path.display(), "commit failed, rolling back {} files", tx.moved.len());
                let unrestored = tx.rollback();
                let path = file.path.clone();
                return Err(if unrestored.is_empty() {
                    Error::Commit { path, source }
                } else {
                    Error::Rollback {
                        path,
                        source,
                        unrestored,
                    }
                });
            }
            trace!(path = %file.path.display(), "moved into place");
        }

        debug!(root = %root.display(), files = self.len(), "committed generated files");
        Ok(())
    }
}

impl<'a> IntoIterator for &'a VirtualFs {
    type Item = &'a GeneratedFile;
    type IntoIter = indexmap::map::Values<'a, PathBuf, GeneratedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.values()
    }
}

fn check_relative(path: &Path) -> Result<(), Error> {
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || path.as_os_str().is_empty() {
        return Err(Error::Commit {
            path: path.to_owned(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "generated paths must be relative and stay inside the output root",
            ),
        });
    }
    Ok(())
}

/// A move into place and what it takes to revert it.
struct Moved {
    dest: PathBuf,
    backup: Option<PathBuf>,
    placed: bool,
}

/// The moves and directories of one commit, undone together on failure.
struct Transaction<'a> {
    root: &'a Path,
    backups: &'a Path,
    moved: Vec<Moved>,
    created: Vec<PathBuf>,
}

impl<'a> Transaction<'a> {
    fn new(root: &'a Path, backups: &'a Path) -> Self {
        Self {
            root,
            backups,
            moved: Vec::new(),
            created: Vec::new(),
        }
    }

    fn place(&mut self, index: usize, staged: &Path, relative: &Path) -> io::Result<()> {
        let dest = self.root.join(relative);
        if let Some(parent) = dest.parent() {
            self.create_dirs(parent)?;
        }

        let backup = if dest.exists() {
            let backup = self.backups.join(format!("{index}"));
            fs::rename(&dest, &backup)?;
            Some(backup)
        } else {
            None
        };
        self.moved.push(Moved {
            dest: dest.clone(),
            backup,
            placed: false,
        });

        fs::rename(staged, &dest)?;
        if let Some(last) = self.moved.last_mut() {
            last.placed = true;
        }
        Ok(())
    }

    fn create_dirs(&mut self, dir: &Path) -> io::Result<()> {
        let missing: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|d| !d.exists())
            .map(Path::to_path_buf)
            .collect();
        fs::create_dir_all(dir)?;
        self.created.extend(missing.into_iter().rev());
        Ok(())
    }

    /// Reverts every move, newest first, and removes the directories the
    /// commit created. Returns the files whose previous state is lost.
    fn rollback(self) -> Vec<(PathBuf, io::Error)> {
        let mut unrestored = Vec::new();
        for m in self.moved.into_iter().rev() {
            let result = match (&m.backup, m.placed) {
                (Some(backup), _) => fs::rename(backup, &m.dest),
                (None, true) => fs::remove_file(&m.dest),
                (None, false) => Ok(()),
            };
            if let Err(err) = result {
                warn!(path = %m.dest.display(), "rollback failed: {err}");
                unrestored.push((m.dest, err));
            }
        }
        for dir in self.created.iter().rev() {
            if let Err(err) = fs::remove_dir(dir) {
                warn!(path = %dir.display(), "could not remove directory: {err}");
            }
        }
        unrestored
    }
}
