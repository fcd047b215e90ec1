use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tracing::{debug, error};

use crate::error::BackupError;

/// Name of the staged entity inside the staging directory.
const STAGED: &str = "staged";

fn io_err(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> BackupError {
    let path = path.to_path_buf();
    move |source| BackupError::Io { op, path, source }
}

/// A relocatable copy of one file or directory tree.
///
/// The staged content lives in a private temporary directory that is
/// removed when the snapshot is closed or dropped. Restoring and closing
/// consume the snapshot, so each happens at most once.
#[derive(Debug)]
pub struct Snapshot {
    source: PathBuf,
    staging: TempDir,
    /// `None` when the source did not exist at snapshot time.
    staged: Option<PathBuf>,
    digest: String,
}

impl Snapshot {
    /// Copy `source` into staging, leaving it in place.
    pub fn copy_of(source: &Path) -> Result<Self, BackupError> {
        Self::take(source, |src, dst| copy_entry(src, dst))
    }

    /// Move `source` into staging, leaving nothing behind.
    pub fn move_of(source: &Path) -> Result<Self, BackupError> {
        Self::take(source, |src, dst| move_entry(src, dst))
    }

    fn take(
        source: &Path,
        stage: impl FnOnce(&Path, &Path) -> Result<(), BackupError>,
    ) -> Result<Self, BackupError> {
        let staging = tempfile::Builder::new()
            .prefix("ivg-backup")
            .tempdir()
            .map_err(io_err("create staging for", source))?;
        let staged = if exists(source) {
            let dst = staging.path().join(STAGED);
            stage(source, &dst)?;
            Some(dst)
        } else {
            None
        };
        let digest = match &staged {
            Some(p) => digest_of(p)?,
            None => String::new(),
        };
        debug!(
            source = %source.display(),
            staging = %staging.path().display(),
            absent = staged.is_none(),
            "snapshot"
        );
        Ok(Self {
            source: source.to_path_buf(),
            staging,
            staged,
            digest,
        })
    }

    /// Put the staged content back over `source`.
    ///
    /// Whatever currently sits at `source` is removed first. A snapshot of an
    /// absent source restores to absent. When restoring fails the staging
    /// directory is kept on disk and its path is part of the error.
    pub fn restore(self) -> Result<(), BackupError> {
        if let Err(cause) = self.put_back() {
            let kept = self.staging.keep();
            error!(
                source = %self.source.display(),
                kept = %kept.display(),
                error = %cause,
                "restore failed, staged copy kept"
            );
            return Err(BackupError::Restore {
                source_path: self.source,
                kept,
                cause: Box::new(cause),
            });
        }
        debug!(source = %self.source.display(), "snapshot restored");
        self.close()
    }

    fn put_back(&self) -> Result<(), BackupError> {
        if let Some(staged) = &self.staged
            && digest_of(staged)? != self.digest
        {
            return Err(BackupError::Corrupted {
                source_path: self.source.clone(),
            });
        }
        remove_entry(&self.source)?;
        if let Some(staged) = &self.staged {
            if let Some(parent) = self.source.parent() {
                fs::create_dir_all(parent).map_err(io_err("create", parent))?;
            }
            move_entry(staged, &self.source)?;
        }
        Ok(())
    }

    /// Discard the staged content.
    pub fn close(self) -> Result<(), BackupError> {
        let path = self.staging.path().to_path_buf();
        self.staging.close().map_err(io_err("remove staging", &path))
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn remove_entry(path: &Path) -> Result<(), BackupError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            return Ok(());
        }
        Err(e) => return Err(io_err("stat", path)(e)),
    };
    let res = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    res.map_err(io_err("remove", path))
}

/// Rename, falling back to copy + remove across filesystems.
fn move_entry(src: &Path, dst: &Path) -> Result<(), BackupError> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_entry(src, dst)?;
            remove_entry(src)
        }
        Err(e) => Err(io_err("move", src)(e)),
    }
}

/// Recursive copy preserving symlinks, permissions and empty directories.
fn copy_entry(src: &Path, dst: &Path) -> Result<(), BackupError> {
    let meta = fs::symlink_metadata(src).map_err(io_err("stat", src))?;
    let ft = meta.file_type();
    if ft.is_symlink() {
        let target = fs::read_link(src).map_err(io_err("read link", src))?;
        std::os::unix::fs::symlink(&target, dst).map_err(io_err("create link", dst))?;
    } else if ft.is_dir() {
        fs::create_dir(dst).map_err(io_err("create", dst))?;
        for ent in fs::read_dir(src).map_err(io_err("read", src))? {
            let ent = ent.map_err(io_err("read", src))?;
            copy_entry(&ent.path(), &dst.join(ent.file_name()))?;
        }
        fs::set_permissions(dst, meta.permissions()).map_err(io_err("chmod", dst))?;
    } else {
        fs::copy(src, dst).map_err(io_err("copy", src))?;
    }
    Ok(())
}

/// SHA-256 over relative paths, entry kinds and contents, in sorted order.
fn digest_of(root: &Path) -> Result<String, BackupError> {
    let mut hasher = Sha256::new();
    feed(&mut hasher, root, Path::new(""))?;
    Ok(hex::encode(hasher.finalize()))
}

fn feed(hasher: &mut Sha256, path: &Path, rel: &Path) -> Result<(), BackupError> {
    let meta = fs::symlink_metadata(path).map_err(io_err("stat", path))?;
    let ft = meta.file_type();
    hasher.update(rel.to_string_lossy().as_bytes());
    hasher.update([0]);
    if ft.is_symlink() {
        let target = fs::read_link(path).map_err(io_err("read link", path))?;
        hasher.update(b"l");
        hasher.update(target.to_string_lossy().as_bytes());
    } else if ft.is_dir() {
        hasher.update(b"d");
        let mut names = fs::read_dir(path)
            .map_err(io_err("read", path))?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(io_err("read", path))?;
        names.sort();
        for name in names {
            feed(hasher, &path.join(&name), &rel.join(&name))?;
        }
    } else {
        hasher.update(b"f");
        let bytes = fs::read(path).map_err(io_err("read", path))?;
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    hasher.update([0]);
    Ok(())
}
