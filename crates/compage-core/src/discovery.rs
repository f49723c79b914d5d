use crate::error::{Error, Result};
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directories never descended into.
pub const EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".tox",
    ".venv",
    "venv",
    "build",
    "dist",
];

/// Outcome of walking a source tree.
#[derive(Debug, Default)]
pub struct SourceFiles {
    /// Python sources, sorted.
    pub files: Vec<PathBuf>,
    /// Entries below the root that could not be read, in walk order.
    pub unreadable: Vec<(PathBuf, Error)>,
}

/// Find Python source files under `root`.
///
/// A file root yields itself regardless of its extension. A missing or
/// unreadable root is an error; unreadable entries below it are collected
/// in [`SourceFiles::unreadable`]. Symlinks to files are listed, symlinked
/// directories are not descended into.
pub fn find_source_files(root: &Path) -> Result<SourceFiles> {
    let metadata = std::fs::metadata(root).map_err(|source| Error::FileRead {
        path: root.to_path_buf(),
        source,
    })?;
    if metadata.is_file() {
        return Ok(SourceFiles {
            files: vec![root.to_path_buf()],
            unreadable: Vec::new(),
        });
    }

    let mut found = SourceFiles::default();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                let depth = err.depth();
                let source = io::Error::from(err);
                if depth == 0 {
                    return Err(Error::FileRead { path, source });
                }
                debug!(path = %path.display(), "unreadable entry: {source}");
                found
                    .unreadable
                    .push((path.clone(), Error::FileRead { path, source }));
                continue;
            }
        };

        if !is_python_source(entry.path()) {
            continue;
        }
        if entry.file_type().is_file() {
            found.files.push(entry.into_path());
        } else if entry.path_is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(target) if target.is_file() => found.files.push(entry.into_path()),
                Ok(_) => {}
                Err(source) => {
                    let path = entry.into_path();
                    found
                        .unreadable
                        .push((path.clone(), Error::FileRead { path, source }));
                }
            }
        }
    }

    found.files.sort();
    Ok(found)
}

fn is_excluded_dir(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && EXCLUDE_DIRS
            .iter()
            .any(|excluded| entry.file_name() == OsStr::new(*excluded))
}

fn is_python_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "py")
}
