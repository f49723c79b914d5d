use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

const UTF8_BOM: &str = "\u{FEFF}";

/// Read a source file to string.
///
/// Invalid UTF-8 sequences are replaced with the replacement character so
/// legacy-encoded sources still yield usable line text, and a leading UTF-8
/// byte order mark is dropped.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_source_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(match text.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => text.into_owned(),
    })
}

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// Readers of the destination see either the previous contents or the new
/// contents, never a partial write.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    // Same directory as the target so the rename never crosses filesystems
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("out"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        if cfg!(windows) {
            // Windows refuses to rename over an existing file
            fs::copy(&temp_path, path)?;
            let _ = fs::remove_file(&temp_path);
            return Ok(());
        }
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_source_lossy_plain() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"import os\nimport sys\n").unwrap();
        file.flush().unwrap();

        let content = read_source_lossy(file.path()).unwrap();
        assert_eq!(content, "import os\nimport sys\n");
    }

    #[test]
    fn test_read_source_lossy_latin1_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        // "# caf\xe9" as written by a latin-1 editor
        file.write_all(b"# caf\xe9\nimport os\n").unwrap();
        file.flush().unwrap();

        let content = read_source_lossy(file.path()).unwrap();
        assert!(content.starts_with("# caf"));
        assert!(content.contains('\u{FFFD}'));
        assert!(content.ends_with("import os\n"));
    }

    #[test]
    fn test_read_source_lossy_strips_bom() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"\xef\xbb\xbfimport os\n").unwrap();
        file.flush().unwrap();

        let content = read_source_lossy(file.path()).unwrap();
        assert_eq!(content, "import os\n");
    }

    #[test]
    fn test_read_source_lossy_missing_file() {
        assert!(read_source_lossy(Path::new("/nonexistent/module.py")).is_err());
    }

    #[test]
    fn test_atomic_write_replaces_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.txt");

        atomic_write(&path, b"Import Report\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Import Report\n");

        atomic_write(&path, b"Rank Report\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Rank Report\n");

        // Only the destination remains, no stray temp file
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
