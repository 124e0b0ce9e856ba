use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, WriteError};

/// Output file that only appears at its final path once committed.
///
/// Bytes go to a temporary file in the destination directory. [`commit`]
/// renames it over the target; dropping it uncommitted deletes it, so a
/// failed or cancelled run leaves any previous file untouched.
///
/// [`commit`]: OutputFile::commit
pub struct OutputFile {
    path: PathBuf,
    writer: BufWriter<NamedTempFile>,
}

impl OutputFile {
    pub fn create(path: &Path) -> Result<Self> {
        ensure_parent_dir(path).map_err(|e| WriteError::io(path, e))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir).map_err(|e| WriteError::io(path, e))?;
        debug!(path = %path.display(), staging = %temp.path().display(), "opened staging file");
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(temp),
        })
    }

    pub fn writer(&mut self) -> &mut dyn Write {
        &mut self.writer
    }

    /// Flush and move the staged file to its final path.
    pub fn commit(self) -> Result<PathBuf> {
        let path = self.path;
        let temp = self
            .writer
            .into_inner()
            .map_err(|e| WriteError::io(&path, e.into_error()))?;
        temp.as_file().sync_all().map_err(|e| WriteError::io(&path, e))?;
        temp.persist(&path).map_err(|e| WriteError::io(&path, e.error))?;
        Ok(path)
    }
}

/// `base` with `extension` appended, unless it already ends with it.
pub fn output_path(base: &Path, extension: &str) -> PathBuf {
    let has_extension = base
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    if has_extension {
        return base.to_path_buf();
    }
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
