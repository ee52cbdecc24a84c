use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Error that occurs when reading a file (or symlink) fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to read `{path}`: {source}")]
pub struct FileReadError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FileReadError {
    fn new(path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileReadError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use proc_metrics_exporter::fsutil;
/// let reader = fsutil::open_file_reader("/proc/self/status")?;
/// # Ok::<(), fsutil::FileReadError>(())
/// ```
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileReadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileReadError::new(path, source))?;
    Ok(BufReader::new(file))
}

/// Reads the whole file into memory.
///
/// Files under `/proc` report a size of zero, so this never trusts metadata.
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>, FileReadError> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| FileReadError::new(path, source))
}

/// Reads the file into a string.
pub fn read_file_to_string(path: impl AsRef<Path>) -> Result<String, FileReadError> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|source| FileReadError::new(path, source))
}

/// Resolves the target of a symbolic link.
pub fn read_link(path: impl AsRef<Path>) -> Result<PathBuf, FileReadError> {
    let path = path.as_ref();
    std::fs::read_link(path).map_err(|source| FileReadError::new(path, source))
}
