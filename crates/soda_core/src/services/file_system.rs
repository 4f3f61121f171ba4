//! Local file access with `~` expansion.
//!
//! Every path operation expands a leading `~` to the user's home directory
//! before touching the OS. Reads and writes return a `Result` and never log:
//! callers decide whether a failure matters and log it themselves.

use crate::error::SodaError;

use std::fs;
use std::path::{Path, PathBuf};

/// File system access rooted at a home directory.
#[derive(Debug, Clone)]
pub struct FileSystem {
    home_dir: PathBuf,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem {
    /// Create a file system that expands `~` to the current user's home.
    pub fn new() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self { home_dir }
    }

    /// Create a file system with a custom home directory (for testing).
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        Self { home_dir: home_dir.into() }
    }

    /// Expand a leading `~` to the home directory.
    pub fn expand_user(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match path.strip_prefix("~") {
            Ok(rest) => self.home_dir.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }

    /// Join path segments.
    pub fn join(&self, base: impl AsRef<Path>, segments: &[&str]) -> PathBuf {
        let mut path = base.as_ref().to_path_buf();
        path.extend(segments);
        path
    }

    /// Split a path into its parent directory and file name.
    pub fn split(&self, path: impl AsRef<Path>) -> (PathBuf, String) {
        let path = path.as_ref();
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        (parent, name)
    }

    /// Whether anything exists at `path`.
    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.expand_user(path).exists()
    }

    /// Whether `path` is a directory.
    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        self.expand_user(path).is_dir()
    }

    /// Whether `path` is a regular file.
    pub fn is_file(&self, path: impl AsRef<Path>) -> bool {
        self.expand_user(path).is_file()
    }

    /// List entry names in a directory, sorted.
    pub fn list_dir(&self, path: impl AsRef<Path>) -> Result<Vec<String>, SodaError> {
        let expanded = self.expand_user(path);
        let entries = fs::read_dir(&expanded).map_err(|e| SodaError::file_system_io(&expanded, &e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SodaError::file_system_io(&expanded, &e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Create a directory and all missing parents. No-op if it already exists.
    pub fn mkdirs(&self, path: impl AsRef<Path>) -> Result<(), SodaError> {
        let expanded = self.expand_user(path);
        fs::create_dir_all(&expanded).map_err(|e| SodaError::file_system_io(&expanded, &e))
    }

    /// The home directory `~` expands to.
    pub fn user_home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// Read a whole file as text.
    pub fn file_read_as_str(&self, path: impl AsRef<Path>) -> Result<String, SodaError> {
        let expanded = self.expand_user(path);
        fs::read_to_string(&expanded).map_err(|e| SodaError::file_system_io(&expanded, &e))
    }

    /// Write text to a file, replacing its contents.
    ///
    /// A file created by this call is made world-writable (0o666) on unix.
    pub fn file_write_from_str(&self, path: impl AsRef<Path>, content: &str) -> Result<(), SodaError> {
        let expanded = self.expand_user(path);
        let is_new = !expanded.exists();

        fs::write(&expanded, content).map_err(|e| SodaError::file_system_io(&expanded, &e))?;

        #[cfg(unix)]
        if is_new {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&expanded, fs::Permissions::from_mode(0o666))
                .map_err(|e| SodaError::file_system_io(&expanded, &e))?;
        }
        #[cfg(not(unix))]
        let _ = is_new;

        Ok(())
    }
}
