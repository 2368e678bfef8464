use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::PathEncodingError;

/// Defines fns for creating common paths in the output directory
mod paths;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Specified output directory \"{0}\" is not a directory")]
    NotDirectory(String),
    #[error("Can't perform IO operation: \"{0}\" is outside the output directory")]
    NotWhitelisted(String),
}

/// All file operations in the crate should go through this struct.
///
/// All writes check that the path in question is inside the output
/// directory, otherwise they will not be performed. Commands run by stages
/// and batch jobs are not covered by this; tools write wherever they write.
#[derive(Debug)]
pub struct Fs {
    /// The directory we are allowed to modify
    output_prefix: PathBuf,
}

impl Fs {
    /// Create a new `Fs` with the given output directory.
    pub fn new(output_prefix: &Path) -> Self {
        Self {
            output_prefix: output_prefix.to_path_buf(),
        }
    }

    /// The output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_prefix
    }

    /// Check whether output dir exists, and create it if not.
    pub fn ensure_output_dir_exists(&mut self, verbose: bool) -> Result<()> {
        if !self.output_prefix.exists() {
            eprintln!(
                "Output directory {:?} doesn't exist. Creating.",
                self.output_prefix
            );
            fs::create_dir_all(&self.output_prefix).context("creating output directory")?;
        } else if !self.output_prefix.is_dir() {
            return Err(Error::NotDirectory(
                self.output_prefix
                    .to_str()
                    .ok_or(PathEncodingError)?
                    .to_string(),
            )
            .into());
        } else if verbose {
            eprintln!(
                "Output directory {:?} already exists. Not creating.",
                self.output_prefix
            );
        }

        self.output_prefix = self.output_prefix.canonicalize()?;
        Ok(())
    }

    /// Check if path exists on disk.
    pub fn exists<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        path.exists() || path.is_symlink()
    }

    /// Create a directory, along with any missing parents.
    pub fn create_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::create_dir_all(path).context("creating dir")?;
        Ok(())
    }

    /// Write entire str to a file.
    pub fn write_file<T: AsRef<Path>>(&self, path: T, text: &str) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::write(path, text).context("writing file")?;
        Ok(())
    }

    /// Write entire str to a file and mark it executable (0755).
    pub fn write_executable<T: AsRef<Path>>(&self, path: T, text: &str) -> Result<()> {
        let path = path.as_ref();
        self.write_file(path, text)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755))
                .context("making file executable")?;
        }
        Ok(())
    }

    fn is_whitelisted<T: AsRef<Path>>(&self, path: T) -> bool {
        path.as_ref().starts_with(&self.output_prefix)
    }

    fn check_whitelist(&self, path: &Path) -> Result<()> {
        if !self.is_whitelisted(path) {
            Err(Error::NotWhitelisted(path.to_str().ok_or(PathEncodingError)?.to_owned()).into())
        } else {
            Ok(())
        }
    }
}
