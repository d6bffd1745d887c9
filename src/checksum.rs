use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::DatastoreError;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumEntry {
    pub filename: String,
    pub digest: String,
}

/// Parses `<hex digest> <file name>` lines; blank and `#` lines are skipped.
pub fn parse_checksums(content: &str) -> Vec<ChecksumEntry> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let digest = fields.next()?;
            let filename = fields.next()?;
            // md5sum marks binary mode with a leading '*'
            let filename = filename.strip_prefix('*').unwrap_or(filename);
            Some(ChecksumEntry {
                filename: filename.to_string(),
                digest: digest.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ChecksumFile {
    path: PathBuf,
    entries: Vec<ChecksumEntry>,
}

impl ChecksumFile {
    pub fn read(path: &Path) -> Result<Self, DatastoreError> {
        let content = fs::read_to_string(path)
            .map_err(|err| DatastoreError::Filesystem(format!("read {}: {err}", path.display())))?;
        Ok(Self {
            path: path.to_path_buf(),
            entries: parse_checksums(&content),
        })
    }

    /// Finds the single `CHECKSUM*` file in `dir`.
    pub fn locate(dir: &Path) -> Result<Self, DatastoreError> {
        let pattern = format!(
            "{}/CHECKSUM*",
            glob::Pattern::escape(&dir.to_string_lossy())
        );
        let paths = glob::glob(&pattern)
            .map_err(|err| DatastoreError::Filesystem(err.to_string()))?
            .filter_map(Result::ok)
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();
        match paths.as_slice() {
            [path] => Self::read(path),
            [] => Err(DatastoreError::ChecksumFileMissing(dir.to_path_buf())),
            _ => Err(DatastoreError::Filesystem(format!(
                "{} CHECKSUM files in {}",
                paths.len(),
                dir.display()
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ChecksumEntry] {
        &self.entries
    }

    /// The one entry whose base name is `file_name`.
    pub fn entry_for(&self, file_name: &str) -> Result<&ChecksumEntry, DatastoreError> {
        let matches = self
            .entries
            .iter()
            .filter(|entry| base_name(&entry.filename) == file_name)
            .collect::<Vec<_>>();
        match matches.as_slice() {
            [entry] => Ok(entry),
            [] => Err(DatastoreError::ChecksumEntryMissing {
                file: file_name.to_string(),
                checksum_file: self.path.clone(),
            }),
            _ => Err(DatastoreError::ChecksumEntryDuplicate {
                file: file_name.to_string(),
                checksum_file: self.path.clone(),
                count: matches.len(),
            }),
        }
    }

    pub fn verify(&self, path: &Path) -> Result<(), DatastoreError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                DatastoreError::Filesystem(format!("not a UTF-8 file name: {}", path.display()))
            })?;
        let entry = self.entry_for(file_name)?;
        let actual = file_digest(path)?;
        verify_digest(path, &entry.digest, &actual)?;
        info!(path = %path.display(), digest = %actual, "checksum verified");
        Ok(())
    }
}

fn base_name(filename: &str) -> &str {
    filename.rsplit('/').next().unwrap_or(filename)
}

/// md5 of the raw file bytes, read in fixed-size chunks.
pub fn file_digest(path: &Path) -> Result<String, DatastoreError> {
    let mut file = File::open(path)
        .map_err(|err| DatastoreError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|err| DatastoreError::Filesystem(format!("read {}: {err}", path.display())))?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    let digest = format!("{:x}", context.compute());
    debug!(path = %path.display(), digest = %digest, "computed md5");
    Ok(digest)
}

pub fn verify_digest(path: &Path, expected: &str, actual: &str) -> Result<(), DatastoreError> {
    if expected.as_bytes() != actual.as_bytes() {
        return Err(DatastoreError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}
