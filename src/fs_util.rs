use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::DatastoreError;

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Opens `path` for buffered reading, decompressing when the content starts with the gzip magic.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead>, DatastoreError> {
    let mut file = File::open(path)
        .map_err(|err| DatastoreError::Filesystem(format!("open {}: {err}", path.display())))?;
    let gzipped = has_gzip_magic(&mut file)
        .map_err(|err| DatastoreError::Filesystem(format!("read {}: {err}", path.display())))?;
    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn has_gzip_magic(file: &mut File) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut filled = 0;
    while filled < magic.len() {
        let read = file.read(&mut magic[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    file.seek(SeekFrom::Start(0))?;
    Ok(filled == magic.len() && magic == GZIP_MAGIC)
}

/// Forward-only lines of a text or gzip file, newline stripped.
pub struct LineStream {
    reader: Box<dyn BufRead>,
    path: PathBuf,
    buf: String,
    line_number: usize,
}

impl LineStream {
    pub fn open(path: &Path) -> Result<Self, DatastoreError> {
        Ok(Self {
            reader: open_reader(path)?,
            path: path.to_path_buf(),
            buf: String::with_capacity(256),
            line_number: 0,
        })
    }

    /// 1-based number of the line most recently returned.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for LineStream {
    type Item = Result<String, DatastoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_line(&mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                let trimmed = self.buf.trim_end_matches(['\n', '\r']);
                Some(Ok(trimmed.to_string()))
            }
            Err(err) => Some(Err(DatastoreError::Filesystem(format!(
                "read {} line {}: {err}",
                self.path.display(),
                self.line_number + 1
            )))),
        }
    }
}

/// Every regular file under `root`, in file name order.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>, DatastoreError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| DatastoreError::Filesystem(err.to_string()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Writes through a temp file in the destination directory and renames it into place.
pub fn write_atomic<F>(dest: &Path, write: F) -> Result<(), DatastoreError>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), DatastoreError>,
{
    let parent = dest
        .parent()
        .ok_or_else(|| DatastoreError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent).map_err(|err| DatastoreError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("ds-lint")
        .tempfile_in(parent)
        .map_err(|err| DatastoreError::Filesystem(err.to_string()))?;
    write(&mut temp)?;
    temp.persist(dest)
        .map_err(|err| DatastoreError::Filesystem(format!("persist {}: {err}", dest.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn reads_plain_and_gzip_alike() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        fs::write(&plain, ">a\r\nACGT\n").unwrap();

        let gz = dir.path().join("packed.txt");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(b">a\nACGT\n").unwrap();
        encoder.finish().unwrap();

        for path in [plain, gz] {
            let lines = LineStream::open(&path)
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            assert_eq!(lines, vec![">a".to_string(), "ACGT".to_string()]);
        }
    }

    #[test]
    fn empty_and_one_byte_files() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        fs::write(&empty, "").unwrap();
        assert_eq!(LineStream::open(&empty).unwrap().count(), 0);

        let single = dir.path().join("single");
        fs::write(&single, "A").unwrap();
        assert_eq!(LineStream::open(&single).unwrap().count(), 1);
    }
}
