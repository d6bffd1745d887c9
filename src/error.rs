use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::NamingRule;

#[derive(Debug, Error, Diagnostic)]
pub enum DatastoreError {
    #[error("invalid file name {name}: {rule}")]
    Naming { name: String, rule: NamingRule },

    #[error("unsupported canonical type: {0}")]
    UnsupportedType(String),

    #[error("cannot classify target {0}: expected a .gz file, a Genus_species directory or a data directory")]
    UnknownTargetKind(PathBuf),

    #[error("reference not found for {child}: no file matches {pattern}")]
    ReferenceNotFound { child: PathBuf, pattern: String },

    #[error("ambiguous reference for {child}: {} files match {pattern}", .matches.len())]
    AmbiguousReference {
        child: PathBuf,
        pattern: String,
        matches: Vec<PathBuf>,
    },

    #[error("no CHECKSUM file found in {0}")]
    ChecksumFileMissing(PathBuf),

    #[error("{checksum_file} has no entry for {file}")]
    ChecksumEntryMissing { file: String, checksum_file: PathBuf },

    #[error("{checksum_file} has {count} entries for {file}")]
    ChecksumEntryDuplicate {
        file: String,
        checksum_file: PathBuf,
        count: usize,
    },

    #[error("checksum mismatch for {path}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{path}:{line}: parent id {id} is not defined by any feature")]
    UnknownParent { path: PathBuf, line: usize, id: String },

    #[error("{path}: feature types cannot be ranked (cyclic or unreachable): {}", .types.join(", "))]
    UnrankedFeatureTypes { path: PathBuf, types: Vec<String> },

    #[error("{path}:{line}: malformed FASTA header {header:?}")]
    MalformedHeader {
        path: PathBuf,
        line: usize,
        header: String,
    },

    #[error("{path}:{line}: malformed record: {reason}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("{tool} failed ({status}): {message}")]
    ToolFailed {
        tool: String,
        status: String,
        message: String,
    },

    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("DOI request failed: {0}")]
    DoiHttp(String),

    #[error("DOI service returned status {status}: {message}")]
    DoiStatus { status: u16, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl DatastoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            DatastoreError::Naming { .. } => "naming",
            DatastoreError::UnsupportedType(_)
            | DatastoreError::UnknownTargetKind(_)
            | DatastoreError::ReferenceNotFound { .. }
            | DatastoreError::AmbiguousReference { .. } => "reference",
            DatastoreError::ChecksumFileMissing(_)
            | DatastoreError::ChecksumEntryMissing { .. }
            | DatastoreError::ChecksumEntryDuplicate { .. }
            | DatastoreError::ChecksumMismatch { .. } => "checksum",
            DatastoreError::UnknownParent { .. } | DatastoreError::UnrankedFeatureTypes { .. } => {
                "hierarchy"
            }
            DatastoreError::MalformedHeader { .. } | DatastoreError::MalformedRecord { .. } => {
                "parse"
            }
            DatastoreError::MissingTool(_) | DatastoreError::ToolFailed { .. } => "collaborator",
            DatastoreError::InvalidDoi(_)
            | DatastoreError::DoiHttp(_)
            | DatastoreError::DoiStatus { .. } => "doi",
            DatastoreError::ConfigRead(_)
            | DatastoreError::ConfigParse(_)
            | DatastoreError::InvalidConfig(_) => "config",
            DatastoreError::Filesystem(_) => "filesystem",
        }
    }
}
