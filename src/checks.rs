use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::domain::{AnnotationName, GenomeName};
use crate::error::DatastoreError;
use crate::fs_util::LineStream;

pub(crate) static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>(\S+)\s*(.*)$").unwrap());
static GENE_ID_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ID=(.+?);.*Name=(.+?);").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A non-fatal content issue found while scanning a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub line: Option<usize>,
    pub message: String,
}

impl Finding {
    pub fn warning(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            line,
            message: message.into(),
        }
    }

    pub fn error(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            line,
            message: message.into(),
        }
    }
}

/// Sequence ids collected from a genome, handed to the checks of its annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastaIds(HashSet<String>);

impl FastaIds {
    pub fn insert(&mut self, id: impl Into<String>) {
        self.0.insert(id.into());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for FastaIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone)]
pub struct FastaCheck {
    pub passed: bool,
    pub ids: FastaIds,
    pub headers: usize,
    pub findings: Vec<Finding>,
}

/// Scans every header of a genome FASTA. Ids that do not carry the assembly prefix
/// fail the check but the scan always runs to the end so every id is collected.
pub fn check_genome_fasta(path: &Path, name: &GenomeName) -> Result<FastaCheck, DatastoreError> {
    let expected = name.header_prefix();
    let expected_dotted = format!("{expected}.");
    let mut check = FastaCheck {
        passed: true,
        ids: FastaIds::default(),
        headers: 0,
        findings: Vec::new(),
    };

    let mut lines = LineStream::open(path)?;
    while let Some(line) = lines.next() {
        let line = line?;
        if !line.starts_with('>') {
            continue;
        }
        let line_number = lines.line_number();
        check.headers += 1;
        let Some(captures) = HEADER_RE.captures(&line) else {
            warn!(path = %path.display(), line = line_number, header = %line, "malformed FASTA header");
            check.passed = false;
            check.findings.push(Finding::error(
                Some(line_number),
                format!("malformed header {line:?}"),
            ));
            continue;
        };
        let id = &captures[1];
        debug!(id, "fasta header");
        check.ids.insert(id);
        if !id.starts_with(&expected_dotted) {
            warn!(
                path = %path.display(),
                line = line_number,
                id,
                expected = %format!("{expected}.{id}"),
                "inconsistent FASTA id"
            );
            check.passed = false;
            check.findings.push(Finding::warning(
                Some(line_number),
                format!("inconsistent id {id}, should be {expected}.{id}"),
            ));
        }
    }
    Ok(check)
}

#[derive(Debug, Clone, Default)]
pub struct Gff3Check {
    pub records: usize,
    pub genes: usize,
    pub findings: Vec<Finding>,
}

impl Gff3Check {
    pub fn congruent(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Checks seqids against the genome's ids (when handed over) and the ID/Name
/// attributes of every gene. Nothing here aborts the scan.
pub fn check_gene_models(
    path: &Path,
    name: &AnnotationName,
    fasta_ids: Option<&FastaIds>,
) -> Result<Gff3Check, DatastoreError> {
    let id_prefix = name.id_prefix();
    let id_prefix_dotted = format!("{id_prefix}.");
    let name_prefix = name.name_prefix();
    let fasta_ids = fasta_ids.filter(|ids| !ids.is_empty());
    let mut check = Gff3Check::default();

    let mut lines = LineStream::open(path)?;
    while let Some(line) = lines.next() {
        let line = line?;
        let line_number = lines.line_number();
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        check.records += 1;
        let columns: Vec<&str> = line.split('\t').collect();
        let seqid = columns[0].trim_end();
        if let Some(ids) = fasta_ids {
            if !ids.contains(seqid) {
                error!(path = %path.display(), line = line_number, seqid, "seqid not found in genome_main");
                check.findings.push(Finding::error(
                    Some(line_number),
                    format!("seqid {seqid} not found in genome_main"),
                ));
            }
        }
        if columns.len() < 9 {
            error!(path = %path.display(), line = line_number, columns = columns.len(), "expected 9 columns");
            check.findings.push(Finding::error(
                Some(line_number),
                format!("expected 9 tab-delimited columns, found {}", columns.len()),
            ));
            continue;
        }
        if columns[2] != "gene" {
            continue;
        }
        check.genes += 1;
        let Some(captures) = GENE_ID_NAME_RE.captures(columns[8]) else {
            error!(path = %path.display(), line = line_number, "gene without ID and Name attributes");
            check.findings.push(Finding::error(
                Some(line_number),
                "no ID and Name attributes",
            ));
            continue;
        };
        let feature_id = &captures[1];
        let feature_name = &captures[2];
        if !feature_id.starts_with(&id_prefix_dotted) {
            error!(path = %path.display(), line = line_number, feature_id, expected = %id_prefix, "gene ID has wrong prefix");
            check.findings.push(Finding::error(
                Some(line_number),
                format!("feature id {feature_id} should start with {id_prefix}"),
            ));
        }
        if !feature_name.starts_with(name_prefix) {
            error!(path = %path.display(), line = line_number, feature_name, expected = name_prefix, "gene Name has wrong prefix");
            check.findings.push(Finding::error(
                Some(line_number),
                format!("feature name {feature_name} should start with {name_prefix}"),
            ));
        }
    }
    Ok(check)
}
