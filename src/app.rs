use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::checks::{FastaIds, Finding, check_gene_models, check_genome_fasta};
use crate::checksum::ChecksumFile;
use crate::doi::{DoiCheck, DoiClient, check_readme};
use crate::domain::{AnnotationName, CanonicalType, FileAttributes, GenomeName};
use crate::error::DatastoreError;
use crate::normalize::Normalizer;
use crate::target::{TargetGraph, TargetKind};
use crate::tools::Toolchain;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub normalize: bool,
    pub prefix_names: bool,
    pub verify_checksums: bool,
    pub check_dois: bool,
    pub gff3_validator: bool,
    pub output_dir: PathBuf,
    pub report_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Passed,
    Failed,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub path: String,
    pub canonical_type: CanonicalType,
    pub reference: Option<String>,
    pub status: TargetStatus,
    pub checksum_verified: bool,
    pub findings: Vec<Finding>,
    pub error_kind: Option<&'static str>,
    pub error: Option<String>,
    pub validator_report: Option<String>,
    pub normalized: Option<String>,
}

impl TargetReport {
    fn new(path: &Path, canonical_type: CanonicalType, reference: Option<&Path>) -> Self {
        Self {
            path: path.display().to_string(),
            canonical_type,
            reference: reference.map(|path| path.display().to_string()),
            status: TargetStatus::Passed,
            checksum_verified: false,
            findings: Vec::new(),
            error_kind: None,
            error: None,
            validator_report: None,
            normalized: None,
        }
    }

    fn record_error(&mut self, err: &DatastoreError) {
        error!(path = %self.path, kind = err.kind(), error = %err, "target failed");
        self.status = TargetStatus::Error;
        self.error_kind = Some(err.kind());
        self.error = Some(err.to_string());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadmeReport {
    pub path: String,
    pub checks: Vec<DoiCheck>,
    pub findings: Vec<Finding>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: String,
    pub kind: TargetKind,
    pub checked_at: String,
    pub targets: Vec<TargetReport>,
    pub readmes: Vec<ReadmeReport>,
}

impl RunReport {
    pub fn count(&self, status: TargetStatus) -> usize {
        self.targets
            .iter()
            .filter(|target| target.status == status)
            .count()
    }

    pub fn success(&self) -> bool {
        self.targets
            .iter()
            .all(|target| target.status == TargetStatus::Passed)
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Runs the detector over a target graph: every reference first, then the
/// files attached to it, each reported independently.
pub struct App<T: Toolchain, D: DoiClient> {
    tools: T,
    doi: D,
    options: RunOptions,
}

impl<T: Toolchain, D: DoiClient> App<T, D> {
    pub fn new(tools: T, doi: D, options: RunOptions) -> Self {
        Self {
            tools,
            doi,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn run(&self, graph: &TargetGraph, sink: &dyn ProgressSink) -> RunReport {
        let mut report = RunReport {
            root: graph.organism_dir().to_string(),
            kind: graph.kind(),
            checked_at: chrono::Utc::now().to_rfc3339(),
            targets: Vec::new(),
            readmes: Vec::new(),
        };
        let mut directories = BTreeSet::new();

        for rejected in graph.rejected() {
            sink.event(ProgressEvent {
                message: format!("phase=Resolve; {} has no usable reference", rejected.path),
                elapsed: None,
            });
            let path = rejected.path.as_std_path();
            let canonical_type = FileAttributes::from_path(path)
                .and_then(|attrs| attrs.canonical_type())
                .unwrap_or(CanonicalType::GeneModelsMain);
            let mut target = TargetReport::new(path, canonical_type, None);
            target.record_error(&rejected.error);
            report.targets.push(target);
            directories.extend(path.parent().map(Path::to_path_buf));
        }

        for node in graph.roots() {
            let reference = node.path.as_std_path();
            directories.extend(reference.parent().map(Path::to_path_buf));
            let (target, fasta_ids) = self.check_target(reference, node.canonical_type, None, None, sink);
            report.targets.push(target);

            for (child, child_type) in &node.children {
                let child = child.as_std_path();
                directories.extend(child.parent().map(Path::to_path_buf));
                let (target, _) =
                    self.check_target(child, *child_type, Some(reference), fasta_ids.as_ref(), sink);
                report.targets.push(target);
            }
        }

        if self.options.check_dois {
            for dir in &directories {
                report.readmes.extend(self.check_readmes(dir, sink));
            }
        }

        info!(
            targets = report.targets.len(),
            passed = report.count(TargetStatus::Passed),
            failed = report.count(TargetStatus::Failed),
            errors = report.count(TargetStatus::Error),
            "run complete"
        );
        report
    }

    /// Checks one file. Genomes hand back the ids their children are checked against.
    pub fn check_target(
        &self,
        path: &Path,
        canonical_type: CanonicalType,
        reference: Option<&Path>,
        fasta_ids: Option<&FastaIds>,
        sink: &dyn ProgressSink,
    ) -> (TargetReport, Option<FastaIds>) {
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Check; {canonical_type} {}", path.display()),
            elapsed: None,
        });
        let mut report = TargetReport::new(path, canonical_type, reference);
        let outcome = match canonical_type {
            CanonicalType::GenomeMain => self.check_genome(path, &mut report).map(Some),
            CanonicalType::GeneModelsMain => self
                .check_annotation(path, fasta_ids, &mut report)
                .map(|()| None),
        };
        let ids = match outcome {
            Ok(ids) => ids,
            Err(err) => {
                report.record_error(&err);
                None
            }
        };
        sink.event(ProgressEvent {
            message: format!("phase=Done; {:?} {}", report.status, path.display()),
            elapsed: Some(started.elapsed()),
        });
        (report, ids)
    }

    fn check_genome(&self, path: &Path, report: &mut TargetReport) -> Result<FastaIds, DatastoreError> {
        let attrs = FileAttributes::from_path(path)?;
        let name = GenomeName::from_attributes(&attrs)?;
        info!(path = %path.display(), "genome_main file name conforms");
        self.verify_checksum(path, report)?;

        let check = check_genome_fasta(path, &name)?;
        report.findings.extend(check.findings);
        if check.passed {
            return Ok(check.ids);
        }
        report.status = TargetStatus::Failed;
        if self.options.normalize {
            let output = self.normalized_path(&attrs);
            match Normalizer::new(&self.tools).normalize_fasta(path, name.assembly(), &output) {
                Ok(normalized) => report.normalized = Some(normalized.display().to_string()),
                Err(err) => report.record_error(&err),
            }
        }
        Ok(check.ids)
    }

    fn check_annotation(
        &self,
        path: &Path,
        fasta_ids: Option<&FastaIds>,
        report: &mut TargetReport,
    ) -> Result<(), DatastoreError> {
        let attrs = FileAttributes::from_path(path)?;
        let name = AnnotationName::from_attributes(&attrs)?;
        info!(path = %path.display(), "gene_models_main file name conforms");
        self.verify_checksum(path, report)?;

        if fasta_ids.is_none() {
            warn!(path = %path.display(), "no genome_main ids to cross-check seqids against");
        }
        let check = check_gene_models(path, &name, fasta_ids)?;
        let congruent = check.congruent();
        report.findings.extend(check.findings);

        let mut valid = true;
        if self.options.gff3_validator {
            let outcome = self.tools.validate_gff3(path, &self.options.report_dir)?;
            report.validator_report = Some(outcome.report.display().to_string());
            if !outcome.valid {
                valid = false;
                report.findings.push(Finding::error(
                    None,
                    format!("gff3validator rejected the file, see {}", outcome.report.display()),
                ));
            }
        }
        if congruent && valid {
            return Ok(());
        }
        report.status = TargetStatus::Failed;
        if self.options.normalize {
            let output = self.normalized_path(&attrs);
            let normalizer = Normalizer::new(&self.tools).with_prefix_names(self.options.prefix_names);
            match normalizer.normalize_gff3(path, name.annotation(), &output) {
                Ok(normalized) => report.normalized = Some(normalized.display().to_string()),
                Err(err) => report.record_error(&err),
            }
        }
        Ok(())
    }

    fn verify_checksum(&self, path: &Path, report: &mut TargetReport) -> Result<(), DatastoreError> {
        if !self.options.verify_checksums {
            return Ok(());
        }
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        ChecksumFile::locate(dir)?.verify(path)?;
        report.checksum_verified = true;
        Ok(())
    }

    /// `<output_dir>/<file name without .gz>`; the toolchain compresses it back.
    fn normalized_path(&self, attrs: &FileAttributes) -> PathBuf {
        let name = attrs.name();
        let plain = name.strip_suffix(".gz").unwrap_or(name);
        self.options.output_dir.join(plain)
    }

    fn check_readmes(&self, dir: &Path, sink: &dyn ProgressSink) -> Vec<ReadmeReport> {
        let pattern = format!("{}/README*", glob::Pattern::escape(&dir.to_string_lossy()));
        let readmes: Vec<PathBuf> = match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(Result::ok).filter(|path| path.is_file()).collect(),
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "invalid README pattern");
                Vec::new()
            }
        };

        let mut reports = Vec::new();
        for readme in readmes {
            sink.event(ProgressEvent {
                message: format!("phase=Doi; {}", readme.display()),
                elapsed: None,
            });
            let report = match check_readme(&readme, &self.doi) {
                Ok(check) => ReadmeReport {
                    path: readme.display().to_string(),
                    checks: check.checks,
                    findings: check.findings,
                    error: None,
                },
                Err(err) => {
                    warn!(readme = %readme.display(), error = %err, "README check failed");
                    ReadmeReport {
                        path: readme.display().to_string(),
                        checks: Vec::new(),
                        findings: Vec::new(),
                        error: Some(err.to_string()),
                    }
                }
            };
            reports.push(report);
        }
        reports
    }
}
