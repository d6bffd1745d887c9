use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DatastoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Fasta,
    Gff3,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidatorOutcome {
    pub valid: bool,
    pub exit_code: Option<i32>,
    pub report: PathBuf,
}

/// External programs the detector and normalizer call out to.
pub trait Toolchain {
    /// Runs the GFF3 format validator, capturing its output next to `report_dir`.
    fn validate_gff3(&self, target: &Path, report_dir: &Path)
    -> Result<ValidatorOutcome, DatastoreError>;

    /// Compresses `path` to `path.gz` and builds its index. Returns the compressed path.
    fn compress_and_index(&self, path: &Path, format: IndexFormat)
    -> Result<PathBuf, DatastoreError>;
}

/// Configured tool locations; each may be the binary itself or its directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default)]
    pub gt: Option<PathBuf>,
    #[serde(default)]
    pub bgzip: Option<PathBuf>,
    #[serde(default)]
    pub tabix: Option<PathBuf>,
    #[serde(default)]
    pub samtools: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SystemToolchain {
    gt: Option<PathBuf>,
    bgzip: Option<PathBuf>,
    tabix: Option<PathBuf>,
    samtools: Option<PathBuf>,
}

impl SystemToolchain {
    pub fn new(paths: &ToolPaths) -> Self {
        let tools = Self {
            gt: locate(paths.gt.as_deref(), "gt"),
            bgzip: locate(paths.bgzip.as_deref(), "bgzip"),
            tabix: locate(paths.tabix.as_deref(), "tabix"),
            samtools: locate(paths.samtools.as_deref(), "samtools"),
        };
        debug!(
            gt = ?tools.gt,
            bgzip = ?tools.bgzip,
            tabix = ?tools.tabix,
            samtools = ?tools.samtools,
            "resolved tools"
        );
        tools
    }

    fn require<'a>(tool: &'a Option<PathBuf>, name: &str) -> Result<&'a PathBuf, DatastoreError> {
        tool.as_ref()
            .ok_or_else(|| DatastoreError::MissingTool(name.to_string()))
    }

    fn spawn(program: &Path, args: &[String]) -> Result<Output, DatastoreError> {
        debug!(program = %program.display(), args = ?args, "running");
        Command::new(program)
            .args(args)
            .output()
            .map_err(|err| DatastoreError::ToolFailed {
                tool: program.display().to_string(),
                status: "not started".to_string(),
                message: err.to_string(),
            })
    }

    fn run_cmd(program: &Path, args: &[String]) -> Result<(), DatastoreError> {
        let output = Self::spawn(program, args)?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {} {}", program.display(), args.join(" "))
        } else {
            stderr
        };
        Err(DatastoreError::ToolFailed {
            tool: program.display().to_string(),
            status: output.status.to_string(),
            message,
        })
    }
}

impl Toolchain for SystemToolchain {
    fn validate_gff3(
        &self,
        target: &Path,
        report_dir: &Path,
    ) -> Result<ValidatorOutcome, DatastoreError> {
        let gt = Self::require(&self.gt, "gt")?;
        let output = Self::spawn(
            gt,
            &[
                "gff3validator".to_string(),
                target.to_string_lossy().to_string(),
            ],
        )?;
        let report = validator_report_path(target, report_dir);
        fs::create_dir_all(report_dir)
            .map_err(|err| DatastoreError::Filesystem(err.to_string()))?;
        let mut content = output.stdout;
        content.extend_from_slice(&output.stderr);
        fs::write(&report, content)
            .map_err(|err| DatastoreError::Filesystem(format!("write {}: {err}", report.display())))?;

        let valid = output.status.success();
        if valid {
            info!(target = %target.display(), "gff3validator passed");
        } else {
            warn!(target = %target.display(), report = %report.display(), "gff3validator failed");
        }
        Ok(ValidatorOutcome {
            valid,
            exit_code: output.status.code(),
            report,
        })
    }

    fn compress_and_index(
        &self,
        path: &Path,
        format: IndexFormat,
    ) -> Result<PathBuf, DatastoreError> {
        let bgzip = Self::require(&self.bgzip, "bgzip")?;
        let plain = path.to_string_lossy().to_string();
        let compressed = PathBuf::from(format!("{plain}.gz"));
        let compressed_arg = compressed.to_string_lossy().to_string();
        info!(path = %path.display(), "compressing");
        match format {
            IndexFormat::Fasta => {
                let samtools = Self::require(&self.samtools, "samtools")?;
                Self::run_cmd(bgzip, &["-f".to_string(), "--index".to_string(), plain])?;
                info!(path = %compressed.display(), "indexing with samtools faidx");
                Self::run_cmd(samtools, &["faidx".to_string(), compressed_arg])?;
            }
            IndexFormat::Gff3 => {
                let tabix = Self::require(&self.tabix, "tabix")?;
                Self::run_cmd(bgzip, &["-f".to_string(), plain])?;
                info!(path = %compressed.display(), "indexing with tabix");
                Self::run_cmd(
                    tabix,
                    &["-p".to_string(), "gff".to_string(), compressed_arg],
                )?;
            }
        }
        Ok(compressed)
    }
}

/// `<report_dir>/<target file name>_validator_report.txt`
pub fn validator_report_path(target: &Path, report_dir: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "target".to_string());
    report_dir.join(format!("{name}_validator_report.txt"))
}

fn locate(configured: Option<&Path>, name: &str) -> Option<PathBuf> {
    match configured {
        Some(path) if path.is_dir() => Some(path.join(name)).filter(|exe| exe.exists()),
        Some(path) => Some(path.to_path_buf()).filter(|exe| exe.exists()),
        None => which::which(name).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_sidecar_name() {
        let path = validator_report_path(
            Path::new("/data/glyma.Wm82.gnm2.ann1.FCtY.gene_models_main.gff3.gz"),
            Path::new("reports"),
        );
        assert_eq!(
            path,
            Path::new("reports/glyma.Wm82.gnm2.ann1.FCtY.gene_models_main.gff3.gz_validator_report.txt")
        );
    }

    #[test]
    fn unconfigured_tool_is_looked_up_on_path() {
        assert_eq!(locate(None, "ds-lint-no-such-tool"), None);
    }

    #[test]
    fn missing_configured_tool_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let tools = SystemToolchain::new(&ToolPaths {
            gt: Some(dir.path().to_path_buf()),
            bgzip: Some(dir.path().join("nope")),
            tabix: None,
            samtools: None,
        });
        assert!(tools.gt.is_none());
        assert!(tools.bgzip.is_none());
    }
}
