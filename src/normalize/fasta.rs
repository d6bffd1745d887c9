use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::checks::HEADER_RE;
use crate::domain::AssemblyPrefix;
use crate::error::DatastoreError;
use crate::fs_util::LineStream;

#[derive(Debug, Clone, Default, Serialize)]
pub struct FastaSummary {
    pub headers: usize,
    pub rewritten: usize,
}

/// Rewrites FASTA headers to `>prefix.infra_id.gnmN.<id>[ <description>]`.
#[derive(Debug, Clone)]
pub struct FastaNormalizer {
    prefix: AssemblyPrefix,
}

impl FastaNormalizer {
    pub fn new(prefix: AssemblyPrefix) -> Self {
        Self { prefix }
    }

    /// `None` when the line is not an `>id[ description]` header.
    pub fn rewrite_header(&self, line: &str) -> Option<String> {
        let captures = HEADER_RE.captures(line)?;
        let id = self.prefix.apply(&captures[1]);
        let description = &captures[2];
        if description.is_empty() {
            Some(format!(">{id}"))
        } else {
            Some(format!(">{id} {description}"))
        }
    }

    pub fn normalize<W: Write>(&self, input: &Path, mut out: W) -> Result<FastaSummary, DatastoreError> {
        let write_err =
            |err: std::io::Error| DatastoreError::Filesystem(format!("write normalized FASTA: {err}"));
        let mut summary = FastaSummary::default();
        let mut lines = LineStream::open(input)?;
        while let Some(line) = lines.next() {
            let line = line?;
            if !line.starts_with('>') {
                writeln!(out, "{line}").map_err(write_err)?;
                continue;
            }
            let header = self
                .rewrite_header(&line)
                .ok_or_else(|| DatastoreError::MalformedHeader {
                    path: input.to_path_buf(),
                    line: lines.line_number(),
                    header: line.clone(),
                })?;
            summary.headers += 1;
            if header != line {
                summary.rewritten += 1;
            }
            debug!(from = %line, to = %header, "fasta header");
            writeln!(out, "{header}").map_err(write_err)?;
        }
        out.flush().map_err(write_err)?;
        Ok(summary)
    }
}
