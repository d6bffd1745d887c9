//! Rewriting of non-conformant files into canonical form.

pub mod fasta;
pub mod gff3;
pub mod hierarchy;

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::domain::{AnnotationPrefix, AssemblyPrefix, CanonicalType};
use crate::error::DatastoreError;
use crate::fs_util::write_atomic;
use crate::tools::{IndexFormat, Toolchain};

pub use fasta::{FastaNormalizer, FastaSummary};
pub use gff3::{Gff3Normalizer, Gff3Summary};
pub use hierarchy::FeatureHierarchy;

const FASTA_EXTENSIONS: &[&str] = &["fna", "fasta", "fa"];
const GFF3_EXTENSIONS: &[&str] = &["gff", "gff3"];
const COMPRESSED_EXTENSIONS: &[&str] = &["gz", "bgz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Fasta,
    Gff3,
}

impl InputFormat {
    /// Detects the format from the file extension, looking past a `.gz`/`.bgz` suffix.
    pub fn detect(path: &Path) -> Result<Self, DatastoreError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| DatastoreError::UnsupportedType(path.display().to_string()))?;
        let mut tokens = name.rsplit('.');
        let mut extension = tokens.next().unwrap_or_default().to_ascii_lowercase();
        if COMPRESSED_EXTENSIONS.contains(&extension.as_str()) {
            extension = tokens.next().unwrap_or_default().to_ascii_lowercase();
        }
        if FASTA_EXTENSIONS.contains(&extension.as_str()) {
            Ok(InputFormat::Fasta)
        } else if GFF3_EXTENSIONS.contains(&extension.as_str()) {
            Ok(InputFormat::Gff3)
        } else {
            Err(DatastoreError::UnsupportedType(name.to_string()))
        }
    }

    pub fn canonical_type(&self) -> CanonicalType {
        match self {
            InputFormat::Fasta => CanonicalType::GenomeMain,
            InputFormat::Gff3 => CanonicalType::GeneModelsMain,
        }
    }
}

/// Taxon and version fields the standalone normalizer names its output from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonNaming {
    pub genus: String,
    pub species: String,
    pub infra_id: String,
    pub gnm: u32,
    pub ann: Option<u32>,
    pub key: String,
}

impl TaxonNaming {
    pub fn assembly(&self) -> Result<AssemblyPrefix, DatastoreError> {
        AssemblyPrefix::from_taxon(&self.genus, &self.species, &self.infra_id, self.gnm)
    }

    pub fn annotation(&self) -> Result<AnnotationPrefix, DatastoreError> {
        let ann = self.ann.ok_or_else(|| {
            DatastoreError::InvalidConfig("an annotation version is required for GFF3 input".to_string())
        })?;
        Ok(AnnotationPrefix::new(self.assembly()?, ann, &self.key))
    }

    /// `Genus_species`, with the genus capitalized and the species lower-cased.
    pub fn organism_dir(&self) -> String {
        let mut chars = self.genus.chars();
        let genus = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        };
        format!("{genus}_{}", self.species.to_lowercase())
    }

    /// Uncompressed output path under `root`; the toolchain appends `.gz`.
    pub fn output_path(&self, root: &Path, format: InputFormat) -> Result<PathBuf, DatastoreError> {
        let assembly = self.assembly()?;
        let (collection, file_name) = match format {
            InputFormat::Fasta => (
                format!("{}.gnm{}.{}", self.infra_id, self.gnm, self.key),
                format!("{assembly}.{}.{}.fna", self.key, CanonicalType::GenomeMain),
            ),
            InputFormat::Gff3 => {
                let annotation = self.annotation()?;
                (
                    format!("{}.gnm{}.ann{}.{}", self.infra_id, self.gnm, annotation.ann(), self.key),
                    format!("{annotation}.{}.gff3", CanonicalType::GeneModelsMain),
                )
            }
        };
        Ok(root.join(self.organism_dir()).join(collection).join(file_name))
    }
}

/// Runs the FASTA/GFF3 rewriters and hands their output to the compressor.
pub struct Normalizer<'a, T: Toolchain> {
    tools: &'a T,
    prefix_names: bool,
}

impl<'a, T: Toolchain> Normalizer<'a, T> {
    pub fn new(tools: &'a T) -> Self {
        Self {
            tools,
            prefix_names: false,
        }
    }

    pub fn with_prefix_names(mut self, prefix_names: bool) -> Self {
        self.prefix_names = prefix_names;
        self
    }

    /// Writes the rewritten FASTA to `output` and returns the compressed path.
    pub fn normalize_fasta(
        &self,
        input: &Path,
        prefix: &AssemblyPrefix,
        output: &Path,
    ) -> Result<PathBuf, DatastoreError> {
        let normalizer = FastaNormalizer::new(prefix.clone());
        let mut summary = FastaSummary::default();
        write_atomic(output, |temp| {
            summary = normalizer.normalize(input, BufWriter::new(temp.as_file_mut()))?;
            Ok(())
        })?;
        info!(
            input = %input.display(),
            output = %output.display(),
            headers = summary.headers,
            rewritten = summary.rewritten,
            "normalized FASTA"
        );
        self.tools.compress_and_index(output, IndexFormat::Fasta)
    }

    /// Writes the rewritten GFF3 to `output` and returns the compressed path.
    pub fn normalize_gff3(
        &self,
        input: &Path,
        prefix: &AnnotationPrefix,
        output: &Path,
    ) -> Result<PathBuf, DatastoreError> {
        let normalizer = Gff3Normalizer::new(prefix.clone()).with_prefix_names(self.prefix_names);
        let mut summary = Gff3Summary::default();
        write_atomic(output, |temp| {
            summary = normalizer.normalize(input, BufWriter::new(temp.as_file_mut()))?;
            Ok(())
        })?;
        info!(
            input = %input.display(),
            output = %output.display(),
            records = summary.records,
            feature_types = summary.ranks.len(),
            "normalized GFF3"
        );
        self.tools.compress_and_index(output, IndexFormat::Gff3)
    }

    /// Normalizes a file named by taxon fields into the canonical layout under `output_root`.
    pub fn normalize_taxon(
        &self,
        input: &Path,
        naming: &TaxonNaming,
        output_root: &Path,
    ) -> Result<PathBuf, DatastoreError> {
        let format = InputFormat::detect(input)?;
        let output = naming.output_path(output_root, format)?;
        info!(
            input = %input.display(),
            canonical_type = %format.canonical_type(),
            output = %output.display(),
            "normalizing"
        );
        match format {
            InputFormat::Fasta => self.normalize_fasta(input, &naming.assembly()?, &output),
            InputFormat::Gff3 => self.normalize_gff3(input, &naming.annotation()?, &output),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn naming(ann: Option<u32>) -> TaxonNaming {
        TaxonNaming {
            genus: "glycine".to_string(),
            species: "Max".to_string(),
            infra_id: "Wm82".to_string(),
            gnm: 2,
            ann,
            key: "FCtY".to_string(),
        }
    }

    #[test]
    fn detects_by_extension() {
        assert_eq!(InputFormat::detect(Path::new("a.fna")).unwrap(), InputFormat::Fasta);
        assert_eq!(InputFormat::detect(Path::new("a.FA.bgz")).unwrap(), InputFormat::Fasta);
        assert_eq!(InputFormat::detect(Path::new("a.gff3.gz")).unwrap(), InputFormat::Gff3);
        assert_matches!(
            InputFormat::detect(Path::new("a.txt.gz")),
            Err(DatastoreError::UnsupportedType(_))
        );
        assert_matches!(
            InputFormat::detect(Path::new("gz")),
            Err(DatastoreError::UnsupportedType(_))
        );
    }

    #[test]
    fn canonical_output_layout() {
        let root = Path::new("out");
        assert_eq!(
            naming(None).output_path(root, InputFormat::Fasta).unwrap(),
            Path::new("out/Glycine_max/Wm82.gnm2.FCtY/glyma.Wm82.gnm2.FCtY.genome_main.fna")
        );
        assert_eq!(
            naming(Some(1)).output_path(root, InputFormat::Gff3).unwrap(),
            Path::new("out/Glycine_max/Wm82.gnm2.ann1.FCtY/glyma.Wm82.gnm2.ann1.FCtY.gene_models_main.gff3")
        );
        assert_matches!(
            naming(None).output_path(root, InputFormat::Gff3),
            Err(DatastoreError::InvalidConfig(_))
        );
    }
}
