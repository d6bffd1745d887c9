#![allow(dead_code)]

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flate2::Compression;
use flate2::write::GzEncoder;

use datastore_lint::checksum::file_digest;
use datastore_lint::doi::{DoiClient, DoiResponse};
use datastore_lint::domain::Doi;
use datastore_lint::error::DatastoreError;
use datastore_lint::tools::{IndexFormat, Toolchain, ValidatorOutcome, validator_report_path};

pub const GENOME: &str = "glyma.Wm82.gnm2.FCtY.genome_main.fna.gz";
pub const ANNOTATION: &str = "glyma.Wm82.gnm2.ann1.FCtY.gene_models_main.gff3.gz";
pub const GENOME_DIR: &str = "Wm82.gnm2.FCtY";
pub const ANNOTATION_DIR: &str = "Wm82.gnm2.ann1.FCtY";

pub const CANONICAL_FASTA: &str = "\
>glyma.Wm82.gnm2.Chr01 chromosome 1
ACGTACGTAC
GTACGT
>glyma.Wm82.gnm2.Chr02
TTGGCCAA
";

pub const CANONICAL_GFF3: &str = "\
##gff-version 3
##sequence-region glyma.Wm82.gnm2.Chr01 1 16
glyma.Wm82.gnm2.Chr01\tphytozome\tgene\t1\t16\t.\t+\t.\tID=glyma.Wm82.gnm2.ann1.FCtY.g1;Name=glyma.G1;
glyma.Wm82.gnm2.Chr01\tphytozome\tmRNA\t1\t16\t.\t+\t.\tID=glyma.Wm82.gnm2.ann1.FCtY.m1;Parent=glyma.Wm82.gnm2.ann1.FCtY.g1
glyma.Wm82.gnm2.Chr01\tphytozome\texon\t1\t16\t.\t+\t.\tID=glyma.Wm82.gnm2.ann1.FCtY.e1;Parent=glyma.Wm82.gnm2.ann1.FCtY.m1
";

pub fn write_gz(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path.to_path_buf()
}

pub fn write_plain(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

/// Writes a CHECKSUM file next to the given files with their real digests.
pub fn write_checksums(dir: &Path, files: &[&Path]) -> PathBuf {
    let mut content = String::from("# md5 checksums\n");
    for file in files {
        let name = file.file_name().unwrap().to_string_lossy();
        content.push_str(&format!("{}  {}\n", file_digest(file).unwrap(), name));
    }
    write_plain(&dir.join("CHECKSUM.md5"), &content)
}

/// `Glycine_max/` with a conformant genome and annotation, each with a CHECKSUM file.
pub fn organism_tree(root: &Path, fasta: &str, gff3: &str) -> PathBuf {
    let organism = root.join("Glycine_max");
    let genome_dir = organism.join(GENOME_DIR);
    let annotation_dir = organism.join(ANNOTATION_DIR);
    let genome = write_gz(&genome_dir.join(GENOME), fasta);
    let annotation = write_gz(&annotation_dir.join(ANNOTATION), gff3);
    write_checksums(&genome_dir, &[&genome]);
    write_checksums(&annotation_dir, &[&annotation]);
    organism
}

pub fn read_gz(path: &Path) -> String {
    let mut content = String::new();
    let mut decoder = flate2::read::MultiGzDecoder::new(File::open(path).unwrap());
    std::io::Read::read_to_string(&mut decoder, &mut content).unwrap();
    content
}

/// Stands in for gt/bgzip/samtools/tabix: gzips in place and writes a validator report.
#[derive(Default)]
pub struct MockToolchain {
    pub invalid: bool,
    pub validated: Mutex<Vec<PathBuf>>,
    pub compressed: Mutex<Vec<(PathBuf, IndexFormat)>>,
}

impl MockToolchain {
    pub fn rejecting() -> Self {
        Self {
            invalid: true,
            ..Self::default()
        }
    }
}

impl Toolchain for MockToolchain {
    fn validate_gff3(
        &self,
        target: &Path,
        report_dir: &Path,
    ) -> Result<ValidatorOutcome, DatastoreError> {
        self.validated.lock().unwrap().push(target.to_path_buf());
        let report = validator_report_path(target, report_dir);
        write_plain(&report, if self.invalid { "error: bad\n" } else { "" });
        Ok(ValidatorOutcome {
            valid: !self.invalid,
            exit_code: Some(if self.invalid { 1 } else { 0 }),
            report,
        })
    }

    fn compress_and_index(
        &self,
        path: &Path,
        format: IndexFormat,
    ) -> Result<PathBuf, DatastoreError> {
        self.compressed
            .lock()
            .unwrap()
            .push((path.to_path_buf(), format));
        let content = fs::read_to_string(path).unwrap();
        let compressed = PathBuf::from(format!("{}.gz", path.display()));
        write_gz(&compressed, &content);
        fs::remove_file(path).unwrap();
        Ok(compressed)
    }
}

/// Resolves only the DOIs it was built with.
#[derive(Default)]
pub struct MockDoi {
    pub resolvable: HashSet<String>,
    pub calls: Mutex<usize>,
}

impl MockDoi {
    pub fn resolving(dois: &[&str]) -> Self {
        Self {
            resolvable: dois.iter().map(|doi| doi.to_string()).collect(),
            calls: Mutex::new(0),
        }
    }
}

impl DoiClient for MockDoi {
    fn lookup(&self, doi: &Doi) -> Result<DoiResponse, DatastoreError> {
        *self.calls.lock().unwrap() += 1;
        if doi.as_str().ends_with("offline") {
            return Err(DatastoreError::DoiHttp("connection refused".to_string()));
        }
        let response_code = if self.resolvable.contains(doi.as_str()) {
            1
        } else {
            100
        };
        Ok(DoiResponse {
            response_code,
            handle: Some(doi.to_string()),
        })
    }
}
