use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DatastoreError;

pub const PREFIX_LEN: usize = 5;
pub const GENOME_FIELDS: usize = 7;
pub const ANNOTATION_FIELDS: usize = 8;
pub const COMPRESSION_MARKER: &str = "gz";

static DOI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^10\.\d{4,9}/\S+$").unwrap());

/// The first naming rule a file name violates, with the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingRule {
    FieldCount { expected: usize, actual: usize },
    PrefixLength { prefix: String },
    VersionMarker { expected: &'static str, found: String },
    NonIntegerVersion { marker: &'static str, found: String },
    CanonicalType { expected: &'static str, found: String },
    Extension { expected: &'static str, found: String },
    Compression { found: String },
}

impl NamingRule {
    pub fn offending_field(&self) -> String {
        match self {
            NamingRule::FieldCount { actual, .. } => actual.to_string(),
            NamingRule::PrefixLength { prefix } => prefix.clone(),
            NamingRule::VersionMarker { found, .. }
            | NamingRule::NonIntegerVersion { found, .. }
            | NamingRule::CanonicalType { found, .. }
            | NamingRule::Extension { found, .. }
            | NamingRule::Compression { found } => found.clone(),
        }
    }
}

impl fmt::Display for NamingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingRule::FieldCount { expected, actual } => {
                write!(f, "expected {expected} dot-delimited fields, found {actual}")
            }
            NamingRule::PrefixLength { prefix } => write!(
                f,
                "prefix must be {PREFIX_LEN} characters, {prefix:?} has {}",
                prefix.chars().count()
            ),
            NamingRule::VersionMarker { expected, found } => {
                write!(f, "expected a {expected}<N> version field, found {found:?}")
            }
            NamingRule::NonIntegerVersion { marker, found } => {
                write!(f, "{marker} version must be an integer, not {found:?}")
            }
            NamingRule::CanonicalType { expected, found } => {
                write!(f, "expected canonical type {expected}, found {found:?}")
            }
            NamingRule::Extension { expected, found } => {
                write!(f, "expected extension {expected}, found {found:?}")
            }
            NamingRule::Compression { found } => {
                write!(f, "last field must be {COMPRESSION_MARKER}, found {found:?}")
            }
        }
    }
}

/// Canonical content types the standard defines validators for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalType {
    GenomeMain,
    GeneModelsMain,
}

impl CanonicalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalType::GenomeMain => "genome_main",
            CanonicalType::GeneModelsMain => "gene_models_main",
        }
    }

    /// The type of the reference file this type is attached under.
    pub fn parent(&self) -> Option<CanonicalType> {
        match self {
            CanonicalType::GenomeMain => None,
            CanonicalType::GeneModelsMain => Some(CanonicalType::GenomeMain),
        }
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalType {
    type Err = DatastoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "genome_main" => Ok(CanonicalType::GenomeMain),
            "gene_models_main" => Ok(CanonicalType::GeneModelsMain),
            _ => Err(DatastoreError::UnsupportedType(value.to_string())),
        }
    }
}

/// Dot-delimited tokens of a base file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    name: String,
    tokens: Vec<String>,
}

impl FileAttributes {
    pub fn from_file_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tokens: name.split('.').map(str::to_string).collect(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, DatastoreError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                DatastoreError::Filesystem(format!("not a UTF-8 file name: {}", path.display()))
            })?;
        Ok(Self::from_file_name(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The token three places from the end, where the canonical type lives.
    pub fn type_token(&self) -> Option<&str> {
        let len = self.tokens.len();
        if len < 3 {
            return None;
        }
        Some(self.tokens[len - 3].as_str())
    }

    pub fn canonical_type(&self) -> Result<CanonicalType, DatastoreError> {
        let token = self
            .type_token()
            .ok_or_else(|| DatastoreError::UnsupportedType(self.name.clone()))?;
        token.parse()
    }

    /// `prefix.infra_id`, shared by a file and its reference.
    pub fn organism_key(&self) -> Option<String> {
        if self.tokens.len() < 2 {
            return None;
        }
        Some(format!("{}.{}", self.tokens[0], self.tokens[1]))
    }

    fn naming_error(&self, rule: NamingRule) -> DatastoreError {
        DatastoreError::Naming {
            name: self.name.clone(),
            rule,
        }
    }
}

/// `prefix.infra_id.gnmN`, the namespace for sequence ids of one assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyPrefix {
    prefix: String,
    infra_id: String,
    gnm: u32,
}

impl AssemblyPrefix {
    pub fn new(prefix: &str, infra_id: &str, gnm: u32) -> Result<Self, NamingRule> {
        check_prefix(prefix)?;
        Ok(Self {
            prefix: prefix.to_string(),
            infra_id: infra_id.to_string(),
            gnm,
        })
    }

    /// Builds the prefix from a taxon: three letters of the genus and two of the species.
    pub fn from_taxon(
        genus: &str,
        species: &str,
        infra_id: &str,
        gnm: u32,
    ) -> Result<Self, DatastoreError> {
        let genus_part: String = genus.chars().take(3).collect();
        let species_part: String = species.chars().take(2).collect();
        if genus_part.chars().count() != 3 || species_part.chars().count() != 2 {
            return Err(DatastoreError::InvalidConfig(format!(
                "genus {genus:?} and species {species:?} are too short to build a prefix"
            )));
        }
        let prefix = format!("{genus_part}{species_part}").to_lowercase();
        Self::new(&prefix, infra_id, gnm).map_err(|rule| DatastoreError::Naming {
            name: format!("{genus} {species}"),
            rule,
        })
    }

    /// Reads the first three tokens of a file name.
    pub fn from_file_name(name: &str) -> Result<Self, DatastoreError> {
        let attrs = FileAttributes::from_file_name(name);
        if attrs.len() < 3 {
            return Err(attrs.naming_error(NamingRule::FieldCount {
                expected: 3,
                actual: attrs.len(),
            }));
        }
        let tokens = attrs.tokens();
        let gnm = parse_version(&tokens[2], "gnm").map_err(|rule| attrs.naming_error(rule))?;
        Self::new(&tokens[0], &tokens[1], gnm).map_err(|rule| attrs.naming_error(rule))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn infra_id(&self) -> &str {
        &self.infra_id
    }

    pub fn gnm(&self) -> u32 {
        self.gnm
    }

    /// Prepends this prefix to `value` unless it is already there.
    pub fn apply<'a>(&self, value: &'a str) -> Cow<'a, str> {
        apply_prefix(&self.to_string(), value)
    }
}

impl fmt::Display for AssemblyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.gnm{}", self.prefix, self.infra_id, self.gnm)
    }
}

/// `prefix.infra_id.gnmN.annM.key`, the namespace for feature ids of one annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationPrefix {
    assembly: AssemblyPrefix,
    ann: u32,
    key: String,
}

impl AnnotationPrefix {
    pub fn new(assembly: AssemblyPrefix, ann: u32, key: &str) -> Self {
        Self {
            assembly,
            ann,
            key: key.to_string(),
        }
    }

    pub fn assembly(&self) -> &AssemblyPrefix {
        &self.assembly
    }

    pub fn ann(&self) -> u32 {
        self.ann
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn apply<'a>(&self, value: &'a str) -> Cow<'a, str> {
        apply_prefix(&self.to_string(), value)
    }
}

impl fmt::Display for AnnotationPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.ann{}.{}", self.assembly, self.ann, self.key)
    }
}

fn apply_prefix<'a>(prefix: &str, value: &'a str) -> Cow<'a, str> {
    let already = value
        .strip_prefix(prefix)
        .map(|rest| rest.starts_with('.'))
        .unwrap_or(false);
    if already {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("{prefix}.{value}"))
    }
}

/// A validated `genome_main` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeName {
    assembly: AssemblyPrefix,
    key: String,
}

impl GenomeName {
    pub fn parse(name: &str) -> Result<Self, DatastoreError> {
        let attrs = FileAttributes::from_file_name(name);
        Self::from_attributes(&attrs)
    }

    pub fn from_attributes(attrs: &FileAttributes) -> Result<Self, DatastoreError> {
        check_genome_tokens(attrs.tokens()).map_err(|rule| attrs.naming_error(rule))
    }

    pub fn assembly(&self) -> &AssemblyPrefix {
        &self.assembly
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Every FASTA id in the file must start with this.
    pub fn header_prefix(&self) -> String {
        self.assembly.to_string()
    }
}

fn check_genome_tokens(tokens: &[String]) -> Result<GenomeName, NamingRule> {
    if tokens.len() != GENOME_FIELDS {
        return Err(NamingRule::FieldCount {
            expected: GENOME_FIELDS,
            actual: tokens.len(),
        });
    }
    check_prefix(&tokens[0])?;
    let gnm = parse_version(&tokens[2], "gnm")?;
    check_token(&tokens[4], CanonicalType::GenomeMain.as_str(), |expected, found| {
        NamingRule::CanonicalType { expected, found }
    })?;
    check_token(&tokens[5], "fna", |expected, found| NamingRule::Extension {
        expected,
        found,
    })?;
    check_compression(&tokens[6])?;
    Ok(GenomeName {
        assembly: AssemblyPrefix {
            prefix: tokens[0].clone(),
            infra_id: tokens[1].clone(),
            gnm,
        },
        key: tokens[3].clone(),
    })
}

/// A validated `gene_models_main` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationName {
    annotation: AnnotationPrefix,
}

impl AnnotationName {
    pub fn parse(name: &str) -> Result<Self, DatastoreError> {
        let attrs = FileAttributes::from_file_name(name);
        Self::from_attributes(&attrs)
    }

    pub fn from_attributes(attrs: &FileAttributes) -> Result<Self, DatastoreError> {
        check_annotation_tokens(attrs.tokens()).map_err(|rule| attrs.naming_error(rule))
    }

    pub fn annotation(&self) -> &AnnotationPrefix {
        &self.annotation
    }

    pub fn assembly(&self) -> &AssemblyPrefix {
        self.annotation.assembly()
    }

    /// The first four file name tokens; gene IDs must start with this.
    pub fn id_prefix(&self) -> String {
        format!("{}.ann{}", self.annotation.assembly, self.annotation.ann)
    }

    /// The first file name token; gene Names must start with this.
    pub fn name_prefix(&self) -> &str {
        self.annotation.assembly.prefix()
    }
}

fn check_annotation_tokens(tokens: &[String]) -> Result<AnnotationName, NamingRule> {
    if tokens.len() != ANNOTATION_FIELDS {
        return Err(NamingRule::FieldCount {
            expected: ANNOTATION_FIELDS,
            actual: tokens.len(),
        });
    }
    check_prefix(&tokens[0])?;
    let gnm = parse_version(&tokens[2], "gnm")?;
    let ann = parse_version(&tokens[3], "ann")?;
    check_token(
        &tokens[5],
        CanonicalType::GeneModelsMain.as_str(),
        |expected, found| NamingRule::CanonicalType { expected, found },
    )?;
    check_token(&tokens[6], "gff3", |expected, found| NamingRule::Extension {
        expected,
        found,
    })?;
    check_compression(&tokens[7])?;
    let assembly = AssemblyPrefix {
        prefix: tokens[0].clone(),
        infra_id: tokens[1].clone(),
        gnm,
    };
    Ok(AnnotationName {
        annotation: AnnotationPrefix::new(assembly, ann, &tokens[4]),
    })
}

fn check_prefix(prefix: &str) -> Result<(), NamingRule> {
    if prefix.chars().count() != PREFIX_LEN {
        return Err(NamingRule::PrefixLength {
            prefix: prefix.to_string(),
        });
    }
    Ok(())
}

fn check_token<F>(token: &str, expected: &'static str, rule: F) -> Result<(), NamingRule>
where
    F: FnOnce(&'static str, String) -> NamingRule,
{
    if token != expected {
        return Err(rule(expected, token.to_string()));
    }
    Ok(())
}

fn check_compression(token: &str) -> Result<(), NamingRule> {
    if token != COMPRESSION_MARKER {
        return Err(NamingRule::Compression {
            found: token.to_string(),
        });
    }
    Ok(())
}

/// Parses `gnm3` / `ann1` style tokens. Signs, decimals and empty versions are rejected.
pub fn parse_version(token: &str, marker: &'static str) -> Result<u32, NamingRule> {
    let version = token
        .strip_prefix(marker)
        .ok_or_else(|| NamingRule::VersionMarker {
            expected: marker,
            found: token.to_string(),
        })?;
    let non_integer = || NamingRule::NonIntegerVersion {
        marker,
        found: version.to_string(),
    };
    if version.is_empty() || !version.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(non_integer());
    }
    version.parse().map_err(|_| non_integer())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Doi(String);

impl Doi {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Doi {
    type Err = DatastoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let bare = ["https://doi.org/", "http://doi.org/", "doi:"]
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
            .unwrap_or(trimmed);
        if !DOI_RE.is_match(bare) {
            return Err(DatastoreError::InvalidDoi(value.to_string()));
        }
        Ok(Self(bare.to_string()))
    }
}
