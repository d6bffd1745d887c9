use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{CanonicalType, FileAttributes, GENOME_FIELDS};
use crate::error::DatastoreError;
use crate::fs_util::walk_files;

const COMPRESSED_SUFFIX: &str = ".gz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A single compressed file.
    File,
    /// A `Genus_species` directory.
    Organism,
    /// A collection directory such as `Wm82.gnm2.ann1.FCtY`.
    Data,
}

pub fn classify(path: &Utf8Path) -> Result<TargetKind, DatastoreError> {
    let unknown = || DatastoreError::UnknownTargetKind(path.as_std_path().to_path_buf());
    let name = path.file_name().ok_or_else(unknown)?;
    if path.is_file() && name.ends_with(COMPRESSED_SUFFIX) {
        return Ok(TargetKind::File);
    }
    if path.is_dir() {
        if !name.contains('.') && name.split('_').count() == 2 {
            return Ok(TargetKind::Organism);
        }
        if name.split('.').count() >= 4 {
            return Ok(TargetKind::Data);
        }
    }
    Err(unknown())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNode {
    pub path: Utf8PathBuf,
    pub canonical_type: CanonicalType,
    pub children: BTreeMap<Utf8PathBuf, CanonicalType>,
}

impl TargetNode {
    fn new(path: Utf8PathBuf, canonical_type: CanonicalType) -> Self {
        Self {
            path,
            canonical_type,
            children: BTreeMap::new(),
        }
    }
}

/// A file that could not be attached to the graph.
#[derive(Debug)]
pub struct RejectedTarget {
    pub path: Utf8PathBuf,
    pub error: DatastoreError,
}

/// Reference nodes keyed by path, each holding the files that depend on it.
#[derive(Debug)]
pub struct TargetGraph {
    kind: TargetKind,
    organism_dir: Utf8PathBuf,
    nodes: BTreeMap<Utf8PathBuf, TargetNode>,
    rejected: Vec<RejectedTarget>,
}

impl TargetGraph {
    pub fn discover(root: &Utf8Path) -> Result<Self, DatastoreError> {
        let root = root.canonicalize_utf8().map_err(|err| {
            DatastoreError::Filesystem(format!("resolve {root}: {err}"))
        })?;
        let kind = classify(&root)?;
        let organism_dir = match kind {
            TargetKind::Organism => Some(root.clone()),
            TargetKind::Data => root.parent().map(Utf8Path::to_path_buf),
            TargetKind::File => root
                .parent()
                .and_then(Utf8Path::parent)
                .map(Utf8Path::to_path_buf),
        }
        .ok_or_else(|| DatastoreError::UnknownTargetKind(root.as_std_path().to_path_buf()))?;
        info!(root = %root, kind = ?kind, organism_dir = %organism_dir, "discovering targets");

        let mut graph = Self {
            kind,
            organism_dir,
            nodes: BTreeMap::new(),
            rejected: Vec::new(),
        };

        let files = match kind {
            TargetKind::File => vec![root],
            TargetKind::Organism | TargetKind::Data => walk_files(root.as_std_path())?
                .into_iter()
                .filter_map(|path| Utf8PathBuf::from_path_buf(path).ok())
                .collect(),
        };
        for file in files {
            graph.add_file(file);
        }
        Ok(graph)
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn organism_dir(&self) -> &Utf8Path {
        &self.organism_dir
    }

    pub fn roots(&self) -> impl Iterator<Item = &TargetNode> {
        self.nodes.values()
    }

    pub fn root(&self, path: &Utf8Path) -> Option<&TargetNode> {
        self.nodes.get(path)
    }

    pub fn rejected(&self) -> &[RejectedTarget] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn add_file(&mut self, file: Utf8PathBuf) {
        let Some(name) = file.file_name() else {
            return;
        };
        if !name.ends_with(COMPRESSED_SUFFIX) {
            debug!(path = %file, "skipping uncompressed file");
            return;
        }
        let attrs = FileAttributes::from_file_name(name);
        let canonical_type = match attrs.canonical_type() {
            Ok(canonical_type) => canonical_type,
            Err(err) => {
                warn!(path = %file, error = %err, "skipping file with unrecognized canonical type");
                return;
            }
        };

        let parent_type = canonical_type
            .parent()
            .filter(|_| attrs.len() > GENOME_FIELDS);
        match parent_type {
            Some(parent_type) => match self.resolve_reference(&file, &attrs, parent_type) {
                Ok(reference) => {
                    debug!(child = %file, reference = %reference, "attached to reference");
                    self.nodes
                        .entry(reference.clone())
                        .or_insert_with(|| TargetNode::new(reference, parent_type))
                        .children
                        .insert(file, canonical_type);
                }
                Err(error) => {
                    warn!(path = %file, error = %error, "reference resolution failed");
                    self.rejected.push(RejectedTarget { path: file, error });
                }
            },
            None => {
                self.nodes
                    .entry(file.clone())
                    .or_insert_with(|| TargetNode::new(file, canonical_type));
            }
        }
    }

    /// Globs the organism directory for the one `parent_type` file sharing `prefix.infra_id`.
    fn resolve_reference(
        &self,
        child: &Utf8Path,
        attrs: &FileAttributes,
        parent_type: CanonicalType,
    ) -> Result<Utf8PathBuf, DatastoreError> {
        let organism_key = attrs
            .organism_key()
            .ok_or_else(|| DatastoreError::UnsupportedType(attrs.name().to_string()))?;
        let pattern = format!(
            "{}/*/{}.*.{}.*",
            glob::Pattern::escape(self.organism_dir.as_str()),
            glob::Pattern::escape(&organism_key),
            parent_type
        );
        let matches = glob::glob(&pattern)
            .map_err(|err| DatastoreError::Filesystem(err.to_string()))?
            .filter_map(Result::ok)
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == "gz"))
            .collect::<Vec<_>>();
        debug!(child = %child, pattern = %pattern, matches = matches.len(), "reference glob");

        match matches.as_slice() {
            [reference] => Utf8PathBuf::from_path_buf(reference.clone()).map_err(|path| {
                DatastoreError::Filesystem(format!("not a UTF-8 path: {}", path.display()))
            }),
            [] => Err(DatastoreError::ReferenceNotFound {
                child: child.as_std_path().to_path_buf(),
                pattern,
            }),
            _ => Err(DatastoreError::AmbiguousReference {
                child: child.as_std_path().to_path_buf(),
                pattern,
                matches,
            }),
        }
    }
}
