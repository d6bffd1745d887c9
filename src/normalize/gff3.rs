use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::AnnotationPrefix;
use crate::error::DatastoreError;
use crate::fs_util::LineStream;
use crate::normalize::hierarchy::FeatureHierarchy;

/// Sort key for types the hierarchy does not rank; they go after every ranked type.
pub const UNRANKED: u32 = 1000;

const SEQUENCE_REGION: &str = "##sequence-region";

#[derive(Debug, Clone, Default, Serialize)]
pub struct Gff3Summary {
    pub records: usize,
    pub directives: usize,
    pub ranks: BTreeMap<String, u32>,
}

#[derive(Debug)]
struct Gff3Record {
    line: usize,
    fields: Vec<String>,
    start: u64,
    parent_ids: Vec<String>,
}

impl Gff3Record {
    fn seqid(&self) -> &str {
        &self.fields[0]
    }

    fn feature_type(&self) -> &str {
        &self.fields[2]
    }
}

/// Rewrites a GFF3 file into canonical form: records sorted by seqid, start and
/// type rank, with seqids and ID/Parent (optionally Name) values prefixed.
#[derive(Debug, Clone)]
pub struct Gff3Normalizer {
    prefix: AnnotationPrefix,
    prefix_names: bool,
}

impl Gff3Normalizer {
    pub fn new(prefix: AnnotationPrefix) -> Self {
        Self {
            prefix,
            prefix_names: false,
        }
    }

    pub fn with_prefix_names(mut self, prefix_names: bool) -> Self {
        self.prefix_names = prefix_names;
        self
    }

    pub fn normalize<W: Write>(&self, input: &Path, mut out: W) -> Result<Gff3Summary, DatastoreError> {
        let write_err =
            |err: std::io::Error| DatastoreError::Filesystem(format!("write normalized GFF3: {err}"));
        let mut summary = Gff3Summary::default();

        // ingest
        let mut records = Vec::new();
        let mut feature_types: HashMap<String, String> = HashMap::new();
        let mut lines = LineStream::open(input)?;
        while let Some(line) = lines.next() {
            let line = line?;
            let line_number = lines.line_number();
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with('#') {
                summary.directives += 1;
                writeln!(out, "{}", self.rewrite_directive(&line)).map_err(write_err)?;
                continue;
            }
            let record = parse_record(input, line_number, &line)?;
            if let Some(id) = attribute(&record.fields[8], "ID") {
                feature_types
                    .entry(id.to_string())
                    .or_insert_with(|| record.feature_type().to_string());
            }
            records.push(record);
        }
        summary.records = records.len();
        info!(path = %input.display(), records = records.len(), features = feature_types.len(), "ingested GFF3");

        // rank
        let hierarchy = build_hierarchy(input, &records, &feature_types)?;
        summary.ranks = hierarchy.ranks();
        debug!(ranks = ?summary.ranks, "feature type ranks");

        // sort and rewrite
        records.sort_by(|a, b| compare_records(&hierarchy, a, b));
        for record in &records {
            writeln!(out, "{}", self.rewrite_record(record)).map_err(write_err)?;
        }
        out.flush().map_err(write_err)?;
        Ok(summary)
    }

    fn rewrite_directive(&self, line: &str) -> String {
        let Some(rest) = line.strip_prefix(SEQUENCE_REGION) else {
            return line.to_string();
        };
        let body = rest.trim_start();
        let gap = &rest[..rest.len() - body.len()];
        if gap.is_empty() || body.is_empty() {
            return line.to_string();
        }
        let (seqid, tail) = match body.find(char::is_whitespace) {
            Some(index) => body.split_at(index),
            None => (body, ""),
        };
        format!(
            "{SEQUENCE_REGION}{gap}{}{tail}",
            self.prefix.assembly().apply(seqid)
        )
    }

    fn rewrite_record(&self, record: &Gff3Record) -> String {
        let mut fields = record.fields.clone();
        fields[0] = self.prefix.assembly().apply(record.seqid()).into_owned();
        fields[8] = self.rewrite_attributes(&record.fields[8]);
        fields.join("\t")
    }

    /// Keys are matched the same way `attribute` matches them, so whitespace
    /// after a `;` is kept but does not hide the key.
    fn rewrite_attributes(&self, attributes: &str) -> String {
        attributes
            .split(';')
            .map(|pair| {
                let Some((key, value)) = pair.split_once('=') else {
                    return pair.to_string();
                };
                let name = key.trim_start();
                let indent = &key[..key.len() - name.len()];
                let value = match name {
                    "ID" => self.prefix.apply(value).into_owned(),
                    "Parent" => value
                        .split(',')
                        .map(|parent| self.prefix.apply(parent))
                        .collect::<Vec<_>>()
                        .join(","),
                    "Name" if self.prefix_names => self.prefix.apply(value).into_owned(),
                    _ => return pair.to_string(),
                };
                format!("{indent}{name}={value}")
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

fn parse_record(path: &Path, line: usize, text: &str) -> Result<Gff3Record, DatastoreError> {
    let fields: Vec<String> = text.split('\t').map(str::to_string).collect();
    if fields.len() < 9 {
        return Err(DatastoreError::MalformedRecord {
            path: path.to_path_buf(),
            line,
            reason: format!("expected 9 tab-delimited columns, found {}", fields.len()),
        });
    }
    let start = fields[3].trim().parse::<u64>().map_err(|_| DatastoreError::MalformedRecord {
        path: path.to_path_buf(),
        line,
        reason: format!("start coordinate {:?} is not an integer", fields[3]),
    })?;
    let parent_ids = attribute(&fields[8], "Parent")
        .map(|value| value.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    Ok(Gff3Record {
        line,
        fields,
        start,
        parent_ids,
    })
}

/// Value of the first `key=value` pair in a `;`-delimited attribute column.
pub fn attribute<'a>(attributes: &'a str, key: &str) -> Option<&'a str> {
    attributes
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim_start() == key)
        .map(|(_, value)| value)
}

fn build_hierarchy(
    path: &Path,
    records: &[Gff3Record],
    feature_types: &HashMap<String, String>,
) -> Result<FeatureHierarchy, DatastoreError> {
    let mut hierarchy = FeatureHierarchy::new();
    for record in records {
        let mut parent_types = BTreeSet::new();
        for parent_id in &record.parent_ids {
            let parent_type =
                feature_types
                    .get(parent_id)
                    .ok_or_else(|| DatastoreError::UnknownParent {
                        path: path.to_path_buf(),
                        line: record.line,
                        id: parent_id.clone(),
                    })?;
            parent_types.insert(parent_type.as_str());
        }
        let parent_types = parent_types.into_iter().collect::<Vec<_>>();
        hierarchy.register(record.feature_type(), &parent_types);
    }
    hierarchy
        .resolve_ranks()
        .map_err(|types| DatastoreError::UnrankedFeatureTypes {
            path: path.to_path_buf(),
            types,
        })?;
    Ok(hierarchy)
}

fn compare_records(hierarchy: &FeatureHierarchy, a: &Gff3Record, b: &Gff3Record) -> Ordering {
    let rank = |record: &Gff3Record| hierarchy.rank_of(record.feature_type()).unwrap_or(UNRANKED);
    a.seqid()
        .cmp(b.seqid())
        .then(a.start.cmp(&b.start))
        .then_with(|| rank(a).cmp(&rank(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssemblyPrefix;

    fn normalizer() -> Gff3Normalizer {
        let assembly = AssemblyPrefix::new("glyma", "Wm82", 2).unwrap();
        Gff3Normalizer::new(AnnotationPrefix::new(assembly, 1, "FCtY"))
    }

    #[test]
    fn attribute_lookup() {
        let attrs = "ID=mrna1;Parent=gene1,gene2;Name=Foo";
        assert_eq!(attribute(attrs, "ID"), Some("mrna1"));
        assert_eq!(attribute(attrs, "Parent"), Some("gene1,gene2"));
        assert_eq!(attribute(attrs, "Note"), None);
    }

    #[test]
    fn attributes_keep_order_and_multiplicity() {
        let rewritten = normalizer().rewrite_attributes("ID=e1;Parent=m1,m2,m1;Name=E1;Note=x=y;");
        assert_eq!(
            rewritten,
            "ID=glyma.Wm82.gnm2.ann1.FCtY.e1;Parent=glyma.Wm82.gnm2.ann1.FCtY.m1,glyma.Wm82.gnm2.ann1.FCtY.m2,glyma.Wm82.gnm2.ann1.FCtY.m1;Name=E1;Note=x=y;"
        );
    }

    #[test]
    fn spaced_attribute_keys_are_rewritten() {
        let normalizer = normalizer().with_prefix_names(true);
        assert_eq!(
            normalizer.rewrite_attributes("ID=m1; Parent=g1;  Name=M1; Note=a b"),
            "ID=glyma.Wm82.gnm2.ann1.FCtY.m1; Parent=glyma.Wm82.gnm2.ann1.FCtY.g1;  Name=glyma.Wm82.gnm2.ann1.FCtY.M1; Note=a b"
        );
    }

    #[test]
    fn names_only_prefixed_on_request() {
        let normalizer = normalizer().with_prefix_names(true);
        assert_eq!(
            normalizer.rewrite_attributes("ID=g1;Name=G1"),
            "ID=glyma.Wm82.gnm2.ann1.FCtY.g1;Name=glyma.Wm82.gnm2.ann1.FCtY.G1"
        );
    }

    #[test]
    fn sequence_region_directive() {
        let normalizer = normalizer();
        assert_eq!(
            normalizer.rewrite_directive("##sequence-region   Chr01 1 5000"),
            "##sequence-region   glyma.Wm82.gnm2.Chr01 1 5000"
        );
        assert_eq!(
            normalizer.rewrite_directive("##sequence-region glyma.Wm82.gnm2.Chr01 1 5000"),
            "##sequence-region glyma.Wm82.gnm2.Chr01 1 5000"
        );
        assert_eq!(normalizer.rewrite_directive("##gff-version 3"), "##gff-version 3");
    }
}
