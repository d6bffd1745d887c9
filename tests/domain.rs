use assert_matches::assert_matches;

use datastore_lint::domain::{
    AnnotationName, CanonicalType, Doi, FileAttributes, GenomeName, NamingRule,
};
use datastore_lint::error::DatastoreError;

#[test]
fn genome_name_fields() {
    let name = GenomeName::parse("glyma.Wm82.gnm2.FCtY.genome_main.fna.gz").unwrap();
    assert_eq!(name.assembly().prefix(), "glyma");
    assert_eq!(name.assembly().infra_id(), "Wm82");
    assert_eq!(name.assembly().gnm(), 2);
    assert_eq!(name.key(), "FCtY");
    assert_eq!(name.header_prefix(), "glyma.Wm82.gnm2");

    let attrs = FileAttributes::from_file_name("glyma.Wm82.gnm2.FCtY.genome_main.fna.gz");
    assert_eq!(attrs.len(), 7);
    assert_eq!(attrs.canonical_type().unwrap(), CanonicalType::GenomeMain);
}

#[test]
fn short_genome_name_fails_on_field_count() {
    let err = GenomeName::parse("ABCDE.Foo.gnm1.fna.gz").unwrap_err();
    assert_matches!(
        err,
        DatastoreError::Naming {
            rule: NamingRule::FieldCount {
                expected: 7,
                actual: 5
            },
            ..
        }
    );
}

#[test]
fn four_character_prefix() {
    let err = GenomeName::parse("glym.Wm82.gnm2.FCtY.genome_main.fna.gz").unwrap_err();
    assert_matches!(
        err,
        DatastoreError::Naming {
            rule: NamingRule::PrefixLength { ref prefix },
            ..
        } if prefix == "glym"
    );
}

#[test]
fn non_integer_versions() {
    assert_matches!(
        GenomeName::parse("glyma.Wm82.gnmX.FCtY.genome_main.fna.gz"),
        Err(DatastoreError::Naming {
            rule: NamingRule::NonIntegerVersion { marker: "gnm", .. },
            ..
        })
    );
    assert_matches!(
        GenomeName::parse("glyma.Wm82.v2.FCtY.genome_main.fna.gz"),
        Err(DatastoreError::Naming {
            rule: NamingRule::VersionMarker { expected: "gnm", .. },
            ..
        })
    );
    assert_matches!(
        AnnotationName::parse("glyma.Wm82.gnm2.ann-1.FCtY.gene_models_main.gff3.gz"),
        Err(DatastoreError::Naming {
            rule: NamingRule::NonIntegerVersion { marker: "ann", .. },
            ..
        })
    );
}

#[test]
fn fasta_suffix_instead_of_fna() {
    let err = GenomeName::parse("glyma.Wm82.gnm2.FCtY.genome_main.fasta.gz").unwrap_err();
    assert_matches!(
        err,
        DatastoreError::Naming {
            rule: NamingRule::Extension {
                expected: "fna",
                ref found
            },
            ..
        } if found == "fasta"
    );
}

#[test]
fn uncompressed_and_wrong_type() {
    assert_matches!(
        GenomeName::parse("glyma.Wm82.gnm2.FCtY.genome_main.fna.zip"),
        Err(DatastoreError::Naming {
            rule: NamingRule::Compression { .. },
            ..
        })
    );
    assert_matches!(
        GenomeName::parse("glyma.Wm82.gnm2.FCtY.genome_alt.fna.gz"),
        Err(DatastoreError::Naming {
            rule: NamingRule::CanonicalType { .. },
            ..
        })
    );
}

#[test]
fn annotation_name_prefixes() {
    let name = AnnotationName::parse("glyma.Wm82.gnm2.ann1.FCtY.gene_models_main.gff3.gz").unwrap();
    assert_eq!(name.id_prefix(), "glyma.Wm82.gnm2.ann1");
    assert_eq!(name.name_prefix(), "glyma");
    assert_eq!(name.annotation().to_string(), "glyma.Wm82.gnm2.ann1.FCtY");
    assert_eq!(name.annotation().apply("g1"), "glyma.Wm82.gnm2.ann1.FCtY.g1");

    assert_matches!(
        AnnotationName::parse("glyma.Wm82.gnm2.ann1.FCtY.gene_models_main.gff.gz"),
        Err(DatastoreError::Naming {
            rule: NamingRule::Extension { expected: "gff3", .. },
            ..
        })
    );
    assert_matches!(
        AnnotationName::parse("glyma.Wm82.gnm2.FCtY.gene_models_main.gff3.gz"),
        Err(DatastoreError::Naming {
            rule: NamingRule::FieldCount {
                expected: 8,
                actual: 7
            },
            ..
        })
    );
}

#[test]
fn canonical_type_registry() {
    let attrs = FileAttributes::from_file_name("glyma.Wm82.gnm2.FCtY.protein.faa.gz");
    assert_matches!(attrs.canonical_type(), Err(DatastoreError::UnsupportedType(ref t)) if t == "protein");
    assert_matches!(
        FileAttributes::from_file_name("x.gz").canonical_type(),
        Err(DatastoreError::UnsupportedType(_))
    );
    assert_eq!(
        CanonicalType::GeneModelsMain.parent(),
        Some(CanonicalType::GenomeMain)
    );
    assert_eq!(CanonicalType::GenomeMain.parent(), None);
}

#[test]
fn doi_forms() {
    let doi: Doi = "https://doi.org/10.1038/nature08670".parse().unwrap();
    assert_eq!(doi.as_str(), "10.1038/nature08670");
    let doi: Doi = "doi:10.1104/pp.19.00123".parse().unwrap();
    assert_eq!(doi.as_str(), "10.1104/pp.19.00123");
    assert_matches!("11.1/x".parse::<Doi>(), Err(DatastoreError::InvalidDoi(_)));
}
