mod common;

use datastore_lint::doi::{DoiField, check_readme};

use common::{MockDoi, write_plain};

#[test]
fn readme_lookups_never_fail_the_check() {
    let dir = tempfile::tempdir().unwrap();
    let readme = write_plain(
        &dir.path().join("README.Wm82.gnm2.FCtY.yml"),
        "\
scientific_name: Glycine max
publication_doi: 10.1038/nature08670
dataset_doi: 10.5555/offline
genbank_accession: none
",
    );
    let client = MockDoi::resolving(&["10.1038/nature08670"]);

    let check = check_readme(&readme, &client).unwrap();
    assert_eq!(*client.calls.lock().unwrap(), 2);
    assert_eq!(check.checks.len(), 2);
    assert_eq!(check.checks[0].field, DoiField::Publication);
    assert!(check.checks[0].resolved);
    assert_eq!(check.checks[0].response_code, Some(1));
    assert_eq!(check.checks[1].field, DoiField::Dataset);
    assert!(!check.checks[1].resolved);
    assert!(check.checks[1].error.is_some());
    assert!(!check.passed());
    assert_eq!(check.findings[0].line, Some(3));
}

#[test]
fn none_values_are_not_looked_up() {
    let dir = tempfile::tempdir().unwrap();
    let readme = write_plain(
        &dir.path().join("README.md"),
        "publication_doi: NONE\ndataset_doi: 'none'\n",
    );
    let client = MockDoi::default();

    let check = check_readme(&readme, &client).unwrap();
    assert!(check.checks.is_empty());
    assert!(check.passed());
    assert_eq!(*client.calls.lock().unwrap(), 0);
}
