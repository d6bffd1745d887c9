use std::fs;
use std::path::PathBuf;

use assert_matches::assert_matches;

use datastore_lint::config::ConfigLoader;
use datastore_lint::error::DatastoreError;

#[test]
fn explicit_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ds-lint.json");
    fs::write(
        &path,
        r#"{
  "schema_version": 1,
  "tools": { "gt": "/opt/genometools/bin" },
  "checks": { "verify_checksums": false, "check_dois": true },
  "normalize": { "enabled": true, "prefix_names": true, "output_dir": "/data/normalized" }
}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.source.as_deref(), Some(path.as_path()));
    assert_eq!(resolved.tools.gt, Some(PathBuf::from("/opt/genometools/bin")));
    assert_eq!(resolved.tools.bgzip, None);
    assert!(!resolved.verify_checksums);
    assert!(resolved.check_dois);
    assert!(resolved.gff3_validator);

    let options = resolved.run_options();
    assert!(options.normalize);
    assert!(options.prefix_names);
    assert_eq!(options.output_dir, PathBuf::from("/data/normalized"));
}

#[test]
fn explicit_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");
    assert_matches!(
        ConfigLoader::resolve(Some(path.to_str().unwrap())),
        Err(DatastoreError::ConfigRead(_))
    );
}

#[test]
fn malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ds-lint.json");
    fs::write(&path, r#"{"checks": {"verify_checksums": "yes"}}"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve(Some(path.to_str().unwrap())),
        Err(DatastoreError::ConfigParse(_))
    );
}
