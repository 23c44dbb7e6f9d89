use std::io::Write;

use ido_config::{Config, ConfigLoader};

#[test]
fn loads_overrides_and_keeps_section_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).expect("create config");
    write!(
        file,
        r#"
language = "zh"

[database]
path = "/tmp/ido-test/custom.db"

[image_optimization]
phash_threshold = 0.95
max_images = 4

[session]
aggregation_interval = 600

[cleanup]
retention_days = 7
"#
    )
    .expect("write config");

    let config = ConfigLoader::load_from(&path).expect("load");

    assert_eq!(config.language, "zh");
    assert_eq!(
        config.database_path().to_string_lossy(),
        "/tmp/ido-test/custom.db"
    );
    assert_eq!(config.image_optimization.phash_threshold, 0.95);
    assert_eq!(config.image_optimization.max_images, 4);
    // Untouched keys in a touched section keep their defaults.
    assert_eq!(config.image_optimization.min_interval, 2.0);
    assert_eq!(config.session.aggregation_interval, 600);
    assert_eq!(config.session.merge_similarity_threshold, 0.6);
    assert_eq!(config.cleanup.retention_days, 7);
    assert_eq!(config.cleanup.cleanup_interval, 86_400);
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let loader = ConfigLoader::with_path(dir.path().join("absent.toml"));
    let config = loader.load().expect("defaults");
    assert_eq!(config, Config::default());
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "session = \"not a table\"").expect("write");
    assert!(ConfigLoader::load_from(&path).is_err());
}
