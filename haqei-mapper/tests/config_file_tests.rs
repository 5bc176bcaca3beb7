//! Configuration files and reference data files on disk

use std::sync::Arc;

use serial_test::serial;

use haqei_common::config::{load_or_default, parse_toml_config, CONFIG_FILE_ENV};
use haqei_mapper::config::MapperConfig;
use haqei_mapper::error::MapperError;
use haqei_mapper::reference::ReferenceTable;
use haqei_mapper::MappingService;

const EXAMPLE: &str = include_str!("../haqei-mapper.example.toml");

#[test]
fn test_example_config_matches_defaults() {
    let example: MapperConfig = parse_toml_config(EXAMPLE).unwrap();
    let defaults = MapperConfig::default();

    assert_eq!(example.mapper.seed.as_deref(), Some("change-me"));
    assert_eq!(example.scoring, defaults.scoring);
    assert_eq!(example.cache, defaults.cache);
    assert_eq!(example.fallback, defaults.fallback);
    assert_eq!(example.common.server.port, 5780);
    assert!(example.validate().is_ok());
}

#[test]
#[serial]
fn test_explicit_config_path_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("haqei-mapper.toml");
    std::fs::write(&path, "[mapper]\nseed = \"from-file\"\n\n[server]\nport = 6001\n").unwrap();

    let (config, found): (MapperConfig, _) = load_or_default(Some(&path), "haqei-mapper").unwrap();
    assert_eq!(found.as_deref(), Some(path.as_path()));
    assert_eq!(config.mapper.seed.as_deref(), Some("from-file"));
    assert_eq!(config.common.server.port, 6001);
}

#[test]
#[serial]
fn test_config_env_var_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[cache]\nhot_capacity = 7\n").unwrap();

    std::env::set_var(CONFIG_FILE_ENV, &path);
    let loaded = load_or_default::<MapperConfig>(None, "haqei-mapper");
    std::env::remove_var(CONFIG_FILE_ENV);

    let (config, _) = loaded.unwrap();
    assert_eq!(config.cache.hot_capacity, 7);
}

#[tokio::test]
async fn test_reference_file_round_trip_drives_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.json");

    let mut config = MapperConfig::default();
    config.mapper.seed = Some("file-seed".to_string());
    let builtin = ReferenceTable::builtin(&config.scoring).unwrap();
    std::fs::write(&path, builtin.to_json_pretty().unwrap()).unwrap();

    let from_builtin = MappingService::builder(config.clone())
        .reference_table(Arc::new(builtin))
        .build()
        .unwrap();
    config.mapper.reference_data = Some(path);
    let from_file = MappingService::builder(config).build().unwrap();

    for text in ["新しい挑戦", "家族の調和", "完成"] {
        assert_eq!(
            from_builtin.map_text(text).await.line_id(),
            from_file.map_text(text).await.line_id()
        );
    }
}

#[test]
fn test_truncated_reference_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.json");
    std::fs::write(&path, "{\"lines\": []}").unwrap();

    let mut config = MapperConfig::default();
    config.mapper.seed = Some("seed".to_string());
    config.mapper.reference_data = Some(path);

    let result = MappingService::builder(config).build();
    assert!(matches!(result, Err(MapperError::Configuration(_))));
}
