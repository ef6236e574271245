//! A scope persisted to disk survives being reopened.

use cvc_sdk::{ComponentId, FileMap, Scope, ScopeConfig, TagParams};
use tempfile::TempDir;

fn comp(name: &str) -> ComponentId {
    ComponentId::parse(name).unwrap()
}

fn files(content: &str) -> FileMap {
    [("index.ts".to_string(), content.as_bytes().to_vec())].into()
}

#[tokio::test]
async fn reopened_scope_keeps_versions_lanes_and_head() {
    let dir = TempDir::new().unwrap();
    let config = ScopeConfig {
        lane_history: true,
        ..ScopeConfig::at(dir.path())
    };
    {
        let mut scope = Scope::open(config.clone()).unwrap();
        scope.add(comp("ui/button"), files("one")).unwrap();
        scope.tag(&TagParams::default()).await.unwrap();
        scope.create_lane("stage", Some("start")).unwrap();
    }
    assert!(dir.path().join("refs.json").exists());
    assert!(dir.path().join("objects").is_dir());

    let scope = Scope::open(config).unwrap();
    assert_eq!(scope.current_head().unwrap().name(), "stage");
    assert_eq!(scope.lane_history("stage").unwrap().len(), 1);
    let listing = scope.list_components(None).unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].latest_tag.as_ref().unwrap().to_string(), "0.0.1");
    assert_eq!(
        scope.workspace().get(&comp("ui/button")).unwrap().files["index.ts"],
        b"one"
    );
}

#[test]
fn scope_config_file_points_at_its_directory() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("cvc.toml");
    std::fs::write(&config_path, "name = \"org.design\"\npath = \"store\"\n").unwrap();

    let config = ScopeConfig::load(&config_path).unwrap();
    assert_eq!(config.path.as_deref(), Some(dir.path().join("store").as_path()));

    let scope = Scope::open(config).unwrap();
    assert_eq!(scope.name(), "org.design");
    assert!(dir.path().join("store").join("objects").is_dir());
}
