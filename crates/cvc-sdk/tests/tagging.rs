//! Tagging flows through the public scope API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cvc_model::LogEntry;
use cvc_sdk::{
    BuildOptions, BuildPipeline, BuildResult, ComponentId, ErrorKind, FileMap, Scope, ScopeConfig,
    SemVer, StaticResolver, TagParams,
};
use cvc_snap::SnapResult;
use cvc_sources::{SourceInput, SourceRepository};
use proptest::prelude::*;

fn comp(name: &str) -> ComponentId {
    ComponentId::parse(name).unwrap()
}

fn files(content: &[u8]) -> FileMap {
    [("index.ts".to_string(), content.to_vec())].into()
}

fn scope() -> Scope {
    Scope::in_memory(ScopeConfig::default()).unwrap()
}

fn tag_ids(ids: &[&str]) -> TagParams {
    let mut params = TagParams::default();
    params.options.ids = ids.iter().map(|n| comp(n)).collect();
    params
}

/// Moves a component's main head once, while the build runs.
struct RacingPipeline {
    sources: SourceRepository,
    component: ComponentId,
    fired: AtomicBool,
}

#[async_trait]
impl BuildPipeline for RacingPipeline {
    async fn run_build(&self, _: &[ComponentId], _: &BuildOptions) -> SnapResult<BuildResult> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            self.sources.add_source(SourceInput {
                id: self.component.clone(),
                files: files(b"racing change"),
                log: LogEntry::new("race", "other"),
            })?;
        }
        Ok(BuildResult::succeeded())
    }
}

// ---------------------------------------------------------------
// Content addressing
// ---------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn equal_bytes_share_one_source(content in proptest::collection::vec(any::<u8>(), 0..256)) {
        let scope = scope();
        let a = scope.sources().add_source(SourceInput {
            id: comp("ui/a"),
            files: files(&content),
            log: LogEntry::new("a", "test"),
        }).unwrap();
        let b = scope.sources().add_source(SourceInput {
            id: comp("ui/b"),
            files: files(&content),
            log: LogEntry::new("b", "test"),
        }).unwrap();

        prop_assert_eq!(a.version.files["index.ts"], b.version.files["index.ts"]);
        prop_assert_ne!(a.version_id, b.version_id);
        let stored = scope.sources().load_source(&a.version.files["index.ts"]).unwrap();
        prop_assert_eq!(stored.content(), &content[..]);
    }
}

#[tokio::test]
async fn stored_versions_rehash_to_their_id() {
    let mut scope = scope();
    let id = comp("ui/button");
    scope.add(id.clone(), files(b"one")).unwrap();
    scope.tag(&TagParams::default()).await.unwrap();
    scope.write_file(&id, "index.ts", "two").unwrap();
    scope.tag(&TagParams::default()).await.unwrap();

    for entry in scope.log(&id).unwrap() {
        let version = scope.sources().load_version(&entry.id).unwrap();
        assert_eq!(version.id().unwrap(), entry.id);
        let reencoded = version.to_stored_object().unwrap();
        assert_eq!(reencoded.compute_id(), entry.id);
    }
}

// ---------------------------------------------------------------
// Selection
// ---------------------------------------------------------------

#[tokio::test]
async fn retagging_unchanged_component_is_nothing_to_tag() {
    let mut scope = scope();
    scope.add(comp("ui/button"), files(b"one")).unwrap();
    let params = TagParams {
        ver: Some("1.0.0".to_string()),
        ..Default::default()
    };
    let first = scope.tag(&params).await.unwrap();
    assert_eq!(first.tagged[0].label, "1.0.0");

    let err = scope.tag(&params).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NothingToTag);
}

#[tokio::test]
async fn tagging_a_dependency_auto_tags_exactly_its_dependent() {
    let resolver = Arc::new(StaticResolver::new());
    resolver.add_dependency(&comp("a"), "b", "+");
    let mut scope = scope().with_resolver(resolver);
    scope.add(comp("a"), files(b"a")).unwrap();
    scope.add(comp("b"), files(b"b")).unwrap();
    scope.add(comp("c"), files(b"c")).unwrap();
    scope.tag(&TagParams::default()).await.unwrap();

    scope.write_file(&comp("b"), "index.ts", "b2").unwrap();
    let results = scope.tag(&tag_ids(&["b"])).await.unwrap();
    assert_eq!(results.tagged_ids(), vec![&comp("b")]);
    assert_eq!(results.auto_tagged_ids(), vec![&comp("a")]);

    let a = scope.show(&comp("a"), None).unwrap();
    assert_eq!(a.version.tag, Some(SemVer::new(0, 0, 2)));
    assert_eq!(a.version.dependencies[0].version, "0.0.2");
    let c = scope.show(&comp("c"), None).unwrap();
    assert_eq!(c.label, "0.0.1");
}

// ---------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------

#[tokio::test]
async fn racing_tag_fails_then_retry_succeeds() {
    let base = scope();
    let racing = Arc::new(RacingPipeline {
        sources: base.sources().clone(),
        component: comp("comp1"),
        fired: AtomicBool::new(false),
    });
    let mut scope = base.with_pipeline(racing);

    scope.add(comp("comp1"), files(b"a")).unwrap();
    let mut params = TagParams::default();
    params.options.build = Some(false);
    scope.tag(&params).await.unwrap();
    let before = scope.log(&comp("comp1")).unwrap();

    scope.write_file(&comp("comp1"), "index.ts", "b").unwrap();
    params.options.build = Some(true);
    let err = scope.tag(&params).await.unwrap_err();
    assert!(err.is_concurrent_modification());

    let raced = scope.log(&comp("comp1")).unwrap();
    assert_eq!(raced.len(), before.len() + 1);
    assert_eq!(raced[0].message, "race");

    let results = scope.tag(&params).await.unwrap();
    assert_eq!(results.tagged[0].label, "0.0.2");
    assert_eq!(scope.log(&comp("comp1")).unwrap()[0].sequence, 3);
}
