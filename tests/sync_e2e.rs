//! End-to-end sync tests: mock upstream, real store, real read path.

mod helper;

use std::sync::Arc;
use std::time::Duration;

use mockito::Server;
use serde_json::json;
use tempfile::TempDir;

use helper::{package_archive, supported_manifest};
use package_mirror::config::SyncConfig;
use package_mirror::data::package::PackageName;
use package_mirror::data::version::Version;
use package_mirror::registry::index::RegistryIndex;
use package_mirror::registry::repository::Repository;
use package_mirror::registry::store::{FsStore, ObjectStore};
use package_mirror::registry::upstream::HttpUpstream;
use package_mirror::sync::{SyncOrchestrator, SyncReport};

fn directory_body() -> String {
    json!([
        {"name": "elm-lang/core", "versions": ["5.0.0"]},
        {"name": "user/widget", "versions": ["1.0.0"]},
    ])
    .to_string()
}

async fn mock_directory(server: &mut Server, expected_hits: usize) -> mockito::Mock {
    server
        .mock("GET", "/all-packages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(directory_body())
        .expect(expected_hits)
        .create_async()
        .await
}

async fn mock_archive(
    server: &mut Server,
    namespace: &str,
    name: &str,
    version: &str,
) -> mockito::Mock {
    server
        .mock(
            "GET",
            format!("/{namespace}/{name}/archive/{version}.zip").as_str(),
        )
        .with_status(200)
        .with_body(package_archive(
            name,
            version,
            &supported_manifest(),
            &[("src/Main.elm", "module Main exposing (..)")],
        ))
        .expect(1)
        .create_async()
        .await
}

fn config_for(server: &Server, trusted: Vec<String>, compiler: std::path::PathBuf) -> SyncConfig {
    SyncConfig {
        upstream_base_url: server.url(),
        archive_base_url: server.url(),
        trusted_namespaces: trusted,
        compiler_path: compiler,
        batch_size: 4,
    }
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn full_pass_harvests_compiles_and_serves_lookups() {
    let mut server = Server::new_async().await;
    let directory = mock_directory(&mut server, 1).await;
    let core_archive = mock_archive(&mut server, "elm-lang", "core", "5.0.0").await;
    let widget_archive = mock_archive(&mut server, "user", "widget", "1.0.0").await;

    let scratch = TempDir::new().unwrap();
    let compiler = helper::fake_compiler(scratch.path(), "elm-lang", "core", "5.0.0");
    let config = config_for(&server, vec!["elm-lang".to_string()], compiler);

    let store = Arc::new(FsStore::new(scratch.path().join("store")));
    let repository = Arc::new(Repository::new(Arc::clone(&store)));
    let upstream = Arc::new(HttpUpstream::new(
        &config.upstream_base_url,
        &config.archive_base_url,
    ));

    let report = SyncOrchestrator::new(Arc::clone(&repository), upstream, &config)
        .run()
        .await
        .unwrap();

    directory.assert_async().await;
    core_archive.assert_async().await;
    widget_archive.assert_async().await;
    assert_eq!(
        report,
        SyncReport {
            attempted: 2,
            succeeded: 2,
            failed: 0
        }
    );

    // The harvested blobs landed under their deterministic keys.
    let searchable = repository.searchable_packages().await.unwrap();
    assert_eq!(searchable.len(), 2);
    let core = &searchable[0];
    assert_eq!(core.to_string(), "elm-lang/core@5.0.0");
    assert!(
        store
            .head("package-artifacts/elm-lang/core/5.0.0/manifest.json")
            .await
            .unwrap()
    );
    assert!(
        store
            .head("package-artifacts/elm-lang/core/5.0.0/source.json")
            .await
            .unwrap()
    );

    // Only the trusted namespace was compiled, and its binary artifact is
    // base64-encoded.
    let artifacts: serde_json::Value = serde_json::from_slice(
        &store
            .get("package-artifacts/elm-lang/core/5.0.0/artifacts/0.18.0.json")
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(artifacts["Main.elmo"], "var out = 1;");
    assert_eq!(artifacts["Main.elmi"], "aWZhY2U=");
    assert!(
        !store
            .head("package-artifacts/user/widget/1.0.0/artifacts/0.18.0.json")
            .await
            .unwrap()
    );

    // The read path serves what the pass persisted.
    let index = RegistryIndex::init(Arc::clone(&repository)).await.unwrap();
    let versions = index
        .versions_for(&PackageName::new("elm-lang", "core"), Version::new(0, 18, 0))
        .await;
    assert_eq!(versions, vec![Version::new(5, 0, 0)]);

    let results = index.search(Version::new(0, 18, 0), "elm-lang/").await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name.to_string(), "elm-lang/core");
}

#[tokio::test(flavor = "multi_thread")]
async fn a_second_pass_downloads_no_archives() {
    let mut server = Server::new_async().await;
    let directory = mock_directory(&mut server, 2).await;
    // Each archive is served exactly once; a second download would fail the
    // mock's expectation.
    let core_archive = mock_archive(&mut server, "elm-lang", "core", "5.0.0").await;
    let widget_archive = mock_archive(&mut server, "user", "widget", "1.0.0").await;

    let scratch = TempDir::new().unwrap();
    // No trusted namespaces, so the compiler binary is never spawned.
    let config = config_for(&server, vec![], "unused-compiler".into());

    let store = Arc::new(FsStore::new(scratch.path().join("store")));
    let repository = Arc::new(Repository::new(Arc::clone(&store)));
    let upstream = Arc::new(HttpUpstream::new(
        &config.upstream_base_url,
        &config.archive_base_url,
    ));
    let orchestrator = SyncOrchestrator::new(Arc::clone(&repository), upstream, &config);

    let first = orchestrator.run().await.unwrap();
    assert_eq!(first.attempted, 2);

    let second = orchestrator.run().await.unwrap();
    assert_eq!(
        second,
        SyncReport {
            attempted: 0,
            succeeded: 0,
            failed: 0
        }
    );

    directory.assert_async().await;
    core_archive.assert_async().await;
    widget_archive.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_read_path_picks_up_a_new_pass() {
    let mut server = Server::new_async().await;
    let _directory = mock_directory(&mut server, 1).await;
    let _core_archive = mock_archive(&mut server, "elm-lang", "core", "5.0.0").await;
    let _widget_archive = mock_archive(&mut server, "user", "widget", "1.0.0").await;

    let scratch = TempDir::new().unwrap();
    let config = config_for(&server, vec![], "unused-compiler".into());

    let store = Arc::new(FsStore::new(scratch.path().join("store")));
    let repository = Arc::new(Repository::new(Arc::clone(&store)));

    // The index starts over an empty store, before any pass has run.
    let index = RegistryIndex::init_with_ttl(Arc::clone(&repository), Duration::ZERO)
        .await
        .unwrap();
    assert!(
        index
            .versions_for(&PackageName::new("elm-lang", "core"), Version::new(0, 18, 0))
            .await
            .is_empty()
    );

    let upstream = Arc::new(HttpUpstream::new(
        &config.upstream_base_url,
        &config.archive_base_url,
    ));
    SyncOrchestrator::new(Arc::clone(&repository), upstream, &config)
        .run()
        .await
        .unwrap();

    // Past its TTL, the next lookup rebuilds from the refreshed corpus.
    let versions = index
        .versions_for(&PackageName::new("elm-lang", "core"), Version::new(0, 18, 0))
        .await;
    assert_eq!(versions, vec![Version::new(5, 0, 0)]);
}
