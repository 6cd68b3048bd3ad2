//! HTTP surface tests: JSON snapshot, failure mapping, event stream upgrade.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures::StreamExt;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use story_indexer::{
    create_router, AppState, ChangeNotifier, CsfExtractor, IndexBuilder, InvalidationCache,
    Specifier, SpecifierWalker, INDEX_VERSION,
};

fn create_file(dir: &Path, name: &str, content: &str) {
    let mut file = File::create(dir.join(name)).unwrap();
    file.write_all(content.as_bytes()).unwrap();
}

fn state_for(root: &Path) -> AppState {
    let walker = SpecifierWalker::new(vec![Specifier::new(root)]).unwrap();
    let builder = IndexBuilder::new(walker, Arc::new(CsfExtractor::new(root)));
    let notifier = ChangeNotifier::new();
    let cache = InvalidationCache::new(builder, notifier.clone());
    AppState { cache, notifier }
}

#[tokio::test]
async fn test_index_json_returns_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    create_file(
        temp_dir.path(),
        "button.stories.ts",
        "export default { title: 'Button' };\nexport const Primary = () => null;\n",
    );

    let response = create_router(state_for(temp_dir.path()))
        .oneshot(
            Request::builder()
                .uri("/index.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["v"], INDEX_VERSION);
    assert_eq!(
        json["entries"]["button--primary"]["importPath"],
        "./button.stories.ts"
    );
}

#[tokio::test]
async fn test_index_json_maps_build_failure_to_500() {
    let response = create_router(state_for(Path::new("/nonexistent/stories-root")))
        .oneshot(
            Request::builder()
                .uri("/index.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let message = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(message.contains("Specifier root not found"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let temp_dir = TempDir::new().unwrap();

    let response = create_router(state_for(temp_dir.path()))
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_event_stream_upgrade_and_invalidate_frame() {
    let temp_dir = TempDir::new().unwrap();
    let state = state_for(temp_dir.path());
    let notifier = state.notifier.clone();

    let response = create_router(state)
        .oneshot(
            Request::builder()
                .uri("/index.json")
                .header(header::ACCEPT, "text/event-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    // no index payload is pushed on connect; the first frame arrives once
    // the notifier fires
    let mut body = response.into_body().into_data_stream();
    notifier.emit();

    let frame = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("no event frame within timeout")
        .expect("stream ended unexpectedly")
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: invalidate"));
}
