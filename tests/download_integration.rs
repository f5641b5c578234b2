//! Integration tests for direct file downloads from the archive web server.

#![allow(clippy::unwrap_used)]

use applause_query::{FileDownloader, TapError};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGBOOK_PATH: &str = "DR3/logbooks/POT050/POT050-OB1-000390-000392.jpg";

async fn setup_mock_file(path_str: &str, content: &[u8]) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(&mock_server)
        .await;

    mock_server
}

#[tokio::test]
async fn test_download_preserves_content() {
    let content = b"\xff\xd8\xff\xe0 not really a jpeg but binary enough";
    let server = setup_mock_file(&format!("/files/{LOGBOOK_PATH}"), content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let downloader =
        FileDownloader::with_base_url(&format!("{}/files/", server.uri())).unwrap();
    let target = temp_dir.path().join("logbook-page.jpg");
    let saved = downloader
        .download(LOGBOOK_PATH, Some(&target))
        .await
        .expect("download should succeed");

    assert_eq!(saved, target);
    let on_disk = std::fs::read(&saved).expect("should read file");
    assert_eq!(on_disk, content, "downloaded content should match original");
}

#[tokio::test]
async fn test_download_explicit_filename_used_verbatim() {
    let server = setup_mock_file(&format!("/files/{LOGBOOK_PATH}"), b"scan").await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let downloader =
        FileDownloader::with_base_url(&format!("{}/files/", server.uri())).unwrap();
    let target = temp_dir.path().join("my-own-name.jpeg");
    let saved = downloader.download(LOGBOOK_PATH, Some(&target)).await.unwrap();

    assert_eq!(
        saved.file_name().unwrap().to_str().unwrap(),
        "my-own-name.jpeg"
    );
    assert!(saved.exists());
}

#[tokio::test]
async fn test_download_missing_path_propagates_status() {
    let server = MockServer::start().await;

    let downloader =
        FileDownloader::with_base_url(&format!("{}/files/", server.uri())).unwrap();
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let result = downloader
        .download(
            "DR3/logbooks/NOPE/missing.jpg",
            Some(&temp_dir.path().join("missing.jpg")),
        )
        .await;

    match result {
        Err(TapError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected TapError::Status, got {other:?}"),
    }
}
