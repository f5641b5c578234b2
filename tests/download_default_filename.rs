//! Default-filename behavior of direct file downloads.
//!
//! With no explicit output filename the file lands under the path's basename
//! in the current directory, as in the archive's reference client. Because
//! that requires changing the process working directory, this test lives in
//! its own binary (tests in one binary share the cwd across threads).

#![allow(clippy::unwrap_used)]

use applause_query::FileDownloader;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGBOOK_PATH: &str = "DR3/logbooks/POT050/POT050-OB1-000390-000392.jpg";

#[tokio::test]
async fn test_download_default_filename_is_path_basename() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{LOGBOOK_PATH}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"scan".to_vec()))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    std::env::set_current_dir(temp_dir.path()).expect("failed to enter temp dir");

    let downloader =
        FileDownloader::with_base_url(&format!("{}/files/", server.uri())).unwrap();
    let saved = downloader.download(LOGBOOK_PATH, None).await.unwrap();

    assert_eq!(
        saved.file_name().unwrap().to_str().unwrap(),
        "POT050-OB1-000390-000392.jpg"
    );
    assert!(temp_dir.path().join("POT050-OB1-000390-000392.jpg").exists());
}
