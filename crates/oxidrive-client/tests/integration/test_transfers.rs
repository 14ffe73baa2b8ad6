//! Download and upload flows, including resumable chunked sessions

use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oxidrive_core::domain::node::LocalNode;
use oxidrive_core::domain::newtypes::{RemoteId, RemotePath};
use oxidrive_core::ports::remote_drive::RemoteDrive;

use crate::common::{folder_node, setup_drive_mock};

fn file_node(path: &str, id: &str, size: u64) -> oxidrive_core::domain::node::RemoteNode {
    let mut node = oxidrive_core::domain::node::RemoteNode::synthetic_file(
        RemotePath::new(path).unwrap(),
        size,
        None,
    );
    node.id = Some(RemoteId::new(id).unwrap());
    node
}

#[tokio::test]
async fn test_download_writes_content_to_destination() {
    let (server, client) = setup_drive_mock().await;
    let content = b"the quick brown fox";

    Mock::given(method("GET"))
        .and(path("/drive/items/F1/content"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("f.txt.tmp");
    std::fs::write(&dest, b"").unwrap();

    let node = file_node("/f.txt", "F1", content.len() as u64);
    client.download(&node, &dest).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

#[tokio::test]
async fn test_download_by_path_when_node_has_no_id() {
    let (server, client) = setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/root:/f.txt:/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out");

    let node = oxidrive_core::domain::node::RemoteNode::synthetic_file(
        RemotePath::new("/f.txt").unwrap(),
        4,
        None,
    );
    client.download(&node, &dest).await.unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"data");
}

#[tokio::test]
async fn test_small_upload_sends_bytes_and_parses_item() {
    let (server, client) = setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("report.txt");
    std::fs::write(&file, b"hello world").unwrap();

    Mock::given(method("PUT"))
        .and(path("/drive/root:/Documents/report.txt:/content"))
        .and(body_bytes(b"hello world".to_vec()))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "UP1",
            "name": "report.txt",
            "size": 11,
            "file": { "hashes": { "crc32Hash": "D4A1185", "sha1Hash": "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed" } },
            "parentReference": { "path": "/drive/root:/Documents" }
        })))
        .mount(&server)
        .await;

    let parent = folder_node("/Documents");
    let node = client
        .upload_file(&parent, &LocalNode::new(&file))
        .await
        .unwrap();

    assert_eq!(node.path.as_str(), "/Documents/report.txt");
    assert_eq!(node.size, 11);
    assert_eq!(node.hashes.as_ref().unwrap().crc32, Some(0x0D4A_1185));
}

/// Drives a full resumable session: create, one intermediate chunk (202),
/// one final chunk (201 with the completed item)
#[tokio::test]
async fn test_chunked_session_uploads_ranges_and_completes() {
    let (server, client) = setup_drive_mock().await;
    let client = client.with_chunk_size(8);

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("big.bin");
    std::fs::write(&file, b"0123456789AB").unwrap(); // 12 bytes -> 8 + 4

    let session_url = format!("{}/upload/session/1", server.uri());
    Mock::given(method("POST"))
        .and(path("/drive/root:/big.bin:/createUploadSession"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uploadUrl": session_url
        })))
        .mount(&server)
        .await;

    // First chunk: bytes 0-7/12, accepted but not complete.
    Mock::given(method("PUT"))
        .and(path("/upload/session/1"))
        .and(header("Content-Range", "bytes 0-7/12"))
        .and(body_bytes(b"01234567".to_vec()))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "nextExpectedRanges": ["8-11"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Final chunk: bytes 8-11/12, returns the completed item.
    Mock::given(method("PUT"))
        .and(path("/upload/session/1"))
        .and(header("Content-Range", "bytes 8-11/12"))
        .and(body_bytes(b"89AB".to_vec()))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "BIG1",
            "name": "big.bin",
            "size": 12,
            "file": {},
            "parentReference": { "path": "/drive/root:" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let parent = folder_node("/");
    let local = LocalNode::new(&file);
    let mut session = client.start_upload_session(&parent, &local).await.unwrap();
    assert_eq!(session.total_size, 12);
    assert_eq!(session.chunk_size, 8);
    assert!(!session.is_complete());

    client.upload_chunk(&mut session).await.unwrap();
    assert_eq!(session.total_uploaded(), 8);
    assert_eq!(session.last_uploaded, 8);
    assert!(!session.is_complete());

    client.upload_chunk(&mut session).await.unwrap();
    assert!(session.is_complete());
    let node = session.result.take().unwrap();
    assert_eq!(node.path.as_str(), "/big.bin");
    assert_eq!(node.size, 12);
}

/// A failed chunk leaves the session untouched so the same range can be
/// retried
#[tokio::test]
async fn test_failed_chunk_leaves_session_resumable() {
    let (server, client) = setup_drive_mock().await;
    let client = client.with_chunk_size(8);

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("big.bin");
    std::fs::write(&file, b"0123456789AB").unwrap();

    let session_url = format!("{}/upload/session/2", server.uri());
    Mock::given(method("POST"))
        .and(path("/drive/root:/big.bin:/createUploadSession"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uploadUrl": session_url
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload/session/2"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let parent = folder_node("/");
    let local = LocalNode::new(&file);
    let mut session = client.start_upload_session(&parent, &local).await.unwrap();

    let err = client.upload_chunk(&mut session).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(session.offset, 0, "a failed chunk must not advance the session");
    assert!(!session.is_complete());
}
