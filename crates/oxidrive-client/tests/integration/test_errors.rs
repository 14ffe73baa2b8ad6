//! Mapping of HTTP failures into the sync error taxonomy

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::newtypes::RemotePath;
use oxidrive_core::ports::remote_drive::RemoteDrive;

use crate::common::{folder_node, setup_drive_mock};

async fn mount_status(server: &wiremock::MockServer, api_path: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(api_path))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_404_maps_to_http_error_with_status() {
    let (server, client) = setup_drive_mock().await;
    mount_status(&server, "/drive/root:/missing", 404, "itemNotFound").await;

    let err = client
        .get_by_path(&RemotePath::new("/missing").unwrap())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    match err {
        SyncError::Http { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("itemNotFound"));
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_retryable_statuses_are_preserved() {
    for status in [429u16, 500, 502, 503, 504, 509] {
        let (server, client) = setup_drive_mock().await;
        mount_status(&server, "/drive/root/children", status, "try later").await;

        let err = client
            .get_children(&folder_node("/"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(status), "status {status} must survive mapping");
    }
}

#[tokio::test]
async fn test_401_is_preserved_for_auth_classification() {
    let (server, client) = setup_drive_mock().await;
    mount_status(&server, "/drive/root", 401, "token expired").await;

    let err = client.get_root().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_connection_failure_maps_to_transport_error() {
    // Point the client at a closed port.
    let client = oxidrive_client::DriveClient::with_base_url("t", "http://127.0.0.1:1");

    let err = client.get_root().await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert_eq!(err.status(), None);
}
