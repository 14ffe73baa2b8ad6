//! Lookup, listing, folder creation, deletion, and property patches

use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oxidrive_core::domain::newtypes::RemotePath;
use oxidrive_core::ports::remote_drive::RemoteDrive;

use crate::common::{folder_node, mount_folder, setup_drive_mock};

#[tokio::test]
async fn test_get_root() {
    let (server, client) = setup_drive_mock().await;
    mount_folder(&server, "/drive/root", "ROOT1", "root").await;

    let root = client.get_root().await.unwrap();
    assert!(root.is_directory);
    assert!(root.path.is_root());
    assert!(root.parent_path.is_none());
}

#[tokio::test]
async fn test_get_by_path_sends_bearer_token() {
    let (server, client) = setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive/root:/Backup"))
        .and(header("Authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "B1",
            "name": "Backup",
            "folder": {},
            "parentReference": { "path": "/drive/root:" }
        })))
        .mount(&server)
        .await;

    let node = client
        .get_by_path(&RemotePath::new("/Backup").unwrap())
        .await
        .unwrap();
    assert_eq!(node.path.as_str(), "/Backup");
    assert!(node.is_directory);
}

#[tokio::test]
async fn test_get_children_follows_pagination() {
    let (server, client) = setup_drive_mock().await;

    // Page 1 points at an absolute continuation URL.
    Mock::given(method("GET"))
        .and(path("/drive/root/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "A",
                    "name": "a.txt",
                    "size": 3,
                    "file": { "hashes": { "crc32Hash": "AABBCCDD" } },
                    "parentReference": { "path": "/drive/root:" }
                }
            ],
            "@odata.nextLink": format!("{}/page2", server.uri())
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "B",
                    "name": "b",
                    "folder": {},
                    "parentReference": { "path": "/drive/root:" }
                }
            ]
        })))
        .mount(&server)
        .await;

    let root = folder_node("/");
    let children = client.get_children(&root).await.unwrap();

    assert_eq!(children.len(), 2);
    assert_eq!(children[0].path.as_str(), "/a.txt");
    assert_eq!(children[0].hashes.as_ref().unwrap().crc32, Some(0xAABB_CCDD));
    assert_eq!(children[1].path.as_str(), "/b");
    assert!(children[1].is_directory);
}

#[tokio::test]
async fn test_create_folder() {
    let (server, client) = setup_drive_mock().await;
    Mock::given(method("POST"))
        .and(path("/drive/root:/Backup:/children"))
        .and(body_json(serde_json::json!({ "name": "photos", "folder": {} })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "NEW1",
            "name": "photos",
            "folder": {},
            "parentReference": { "path": "/drive/root:/Backup" }
        })))
        .mount(&server)
        .await;

    let parent = folder_node("/Backup");
    let folder = client.create_folder(&parent, "photos").await.unwrap();
    assert!(folder.is_directory);
    assert_eq!(folder.path.as_str(), "/Backup/photos");
    assert_eq!(folder.id.as_ref().unwrap().as_str(), "NEW1");
}

#[tokio::test]
async fn test_delete_by_id() {
    let (server, client) = setup_drive_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/drive/items/DOOMED"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut node = folder_node("/old");
    node.id = Some(
        oxidrive_core::domain::newtypes::RemoteId::new("DOOMED").unwrap(),
    );
    client.delete(&node).await.unwrap();
}

#[tokio::test]
async fn test_set_properties_patches_timestamps() {
    let (server, client) = setup_drive_mock().await;
    Mock::given(method("PATCH"))
        .and(path("/drive/root:/f.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "F1",
            "name": "f.txt",
            "parentReference": { "path": "/drive/root:" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let node = oxidrive_core::domain::node::RemoteNode::synthetic_file(
        RemotePath::new("/f.txt").unwrap(),
        3,
        None,
    );
    let modified = chrono::DateTime::from_timestamp(1_700_000_000, 0);
    client.set_properties(&node, None, modified).await.unwrap();
}

#[tokio::test]
async fn test_get_quota() {
    let (server, client) = setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "drive1",
            "quota": { "used": 1073741824u64, "total": 5368709120u64 }
        })))
        .mount(&server)
        .await;

    let quota = RemoteDrive::get_quota(&client).await.unwrap();
    assert_eq!(quota.used, 1_073_741_824);
    assert_eq!(quota.total, 5_368_709_120);
}

#[tokio::test]
async fn test_upload_query_param_marks_replacement() {
    let (server, client) = setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("f.txt");
    std::fs::write(&file, b"abc").unwrap();

    Mock::given(method("PUT"))
        .and(path("/drive/root:/f.txt:/content"))
        .and(query_param("@name.conflictBehavior", "replace"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "F1",
            "name": "f.txt",
            "size": 3,
            "file": {},
            "parentReference": { "path": "/drive/root:" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let parent = folder_node("/");
    client
        .replace_file(&parent, &oxidrive_core::domain::node::LocalNode::new(&file))
        .await
        .unwrap();
}
