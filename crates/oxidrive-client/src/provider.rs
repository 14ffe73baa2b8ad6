//! RemoteDrive implementation over the REST client
//!
//! Items are addressed by identifier when a node carries one, falling back
//! to path addressing for synthetic nodes (dry-run fabrications and parent
//! references derived from lookup keys).
//!
//! No retrying happens here: failures are mapped into the
//! [`SyncError`](oxidrive_core::domain::errors::SyncError) taxonomy and
//! classified by the task engine.

use std::path::Path;

use reqwest::Method;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, RemoteNode};
use oxidrive_core::domain::newtypes::RemotePath;
use oxidrive_core::ports::remote_drive::{DriveQuota, RemoteDrive, UploadSession};

use crate::client::{child_path, expect_success, id_path, item_path, DriveClient};
use crate::items::{to_node, ChildrenPage, DriveItem, UploadSessionResponse};

impl DriveClient {
    /// API path for one node: by identifier when available, by path
    /// otherwise
    fn node_path(&self, node: &RemoteNode, suffix: Option<&str>) -> String {
        match &node.id {
            Some(id) => id_path(id.as_str(), suffix),
            None => item_path(&node.path, suffix),
        }
    }

    async fn fetch_item(&self, path: &str) -> Result<DriveItem, SyncError> {
        self.send(self.request(Method::GET, path))
            .await?
            .json()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))
    }

    /// Reads one chunk of a local file for a session upload
    async fn read_chunk(
        &self,
        session: &UploadSession,
    ) -> Result<(Vec<u8>, u64, u64), SyncError> {
        let start = session.offset;
        let end = (start + session.chunk_size).min(session.total_size);
        let len = (end - start) as usize;

        let mut file = tokio::fs::File::open(&session.local_path).await?;
        file.seek(std::io::SeekFrom::Start(start)).await?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;
        Ok((buf, start, end))
    }
}

#[async_trait::async_trait]
impl RemoteDrive for DriveClient {
    async fn get_root(&self) -> Result<RemoteNode, SyncError> {
        debug!("fetching drive root");
        let item = self.fetch_item("/drive/root").await?;
        to_node(item, Some(RemotePath::root()))
    }

    async fn get_by_path(&self, path: &RemotePath) -> Result<RemoteNode, SyncError> {
        debug!(path = %path, "looking up remote item by path");
        let item = self.fetch_item(&item_path(path, None)).await?;
        to_node(item, Some(path.clone()))
    }

    async fn get_children(&self, node: &RemoteNode) -> Result<Vec<RemoteNode>, SyncError> {
        debug!(path = %node.path, "listing remote children");
        let mut children = Vec::new();
        let mut next: Option<String> = None;

        loop {
            let response = match next.take() {
                // Continuation links are absolute URLs.
                Some(link) => {
                    let response = self
                        .http()
                        .get(&link)
                        .bearer_auth(self.access_token())
                        .send()
                        .await
                        .map_err(|err| SyncError::Transport(err.to_string()))?;
                    expect_success(response).await?
                }
                None => {
                    self.send(self.request(Method::GET, &self.node_path(node, Some("children"))))
                        .await?
                }
            };

            let page: ChildrenPage = response
                .json()
                .await
                .map_err(|err| SyncError::Transport(err.to_string()))?;

            for item in page.value {
                children.push(to_node(item, None)?);
            }

            match page.next_link {
                Some(link) => next = Some(link),
                None => break,
            }
        }

        debug!(path = %node.path, count = children.len(), "remote children listed");
        Ok(children)
    }

    async fn create_folder(
        &self,
        parent: &RemoteNode,
        name: &str,
    ) -> Result<RemoteNode, SyncError> {
        debug!(parent = %parent.path, name, "creating remote folder");
        let body = json!({ "name": name, "folder": {} });
        let item: DriveItem = self
            .send(
                self.request(Method::POST, &self.node_path(parent, Some("children")))
                    .json(&body),
            )
            .await?
            .json()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        to_node(item, Some(parent.path.join(name)))
    }

    async fn upload_file(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<RemoteNode, SyncError> {
        self.put_content(parent, file, "fail").await
    }

    async fn replace_file(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<RemoteNode, SyncError> {
        self.put_content(parent, file, "replace").await
    }

    async fn start_upload_session(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<UploadSession, SyncError> {
        let name = file.name();
        let total_size = file.size()?;
        debug!(
            parent = %parent.path,
            name,
            total_size,
            "creating resumable upload session"
        );

        let body = json!({ "item": { "@name.conflictBehavior": "replace" } });
        let response: UploadSessionResponse = self
            .send(
                self.request(
                    Method::POST,
                    &child_path(&parent.path, &name, "createUploadSession"),
                )
                .json(&body),
            )
            .await?
            .json()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;

        Ok(UploadSession {
            upload_url: response.upload_url,
            local_path: file.path().to_path_buf(),
            total_size,
            offset: 0,
            chunk_size: self.chunk_size(),
            last_uploaded: 0,
            result: None,
        })
    }

    async fn upload_chunk(&self, session: &mut UploadSession) -> Result<(), SyncError> {
        let (chunk, start, end) = self.read_chunk(session).await?;
        let content_range = format!("bytes {}-{}/{}", start, end - 1, session.total_size);
        debug!(range = %content_range, "uploading chunk");

        let response = self
            .http()
            .put(&session.upload_url)
            .bearer_auth(self.access_token())
            .header("Content-Length", chunk.len().to_string())
            .header("Content-Range", &content_range)
            .body(chunk)
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        let response = expect_success(response).await?;
        let status = response.status();

        // The session is only advanced after the service acknowledged the
        // chunk, so a failed chunk can be re-sent as-is.
        session.last_uploaded = end - start;
        session.offset = end;

        if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::CREATED {
            // Final chunk: the body is the completed item.
            let item: DriveItem = response
                .json()
                .await
                .map_err(|err| SyncError::Transport(err.to_string()))?;
            session.result = Some(to_node(item, None)?);
        }
        Ok(())
    }

    async fn download(&self, node: &RemoteNode, dest: &Path) -> Result<(), SyncError> {
        debug!(path = %node.path, dest = %dest.display(), "downloading file content");
        let mut response = self
            .send(self.request(Method::GET, &self.node_path(node, Some("content"))))
            .await?;

        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn delete(&self, node: &RemoteNode) -> Result<(), SyncError> {
        debug!(path = %node.path, "deleting remote item");
        self.send(self.request(Method::DELETE, &self.node_path(node, None)))
            .await?;
        Ok(())
    }

    async fn set_properties(
        &self,
        node: &RemoteNode,
        created: Option<chrono::DateTime<chrono::Utc>>,
        modified: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(), SyncError> {
        debug!(path = %node.path, "patching remote timestamps");
        let mut info = serde_json::Map::new();
        if let Some(created) = created {
            info.insert("createdDateTime".into(), json!(created.to_rfc3339()));
        }
        if let Some(modified) = modified {
            info.insert("lastModifiedDateTime".into(), json!(modified.to_rfc3339()));
        }
        let body = json!({ "fileSystemInfo": info });

        self.send(
            self.request(Method::PATCH, &self.node_path(node, None))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn get_quota(&self) -> Result<DriveQuota, SyncError> {
        self.fetch_quota().await
    }
}

impl DriveClient {
    /// Single-request upload of a whole file's content
    async fn put_content(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
        conflict_behavior: &str,
    ) -> Result<RemoteNode, SyncError> {
        let name = file.name();
        let data = tokio::fs::read(file.path()).await?;
        debug!(
            parent = %parent.path,
            name,
            bytes = data.len(),
            conflict_behavior,
            "uploading file content"
        );

        let item: DriveItem = self
            .send(
                self.request(Method::PUT, &child_path(&parent.path, &name, "content"))
                    .query(&[("@name.conflictBehavior", conflict_behavior)])
                    .header("Content-Type", "application/octet-stream")
                    .body(data),
            )
            .await?
            .json()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;

        to_node(item, Some(parent.path.join(&name)))
    }
}
