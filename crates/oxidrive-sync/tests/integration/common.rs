//! Shared test doubles: an in-memory remote drive and engine helpers

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

use oxidrive_core::config::SyncDirection;
use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, NodeHashes, RemoteNode};
use oxidrive_core::domain::newtypes::{RemoteId, RemotePath};
use oxidrive_core::ports::remote_drive::{DriveQuota, RemoteDrive, UploadSession};
use oxidrive_sync::filter::PathFilter;
use oxidrive_sync::store::RwLocalStore;
use oxidrive_sync::{SyncEngine, SyncOptions, SyncReport};

// ============================================================================
// In-memory drive
// ============================================================================

#[derive(Clone)]
pub struct MemEntry {
    pub is_dir: bool,
    pub content: Vec<u8>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// When false, the node advertises no content hashes
    pub publish_hashes: bool,
}

struct DriveState {
    entries: Mutex<BTreeMap<String, MemEntry>>,
    /// Open upload sessions: url -> (target path, buffered bytes)
    sessions: Mutex<HashMap<String, (String, Vec<u8>)>>,
    chunk_size: u64,
    /// Number of upcoming chunk uploads that should fail
    inject_chunk_failures: AtomicU32,
    next_session: AtomicU32,
}

/// A hash-publishing hierarchical store living entirely in memory.
///
/// Clones share state, so tests can keep a handle for inspection while
/// the engine owns another.
#[derive(Clone)]
pub struct InMemoryDrive {
    state: Arc<DriveState>,
}

impl InMemoryDrive {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "/".to_string(),
            MemEntry {
                is_dir: true,
                content: Vec::new(),
                created: None,
                modified: None,
                publish_hashes: false,
            },
        );
        Self {
            state: Arc::new(DriveState {
                entries: Mutex::new(entries),
                sessions: Mutex::new(HashMap::new()),
                chunk_size: 4,
                inject_chunk_failures: AtomicU32::new(0),
                next_session: AtomicU32::new(0),
            }),
        }
    }

    /// Makes the next `n` chunk uploads fail with a transport error
    pub fn inject_chunk_failures(&self, n: u32) {
        self.state.inject_chunk_failures.store(n, Ordering::SeqCst);
    }

    pub fn insert_dir(&self, path: &str) {
        self.state.entries.lock().unwrap().insert(
            path.to_string(),
            MemEntry {
                is_dir: true,
                content: Vec::new(),
                created: None,
                modified: None,
                publish_hashes: false,
            },
        );
    }

    pub fn insert_file(&self, path: &str, content: &[u8], modified: Option<DateTime<Utc>>) {
        self.state.entries.lock().unwrap().insert(
            path.to_string(),
            MemEntry {
                is_dir: false,
                content: content.to_vec(),
                created: None,
                modified,
                publish_hashes: true,
            },
        );
    }

    pub fn insert_file_without_hashes(
        &self,
        path: &str,
        content: &[u8],
        modified: Option<DateTime<Utc>>,
    ) {
        self.state.entries.lock().unwrap().insert(
            path.to_string(),
            MemEntry {
                is_dir: false,
                content: content.to_vec(),
                created: None,
                modified,
                publish_hashes: false,
            },
        );
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.entries.lock().unwrap().contains_key(path)
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .entries
            .lock()
            .unwrap()
            .get(path)
            .map(|e| e.content.clone())
    }

    pub fn modified(&self, path: &str) -> Option<DateTime<Utc>> {
        self.state
            .entries
            .lock()
            .unwrap()
            .get(path)
            .and_then(|e| e.modified)
    }

    pub fn root_node(&self) -> RemoteNode {
        self.node("/", &self.state.entries.lock().unwrap()["/"])
    }

    fn node(&self, path_str: &str, entry: &MemEntry) -> RemoteNode {
        let path = RemotePath::new(path_str).unwrap();
        let hashes = (!entry.is_dir && entry.publish_hashes).then(|| NodeHashes {
            crc32: Some(crc32fast::hash(&entry.content)),
            sha1: Some(sha1_hex(&entry.content)),
        });
        RemoteNode {
            id: Some(RemoteId::new(format!("id:{path_str}")).unwrap()),
            name: path.file_name().unwrap_or("").to_string(),
            parent_path: path.parent(),
            path,
            is_directory: entry.is_dir,
            size: entry.content.len() as u64,
            hashes,
            created: entry.created,
            modified: entry.modified,
        }
    }

    fn not_found(path: &str) -> SyncError {
        SyncError::http(404, format!("no item at '{path}'"))
    }
}

pub fn sha1_hex(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[async_trait::async_trait]
impl RemoteDrive for InMemoryDrive {
    async fn get_root(&self) -> Result<RemoteNode, SyncError> {
        Ok(self.root_node())
    }

    async fn get_by_path(&self, path: &RemotePath) -> Result<RemoteNode, SyncError> {
        let entries = self.state.entries.lock().unwrap();
        entries
            .get(path.as_str())
            .map(|entry| self.node(path.as_str(), entry))
            .ok_or_else(|| Self::not_found(path.as_str()))
    }

    async fn get_children(&self, node: &RemoteNode) -> Result<Vec<RemoteNode>, SyncError> {
        let entries = self.state.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|(path, _)| {
                RemotePath::new(path.as_str())
                    .ok()
                    .and_then(|p| p.parent())
                    .as_ref()
                    == Some(&node.path)
            })
            .map(|(path, entry)| self.node(path, entry))
            .collect())
    }

    async fn create_folder(
        &self,
        parent: &RemoteNode,
        name: &str,
    ) -> Result<RemoteNode, SyncError> {
        let path = parent.path.join(name);
        let entry = MemEntry {
            is_dir: true,
            content: Vec::new(),
            created: None,
            modified: None,
            publish_hashes: false,
        };
        self.state
            .entries
            .lock()
            .unwrap()
            .insert(path.as_str().to_string(), entry.clone());
        Ok(self.node(path.as_str(), &entry))
    }

    async fn upload_file(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<RemoteNode, SyncError> {
        self.replace_file(parent, file).await
    }

    async fn replace_file(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<RemoteNode, SyncError> {
        let content = tokio::fs::read(file.path()).await?;
        let path = parent.path.join(&file.name());
        let entry = MemEntry {
            is_dir: false,
            content,
            created: None,
            modified: file.modified()?,
            publish_hashes: true,
        };
        self.state
            .entries
            .lock()
            .unwrap()
            .insert(path.as_str().to_string(), entry.clone());
        Ok(self.node(path.as_str(), &entry))
    }

    async fn start_upload_session(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<UploadSession, SyncError> {
        let target = parent.path.join(&file.name());
        let url = format!(
            "mem://session/{}/{}",
            self.state.next_session.fetch_add(1, Ordering::SeqCst),
            target
        );
        self.state
            .sessions
            .lock()
            .unwrap()
            .insert(url.clone(), (target.as_str().to_string(), Vec::new()));
        Ok(UploadSession {
            upload_url: url,
            local_path: file.path().to_path_buf(),
            total_size: file.size()?,
            offset: 0,
            chunk_size: self.state.chunk_size,
            last_uploaded: 0,
            result: None,
        })
    }

    async fn upload_chunk(&self, session: &mut UploadSession) -> Result<(), SyncError> {
        let injected = &self.state.inject_chunk_failures;
        if injected
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SyncError::Transport("injected chunk failure".into()));
        }

        let start = session.offset;
        let end = (start + session.chunk_size).min(session.total_size);
        let data = tokio::fs::read(&session.local_path).await?;
        let chunk = data[start as usize..end as usize].to_vec();

        let mut sessions = self.state.sessions.lock().unwrap();
        let (target, buffer) = sessions
            .get_mut(&session.upload_url)
            .ok_or_else(|| SyncError::Other("unknown upload session".into()))?;
        buffer.extend_from_slice(&chunk);
        session.offset = end;
        session.last_uploaded = end - start;

        if session.offset == session.total_size {
            let target = target.clone();
            let content = buffer.clone();
            drop(sessions);

            let entry = MemEntry {
                is_dir: false,
                content,
                created: None,
                modified: LocalNode::new(&session.local_path).modified()?,
                publish_hashes: true,
            };
            self.state
                .entries
                .lock()
                .unwrap()
                .insert(target.clone(), entry.clone());
            session.result = Some(self.node(&target, &entry));
        }
        Ok(())
    }

    async fn download(&self, node: &RemoteNode, dest: &Path) -> Result<(), SyncError> {
        let content = self
            .content(node.path.as_str())
            .ok_or_else(|| Self::not_found(node.path.as_str()))?;
        tokio::fs::write(dest, content).await?;
        Ok(())
    }

    async fn delete(&self, node: &RemoteNode) -> Result<(), SyncError> {
        let mut entries = self.state.entries.lock().unwrap();
        if entries.remove(node.path.as_str()).is_none() {
            return Err(Self::not_found(node.path.as_str()));
        }
        let prefix = format!("{}/", node.path.as_str());
        entries.retain(|path, _| !path.starts_with(&prefix));
        Ok(())
    }

    async fn set_properties(
        &self,
        node: &RemoteNode,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Result<(), SyncError> {
        let mut entries = self.state.entries.lock().unwrap();
        let entry = entries
            .get_mut(node.path.as_str())
            .ok_or_else(|| Self::not_found(node.path.as_str()))?;
        if created.is_some() {
            entry.created = created;
        }
        if modified.is_some() {
            entry.modified = modified;
        }
        Ok(())
    }

    async fn get_quota(&self) -> Result<DriveQuota, SyncError> {
        let used = self
            .state
            .entries
            .lock()
            .unwrap()
            .values()
            .map(|e| e.content.len() as u64)
            .sum();
        Ok(DriveQuota {
            used,
            total: 1 << 30,
        })
    }
}

// ============================================================================
// Engine helpers
// ============================================================================

pub fn options(direction: SyncDirection) -> SyncOptions {
    SyncOptions {
        direction,
        recursive: true,
        workers: 4,
        max_tries: 3,
        split_after: 4 * 1024 * 1024,
        filter: Arc::new(PathFilter::permissive()),
    }
}

/// Runs a full sync of `drive` against `local_root` and returns the report
pub async fn run_engine(
    drive: &InMemoryDrive,
    opts: SyncOptions,
    local_root: &Path,
    force_hash: bool,
) -> SyncReport {
    let engine = SyncEngine::new(
        Arc::new(drive.clone()),
        Arc::new(RwLocalStore::new(force_hash)),
        opts,
    );
    engine
        .run(drive.root_node(), local_root)
        .await
        .expect("engine run failed")
}
