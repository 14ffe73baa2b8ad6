//! Wire DTOs for drive items and their conversion into domain nodes
//!
//! The structs here mirror the JSON the service returns; they are a
//! client-internal concern. Everything leaving this crate is a
//! [`RemoteNode`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{NodeHashes, RemoteNode};
use oxidrive_core::domain::newtypes::{RemoteId, RemotePath};

/// Prefix the service uses for root-relative paths in parent references
const ROOT_PATH_PREFIX: &str = "/drive/root:";

// ============================================================================
// DTOs
// ============================================================================

/// One item as returned by the service
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriveItem {
    pub id: String,
    pub name: String,
    pub size: Option<u64>,
    pub parent_reference: Option<ParentReference>,
    /// Present if the item is a file (carries hashes)
    pub file: Option<FileFacet>,
    /// Present if the item is a folder
    pub folder: Option<serde_json::Value>,
    pub file_system_info: Option<FileSystemInfoFacet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParentReference {
    /// Path of the parent, e.g. `/drive/root:/Documents`
    pub path: Option<String>,
    #[allow(dead_code)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileFacet {
    pub hashes: Option<HashesFacet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HashesFacet {
    /// CRC32 of the content as an uppercase hex string
    pub crc32_hash: Option<String>,
    /// SHA-1 of the content as a hex string
    pub sha1_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileSystemInfoFacet {
    pub created_date_time: Option<DateTime<Utc>>,
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

/// One page of a children listing
#[derive(Debug, Deserialize)]
pub(crate) struct ChildrenPage {
    pub value: Vec<DriveItem>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Response from creating an upload session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadSessionResponse {
    pub upload_url: String,
}

// ============================================================================
// Conversion
// ============================================================================

/// Converts a wire item into a domain node.
///
/// `known_path` overrides path derivation for items whose location the
/// caller already knows (root and by-path lookups); otherwise the full
/// path is derived from the parent reference plus the item name.
pub(crate) fn to_node(
    item: DriveItem,
    known_path: Option<RemotePath>,
) -> Result<RemoteNode, SyncError> {
    let path = match known_path {
        Some(path) => path,
        None => derive_path(&item)?,
    };

    let hashes = item.file.as_ref().and_then(|f| f.hashes.as_ref()).map(|h| {
        NodeHashes {
            crc32: h
                .crc32_hash
                .as_deref()
                .and_then(|s| u32::from_str_radix(s, 16).ok()),
            sha1: h.sha1_hash.as_ref().map(|s| s.to_ascii_lowercase()),
        }
    });

    let fsinfo = item.file_system_info.as_ref();

    Ok(RemoteNode {
        id: Some(RemoteId::new(item.id)?),
        is_directory: item.folder.is_some(),
        size: item.size.unwrap_or(0),
        hashes,
        created: fsinfo.and_then(|i| i.created_date_time),
        modified: fsinfo.and_then(|i| i.last_modified_date_time),
        parent_path: path.parent(),
        name: item.name,
        path,
    })
}

/// Derives an item's full path from its parent reference
fn derive_path(item: &DriveItem) -> Result<RemotePath, SyncError> {
    let parent_path = item
        .parent_reference
        .as_ref()
        .and_then(|p| p.path.as_deref())
        .ok_or_else(|| {
            SyncError::Other(format!(
                "item '{}' carries no parent reference to derive its path from",
                item.name
            ))
        })?;

    // The service returns parent paths like "/drive/root:/Documents";
    // strip the addressing prefix to get the bare remote path.
    let bare = parent_path
        .strip_prefix(ROOT_PATH_PREFIX)
        .unwrap_or(parent_path);
    let parent = if bare.is_empty() {
        RemotePath::root()
    } else {
        RemotePath::new(bare)?
    };
    Ok(parent.join(&item.name))
}
