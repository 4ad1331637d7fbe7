//! Cloud file store access.
//!
//! The store is an external collaborator reached over HTTP; the seam is
//! the `FileStore` trait so the ingestion pipeline can be exercised
//! against an in-memory store. Recursive listing is an explicit BFS with a
//! visited set on folder id (cycle-safe) and a hard item cap.

use std::collections::{HashSet, VecDeque};

use serde_json::Value;

use crate::error::{Error, Result};

/// Folder MIME type used by the backing store.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Metadata for one remote file.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub modified_time: Option<String>,
    pub size: i64,
    pub parent_id: Option<String>,
}

impl RemoteFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }
}

/// A file found during recursive listing, with its path relative to the
/// listing root ("subfolder/name").
#[derive(Debug, Clone)]
pub struct ListedFile {
    pub file: RemoteFile,
    pub path: String,
}

/// Seam for the cloud file store.
#[allow(async_fn_in_trait)]
pub trait FileStore {
    /// Direct children of a folder (files and subfolders).
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteFile>>;

    /// Raw bytes of a file.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// Breadth-first recursive listing rooted at `root_folder`, capped at
/// `item_cap` collected files. Folder cycles are skipped via the visited
/// set.
pub async fn list_folder_recursive<S: FileStore>(
    store: &S,
    root_folder: &str,
    item_cap: usize,
) -> Result<Vec<ListedFile>> {
    let mut collected = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, String)> = VecDeque::new();

    visited.insert(root_folder.to_string());
    queue.push_back((root_folder.to_string(), String::new()));

    while let Some((folder_id, prefix)) = queue.pop_front() {
        if collected.len() >= item_cap {
            tracing::warn!(cap = item_cap, "folder listing hit item cap, truncating");
            break;
        }
        for child in store.list_children(&folder_id).await? {
            if child.is_folder() {
                if visited.insert(child.id.clone()) {
                    let sub_prefix = if prefix.is_empty() {
                        child.name.clone()
                    } else {
                        format!("{prefix}/{}", child.name)
                    };
                    queue.push_back((child.id.clone(), sub_prefix));
                }
                continue;
            }
            if collected.len() >= item_cap {
                break;
            }
            let path = if prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{prefix}/{}", child.name)
            };
            collected.push(ListedFile { file: child, path });
        }
    }

    Ok(collected)
}

/// HTTP-backed store client (Google Drive v3, API-key access).
pub struct DriveStore {
    http: reqwest::Client,
    api_key: String,
}

impl DriveStore {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    fn parse_file(value: &Value) -> RemoteFile {
        RemoteFile {
            id: value["id"].as_str().unwrap_or_default().to_string(),
            name: value["name"].as_str().unwrap_or_default().to_string(),
            mime_type: value["mimeType"].as_str().unwrap_or_default().to_string(),
            modified_time: value["modifiedTime"].as_str().map(String::from),
            // The API reports size as a string; folders have none.
            size: value["size"].as_str().and_then(|s| s.parse().ok()).unwrap_or(0),
            parent_id: value["parents"]
                .get(0)
                .and_then(Value::as_str)
                .map(String::from),
        }
    }
}

impl FileStore for DriveStore {
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query = format!("'{folder_id}' in parents and trashed = false");
            let mut req = self
                .http
                .get("https://www.googleapis.com/drive/v3/files")
                .query(&[
                    ("q", query.as_str()),
                    ("fields", "nextPageToken,files(id,name,mimeType,modifiedTime,size,parents)"),
                    ("pageSize", "200"),
                    ("key", self.api_key.as_str()),
                ]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req.send().await?;
            let status = resp.status();
            let text = resp.text().await?;
            if !status.is_success() {
                return Err(Error::Provider {
                    provider: "drive".to_string(),
                    message: format!("{status}: {}", text.trim()),
                });
            }

            let json: Value = serde_json::from_str(&text)?;
            if let Some(items) = json["files"].as_array() {
                files.extend(items.iter().map(Self::parse_file));
            }

            match json["nextPageToken"].as_str() {
                Some(token) => page_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(files)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let url = format!("https://www.googleapis.com/drive/v3/files/{file_id}");
        let resp = self
            .http
            .get(&url)
            .query(&[("alt", "media"), ("key", self.api_key.as_str())])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "drive".to_string(),
                message: format!("{status}: {}", text.trim()),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
