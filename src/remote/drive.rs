//! Google Drive API v3 catalog.
//!
//! Lists a folder tree, downloads photo content and manages the small folders
//! that carry remote settings. Every request runs under a bounded timeout;
//! rate limits and server errors are retried with exponential backoff.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::types::{
    CreateFolderRequest, DriveFile, FOLDER_MIME_TYPE, FilesListResponse, TokenResponse,
};
use super::{RemoteCatalog, RemoteContainer, RemoteError, RemoteListing};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const PAGE_SIZE: &str = "1000";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,createdTime,description)";
const MAX_ATTEMPTS: u32 = 3;
/// Refresh a cached access token this long before it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where access tokens come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A bearer token supplied by the operator.
    Static(String),
    /// OAuth 2.0 refresh-token grant.
    Refresh {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct DriveClient {
    http: Client,
    tokens: TokenSource,
    cached: Mutex<Option<CachedToken>>,
    download_timeout: Duration,
}

impl DriveClient {
    pub fn new(
        tokens: TokenSource,
        request_timeout: Duration,
        download_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            tokens,
            cached: Mutex::new(None),
            download_timeout,
        })
    }

    async fn access_token(&self) -> Result<String, RemoteError> {
        let (client_id, client_secret, refresh_token) = match &self.tokens {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Refresh {
                client_id,
                client_secret,
                refresh_token,
            } => (client_id, client_secret, refresh_token),
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN
        {
            return Ok(token.value.clone());
        }

        debug!("refreshing drive access token");
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Auth(format!("token refresh failed ({status}): {body}")));
        }
        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        info!(expires_in = lifetime.as_secs(), "drive access token refreshed");
        Ok(token.access_token)
    }

    async fn forget_token(&self) {
        self.cached.lock().await.take();
    }

    /// Send a request built by `build`, retrying transient failures.
    async fn send<F>(&self, build: F) -> Result<Response, RemoteError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let token = self.access_token().await?;
            let outcome = build(&self.http).bearer_auth(&token).send().await;
            let retry_err = match outcome {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let message = response.text().await.unwrap_or_default();
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        self.forget_token().await;
                        return Err(RemoteError::Auth(format!("{status}: {message}")));
                    }
                    let err = RemoteError::Api {
                        status: status.as_u16(),
                        message,
                    };
                    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                        return Err(err);
                    }
                    err
                }
                Err(err) => RemoteError::from(err),
            };

            if attempt >= MAX_ATTEMPTS {
                warn!(attempt, error = %retry_err, "drive request failed; giving up");
                return Err(retry_err);
            }
            let backoff = Duration::from_millis(250 * 2u64.pow(attempt));
            warn!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %retry_err,
                "drive request failed; retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// All children matching `query`, following pagination.
    async fn list_children(&self, query: &str) -> Result<Vec<DriveFile>, RemoteError> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let response = self
                .send(|http| {
                    let mut params = vec![
                        ("q", query),
                        ("fields", LIST_FIELDS),
                        ("pageSize", PAGE_SIZE),
                        ("orderBy", "createdTime desc"),
                        ("spaces", "drive"),
                        ("supportsAllDrives", "true"),
                        ("includeItemsFromAllDrives", "true"),
                    ];
                    if let Some(token) = page_token.as_deref() {
                        params.push(("pageToken", token));
                    }
                    http.get(format!("{DRIVE_API_BASE}/files")).query(&params)
                })
                .await?;
            let page: FilesListResponse = response
                .json()
                .await
                .map_err(|e| RemoteError::Parse(e.to_string()))?;
            files.extend(page.files);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl RemoteCatalog for DriveClient {
    #[instrument(skip(self, exclude_names))]
    async fn list_items(
        &self,
        folder_id: &str,
        recursive: bool,
        exclude_names: &[&str],
    ) -> Result<Vec<RemoteListing>, RemoteError> {
        let mut photos = Vec::new();
        let mut pending = vec![(folder_id.to_string(), String::new())];
        // Drive folders may have several parents; visit each once.
        let mut visited = HashSet::new();
        while let Some((id, prefix)) = pending.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let children = self.list_children(&children_query(&id, true)).await?;
            for child in children {
                let name = path_segment(&child.name);
                if child.is_folder() {
                    if !recursive
                        || exclude_names
                            .iter()
                            .any(|ex| ex.eq_ignore_ascii_case(child.name.trim()))
                    {
                        debug!(folder = %child.name, "skipping folder");
                        continue;
                    }
                    pending.push((child.id, join_path(&prefix, &name)));
                } else {
                    let created_at = parse_created(child.created_time.as_deref());
                    photos.push(RemoteListing {
                        path: join_path(&prefix, &name),
                        id: child.id,
                        name: child.name,
                        created_at,
                        description: child.description,
                    });
                }
            }
        }
        info!(photos = photos.len(), "listed drive folder");
        Ok(photos)
    }

    #[instrument(skip(self))]
    async fn fetch(&self, id: &str) -> Result<Bytes, RemoteError> {
        let url = format!("{DRIVE_API_BASE}/files/{id}");
        let response = self
            .send(|http| {
                http.get(&url)
                    .query(&[("alt", "media"), ("supportsAllDrives", "true")])
                    .timeout(self.download_timeout)
            })
            .await?;
        let body = response.bytes().await?;
        debug!(bytes = body.len(), "downloaded");
        Ok(body)
    }

    async fn list_containers(&self, parent_id: &str) -> Result<Vec<RemoteContainer>, RemoteError> {
        let children = self.list_children(&children_query(parent_id, false)).await?;
        Ok(children
            .into_iter()
            .filter(DriveFile::is_folder)
            .map(|f| RemoteContainer {
                id: f.id,
                name: f.name,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn create_container(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<RemoteContainer, RemoteError> {
        let body = CreateFolderRequest {
            name,
            mime_type: FOLDER_MIME_TYPE,
            parents: [parent_id],
        };
        let response = self
            .send(|http| {
                http.post(format!("{DRIVE_API_BASE}/files"))
                    .query(&[("fields", "id,name,mimeType"), ("supportsAllDrives", "true")])
                    .json(&body)
            })
            .await?;
        let created: DriveFile = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        info!(id = %created.id, "created drive folder");
        Ok(RemoteContainer {
            id: created.id,
            name: created.name,
        })
    }
}

/// Drive query for the direct children of `parent_id`: photos and folders, or
/// folders only.
fn children_query(parent_id: &str, include_images: bool) -> String {
    let parent = parent_id.replace('\\', "\\\\").replace('\'', "\\'");
    if include_images {
        format!(
            "'{parent}' in parents and trashed=false and \
             (mimeType contains 'image/' or mimeType='{FOLDER_MIME_TYPE}')"
        )
    } else {
        format!("'{parent}' in parents and trashed=false and mimeType='{FOLDER_MIME_TYPE}'")
    }
}

/// Drive names may contain path separators; keep each name a single segment.
fn path_segment(name: &str) -> String {
    name.trim().replace(['/', '\\'], "_")
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn parse_created(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
