#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use drive_photo_frame::remote::{RemoteCatalog, RemoteContainer, RemoteError, RemoteListing};

/// In-memory stand-in for a Drive folder tree.
#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    photos: Vec<RemoteListing>,
    blobs: HashMap<String, Vec<u8>>,
    containers: HashMap<String, Vec<RemoteContainer>>,
    listing_error: bool,
    failing_fetches: HashSet<String>,
    next_container: usize,
    list_calls: usize,
    container_calls: HashMap<String, usize>,
    fetches: Vec<String>,
}

pub fn listing(id: &str, path: &str, created_secs: i64) -> RemoteListing {
    RemoteListing {
        id: id.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        created_at: DateTime::<Utc>::from_timestamp(created_secs, 0).unwrap(),
        description: None,
    }
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_photo(&self, id: &str, path: &str, created_secs: i64) {
        let mut state = self.state.lock().unwrap();
        state.photos.push(listing(id, path, created_secs));
        state.blobs.insert(id.to_string(), format!("photo {id}").into_bytes());
    }

    pub fn remove_photo(&self, id: &str) {
        self.state.lock().unwrap().photos.retain(|p| p.id != id);
    }

    pub fn set_listing_error(&self, failing: bool) {
        self.state.lock().unwrap().listing_error = failing;
    }

    pub fn fail_fetch(&self, id: &str) {
        self.state.lock().unwrap().failing_fetches.insert(id.to_string());
    }

    /// Add a folder under `parent` and return its id.
    pub fn add_container(&self, parent: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_container += 1;
        let id = format!("folder-{}", state.next_container);
        state
            .containers
            .entry(parent.to_string())
            .or_default()
            .push(RemoteContainer {
                id: id.clone(),
                name: name.to_string(),
            });
        id
    }

    pub fn rename_container(&self, parent: &str, from: &str, to: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(children) = state.containers.get_mut(parent) {
            for child in children.iter_mut().filter(|c| c.name == from) {
                child.name = to.to_string();
            }
        }
    }

    pub fn container_names(&self, parent: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .get(parent)
            .map(|c| c.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn container_calls(&self, parent: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.container_calls.get(parent).copied().unwrap_or(0)
    }

    pub fn fetches(&self) -> Vec<String> {
        self.state.lock().unwrap().fetches.clone()
    }
}

#[async_trait]
impl RemoteCatalog for FakeCatalog {
    async fn list_items(
        &self,
        _folder_id: &str,
        _recursive: bool,
        _exclude_names: &[&str],
    ) -> Result<Vec<RemoteListing>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.listing_error {
            return Err(RemoteError::Timeout);
        }
        Ok(state.photos.clone())
    }

    async fn fetch(&self, id: &str) -> Result<Bytes, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.fetches.push(id.to_string());
        if state.failing_fetches.contains(id) {
            return Err(RemoteError::Timeout);
        }
        state
            .blobs
            .get(id)
            .map(|b| Bytes::from(b.clone()))
            .ok_or_else(|| RemoteError::Api {
                status: 404,
                message: format!("no file {id}"),
            })
    }

    async fn list_containers(&self, parent_id: &str) -> Result<Vec<RemoteContainer>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        *state.container_calls.entry(parent_id.to_string()).or_default() += 1;
        Ok(state.containers.get(parent_id).cloned().unwrap_or_default())
    }

    async fn create_container(
        &self,
        name: &str,
        parent_id: &str,
    ) -> Result<RemoteContainer, RemoteError> {
        let id = self.add_container(parent_id, name);
        Ok(RemoteContainer {
            id,
            name: name.to_string(),
        })
    }
}
