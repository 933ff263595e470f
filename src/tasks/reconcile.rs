//! One reconciliation pass between the remote folder and the local mirror.
//!
//! Rules:
//! - Remote photos missing locally are downloaded in remote order (newest first).
//! - Local files missing remotely are deleted, then empty folders are pruned.
//! - Files present on both sides are never touched.
//! - A failed remote listing never deletes anything: the pass degrades to
//!   "preserve local inventory, report nothing new".

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::error::Error;
use crate::remote::{RemoteCatalog, RemoteItem, RemoteListing, sanitize_relative_path};
use crate::scan::{PARTIAL_SUFFIX, scan_mirror};

/// Remote folder whose children carry settings instead of photos.
pub const SETTINGS_CONTAINER_NAME: &str = "settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// The mirror now matches the remote listing.
    Mirrored,
    /// The listing failed; local files were left alone.
    PreserveOnly,
    /// No connectivity; only the local inventory was read.
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Photos downloaded during this pass, in remote order.
    pub new_items: Vec<String>,
    /// Every photo the slideshow should know about, in display order.
    pub all_items: Vec<String>,
    /// Length of the search-matched block at the front of `all_items`.
    pub pinned: usize,
    pub deleted: Vec<String>,
    /// Downloads that failed and will be retried next pass.
    pub failed: Vec<String>,
    pub mode: ReconcileMode,
}

impl ReconcileOutcome {
    fn local_only(local: &BTreeMap<String, PathBuf>, mode: ReconcileMode) -> Self {
        Self {
            new_items: Vec::new(),
            all_items: local.keys().cloned().collect(),
            pinned: 0,
            deleted: Vec::new(),
            failed: Vec::new(),
            mode,
        }
    }
}

/// Bring `local_root` in line with the photos under `folder_id`.
///
/// # Errors
/// Only when the local root cannot be created or scanned; remote failures are
/// reported through [`ReconcileMode::PreserveOnly`].
#[instrument(skip(catalog, settings, rng), fields(root = %local_root.display()))]
pub async fn reconcile(
    catalog: &dyn RemoteCatalog,
    folder_id: &str,
    local_root: &Path,
    settings: &Settings,
    online: bool,
    rng: &mut StdRng,
) -> Result<ReconcileOutcome, Error> {
    fs::create_dir_all(local_root)?;
    let local = scan_mirror(local_root)?;

    if !online {
        debug!(local = local.len(), "offline; using local inventory");
        return Ok(ReconcileOutcome::local_only(&local, ReconcileMode::Offline));
    }

    let listing = match catalog
        .list_items(folder_id, true, &[SETTINGS_CONTAINER_NAME])
        .await
    {
        Ok(listing) => listing,
        Err(err) => {
            warn!(
                error = %err,
                local = local.len(),
                "remote listing failed; preserving local mirror"
            );
            return Ok(ReconcileOutcome::local_only(
                &local,
                ReconcileMode::PreserveOnly,
            ));
        }
    };

    let (items, pinned) = order_remote(listing, settings, rng);

    let mut new_items = Vec::new();
    let mut failed = Vec::new();
    for item in items.iter().filter(|i| !local.contains_key(&i.relative_path)) {
        match download(catalog, local_root, item).await {
            Ok(bytes) => {
                debug!(path = %item.relative_path, bytes, "downloaded");
                new_items.push(item.relative_path.clone());
            }
            Err(err) => {
                warn!(path = %item.relative_path, error = ?err, "download failed; skipping");
                failed.push(item.relative_path.clone());
            }
        }
    }

    let remote_paths: HashSet<&str> = items.iter().map(|i| i.relative_path.as_str()).collect();
    let mut deleted = Vec::new();
    for (rel, path) in local.iter().filter(|(rel, _)| !remote_paths.contains(rel.as_str())) {
        match delete_if_exists(path) {
            Ok(()) => {
                if let Some(parent) = path.parent() {
                    prune_empty_dirs(parent, local_root);
                }
                deleted.push(rel.clone());
            }
            Err(err) => warn!(path = %path.display(), error = %err, "delete failed"),
        }
    }

    info!(
        remote = items.len(),
        downloaded = new_items.len(),
        deleted = deleted.len(),
        failed = failed.len(),
        pinned,
        "reconciliation complete"
    );

    Ok(ReconcileOutcome {
        new_items,
        all_items: items.into_iter().map(|i| i.relative_path).collect(),
        pinned,
        deleted,
        failed,
        mode: ReconcileMode::Mirrored,
    })
}

/// Sanitize, deduplicate and order a remote listing.
///
/// Photos are sorted newest first. With a search query, matching photos form a
/// block at the front (newest first, or shuffled when shuffle is on); the
/// returned count is that block's length. When two photos map to the same path
/// the last one listed wins.
pub fn order_remote(
    listing: Vec<RemoteListing>,
    settings: &Settings,
    rng: &mut StdRng,
) -> (Vec<RemoteItem>, usize) {
    let query = settings.search_query.as_deref().map(str::to_lowercase);
    let mut items: Vec<(RemoteItem, bool)> = Vec::with_capacity(listing.len());
    let mut by_path: HashMap<String, usize> = HashMap::new();

    for entry in listing {
        let Some(relative_path) = sanitize_relative_path(&entry.path) else {
            warn!(id = %entry.id, path = %entry.path, "remote path unusable; skipping");
            continue;
        };
        let matched = query.as_deref().is_some_and(|q| entry.matches(q));
        let item = RemoteItem {
            id: entry.id,
            relative_path,
            created_at: entry.created_at,
        };
        match by_path.get(&item.relative_path) {
            Some(&idx) => {
                if items[idx].0.id != item.id {
                    warn!(
                        path = %item.relative_path,
                        kept = %item.id,
                        dropped = %items[idx].0.id,
                        "two remote photos share a path; last listed wins"
                    );
                }
                items[idx] = (item, matched);
            }
            None => {
                by_path.insert(item.relative_path.clone(), items.len());
                items.push((item, matched));
            }
        }
    }

    items.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));

    let (mut matched, rest): (Vec<_>, Vec<_>) = items.into_iter().partition(|(_, m)| *m);
    if settings.shuffle {
        matched.shuffle(rng);
    }
    let pinned = matched.len();
    let ordered = matched
        .into_iter()
        .chain(rest)
        .map(|(item, _)| item)
        .collect();
    (ordered, pinned)
}

async fn download(catalog: &dyn RemoteCatalog, root: &Path, item: &RemoteItem) -> Result<usize> {
    let bytes = catalog
        .fetch(&item.id)
        .await
        .with_context(|| format!("fetching {}", item.id))?;
    let target = root.join(&item.relative_path);
    write_atomic(&target, &bytes).with_context(|| format!("writing {}", target.display()))?;
    Ok(bytes.len())
}

/// Write `bytes` next to `target` and rename into place, so a reader never
/// observes a partially written photo.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(PARTIAL_SUFFIX);
    let tmp = PathBuf::from(tmp);
    let written = fs::File::create(&tmp).and_then(|mut f| {
        f.write_all(bytes)?;
        f.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&tmp, target)) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}

fn delete_if_exists(p: &Path) -> io::Result<()> {
    match fs::remove_file(p) {
        Ok(()) => {
            info!(path = %p.display(), "delete: removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %p.display(), "delete: source vanished during remove; skipping");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Remove `dir` and its ancestors while they are empty, never touching `root`.
fn prune_empty_dirs(dir: &Path, root: &Path) {
    let mut current = Some(dir);
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        debug!(dir = %dir.display(), "pruned empty folder");
        current = dir.parent();
    }
}
