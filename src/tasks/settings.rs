//! Remote settings: folders under `settings/` whose names carry overrides.

use std::collections::{BTreeSet, HashSet};

use config_model::merge_overrides;
use tracing::{debug, info, instrument, warn};

use crate::config::{SettingKey, Settings};
use crate::remote::{RemoteCatalog, RemoteError};
use crate::tasks::reconcile::SETTINGS_CONTAINER_NAME;

/// Find the `settings` folder under `root_id`, creating it when absent.
pub async fn locate_settings_container(
    catalog: &dyn RemoteCatalog,
    root_id: &str,
) -> Result<String, RemoteError> {
    let existing = catalog.list_containers(root_id).await?;
    if let Some(found) = existing
        .into_iter()
        .find(|c| c.name.trim().eq_ignore_ascii_case(SETTINGS_CONTAINER_NAME))
    {
        return Ok(found.id);
    }
    let created = catalog
        .create_container(SETTINGS_CONTAINER_NAME, root_id)
        .await?;
    info!(id = %created.id, "created remote settings folder");
    Ok(created.id)
}

/// Read overrides from the settings folder and merge them over `current`.
///
/// Returns the merged settings and the keys that had a container. A missing
/// search container clears the search query; other missing keys keep their
/// current value.
#[instrument(skip(catalog, current))]
pub async fn resolve(
    catalog: &dyn RemoteCatalog,
    container_id: &str,
    current: &Settings,
) -> Result<(Settings, BTreeSet<SettingKey>), RemoteError> {
    let containers = catalog.list_containers(container_id).await?;
    let report = merge_overrides(current, containers.iter().map(|c| c.name.as_str()));
    for name in &report.malformed {
        debug!(name = %name, "ignoring malformed settings folder");
    }
    debug!(found = ?report.found, "resolved remote settings");
    Ok((report.settings, report.found))
}

/// Publish a folder for every key that has no container yet, so the owner can
/// see and rename it. Returns the names that were created.
pub async fn ensure_defaults(
    catalog: &dyn RemoteCatalog,
    container_id: &str,
    defaults: &Settings,
    found: &BTreeSet<SettingKey>,
) -> Result<Vec<String>, RemoteError> {
    let existing: HashSet<String> = catalog
        .list_containers(container_id)
        .await?
        .into_iter()
        .map(|c| c.name.trim().to_lowercase())
        .collect();

    let mut created = Vec::new();
    for key in SettingKey::ALL.into_iter().filter(|k| !found.contains(k)) {
        let Some(name) = defaults.container_name(key) else {
            continue;
        };
        if existing.contains(&name.to_lowercase()) {
            continue;
        }
        match catalog.create_container(&name, container_id).await {
            Ok(_) => {
                info!(name = %name, "created default settings folder");
                created.push(name);
            }
            Err(err) => warn!(name = %name, error = %err, "failed to create settings folder"),
        }
    }
    Ok(created)
}

/// Startup sequence: locate the settings folder, publish missing defaults, and
/// return the folder id with the effective settings.
pub async fn bootstrap(
    catalog: &dyn RemoteCatalog,
    root_id: &str,
    defaults: &Settings,
) -> Result<(String, Settings), RemoteError> {
    let container_id = locate_settings_container(catalog, root_id).await?;
    let (settings, found) = resolve(catalog, &container_id, defaults).await?;
    let created = ensure_defaults(catalog, &container_id, defaults, &found).await?;
    if created.is_empty() {
        return Ok((container_id, settings));
    }
    let (settings, _) = resolve(catalog, &container_id, defaults).await?;
    Ok((container_id, settings))
}
