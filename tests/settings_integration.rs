mod common;

use std::time::Duration;

use common::FakeCatalog;
use drive_photo_frame::config::{SettingKey, Settings};
use drive_photo_frame::tasks::settings::{
    bootstrap, ensure_defaults, locate_settings_container, resolve,
};

const ROOT: &str = "root-folder";

#[tokio::test]
async fn renaming_shuffle_folder_flips_the_setting() {
    let catalog = FakeCatalog::new();
    let container = catalog.add_container(ROOT, "settings");
    catalog.add_container(&container, "shuffle_false");
    catalog.add_container(&container, "display_interval_mins_45");

    let current = Settings::default();
    let (first, found) = resolve(&catalog, &container, &current).await.unwrap();
    assert!(!first.shuffle);
    assert!(found.contains(&SettingKey::Shuffle));

    catalog.rename_container(&container, "shuffle_false", "shuffle_true");
    let (second, found) = resolve(&catalog, &container, &first).await.unwrap();
    assert!(second.shuffle);
    assert!(found.contains(&SettingKey::Shuffle));
    assert_eq!(first.changed_keys(&second), vec![SettingKey::Shuffle]);
    assert!(!first.requires_rebuild(&second));
}

#[tokio::test]
async fn malformed_names_are_ignored_and_search_cleared_when_absent() {
    let catalog = FakeCatalog::new();
    let container = catalog.add_container(ROOT, "settings");
    catalog.add_container(&container, "display_interval_mins_abc");
    catalog.add_container(&container, "sync_interval_mins_0");
    catalog.add_container(&container, "Holiday photos");
    catalog.add_container(&container, "SYNC_INTERVAL_MINS_5");

    let current = Settings {
        search_query: Some("beach".into()),
        ..Settings::default()
    };
    let (resolved, found) = resolve(&catalog, &container, &current).await.unwrap();
    assert_eq!(resolved.display_interval, current.display_interval);
    assert_eq!(resolved.sync_interval, Duration::from_secs(5 * 60));
    assert_eq!(resolved.search_query, None);
    assert!(!found.contains(&SettingKey::DisplayInterval));
    assert!(current.requires_rebuild(&resolved));
}

#[tokio::test]
async fn settings_folder_is_created_once() {
    let catalog = FakeCatalog::new();
    let first = locate_settings_container(&catalog, ROOT).await.unwrap();
    let second = locate_settings_container(&catalog, ROOT).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(catalog.container_names(ROOT), vec!["settings"]);
}

#[tokio::test]
async fn existing_settings_folder_is_found_case_insensitively() {
    let catalog = FakeCatalog::new();
    catalog.add_container(ROOT, "Holidays");
    let id = catalog.add_container(ROOT, " Settings ");
    assert_eq!(locate_settings_container(&catalog, ROOT).await.unwrap(), id);
    assert_eq!(catalog.container_names(ROOT).len(), 2);
}

#[tokio::test]
async fn defaults_are_published_without_duplicates() {
    let catalog = FakeCatalog::new();
    let container = catalog.add_container(ROOT, "settings");
    catalog.add_container(&container, "shuffle_false");

    let defaults = Settings {
        display_interval: Duration::from_secs(30 * 60),
        sync_interval: Duration::from_secs(10 * 60),
        ..Settings::default()
    };
    let (_, found) = resolve(&catalog, &container, &defaults).await.unwrap();
    let created = ensure_defaults(&catalog, &container, &defaults, &found)
        .await
        .unwrap();
    assert_eq!(
        created,
        vec!["display_interval_mins_30", "sync_interval_mins_10"]
    );

    // A second run finds everything and creates nothing.
    let (_, found) = resolve(&catalog, &container, &defaults).await.unwrap();
    let again = ensure_defaults(&catalog, &container, &defaults, &found)
        .await
        .unwrap();
    assert!(again.is_empty());

    let mut names = catalog.container_names(&container);
    names.sort();
    assert_eq!(
        names,
        vec![
            "display_interval_mins_30",
            "shuffle_false",
            "sync_interval_mins_10"
        ]
    );
}

#[tokio::test]
async fn bootstrap_publishes_defaults_and_honours_existing_overrides() {
    let catalog = FakeCatalog::new();
    let defaults = Settings {
        search_query: Some("beach".into()),
        ..Settings::default()
    };

    let (container, settings) = bootstrap(&catalog, ROOT, &defaults).await.unwrap();
    assert_eq!(settings, defaults);
    let mut names = catalog.container_names(&container);
    names.sort();
    assert_eq!(
        names,
        vec![
            "display_interval_mins_45",
            "search_beach",
            "shuffle_true",
            "sync_interval_mins_10"
        ]
    );

    catalog.rename_container(&container, "display_interval_mins_45", "display_interval_mins_5");
    let (again, settings) = bootstrap(&catalog, ROOT, &defaults).await.unwrap();
    assert_eq!(again, container);
    assert_eq!(settings.display_interval, Duration::from_secs(5 * 60));
    assert_eq!(catalog.container_names(&container).len(), 4);
}
