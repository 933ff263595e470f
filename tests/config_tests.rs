use drive_photo_frame::config::{Configuration, DisplayMode, Rotation};
use drive_photo_frame::remote::TokenSource;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn parse_minimal_config_uses_defaults() {
    let yaml = r#"
photo-library-path: "/photos"
remote-folder-id: "1uqSiuVgeeYTMnmHnlfIi1j4N_D_XzppG"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.photo_library_path, PathBuf::from("/photos"));
    assert_eq!(cfg.settings_poll_interval, Duration::from_secs(60));
    assert_eq!(cfg.defaults.display_interval, Duration::from_secs(45 * 60));
    assert_eq!(cfg.defaults.sync_interval, Duration::from_secs(10 * 60));
    assert!(cfg.defaults.shuffle);
    assert_eq!(cfg.defaults.search_query, None);
    assert_eq!(cfg.defaults.display_mode, DisplayMode::Captioned);
    assert_eq!(cfg.defaults.rotation, Rotation::Deg0);
    assert_eq!(cfg.connectivity.probe_address, "www.googleapis.com:443");
    assert_eq!(cfg.drive.download_timeout, Duration::from_secs(120));
}

#[test]
fn parse_full_config() {
    let yaml = r#"
photo-library-path: /var/lib/photo-frame/photos
remote-folder-id: "abc123"
settings-poll-interval: 5m
drive:
  credentials:
    client-id: id
    client-secret: secret
    refresh-token: refresh
  request-timeout: 10s
  download-timeout: 1m
connectivity:
  probe-address: 127.0.0.1:8080
  check-interval: 15s
  timeout: 2s
defaults:
  display-interval: 2m
  sync-interval: 30m
  shuffle: false
  search-query: "  Beach "
  display-mode: simple
  rotation: 270
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.settings_poll_interval, Duration::from_secs(300));
    assert_eq!(cfg.drive.request_timeout, Duration::from_secs(10));
    assert_eq!(cfg.connectivity.check_interval, Duration::from_secs(15));
    assert_eq!(cfg.defaults.display_interval, Duration::from_secs(120));
    assert!(!cfg.defaults.shuffle);
    assert_eq!(cfg.defaults.search_query.as_deref(), Some("beach"));
    assert_eq!(cfg.defaults.display_mode, DisplayMode::Simple);
    assert_eq!(cfg.defaults.rotation, Rotation::Deg270);
    assert!(matches!(
        cfg.drive.token_source().unwrap(),
        TokenSource::Refresh { ref client_id, .. } if client_id == "id"
    ));
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
photo-library-path: "/photos"
remote-folder-id: "abc"
oversample: 1.5
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn invalid_rotation_is_rejected() {
    let yaml = r#"
photo-library-path: "/photos"
remote-folder-id: "abc"
defaults:
  rotation: 45
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn placeholder_folder_id_fails_validation() {
    let yaml = r#"
photo-library-path: "/photos"
remote-folder-id: "<your folder id>"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn zero_display_interval_fails_validation() {
    let yaml = r#"
photo-library-path: "/photos"
remote-folder-id: "abc"
defaults:
  display-interval: 0s
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn blank_search_query_is_dropped() {
    let yaml = r#"
photo-library-path: "/photos"
remote-folder-id: "abc"
defaults:
  search-query: "   "
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.defaults.search_query, None);
}
