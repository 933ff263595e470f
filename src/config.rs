use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;

use crate::remote::TokenSource;

pub use config_model::{DisplayMode, Rotation, SettingKey, Settings};

/// Environment variable that supplies a bearer token when the config has none.
pub const ACCESS_TOKEN_ENV: &str = "DRIVE_ACCESS_TOKEN";

/// Folder ids left over from sample configs.
const PLACEHOLDER_FOLDER_IDS: &[&str] = &["your_folder_id", "folder_id", "changeme", "todo"];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DriveConfig {
    /// Static bearer token; takes precedence over `credentials`.
    pub access_token: Option<String>,
    /// OAuth refresh-token credentials.
    pub credentials: Option<OAuthCredentials>,
    /// Timeout for listing and settings calls.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Timeout for a single photo download.
    #[serde(with = "humantime_serde")]
    pub download_timeout: Duration,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            credentials: None,
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(120),
        }
    }
}

impl DriveConfig {
    /// Resolve how the Drive client authenticates.
    pub fn token_source(&self) -> Result<TokenSource> {
        if let Some(token) = self.access_token.as_ref().filter(|t| !t.trim().is_empty()) {
            return Ok(TokenSource::Static(token.trim().to_string()));
        }
        if let Some(creds) = &self.credentials {
            return Ok(TokenSource::Refresh {
                client_id: creds.client_id.clone(),
                client_secret: creds.client_secret.clone(),
                refresh_token: creds.refresh_token.clone(),
            });
        }
        match env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => {
                Ok(TokenSource::Static(token.trim().to_string()))
            }
            _ => bail!(
                "no drive credentials: set drive.access-token, drive.credentials \
                 or {ACCESS_TOKEN_ENV}"
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ConnectivityConfig {
    /// `host:port` that must accept a TCP connection for the frame to count as online.
    pub probe_address: String,
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_address: "www.googleapis.com:443".to_string(),
            check_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Root of the local mirror.
    pub photo_library_path: PathBuf,
    /// Drive folder id whose tree is mirrored.
    pub remote_folder_id: String,
    /// How often the remote settings folder is re-read.
    #[serde(with = "humantime_serde")]
    pub settings_poll_interval: Duration,
    pub drive: DriveConfig,
    pub connectivity: ConnectivityConfig,
    /// Static slideshow defaults; remote settings override them at runtime.
    pub defaults: Settings,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            photo_library_path: PathBuf::new(),
            remote_folder_id: String::new(),
            settings_poll_interval: Duration::from_secs(60),
            drive: DriveConfig::default(),
            connectivity: ConnectivityConfig::default(),
            defaults: Settings::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(mut self) -> Result<Self> {
        ensure!(
            !self.photo_library_path.as_os_str().is_empty(),
            "photo-library-path must be set"
        );
        let folder = self.remote_folder_id.trim();
        ensure!(
            !is_placeholder_folder_id(folder),
            "remote-folder-id is missing or still a placeholder ({:?})",
            self.remote_folder_id
        );
        self.remote_folder_id = folder.to_string();
        ensure!(
            !self.settings_poll_interval.is_zero(),
            "settings-poll-interval must be greater than zero"
        );
        ensure!(
            !self.drive.request_timeout.is_zero() && !self.drive.download_timeout.is_zero(),
            "drive timeouts must be greater than zero"
        );
        ensure!(
            !self.connectivity.timeout.is_zero(),
            "connectivity.timeout must be greater than zero"
        );
        ensure!(
            !self.connectivity.probe_address.trim().is_empty(),
            "connectivity.probe-address must not be empty"
        );
        self.defaults
            .validate()
            .context("invalid slideshow defaults")?;
        self.defaults = self.defaults.normalized();
        Ok(self)
    }
}

fn is_placeholder_folder_id(id: &str) -> bool {
    id.is_empty()
        || id.starts_with('<')
        || PLACEHOLDER_FOLDER_IDS
            .iter()
            .any(|p| id.eq_ignore_ascii_case(p))
}
