use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;
use serde::de::{self, Deserializer, Unexpected};

pub use naming::{
    ContainerName, DISPLAY_INTERVAL_PREFIX, FILTER_PREFIX, SEARCH_PREFIX, SHUFFLE_PREFIX,
    SYNC_INTERVAL_PREFIX, SettingOverride, classify,
};

/// How the renderer presents a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    /// Photo only.
    Simple,
    /// Photo with a caption line (description and capture date).
    #[default]
    Captioned,
}

/// Clockwise rotation applied to every photo before it is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether the rotation swaps width and height.
    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl<'de> Deserialize<'de> for Rotation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let degrees = u64::deserialize(deserializer)?;
        u16::try_from(degrees)
            .ok()
            .and_then(Rotation::from_degrees)
            .ok_or_else(|| {
                de::Error::invalid_value(Unexpected::Unsigned(degrees), &"one of 0, 90, 180, 270")
            })
    }
}

/// Runtime slideshow settings.
///
/// Static defaults come from the YAML configuration; the remote settings
/// containers override individual keys at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Settings {
    /// How long each photo stays on screen.
    #[serde(with = "humantime_serde")]
    pub display_interval: Duration,
    /// How often the mirror is reconciled against the remote folder.
    #[serde(with = "humantime_serde")]
    pub sync_interval: Duration,
    pub shuffle: bool,
    /// Case-insensitive substring filter; matching photos are shown first.
    pub search_query: Option<String>,
    pub display_mode: DisplayMode,
    pub rotation: Rotation,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_interval: Duration::from_secs(45 * 60),
            sync_interval: Duration::from_secs(10 * 60),
            shuffle: true,
            search_query: None,
            display_mode: DisplayMode::default(),
            rotation: Rotation::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.display_interval.is_zero(),
            "display-interval must be greater than zero"
        );
        ensure!(
            !self.sync_interval.is_zero(),
            "sync-interval must be greater than zero"
        );
        Ok(())
    }

    /// Lower-cases the search query and drops it when blank.
    pub fn normalized(mut self) -> Self {
        self.search_query = self
            .search_query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        self
    }

    pub fn apply(&mut self, value: &SettingOverride) {
        match value {
            SettingOverride::DisplayInterval(d) => self.display_interval = *d,
            SettingOverride::SyncInterval(d) => self.sync_interval = *d,
            SettingOverride::Shuffle(b) => self.shuffle = *b,
            SettingOverride::Search(q) => self.search_query = Some(q.clone()),
        }
    }

    /// Container name that publishes the current value of `key`, if any.
    pub fn container_name(&self, key: SettingKey) -> Option<String> {
        let value = match key {
            SettingKey::DisplayInterval => SettingOverride::DisplayInterval(self.display_interval),
            SettingKey::SyncInterval => SettingOverride::SyncInterval(self.sync_interval),
            SettingKey::Shuffle => SettingOverride::Shuffle(self.shuffle),
            SettingKey::Search => SettingOverride::Search(self.search_query.clone()?),
        };
        Some(value.container_name())
    }

    /// Keys whose values differ between `self` and `other`.
    pub fn changed_keys(&self, other: &Settings) -> Vec<SettingKey> {
        SettingKey::ALL
            .into_iter()
            .filter(|key| match key {
                SettingKey::DisplayInterval => self.display_interval != other.display_interval,
                SettingKey::SyncInterval => self.sync_interval != other.sync_interval,
                SettingKey::Shuffle => self.shuffle != other.shuffle,
                SettingKey::Search => self.search_query != other.search_query,
            })
            .collect()
    }

    /// A new search query reorders the whole mirror; everything else applies in place.
    pub fn requires_rebuild(&self, other: &Settings) -> bool {
        self.search_query != other.search_query
    }
}

/// Setting categories that can be overridden remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    DisplayInterval,
    SyncInterval,
    Shuffle,
    Search,
}

impl SettingKey {
    pub const ALL: [SettingKey; 4] = [
        SettingKey::DisplayInterval,
        SettingKey::SyncInterval,
        SettingKey::Shuffle,
        SettingKey::Search,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::DisplayInterval => "display_interval",
            SettingKey::SyncInterval => "sync_interval",
            SettingKey::Shuffle => "shuffle",
            SettingKey::Search => "search",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of folding a listing of container names over the current settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub settings: Settings,
    pub found: BTreeSet<SettingKey>,
    /// Names that carried a known prefix but an unusable value.
    pub malformed: Vec<String>,
}

/// Merge remote overrides over `current`.
///
/// Keys without a container keep their current value, except the search
/// query, which is cleared when no search container exists. When several
/// containers encode the same key the last one in `names` wins.
pub fn merge_overrides<'a, I>(current: &Settings, names: I) -> MergeReport
where
    I: IntoIterator<Item = &'a str>,
{
    let mut settings = current.clone();
    let mut found = BTreeSet::new();
    let mut malformed = Vec::new();
    for name in names {
        match classify(name) {
            ContainerName::Override(value) => {
                found.insert(value.key());
                settings.apply(&value);
            }
            ContainerName::Malformed { .. } => malformed.push(name.to_string()),
            ContainerName::Unrecognized => {}
        }
    }
    if !found.contains(&SettingKey::Search) {
        settings.search_query = None;
    }
    MergeReport {
        settings,
        found,
        malformed,
    }
}

mod naming {
    use super::*;

    pub const DISPLAY_INTERVAL_PREFIX: &str = "display_interval_mins_";
    pub const SYNC_INTERVAL_PREFIX: &str = "sync_interval_mins_";
    pub const SHUFFLE_PREFIX: &str = "shuffle_";
    pub const SEARCH_PREFIX: &str = "search_";
    /// Older frames published the search query under this prefix.
    pub const FILTER_PREFIX: &str = "filter_";

    /// One remote override, decoded from a container name.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SettingOverride {
        DisplayInterval(Duration),
        SyncInterval(Duration),
        Shuffle(bool),
        Search(String),
    }

    impl SettingOverride {
        pub fn key(&self) -> SettingKey {
            match self {
                SettingOverride::DisplayInterval(_) => SettingKey::DisplayInterval,
                SettingOverride::SyncInterval(_) => SettingKey::SyncInterval,
                SettingOverride::Shuffle(_) => SettingKey::Shuffle,
                SettingOverride::Search(_) => SettingKey::Search,
            }
        }

        /// Encode as a container name. Intervals are published in whole
        /// minutes, never less than one.
        pub fn container_name(&self) -> String {
            match self {
                SettingOverride::DisplayInterval(d) => {
                    format!("{DISPLAY_INTERVAL_PREFIX}{}", whole_minutes(*d))
                }
                SettingOverride::SyncInterval(d) => {
                    format!("{SYNC_INTERVAL_PREFIX}{}", whole_minutes(*d))
                }
                SettingOverride::Shuffle(b) => format!("{SHUFFLE_PREFIX}{b}"),
                SettingOverride::Search(q) => format!("{SEARCH_PREFIX}{}", q.to_lowercase()),
            }
        }
    }

    /// Classification of a single container name.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ContainerName {
        Override(SettingOverride),
        Malformed { key: SettingKey, value: String },
        Unrecognized,
    }

    /// Decode a container name. Matching is case-insensitive.
    pub fn classify(name: &str) -> ContainerName {
        let name = name.trim().to_lowercase();
        if let Some(value) = name.strip_prefix(DISPLAY_INTERVAL_PREFIX) {
            return minutes(value)
                .map(SettingOverride::DisplayInterval)
                .map_or_else(
                    || malformed(SettingKey::DisplayInterval, value),
                    ContainerName::Override,
                );
        }
        if let Some(value) = name.strip_prefix(SYNC_INTERVAL_PREFIX) {
            return minutes(value).map(SettingOverride::SyncInterval).map_or_else(
                || malformed(SettingKey::SyncInterval, value),
                ContainerName::Override,
            );
        }
        if let Some(value) = name.strip_prefix(SHUFFLE_PREFIX) {
            return match value {
                "true" => ContainerName::Override(SettingOverride::Shuffle(true)),
                "false" => ContainerName::Override(SettingOverride::Shuffle(false)),
                other => malformed(SettingKey::Shuffle, other),
            };
        }
        if let Some(value) = name
            .strip_prefix(SEARCH_PREFIX)
            .or_else(|| name.strip_prefix(FILTER_PREFIX))
        {
            let query = value.trim();
            if query.is_empty() {
                return malformed(SettingKey::Search, value);
            }
            return ContainerName::Override(SettingOverride::Search(query.to_string()));
        }
        ContainerName::Unrecognized
    }

    fn malformed(key: SettingKey, value: &str) -> ContainerName {
        ContainerName::Malformed {
            key,
            value: value.to_string(),
        }
    }

    fn minutes(value: &str) -> Option<Duration> {
        let mins = value.parse::<u64>().ok().filter(|m| *m > 0)?;
        mins.checked_mul(60).map(Duration::from_secs)
    }

    fn whole_minutes(d: Duration) -> u64 {
        (d.as_secs() / 60).max(1)
    }
}
