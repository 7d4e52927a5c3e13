use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaverConfig {
    pub version: u32,
    #[serde(default)]
    pub grid: GridSection,
    #[serde(default)]
    pub bundle: BundleSection,
    #[serde(default)]
    pub spotify: SpotifySection,
    #[serde(default)]
    pub apple: AppleSection,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            version: 1,
            grid: GridSection::default(),
            bundle: BundleSection::default(),
            spotify: SpotifySection::default(),
            apple: AppleSection::default(),
        }
    }
}

/// Which way the host's vertical axis grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    /// Origin at the bottom-left corner, y grows upwards (AppKit layers).
    #[default]
    BottomUp,
    /// Origin at the top-left corner, y grows downwards (CSS, most toolkits).
    TopDown,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GridSection {
    #[serde(default = "default_gap")]
    pub gap: f64,
    #[serde(
        default = "default_scroll_period",
        deserialize_with = "deserialize_duration"
    )]
    pub scroll_period: Duration,
    #[serde(default = "default_fly_in", deserialize_with = "deserialize_duration")]
    pub fly_in: Duration,
    #[serde(default = "default_fade_in", deserialize_with = "deserialize_duration")]
    pub fade_in: Duration,
    #[serde(
        default = "default_max_fly_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub max_fly_delay: Duration,
    #[serde(default = "default_fly_scale")]
    pub fly_scale: f64,
    #[serde(default = "default_fly_spread")]
    pub fly_spread: f64,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            gap: default_gap(),
            scroll_period: default_scroll_period(),
            fly_in: default_fly_in(),
            fade_in: default_fade_in(),
            max_fly_delay: default_max_fly_delay(),
            fly_scale: default_fly_scale(),
            fly_spread: default_fly_spread(),
            orientation: Orientation::default(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BundleSection {
    #[serde(default = "default_bundle_name")]
    pub name: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_artwork_size")]
    pub artwork_size: u32,
}

impl Default for BundleSection {
    fn default() -> Self {
        Self {
            name: default_bundle_name(),
            display_name: default_display_name(),
            batch_size: default_batch_size(),
            artwork_size: default_artwork_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpotifySection {
    pub client_id: Option<String>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

impl Default for SpotifySection {
    fn default() -> Self {
        Self {
            client_id: None,
            redirect_uri: default_redirect_uri(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppleSection {
    /// Ready-made developer token; takes precedence over signing one.
    pub developer_token: Option<String>,
    pub music_user_token: Option<String>,
    /// MusicKit signing credentials used to mint developer tokens.
    pub team_id: Option<String>,
    pub key_id: Option<String>,
    pub private_key_path: Option<PathBuf>,
}

fn default_gap() -> f64 {
    3.0
}

fn default_scroll_period() -> Duration {
    Duration::from_secs(120)
}

fn default_fly_in() -> Duration {
    Duration::from_secs(1)
}

fn default_fade_in() -> Duration {
    Duration::from_millis(400)
}

fn default_max_fly_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_fly_scale() -> f64 {
    1.8
}

fn default_fly_spread() -> f64 {
    1.5
}

fn default_bundle_name() -> String {
    "TomtopiaSaver".to_string()
}

fn default_display_name() -> String {
    "Tomtopia Screensaver".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_artwork_size() -> u32 {
    500
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:8888/callback".to_string()
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl SaverConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SaverConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let grid = &self.grid;
        if !grid.gap.is_finite() || grid.gap < 0.0 {
            return Err(ConfigError::Invalid("grid.gap must be >= 0".into()));
        }
        if grid.scroll_period.is_zero() {
            return Err(ConfigError::Invalid(
                "grid.scroll_period must be greater than zero".into(),
            ));
        }
        if grid.fly_in.is_zero() {
            return Err(ConfigError::Invalid(
                "grid.fly_in must be greater than zero".into(),
            ));
        }
        if grid.fade_in > grid.fly_in {
            return Err(ConfigError::Invalid(format!(
                "grid.fade_in ({}) must not exceed grid.fly_in ({})",
                humantime::format_duration(grid.fade_in),
                humantime::format_duration(grid.fly_in)
            )));
        }
        if !grid.fly_scale.is_finite() || grid.fly_scale <= 0.0 {
            return Err(ConfigError::Invalid("grid.fly_scale must be > 0".into()));
        }
        if !grid.fly_spread.is_finite() || grid.fly_spread < 0.0 {
            return Err(ConfigError::Invalid("grid.fly_spread must be >= 0".into()));
        }

        let bundle = &self.bundle;
        validate_bundle_name(&bundle.name)?;
        if bundle.display_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "bundle.display_name may not be empty".into(),
            ));
        }
        if bundle.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "bundle.batch_size must be at least 1".into(),
            ));
        }
        if bundle.artwork_size == 0 {
            return Err(ConfigError::Invalid(
                "bundle.artwork_size must be greater than zero".into(),
            ));
        }

        if let Some(client_id) = &self.spotify.client_id {
            if client_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "spotify.client_id may not be empty when set".into(),
                ));
            }
        }
        if !self.spotify.redirect_uri.starts_with("http://")
            && !self.spotify.redirect_uri.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "spotify.redirect_uri '{}' must be an http(s) url",
                self.spotify.redirect_uri
            )));
        }

        let apple = &self.apple;
        let signing = [
            apple.team_id.is_some(),
            apple.key_id.is_some(),
            apple.private_key_path.is_some(),
        ];
        if signing.contains(&true) && signing.contains(&false) {
            return Err(ConfigError::Invalid(
                "apple.team_id, apple.key_id and apple.private_key_path must be set together"
                    .into(),
            ));
        }
        for (field, value) in [("team_id", &apple.team_id), ("key_id", &apple.key_id)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "apple.{field} may not be empty when set"
                )));
            }
        }

        Ok(())
    }
}

fn validate_bundle_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Invalid("bundle.name may not be empty".into()));
    }
    if name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(ConfigError::Invalid(format!(
            "bundle.name '{name}' must be a plain file name"
        )));
    }
    Ok(())
}
