use std::{path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("no Discord token: set [token] token in the config file or DISCORD_TOKEN")]
    MissingToken,
    #[error("music.default_volume must be between 0 and 100 (got {0})")]
    InvalidVolume(u8),
}

/// Whole `Setting.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub token: Tokens,
    #[serde(default)]
    pub music: MusicSettings,
    #[serde(default)]
    pub yt_dlp: YtDlpSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct Tokens {
    #[serde(default)]
    pub token: String,
}

/// Playback behaviour shared by every session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MusicSettings {
    pub prefix: String,
    /// Initial volume of a new session, 0..=100.
    pub default_volume: u8,
    pub idle_timeout_secs: u64,
    /// How long reaction shortcuts (move correction, delete hint) stay live.
    pub confirm_timeout_secs: u64,
    /// Search used to refill an empty queue when autoplay is on.
    pub autoplay_query: String,
    pub max_queue_display: usize,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            prefix: "-".to_string(),
            default_volume: 50,
            idle_timeout_secs: 900,
            confirm_timeout_secs: 60,
            autoplay_query: "recommended song".to_string(),
            max_queue_display: 10,
        }
    }
}

impl MusicSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }
}

/// `[yt_dlp]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YtDlpSettings {
    pub path: String,
    pub cookies_file: Option<String>,
    pub cookies_from_browser: Option<String>,
    pub proxy: Option<String>,
    pub extra_args: Vec<String>,
}

impl Default for YtDlpSettings {
    fn default() -> Self {
        Self {
            path: "yt-dlp".to_string(),
            cookies_file: None,
            cookies_from_browser: None,
            proxy: None,
            extra_args: Vec::new(),
        }
    }
}

impl BotConfig {
    /// Read `path` (if it exists), apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.is_file() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            Self::parse(&contents, &path.display().to_string())?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults and environment");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Environment wins over the file. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = var("DISCORD_TOKEN") {
            self.token.token = token;
        }
        if let Some(prefix) = var("BOT_PREFIX") {
            self.music.prefix = prefix;
        }
        if let Some(path) = var("YTDLP_PATH") {
            self.yt_dlp.path = path;
        }
        if let Some(file) = var("YTDLP_COOKIES_FILE") {
            self.yt_dlp.cookies_file = Some(file);
        }
        if let Some(browser) = var("YTDLP_COOKIES_FROM_BROWSER") {
            self.yt_dlp.cookies_from_browser = Some(browser);
        }
        if let Some(proxy) = var("YTDLP_PROXY") {
            self.yt_dlp.proxy = Some(proxy);
        }
        // Space separated, no quoting.
        if let Some(extra) = var("YTDLP_EXTRA_ARGS") {
            self.yt_dlp
                .extra_args
                .extend(extra.split_whitespace().map(str::to_string));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.music.default_volume > 100 {
            return Err(ConfigError::InvalidVolume(self.music.default_volume));
        }
        Ok(())
    }
}
