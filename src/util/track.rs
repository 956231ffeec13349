use std::time::Duration;

use async_trait::async_trait;
use songbird::input::AuxMetadata;

use crate::util::error::MusicResult;

/// A resolved song. Stored by value in queues and playlists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackDescriptor {
    /// What the user typed (or the autoplay filler query).
    pub query: String,
    pub title: String,
    /// Canonical page URL, not the stream URL.
    pub url: String,
    pub thumbnail: Option<String>,
    /// Length in seconds, `None` for live streams or unknown.
    pub duration: Option<u64>,
}

impl TrackDescriptor {
    #[cfg(test)]
    pub fn new(query: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            title: title.into(),
            url: url.into(),
            thumbnail: None,
            duration: None,
        }
    }

    #[cfg(test)]
    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration = Some(secs);
        self
    }

    /// Builds a descriptor from yt-dlp metadata. Returns `None` when the
    /// lookup produced no usable page URL.
    pub fn from_metadata(query: &str, meta: AuxMetadata) -> Option<Self> {
        let url = meta.source_url.filter(|u| !u.trim().is_empty())?;
        let title = meta
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| url.clone());
        Some(Self {
            query: query.to_string(),
            title,
            url,
            thumbnail: meta.thumbnail,
            duration: meta.duration.as_ref().map(Duration::as_secs),
        })
    }

    /// `m:ss`, or `--:--` when the length is unknown.
    pub fn duration_label(&self) -> String {
        match self.duration {
            Some(secs) => format!("{}:{:02}", secs / 60, secs % 60),
            None => "--:--".to_string(),
        }
    }
}

/// Turns user queries into tracks and tracks into playable stream URLs.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// First search hit for `query`, or `TrackNotFound`.
    async fn search(&self, query: &str) -> MusicResult<TrackDescriptor>;

    /// Direct media URL for the sink, or `PlaybackStartFailed`.
    async fn stream_url(&self, track: &TrackDescriptor) -> MusicResult<String>;
}
