use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::util::{error::MusicResult, player::SessionEvent};

/// Completion callback of one started stream.
///
/// The audio backend calls [`PlaybackDone::finished`] from whatever thread it
/// runs on; all it does is post a message to the owning session, which then
/// decides what plays next on its own task.
#[derive(Debug)]
pub struct PlaybackDone {
    playback_id: u64,
    events: UnboundedSender<SessionEvent>,
}

impl PlaybackDone {
    pub(crate) fn new(playback_id: u64, events: UnboundedSender<SessionEvent>) -> Self {
        Self { playback_id, events }
    }

    pub fn playback_id(&self) -> u64 {
        self.playback_id
    }

    /// Consumes the callback, so it fires at most once.
    pub fn finished(self, error: Option<String>) {
        let event = SessionEvent::PlaybackFinished {
            playback_id: self.playback_id,
            error,
        };
        if self.events.send(event).is_err() {
            tracing::debug!(playback_id = self.playback_id, "session already closed, completion dropped");
        }
    }
}

/// Audio output of one voice connection.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Replace whatever is playing with the stream at `url`.
    async fn start(&self, url: &str, volume: f32, done: PlaybackDone) -> MusicResult<()>;
    async fn stop(&self);
    async fn pause(&self) -> MusicResult<()>;
    async fn resume(&self) -> MusicResult<()>;
    /// `volume` is a ratio in 0.0..=1.0.
    async fn set_volume(&self, volume: f32) -> MusicResult<()>;
    async fn is_playing(&self) -> bool;
    /// True when nobody but the bot is left in the voice channel.
    async fn is_alone(&self) -> bool;
    async fn disconnect(&self);
}
