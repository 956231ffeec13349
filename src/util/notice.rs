use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, CreateMessage, Http};

use crate::util::{music_ui, track::TrackDescriptor};

/// Things a session reports on its own, outside of any command reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Auto-advance started a track.
    NowPlaying { track: TrackDescriptor, queued: usize },
    /// Autoplay appended a filler track.
    AutoplayQueued(TrackDescriptor),
    /// Starting a queued track failed; it will be retried once.
    StartFailed(TrackDescriptor),
    /// The retry failed too and the track was dropped.
    Dropped { track: TrackDescriptor, reason: String },
    QueueFinished,
    IdleDisconnect,
    /// The bot was removed from voice by something other than `leave`.
    VoiceLost,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: Notice);
}

/// Posts notices as embeds into the text channel the session was opened from.
pub struct DiscordNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, notice: Notice) {
        let (embed, components) = music_ui::notice_message(&notice);
        let message = CreateMessage::new().embed(embed).components(components);
        if let Err(e) = self.channel_id.send_message(&*self.http, message).await {
            tracing::warn!(channel = %self.channel_id, error = %e, "failed to post notice");
        }
    }
}
