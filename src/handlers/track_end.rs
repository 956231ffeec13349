use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use poise::serenity_prelude::GuildId;
use songbird::{Event, EventContext, EventHandler, tracks::PlayMode};

use crate::util::sink::PlaybackDone;

/// Registered for both `End` and `Error` of one track. Whichever fires first
/// reports the completion; the other finds the callback gone.
#[derive(Clone)]
pub struct TrackEndHandler {
    guild_id: GuildId,
    done: Arc<Mutex<Option<PlaybackDone>>>,
}

impl TrackEndHandler {
    pub fn new(guild_id: GuildId, done: PlaybackDone) -> Self {
        Self {
            guild_id,
            done: Arc::new(Mutex::new(Some(done))),
        }
    }

    fn take(&self) -> Option<PlaybackDone> {
        match self.done.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[async_trait]
impl EventHandler for TrackEndHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.first().and_then(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{e:?}")),
                _ => None,
            }),
            _ => None,
        };

        if let Some(done) = self.take() {
            tracing::debug!(guild = %self.guild_id, playback_id = done.playback_id(), errored = error.is_some(), "track ended");
            done.finished(error);
        }
        // Unregister.
        Some(Event::Cancel)
    }
}
