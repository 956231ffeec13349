use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude::{Cache, ChannelId, GuildId, UserId};
use songbird::{
    Call, Event, Songbird, TrackEvent,
    input::{Compose, HttpRequest, Input, LiveInput},
    tracks::{PlayMode, Track, TrackHandle},
};
use tokio::{
    sync::Mutex,
    time::{Duration, timeout},
};

use crate::{
    get_http_client,
    handlers::track_end::TrackEndHandler,
    util::{
        error::{MusicError, MusicResult},
        sink::{AudioSink, PlaybackDone},
    },
};

const STREAM_TIMEOUT: Duration = Duration::from_secs(20);

/// Audio output through a songbird voice connection.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    cache: Arc<Cache>,
    guild_id: GuildId,
    channel_id: ChannelId,
    bot_id: UserId,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(
        manager: Arc<Songbird>,
        call: Arc<Mutex<Call>>,
        cache: Arc<Cache>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Self {
        let bot_id = cache.current_user().id;
        Self {
            manager,
            call,
            cache,
            guild_id,
            channel_id,
            bot_id,
            current: Mutex::new(None),
        }
    }

    async fn current(&self) -> MusicResult<TrackHandle> {
        self.current
            .lock()
            .await
            .clone()
            .ok_or(MusicError::NothingPlaying)
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn start(&self, url: &str, volume: f32, done: PlaybackDone) -> MusicResult<()> {
        let playback_id = done.playback_id();
        let mut request = HttpRequest::new(get_http_client(), url.to_string());
        let audio = match timeout(STREAM_TIMEOUT, request.create_async()).await {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => return Err(MusicError::PlaybackStartFailed(e.to_string())),
            Err(_) => {
                return Err(MusicError::PlaybackStartFailed(
                    "stream request timed out".to_string(),
                ));
            }
        };
        let input = Input::Live(LiveInput::Raw(audio), Some(Box::new(request)));

        let handle = {
            self.call
                .lock()
                .await
                .play_only(Track::from(input).volume(volume))
        };
        let on_end = TrackEndHandler::new(self.guild_id, done);
        handle
            .add_event(Event::Track(TrackEvent::End), on_end.clone())
            .and_then(|_| handle.add_event(Event::Track(TrackEvent::Error), on_end))
            .map_err(|e| MusicError::PlaybackStartFailed(e.to_string()))?;

        tracing::debug!(guild = %self.guild_id, playback_id, track = %handle.uuid(), "stream handed to songbird");
        *self.current.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(handle) = self.current.lock().await.take() {
            if let Err(e) = handle.stop() {
                tracing::debug!(guild = %self.guild_id, error = %e, "stop on finished track");
            }
        }
    }

    async fn pause(&self) -> MusicResult<()> {
        self.current()
            .await?
            .pause()
            .map_err(|_| MusicError::NothingPlaying)
    }

    async fn resume(&self) -> MusicResult<()> {
        self.current()
            .await?
            .play()
            .map_err(|_| MusicError::NothingPlaying)
    }

    async fn set_volume(&self, volume: f32) -> MusicResult<()> {
        self.current()
            .await?
            .set_volume(volume)
            .map_err(|_| MusicError::NothingPlaying)
    }

    async fn is_playing(&self) -> bool {
        let Ok(handle) = self.current().await else {
            return false;
        };
        handle
            .get_info()
            .await
            .is_ok_and(|state| matches!(state.playing, PlayMode::Play))
    }

    async fn is_alone(&self) -> bool {
        let Some(guild) = self.cache.guild(self.guild_id) else {
            return true;
        };
        !guild.voice_states.values().any(|vs| {
            vs.channel_id == Some(self.channel_id) && vs.user_id != self.bot_id
        })
    }

    async fn disconnect(&self) {
        self.current.lock().await.take();
        if let Err(e) = self.manager.remove(self.guild_id).await {
            tracing::warn!(guild = %self.guild_id, error = %e, "voice disconnect failed");
        }
    }
}
