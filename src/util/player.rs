//! Per-guild playback controller.
//!
//! Every voice session runs as one tokio task that owns its queue and
//! session state. Commands, track completions coming from the audio backend
//! and inactivity timers all arrive as [`SessionEvent`]s on the task's
//! channel and are handled one at a time, so no state is ever touched from
//! two places at once.

use std::{ops::ControlFlow, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use poise::serenity_prelude::GuildId;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    oneshot,
};

use crate::util::{
    config::MusicSettings,
    error::{MusicError, MusicResult},
    notice::{Notice, Notifier},
    queue::MusicQueue,
    session::{PlayerState, Session},
    sink::{AudioSink, PlaybackDone},
    track::{TrackDescriptor, TrackResolver},
};

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub enum SessionCommand {
    Play {
        track: TrackDescriptor,
        reply: Reply<PlayOutcome>,
    },
    Skip {
        reply: Reply<MusicResult<TrackDescriptor>>,
    },
    Pause {
        reply: Reply<MusicResult<()>>,
    },
    Resume {
        reply: Reply<MusicResult<()>>,
    },
    SetVolume {
        volume: i64,
        reply: Reply<MusicResult<u8>>,
    },
    ToggleLoop {
        reply: Reply<bool>,
    },
    ToggleShuffle {
        reply: Reply<bool>,
    },
    ToggleAutoplay {
        reply: Reply<bool>,
    },
    Status {
        reply: Reply<SessionStatus>,
    },
    Remove {
        index: usize,
        reply: Reply<MusicResult<TrackDescriptor>>,
    },
    Move {
        from: usize,
        to: usize,
        reply: Reply<MusicResult<TrackDescriptor>>,
    },
    Clear {
        reply: Reply<usize>,
    },
    LoadQueue {
        tracks: Vec<TrackDescriptor>,
        reply: Reply<SessionStatus>,
    },
    PlaylistSnapshot {
        reply: Reply<(Option<TrackDescriptor>, Vec<TrackDescriptor>)>,
    },
    Leave {
        reply: Reply<()>,
    },
    /// Stop the task without touching the voice connection.
    Shutdown,
}

#[derive(Debug)]
pub enum SessionEvent {
    Command(SessionCommand),
    /// Posted by the audio backend when a stream ends or fails.
    PlaybackFinished {
        playback_id: u64,
        error: Option<String>,
    },
    InactivityElapsed {
        generation: u64,
    },
    /// The voice connection dropped without a `leave`.
    VoiceLost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The requested track is playing now.
    Started(TrackDescriptor),
    /// Something was already playing; the track was appended.
    Queued {
        track: TrackDescriptor,
        position: usize,
    },
    /// The track could not be started. It was put back in front of the queue
    /// for one more attempt and the session moved on from there.
    Deferred(TrackDescriptor),
}

/// Read-only view of a session.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub state: PlayerState,
    pub now_playing: Option<TrackDescriptor>,
    pub queue: Vec<TrackDescriptor>,
    pub looping: bool,
    pub shuffle: bool,
    pub autoplay: bool,
    pub volume: u8,
    pub disconnect_armed: bool,
}

/// Cheap, cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    events: UnboundedSender<SessionEvent>,
    resolver: Arc<dyn TrackResolver>,
}

impl SessionHandle {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// False once the session task has exited.
    pub fn is_alive(&self) -> bool {
        !self.events.is_closed()
    }

    /// Resolve `query` and play it, or queue it when something is playing.
    /// Resolution happens on the caller's task.
    pub async fn play(&self, query: &str) -> MusicResult<PlayOutcome> {
        let track = self.resolver.search(query).await?;
        self.play_track(track).await
    }

    pub async fn play_track(&self, track: TrackDescriptor) -> MusicResult<PlayOutcome> {
        self.request(|reply| SessionCommand::Play { track, reply }).await
    }

    pub async fn skip(&self) -> MusicResult<TrackDescriptor> {
        self.request(|reply| SessionCommand::Skip { reply }).await?
    }

    pub async fn pause(&self) -> MusicResult<()> {
        self.request(|reply| SessionCommand::Pause { reply }).await?
    }

    pub async fn resume(&self) -> MusicResult<()> {
        self.request(|reply| SessionCommand::Resume { reply }).await?
    }

    pub async fn set_volume(&self, volume: i64) -> MusicResult<u8> {
        self.request(|reply| SessionCommand::SetVolume { volume, reply })
            .await?
    }

    pub async fn toggle_loop(&self) -> MusicResult<bool> {
        self.request(|reply| SessionCommand::ToggleLoop { reply }).await
    }

    pub async fn toggle_shuffle(&self) -> MusicResult<bool> {
        self.request(|reply| SessionCommand::ToggleShuffle { reply })
            .await
    }

    pub async fn toggle_autoplay(&self) -> MusicResult<bool> {
        self.request(|reply| SessionCommand::ToggleAutoplay { reply })
            .await
    }

    pub async fn status(&self) -> MusicResult<SessionStatus> {
        self.request(|reply| SessionCommand::Status { reply }).await
    }

    /// Remove the 1-based `index` from the queue.
    pub async fn remove(&self, index: usize) -> MusicResult<TrackDescriptor> {
        self.request(|reply| SessionCommand::Remove { index, reply })
            .await?
    }

    pub async fn move_track(&self, from: usize, to: usize) -> MusicResult<TrackDescriptor> {
        self.request(|reply| SessionCommand::Move { from, to, reply })
            .await?
    }

    pub async fn clear(&self) -> MusicResult<usize> {
        self.request(|reply| SessionCommand::Clear { reply }).await
    }

    /// Replace the live queue; starts playing if the session is silent.
    pub async fn load_queue(&self, tracks: Vec<TrackDescriptor>) -> MusicResult<SessionStatus> {
        self.request(|reply| SessionCommand::LoadQueue { tracks, reply })
            .await
    }

    /// Current track (if any) and queue, for saving as a playlist.
    pub async fn playlist_snapshot(
        &self,
    ) -> MusicResult<(Option<TrackDescriptor>, Vec<TrackDescriptor>)> {
        self.request(|reply| SessionCommand::PlaylistSnapshot { reply })
            .await
    }

    pub async fn leave(&self) -> MusicResult<()> {
        self.request(|reply| SessionCommand::Leave { reply }).await
    }

    /// Report that the voice connection went away under the session. The
    /// session tears itself down.
    pub fn voice_lost(&self) {
        let _ = self.events.send(SessionEvent::VoiceLost);
    }

    pub fn shutdown(&self) {
        let _ = self
            .events
            .send(SessionEvent::Command(SessionCommand::Shutdown));
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> SessionCommand) -> MusicResult<T> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(SessionEvent::Command(build(tx)))
            .map_err(|_| MusicError::NotConnected)?;
        rx.await.map_err(|_| MusicError::NotConnected)
    }
}

/// Live sessions by guild.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<GuildId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the guild's session, dropping entries whose task has ended.
    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        let handle = self.sessions.get(&guild_id).map(|e| e.value().clone())?;
        if handle.is_alive() {
            return Some(handle);
        }
        self.sessions.remove_if(&guild_id, |_, h| !h.is_alive());
        None
    }

    /// Register a freshly spawned session. If another live session won the
    /// race for this guild, the new one is shut down and the existing handle
    /// is returned instead.
    pub fn insert(&self, handle: SessionHandle) -> SessionHandle {
        match self.sessions.entry(handle.guild_id()) {
            Entry::Occupied(mut e) => {
                if e.get().is_alive() {
                    tracing::debug!(guild = %handle.guild_id(), "session already open, discarding duplicate");
                    handle.shutdown();
                    return e.get().clone();
                }
                e.insert(handle.clone());
                handle
            }
            Entry::Vacant(e) => {
                e.insert(handle.clone());
                handle
            }
        }
    }
}

/// Start the session task for `guild_id`. The session begins connected and
/// silent, with the inactivity timer armed.
pub fn spawn_session(
    guild_id: GuildId,
    resolver: Arc<dyn TrackResolver>,
    sink: Arc<dyn AudioSink>,
    notifier: Arc<dyn Notifier>,
    settings: MusicSettings,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = PlaybackController {
        guild_id,
        queue: MusicQueue::new(),
        session: Session::new(settings.default_volume),
        resolver: resolver.clone(),
        sink,
        notifier,
        settings,
        events: tx.clone(),
        last_playback_id: 0,
    };
    tokio::spawn(controller.run(rx));
    SessionHandle {
        guild_id,
        events: tx,
        resolver,
    }
}

struct PlaybackController {
    guild_id: GuildId,
    queue: MusicQueue,
    session: Session,
    resolver: Arc<dyn TrackResolver>,
    sink: Arc<dyn AudioSink>,
    notifier: Arc<dyn Notifier>,
    settings: MusicSettings,
    /// Handed to completion callbacks and timers.
    events: UnboundedSender<SessionEvent>,
    last_playback_id: u64,
}

impl PlaybackController {
    async fn run(mut self, mut rx: UnboundedReceiver<SessionEvent>) {
        tracing::info!(guild = %self.guild_id, "session opened");
        self.arm_disconnect();

        while let Some(event) = rx.recv().await {
            let flow = match event {
                SessionEvent::Command(cmd) => self.handle(cmd).await,
                SessionEvent::PlaybackFinished { playback_id, error } => {
                    self.on_finished(playback_id, error).await;
                    ControlFlow::Continue(())
                }
                SessionEvent::InactivityElapsed { generation } => {
                    self.on_inactivity(generation).await
                }
                SessionEvent::VoiceLost => {
                    tracing::warn!(guild = %self.guild_id, "voice connection lost, closing session");
                    self.teardown().await;
                    self.notifier.notify(Notice::VoiceLost).await;
                    ControlFlow::Break(())
                }
            };
            if flow.is_break() {
                break;
            }
        }

        self.session.disconnect.cancel();
        self.session.state = PlayerState::Idle;
        tracing::info!(guild = %self.guild_id, "session closed");
    }

    async fn handle(&mut self, cmd: SessionCommand) -> ControlFlow<()> {
        match cmd {
            SessionCommand::Play { track, reply } => {
                let outcome = self.play(track).await;
                let _ = reply.send(outcome);
            }
            SessionCommand::Skip { reply } => match self.skip().await {
                Ok(skipped) => {
                    // Answer before looking up the next stream.
                    let _ = reply.send(Ok(skipped));
                    self.advance(None).await;
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            SessionCommand::Pause { reply } => {
                let result = self.pause().await;
                let _ = reply.send(result);
            }
            SessionCommand::Resume { reply } => {
                let result = self.resume().await;
                let _ = reply.send(result);
            }
            SessionCommand::SetVolume { volume, reply } => {
                let result = self.set_volume(volume).await;
                let _ = reply.send(result);
            }
            SessionCommand::ToggleLoop { reply } => {
                self.session.looping = !self.session.looping;
                tracing::info!(guild = %self.guild_id, looping = self.session.looping, "loop toggled");
                let _ = reply.send(self.session.looping);
            }
            SessionCommand::ToggleShuffle { reply } => {
                self.session.shuffle = !self.session.shuffle;
                tracing::info!(guild = %self.guild_id, shuffle = self.session.shuffle, "shuffle toggled");
                let _ = reply.send(self.session.shuffle);
            }
            SessionCommand::ToggleAutoplay { reply } => {
                self.session.autoplay = !self.session.autoplay;
                tracing::info!(guild = %self.guild_id, autoplay = self.session.autoplay, "autoplay toggled");
                let _ = reply.send(self.session.autoplay);
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            SessionCommand::Remove { index, reply } => {
                let _ = reply.send(self.queue.remove_at(index));
            }
            SessionCommand::Move { from, to, reply } => {
                let _ = reply.send(self.queue.move_track(from, to));
            }
            SessionCommand::Clear { reply } => {
                let _ = reply.send(self.queue.clear());
            }
            SessionCommand::LoadQueue { tracks, reply } => {
                tracing::info!(guild = %self.guild_id, tracks = tracks.len(), "queue replaced");
                self.queue.replace(tracks);
                if !self.session.state.is_active() {
                    self.advance(None).await;
                }
                let _ = reply.send(self.status());
            }
            SessionCommand::PlaylistSnapshot { reply } => {
                let _ = reply.send((self.session.now_playing.clone(), self.queue.to_vec()));
            }
            SessionCommand::Leave { reply } => {
                self.teardown().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
            SessionCommand::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn play(&mut self, track: TrackDescriptor) -> PlayOutcome {
        if self.session.state.is_active() {
            self.queue.push_back(track.clone());
            let position = self.queue.len();
            tracing::info!(guild = %self.guild_id, title = %track.title, position, "queued while busy");
            return PlayOutcome::Queued { track, position };
        }

        match self.start(&track).await {
            Ok(()) => PlayOutcome::Started(track),
            Err(e) => {
                tracing::warn!(guild = %self.guild_id, title = %track.title, error = %e, "start failed, retrying from the queue");
                self.queue.push_front(track.clone());
                self.advance(Some(track.clone())).await;
                PlayOutcome::Deferred(track)
            }
        }
    }

    /// Pick and start the next track.
    ///
    /// `retry` is a track that was just put back in front after a failed
    /// start; it gets exactly one more attempt. Every other failing track is
    /// re-queued in front once as well and dropped on its second failure.
    /// Autoplay filler is looked up at most once per call.
    async fn advance(&mut self, mut retry: Option<TrackDescriptor>) {
        let mut filler_tried = false;
        loop {
            let next = if retry.is_some() {
                self.queue.pop_next()
            } else {
                self.take_next()
            };

            let Some(track) = next else {
                if self.session.autoplay && !filler_tried {
                    filler_tried = true;
                    if self.queue_filler().await {
                        continue;
                    }
                }
                self.go_silent().await;
                return;
            };

            let retrying = retry.take().is_some_and(|r| r == track);
            match self.start(&track).await {
                Ok(()) => {
                    let queued = self.queue.len();
                    self.notifier
                        .notify(Notice::NowPlaying { track, queued })
                        .await;
                    return;
                }
                Err(e) if retrying => {
                    tracing::warn!(guild = %self.guild_id, title = %track.title, error = %e, "retry failed, dropping track");
                    self.notifier
                        .notify(Notice::Dropped {
                            track,
                            reason: e.to_string(),
                        })
                        .await;
                }
                Err(e) => {
                    tracing::warn!(guild = %self.guild_id, title = %track.title, error = %e, "start failed, retrying once");
                    self.notifier.notify(Notice::StartFailed(track.clone())).await;
                    self.queue.push_front(track.clone());
                    retry = Some(track);
                }
            }
        }
    }

    fn take_next(&mut self) -> Option<TrackDescriptor> {
        if self.session.shuffle {
            self.queue.pop_random(&mut rand::rng())
        } else {
            self.queue.pop_next()
        }
    }

    async fn queue_filler(&mut self) -> bool {
        match self.resolver.search(&self.settings.autoplay_query).await {
            Ok(track) => {
                tracing::info!(guild = %self.guild_id, title = %track.title, "autoplay queued filler");
                self.queue.push_back(track.clone());
                self.notifier.notify(Notice::AutoplayQueued(track)).await;
                true
            }
            Err(e) => {
                tracing::warn!(guild = %self.guild_id, error = %e, "autoplay filler lookup failed");
                false
            }
        }
    }

    async fn start(&mut self, track: &TrackDescriptor) -> MusicResult<()> {
        let url = self.resolver.stream_url(track).await?;
        self.last_playback_id += 1;
        let playback_id = self.last_playback_id;
        let done = PlaybackDone::new(playback_id, self.events.clone());
        self.sink
            .start(&url, self.session.volume_ratio(), done)
            .await?;
        self.session.begin(track.clone(), playback_id);
        self.session.disconnect.cancel();
        tracing::info!(guild = %self.guild_id, title = %track.title, playback_id, "playback started");
        Ok(())
    }

    async fn on_finished(&mut self, playback_id: u64, error: Option<String>) {
        if !self.session.owns(playback_id) {
            tracing::debug!(guild = %self.guild_id, playback_id, "stale completion ignored");
            return;
        }
        if let Some(error) = &error {
            tracing::warn!(guild = %self.guild_id, playback_id, %error, "playback ended with an error");
        }

        let finished = self.session.finish();
        // Loop only repeats tracks that ended cleanly.
        if self.session.looping && error.is_none() {
            if let Some(track) = finished {
                match self.start(&track).await {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::warn!(guild = %self.guild_id, title = %track.title, error = %e, "loop replay failed, retrying once");
                        self.notifier.notify(Notice::StartFailed(track.clone())).await;
                        self.queue.push_front(track.clone());
                        self.advance(Some(track)).await;
                        return;
                    }
                }
            }
        }
        self.advance(None).await;
    }

    async fn skip(&mut self) -> MusicResult<TrackDescriptor> {
        if !self.session.state.is_active() {
            return Err(MusicError::NothingPlaying);
        }
        self.sink.stop().await;
        let skipped = self.session.finish().ok_or(MusicError::NothingPlaying)?;
        tracing::info!(guild = %self.guild_id, title = %skipped.title, "skipped");
        Ok(skipped)
    }

    async fn pause(&mut self) -> MusicResult<()> {
        match self.session.state {
            PlayerState::Playing => {
                self.sink.pause().await?;
                self.session.state = PlayerState::Paused;
                Ok(())
            }
            PlayerState::Paused => Err(MusicError::AlreadyPaused),
            _ => Err(MusicError::NothingPlaying),
        }
    }

    async fn resume(&mut self) -> MusicResult<()> {
        match self.session.state {
            PlayerState::Paused => {
                self.sink.resume().await?;
                self.session.state = PlayerState::Playing;
                Ok(())
            }
            PlayerState::Playing => Err(MusicError::NotPaused),
            _ => Err(MusicError::NothingPlaying),
        }
    }

    async fn set_volume(&mut self, volume: i64) -> MusicResult<u8> {
        let level = u8::try_from(volume)
            .ok()
            .filter(|v| *v <= 100)
            .ok_or(MusicError::InvalidVolume(volume))?;
        if self.session.state.is_active() {
            self.sink.set_volume(f32::from(level) / 100.0).await?;
        }
        self.session.volume = level;
        tracing::info!(guild = %self.guild_id, volume = level, "volume changed");
        Ok(level)
    }

    async fn on_inactivity(&mut self, generation: u64) -> ControlFlow<()> {
        if !self.session.disconnect.accepts(generation) {
            tracing::debug!(guild = %self.guild_id, generation, "stale inactivity timer ignored");
            return ControlFlow::Continue(());
        }
        self.session.disconnect.lapse();

        if self.session.state != PlayerState::ConnectedSilent || self.sink.is_playing().await {
            return ControlFlow::Continue(());
        }
        if !self.sink.is_alone().await {
            tracing::info!(guild = %self.guild_id, "idle timer expired but listeners remain");
            return ControlFlow::Continue(());
        }

        tracing::info!(guild = %self.guild_id, "disconnecting after inactivity");
        self.teardown().await;
        self.notifier.notify(Notice::IdleDisconnect).await;
        ControlFlow::Break(())
    }

    async fn go_silent(&mut self) {
        self.session.finish();
        tracing::info!(guild = %self.guild_id, "queue finished");
        self.notifier.notify(Notice::QueueFinished).await;
        self.arm_disconnect();
    }

    fn arm_disconnect(&mut self) {
        let generation = self
            .session
            .disconnect
            .arm(self.settings.idle_timeout(), &self.events);
        tracing::debug!(guild = %self.guild_id, generation, "inactivity timer armed");
    }

    async fn teardown(&mut self) {
        if self.session.state.is_active() {
            self.sink.stop().await;
        }
        self.session.finish();
        self.session.disconnect.cancel();
        self.sink.disconnect().await;
        self.session.state = PlayerState::Idle;
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.session.state,
            now_playing: self.session.now_playing.clone(),
            queue: self.queue.to_vec(),
            looping: self.session.looping,
            shuffle: self.session.shuffle,
            autoplay: self.session.autoplay,
            volume: self.session.volume,
            disconnect_armed: self.session.disconnect.is_armed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::util::testing::{FakeNotifier, FakeResolver, FakeSink, Harness, SinkCall, track};

    fn quick_idle() -> MusicSettings {
        MusicSettings {
            idle_timeout_secs: 5,
            ..MusicSettings::default()
        }
    }

    #[tokio::test]
    async fn play_on_silent_session_starts_immediately() {
        let h = Harness::new();
        let outcome = h.handle.play_track(track("A")).await.unwrap();
        assert_eq!(outcome, PlayOutcome::Started(track("A")));

        let status = h.status().await;
        assert_eq!(status.state, PlayerState::Playing);
        assert_eq!(status.now_playing, Some(track("A")));
        assert!(status.queue.is_empty());
        assert!(!status.disconnect_armed);
        assert_eq!(h.sink.started(), ["A"]);
    }

    #[tokio::test]
    async fn play_resolves_the_query_first() {
        let h = Harness::new();
        h.resolver.unknown("nothing matches");
        assert_eq!(
            h.handle.play("nothing matches").await,
            Err(MusicError::TrackNotFound("nothing matches".into()))
        );
        assert_eq!(h.status().await.state, PlayerState::ConnectedSilent);

        let outcome = h.handle.play("lofi beats").await.unwrap();
        assert_eq!(outcome, PlayOutcome::Started(track("lofi beats")));
    }

    #[tokio::test]
    async fn play_while_busy_appends_with_position() {
        let h = Harness::new();
        h.handle.play_track(track("A")).await.unwrap();
        let b = h.handle.play_track(track("B")).await.unwrap();
        let c = h.handle.play_track(track("C")).await.unwrap();
        assert_eq!(
            b,
            PlayOutcome::Queued {
                track: track("B"),
                position: 1
            }
        );
        assert_eq!(
            c,
            PlayOutcome::Queued {
                track: track("C"),
                position: 2
            }
        );
        assert_eq!(h.sink.started(), ["A"]);

        let status = h.status().await;
        assert_eq!(status.state, PlayerState::Playing);
        assert_eq!(status.now_playing, Some(track("A")));
        assert_eq!(Harness::queue_titles(&status), ["B", "C"]);
    }

    #[tokio::test]
    async fn natural_finish_advances_in_order() {
        let h = Harness::new();
        for t in ["A", "B", "C"] {
            h.handle.play_track(track(t)).await.unwrap();
        }

        h.sink.finish_current();
        let status = h.status().await;
        assert_eq!(status.now_playing, Some(track("B")));
        assert_eq!(Harness::queue_titles(&status), ["C"]);
        assert_eq!(
            h.notifier.notices(),
            [Notice::NowPlaying {
                track: track("B"),
                queued: 1
            }]
        );
    }

    #[tokio::test]
    async fn empty_queue_goes_silent_and_arms_the_timer() {
        let h = Harness::new();
        h.handle.play_track(track("A")).await.unwrap();
        h.sink.finish_current();

        let status = h.status().await;
        assert_eq!(status.state, PlayerState::ConnectedSilent);
        assert_eq!(status.now_playing, None);
        assert!(status.disconnect_armed);
        assert_eq!(h.notifier.notices(), [Notice::QueueFinished]);
    }

    #[tokio::test]
    async fn completion_of_a_skipped_stream_is_ignored() {
        let h = Harness::new();
        for t in ["A", "B", "C"] {
            h.handle.play_track(track(t)).await.unwrap();
        }
        let done_a = h.sink.take_done();

        assert_eq!(h.handle.skip().await.unwrap(), track("A"));
        done_a.finished(None);

        let status = h.status().await;
        assert_eq!(status.now_playing, Some(track("B")));
        assert_eq!(Harness::queue_titles(&status), ["C"]);
        assert_eq!(h.sink.started(), ["A", "B"]);
    }

    #[tokio::test]
    async fn skip_requires_something_playing() {
        let h = Harness::new();
        assert_eq!(h.handle.skip().await, Err(MusicError::NothingPlaying));

        h.handle.play_track(track("A")).await.unwrap();
        h.handle.skip().await.unwrap();
        let status = h.status().await;
        assert_eq!(status.state, PlayerState::ConnectedSilent);
        assert!(status.disconnect_armed);
        assert!(h.sink.calls().contains(&SinkCall::Stop));
    }

    #[tokio::test(start_paused = true)]
    async fn skip_answers_before_the_next_stream_is_ready() {
        let h = Harness::new();
        h.handle.play_track(track("A")).await.unwrap();
        h.handle.play_track(track("B")).await.unwrap();
        h.resolver.slow_stream("B", Duration::from_secs(10));

        let before = tokio::time::Instant::now();
        assert_eq!(h.handle.skip().await, Ok(track("A")));
        assert!(before.elapsed() < Duration::from_secs(1));

        let status = h.status().await;
        assert_eq!(status.now_playing, Some(track("B")));
        assert!(before.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn loop_replays_finished_track_but_not_skipped_one() {
        let h = Harness::new();
        h.handle.play_track(track("A")).await.unwrap();
        h.handle.play_track(track("B")).await.unwrap();
        assert!(h.handle.toggle_loop().await.unwrap());

        h.sink.finish_current();
        let status = h.status().await;
        assert_eq!(status.now_playing, Some(track("A")));
        assert_eq!(Harness::queue_titles(&status), ["B"]);

        h.handle.skip().await.unwrap();
        assert_eq!(h.status().await.now_playing, Some(track("B")));
        assert_eq!(h.sink.started(), ["A", "A", "B"]);
    }

    #[tokio::test]
    async fn loop_does_not_replay_a_failed_stream() {
        let h = Harness::new();
        h.handle.play_track(track("A")).await.unwrap();
        h.handle.play_track(track("B")).await.unwrap();
        h.handle.toggle_loop().await.unwrap();

        h.sink.fail_current("decoder error");
        assert_eq!(h.status().await.now_playing, Some(track("B")));
    }

    #[tokio::test]
    async fn loop_replay_failure_is_reported_and_retried_once() {
        let h = Harness::new();
        h.handle.play_track(track("A")).await.unwrap();
        h.handle.play_track(track("B")).await.unwrap();
        h.handle.toggle_loop().await.unwrap();
        h.resolver.fail_stream("A", 2);

        h.sink.finish_current();
        let status = h.status().await;
        assert_eq!(status.now_playing, Some(track("B")));
        assert!(status.queue.is_empty());
        assert_eq!(h.sink.started(), ["A", "B"]);
        assert_eq!(
            h.notifier.notices(),
            [
                Notice::StartFailed(track("A")),
                Notice::Dropped {
                    track: track("A"),
                    reason: "Could not start playback: A".into()
                },
                Notice::NowPlaying {
                    track: track("B"),
                    queued: 0
                },
            ]
        );
    }

    #[tokio::test]
    async fn shuffle_takes_some_queued_track() {
        let h = Harness::new();
        for t in ["A", "B", "C", "D"] {
            h.handle.play_track(track(t)).await.unwrap();
        }
        assert!(h.handle.toggle_shuffle().await.unwrap());

        h.sink.finish_current();
        let status = h.status().await;
        let mut seen = Harness::queue_titles(&status);
        let current = status.now_playing.unwrap().title;
        assert!(["B", "C", "D"].contains(&current.as_str()));
        seen.push(current);
        seen.sort();
        assert_eq!(seen, ["B", "C", "D"]);
    }

    #[tokio::test]
    async fn autoplay_refills_an_empty_queue() {
        let h = Harness::new();
        h.handle.play_track(track("A")).await.unwrap();
        assert!(h.handle.toggle_autoplay().await.unwrap());

        h.sink.finish_current();
        let status = h.status().await;
        let filler = track("recommended song");
        assert_eq!(status.now_playing, Some(filler.clone()));
        assert_eq!(
            h.notifier.notices(),
            [
                Notice::AutoplayQueued(filler.clone()),
                Notice::NowPlaying {
                    track: filler,
                    queued: 0
                }
            ]
        );
    }

    #[tokio::test]
    async fn autoplay_lookup_failure_is_tried_once() {
        let h = Harness::new();
        h.resolver.unknown("recommended song");
        h.handle.play_track(track("A")).await.unwrap();
        h.handle.toggle_autoplay().await.unwrap();

        h.sink.finish_current();
        let status = h.status().await;
        assert_eq!(status.state, PlayerState::ConnectedSilent);
        assert_eq!(h.resolver.searches.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(h.notifier.notices(), [Notice::QueueFinished]);
    }

    #[tokio::test]
    async fn failed_start_is_retried_once() {
        let h = Harness::new();
        h.resolver.fail_stream("A", 1);

        let outcome = h.handle.play_track(track("A")).await.unwrap();
        assert_eq!(outcome, PlayOutcome::Deferred(track("A")));
        let status = h.status().await;
        assert_eq!(status.now_playing, Some(track("A")));
        assert_eq!(h.sink.started(), ["A"]);
    }

    #[tokio::test]
    async fn track_failing_twice_is_dropped_and_the_next_plays() {
        let h = Harness::new();
        for t in ["A", "B", "C"] {
            h.handle.play_track(track(t)).await.unwrap();
        }
        h.resolver.fail_stream("B", 2);

        h.sink.finish_current();
        let status = h.status().await;
        assert_eq!(status.now_playing, Some(track("C")));
        assert!(status.queue.is_empty());
        assert_eq!(h.sink.started(), ["A", "C"]);
        assert_eq!(
            h.notifier.notices(),
            [
                Notice::StartFailed(track("B")),
                Notice::Dropped {
                    track: track("B"),
                    reason: "Could not start playback: B".into()
                },
                Notice::NowPlaying {
                    track: track("C"),
                    queued: 0
                },
            ]
        );
    }

    #[tokio::test]
    async fn pause_and_resume_follow_the_state() {
        let h = Harness::new();
        assert_eq!(h.handle.pause().await, Err(MusicError::NothingPlaying));

        h.handle.play_track(track("A")).await.unwrap();
        assert_eq!(h.handle.resume().await, Err(MusicError::NotPaused));
        h.handle.pause().await.unwrap();
        assert_eq!(h.handle.pause().await, Err(MusicError::AlreadyPaused));

        let queued = h.handle.play_track(track("B")).await.unwrap();
        assert!(matches!(queued, PlayOutcome::Queued { position: 1, .. }));
        assert_eq!(h.status().await.state, PlayerState::Paused);

        h.handle.resume().await.unwrap();
        assert_eq!(h.status().await.state, PlayerState::Playing);
        assert_eq!(
            h.sink.calls(),
            [
                SinkCall::Start("stream://A".into()),
                SinkCall::Pause,
                SinkCall::Resume
            ]
        );
    }

    #[tokio::test]
    async fn volume_is_validated_and_applied() {
        let h = Harness::new();
        assert_eq!(h.handle.set_volume(150).await, Err(MusicError::InvalidVolume(150)));
        assert_eq!(h.handle.set_volume(-1).await, Err(MusicError::InvalidVolume(-1)));
        assert_eq!(h.status().await.volume, 50);

        assert_eq!(h.handle.set_volume(80).await, Ok(80));
        assert!(h.sink.calls().is_empty());

        h.handle.play_track(track("A")).await.unwrap();
        h.handle.set_volume(30).await.unwrap();
        assert_eq!(h.status().await.volume, 30);
        assert_eq!(h.sink.calls().last(), Some(&SinkCall::Volume(0.3)));
    }

    #[tokio::test]
    async fn queue_edits_go_through_the_session() {
        let h = Harness::new();
        for t in ["A", "B", "C", "D"] {
            h.handle.play_track(track(t)).await.unwrap();
        }

        assert_eq!(
            h.handle.remove(5).await,
            Err(MusicError::IndexOutOfRange { index: 5, len: 3 })
        );
        assert_eq!(h.handle.move_track(3, 1).await.unwrap(), track("D"));
        assert_eq!(Harness::queue_titles(&h.status().await), ["D", "B", "C"]);

        assert_eq!(h.handle.remove(2).await.unwrap(), track("B"));
        assert_eq!(h.handle.clear().await.unwrap(), 2);
        let status = h.status().await;
        assert!(status.queue.is_empty());
        assert_eq!(status.now_playing, Some(track("A")));
    }

    #[tokio::test]
    async fn snapshot_and_load_queue() {
        let h = Harness::new();
        for t in ["A", "B"] {
            h.handle.play_track(track(t)).await.unwrap();
        }
        let (current, queued) = h.handle.playlist_snapshot().await.unwrap();
        assert_eq!(current, Some(track("A")));
        assert_eq!(queued, [track("B")]);

        h.handle.skip().await.unwrap();
        h.handle.skip().await.unwrap();
        assert_eq!(h.status().await.state, PlayerState::ConnectedSilent);

        let status = h
            .handle
            .load_queue(vec![track("X"), track("Y")])
            .await
            .unwrap();
        assert_eq!(status.now_playing, Some(track("X")));
        assert_eq!(Harness::queue_titles(&status), ["Y"]);
        assert!(!status.disconnect_armed);
    }

    #[tokio::test]
    async fn load_queue_while_playing_keeps_current_track() {
        let h = Harness::new();
        h.handle.play_track(track("A")).await.unwrap();
        h.handle.play_track(track("B")).await.unwrap();

        let status = h.handle.load_queue(vec![track("X")]).await.unwrap();
        assert_eq!(status.now_playing, Some(track("A")));
        assert_eq!(Harness::queue_titles(&status), ["X"]);
    }

    #[tokio::test]
    async fn leave_stops_and_closes_the_session() {
        let h = Harness::new();
        h.handle.play_track(track("A")).await.unwrap();
        h.handle.leave().await.unwrap();

        assert!(matches!(h.handle.status().await, Err(MusicError::NotConnected)));
        assert!(!h.handle.is_alive());
        assert_eq!(
            h.sink.calls(),
            [
                SinkCall::Start("stream://A".into()),
                SinkCall::Stop,
                SinkCall::Disconnect
            ]
        );
    }

    #[tokio::test]
    async fn lost_voice_connection_closes_the_session() {
        let registry = SessionRegistry::new();
        let h = Harness::new();
        let guild = h.handle.guild_id();
        registry.insert(h.handle.clone());
        h.handle.play_track(track("A")).await.unwrap();
        h.handle.play_track(track("B")).await.unwrap();

        h.handle.voice_lost();
        assert!(matches!(h.handle.status().await, Err(MusicError::NotConnected)));
        assert!(!h.handle.is_alive());
        assert!(registry.get(guild).is_none());
        assert_eq!(
            h.sink.calls(),
            [
                SinkCall::Start("stream://A".into()),
                SinkCall::Stop,
                SinkCall::Disconnect
            ]
        );
        assert_eq!(h.notifier.notices(), [Notice::VoiceLost]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_disconnects_when_alone() {
        let h = Harness::with_settings(quick_idle());
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(matches!(h.handle.status().await, Err(MusicError::NotConnected)));
        assert_eq!(h.sink.calls(), [SinkCall::Disconnect]);
        assert_eq!(h.notifier.notices(), [Notice::IdleDisconnect]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_lapses_while_listeners_remain() {
        let h = Harness::with_settings(quick_idle());
        h.sink.set_alone(false);
        tokio::time::sleep(Duration::from_secs(6)).await;

        let status = h.status().await;
        assert_eq!(status.state, PlayerState::ConnectedSilent);
        assert!(!status.disconnect_armed);
        assert!(h.sink.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn playback_cancels_the_idle_timer() {
        let h = Harness::with_settings(quick_idle());
        h.handle.play_track(track("A")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let status = h.status().await;
        assert_eq!(status.state, PlayerState::Playing);

        h.sink.finish_current();
        assert!(h.status().await.disconnect_armed);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!h.handle.is_alive());
    }

    #[tokio::test]
    async fn registry_keeps_the_first_live_session() {
        let registry = SessionRegistry::new();
        let first = Harness::new();
        let second = Harness::new();
        let guild = first.handle.guild_id();

        registry.insert(first.handle.clone());
        let kept = registry.insert(second.handle.clone());
        assert!(kept.status().await.is_ok());
        assert!(matches!(second.handle.status().await, Err(MusicError::NotConnected)));
        // The discarded session must not touch the shared voice connection.
        assert!(second.sink.calls().is_empty());

        first.handle.leave().await.unwrap();
        let _ = first.handle.status().await;
        assert!(registry.get(guild).is_none());
    }

    #[tokio::test]
    async fn handles_of_a_session_share_state() {
        let resolver = std::sync::Arc::new(FakeResolver::default());
        let sink = std::sync::Arc::new(FakeSink::default());
        let handle = spawn_session(
            GuildId::new(9),
            resolver,
            sink.clone(),
            std::sync::Arc::new(FakeNotifier::default()),
            MusicSettings::default(),
        );
        let other = handle.clone();
        handle.play_track(track("A")).await.unwrap();
        assert_eq!(other.status().await.unwrap().now_playing, Some(track("A")));
        assert_eq!(sink.started(), ["A"]);
    }
}
