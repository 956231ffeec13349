use std::time::Duration;

use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

use crate::util::{player::SessionEvent, track::TrackDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// No voice connection.
    Idle,
    /// Connected, nothing playing.
    ConnectedSilent,
    Playing,
    Paused,
}

impl PlayerState {
    /// A stream is owned by the sink (playing or paused).
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Per-voice-connection state. Owned by the session task, never shared.
#[derive(Debug)]
pub struct Session {
    pub state: PlayerState,
    /// Set iff the sink holds a stream for this session.
    pub now_playing: Option<TrackDescriptor>,
    /// Id of the stream the sink is playing; completions for other ids are stale.
    pub playback_id: Option<u64>,
    pub looping: bool,
    pub shuffle: bool,
    pub autoplay: bool,
    /// 0..=100
    pub volume: u8,
    pub disconnect: DisconnectTimer,
}

impl Session {
    pub fn new(volume: u8) -> Self {
        Self {
            state: PlayerState::ConnectedSilent,
            now_playing: None,
            playback_id: None,
            looping: false,
            shuffle: false,
            autoplay: false,
            volume: volume.min(100),
            disconnect: DisconnectTimer::default(),
        }
    }

    pub fn begin(&mut self, track: TrackDescriptor, playback_id: u64) {
        self.state = PlayerState::Playing;
        self.now_playing = Some(track);
        self.playback_id = Some(playback_id);
    }

    /// Forget the current stream and fall back to connected-silent.
    pub fn finish(&mut self) -> Option<TrackDescriptor> {
        self.state = PlayerState::ConnectedSilent;
        self.playback_id = None;
        self.now_playing.take()
    }

    pub fn owns(&self, playback_id: u64) -> bool {
        self.playback_id == Some(playback_id)
    }

    pub fn volume_ratio(&self) -> f32 {
        f32::from(self.volume) / 100.0
    }
}

/// The single pending inactivity-disconnect timer of a session.
///
/// Arming aborts the previous task and bumps the generation, so a message
/// from an older timer that raced past the abort is recognisably stale.
#[derive(Debug, Default)]
pub struct DisconnectTimer {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl DisconnectTimer {
    pub fn arm(&mut self, after: Duration, events: &UnboundedSender<SessionEvent>) -> u64 {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let events = events.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(SessionEvent::InactivityElapsed { generation });
        }));
        generation
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether an expiry message belongs to the timer that is currently armed.
    pub fn accepts(&self, generation: u64) -> bool {
        self.is_armed() && generation == self.generation
    }

    /// The armed timer has fired; nothing is pending any more.
    pub fn lapse(&mut self) {
        self.pending = None;
    }
}

impl Drop for DisconnectTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
