//! In-memory stand-ins for the Discord side of a session.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use poise::serenity_prelude::GuildId;

use crate::util::{
    config::MusicSettings,
    error::{MusicError, MusicResult},
    notice::{Notice, Notifier},
    player::{SessionHandle, SessionStatus, spawn_session},
    sink::{AudioSink, PlaybackDone},
    track::{TrackDescriptor, TrackResolver},
};

pub fn track(title: &str) -> TrackDescriptor {
    TrackDescriptor::new(title, title, format!("https://example.com/{title}"))
}

/// Every query resolves to a track titled after it, unless marked unknown.
#[derive(Default)]
pub struct FakeResolver {
    unknown: Mutex<HashSet<String>>,
    /// Title -> remaining stream lookups that fail.
    failures: Mutex<HashMap<String, usize>>,
    /// Title -> how long its stream lookup takes.
    delays: Mutex<HashMap<String, Duration>>,
    pub searches: AtomicUsize,
}

impl FakeResolver {
    pub fn unknown(&self, query: &str) {
        self.unknown.lock().unwrap().insert(query.to_string());
    }

    pub fn fail_stream(&self, title: &str, times: usize) {
        self.failures.lock().unwrap().insert(title.to_string(), times);
    }

    pub fn slow_stream(&self, title: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(title.to_string(), delay);
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn search(&self, query: &str) -> MusicResult<TrackDescriptor> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.unknown.lock().unwrap().contains(query) {
            return Err(MusicError::TrackNotFound(query.to_string()));
        }
        Ok(track(query))
    }

    async fn stream_url(&self, track: &TrackDescriptor) -> MusicResult<String> {
        let delay = self.delays.lock().unwrap().get(&track.title).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut failures = self.failures.lock().unwrap();
        if let Some(left) = failures.get_mut(&track.title) {
            if *left > 0 {
                *left -= 1;
                return Err(MusicError::PlaybackStartFailed(track.title.clone()));
            }
        }
        Ok(format!("stream://{}", track.title))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Start(String),
    Stop,
    Pause,
    Resume,
    Volume(f32),
    Disconnect,
}

/// Records calls and keeps completion callbacks so tests can end streams.
pub struct FakeSink {
    calls: Mutex<Vec<SinkCall>>,
    done: Mutex<Vec<PlaybackDone>>,
    playing: AtomicBool,
    alone: AtomicBool,
}

impl Default for FakeSink {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            done: Mutex::new(Vec::new()),
            playing: AtomicBool::new(false),
            alone: AtomicBool::new(true),
        }
    }
}

impl FakeSink {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Titles of every stream started so far, in order.
    pub fn started(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Start(url) => url.strip_prefix("stream://").map(str::to_string),
                _ => None,
            })
            .collect()
    }

    pub fn set_alone(&self, alone: bool) {
        self.alone.store(alone, Ordering::SeqCst);
    }

    /// Completion callback of the most recently started stream.
    pub fn take_done(&self) -> PlaybackDone {
        self.done.lock().unwrap().pop().expect("no stream started")
    }

    /// End the current stream normally.
    pub fn finish_current(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.take_done().finished(None);
    }

    pub fn fail_current(&self, error: &str) {
        self.playing.store(false, Ordering::SeqCst);
        self.take_done().finished(Some(error.to_string()));
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn start(&self, url: &str, _volume: f32, done: PlaybackDone) -> MusicResult<()> {
        self.calls.lock().unwrap().push(SinkCall::Start(url.to_string()));
        self.done.lock().unwrap().push(done);
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.calls.lock().unwrap().push(SinkCall::Stop);
        self.playing.store(false, Ordering::SeqCst);
    }

    async fn pause(&self) -> MusicResult<()> {
        self.calls.lock().unwrap().push(SinkCall::Pause);
        Ok(())
    }

    async fn resume(&self) -> MusicResult<()> {
        self.calls.lock().unwrap().push(SinkCall::Resume);
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> MusicResult<()> {
        self.calls.lock().unwrap().push(SinkCall::Volume(volume));
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    async fn is_alone(&self) -> bool {
        self.alone.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.calls.lock().unwrap().push(SinkCall::Disconnect);
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl FakeNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// A running session wired to fakes.
pub struct Harness {
    pub handle: SessionHandle,
    pub resolver: Arc<FakeResolver>,
    pub sink: Arc<FakeSink>,
    pub notifier: Arc<FakeNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(MusicSettings::default())
    }

    pub fn with_settings(settings: MusicSettings) -> Self {
        let resolver = Arc::new(FakeResolver::default());
        let sink = Arc::new(FakeSink::default());
        let notifier = Arc::new(FakeNotifier::default());
        let handle = spawn_session(
            GuildId::new(1),
            resolver.clone(),
            sink.clone(),
            notifier.clone(),
            settings,
        );
        Self {
            handle,
            resolver,
            sink,
            notifier,
        }
    }

    /// Round-trips through the session task, so every event posted before
    /// this call has been handled when it returns.
    pub async fn status(&self) -> SessionStatus {
        self.handle.status().await.unwrap()
    }

    pub fn queue_titles(status: &SessionStatus) -> Vec<String> {
        status.queue.iter().map(|t| t.title.clone()).collect()
    }
}
