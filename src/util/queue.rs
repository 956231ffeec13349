use std::collections::VecDeque;

use rand::Rng;

use crate::util::{
    error::{MusicError, MusicResult},
    track::TrackDescriptor,
};

/// Ordered play queue of one session. Front is played next.
///
/// Positions taken by `remove_at` / `move_track` are 1-based, as shown to
/// users.
#[derive(Debug, Default, Clone)]
pub struct MusicQueue {
    queue: VecDeque<TrackDescriptor>,
}

impl MusicQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the back.
    pub fn push_back(&mut self, track: TrackDescriptor) {
        self.queue.push_back(track);
    }

    /// Put a track back in front, used when a start attempt is retried.
    pub fn push_front(&mut self, track: TrackDescriptor) {
        self.queue.push_front(track);
    }

    pub fn pop_next(&mut self) -> Option<TrackDescriptor> {
        self.queue.pop_front()
    }

    /// Take a uniformly random entry (shuffle mode).
    pub fn pop_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<TrackDescriptor> {
        if self.is_empty() {
            return None;
        }
        let idx = rng.random_range(0..self.queue.len());
        self.queue.remove(idx)
    }

    pub fn remove_at(&mut self, index: usize) -> MusicResult<TrackDescriptor> {
        let pos = self.position(index)?;
        self.queue
            .remove(pos)
            .ok_or(MusicError::IndexOutOfRange { index, len: self.queue.len() })
    }

    /// Move the entry at `from` so that it ends up at `to`. Both positions
    /// are validated before anything changes.
    pub fn move_track(&mut self, from: usize, to: usize) -> MusicResult<TrackDescriptor> {
        let src = self.position(from)?;
        let dst = self.position(to)?;
        let track = self
            .queue
            .remove(src)
            .ok_or(MusicError::IndexOutOfRange { index: from, len: self.queue.len() })?;
        self.queue.insert(dst, track.clone());
        Ok(track)
    }

    /// Drop everything, returning how many entries were removed.
    pub fn clear(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        n
    }

    /// Swap the whole content, e.g. when a playlist is loaded.
    pub fn replace(&mut self, tracks: Vec<TrackDescriptor>) {
        self.queue = tracks.into();
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.queue.iter()
    }

    /// Owned copy for display or playlist snapshots.
    pub fn to_vec(&self) -> Vec<TrackDescriptor> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn position(&self, index: usize) -> MusicResult<usize> {
        if index == 0 || index > self.queue.len() {
            return Err(MusicError::IndexOutOfRange { index, len: self.queue.len() });
        }
        Ok(index - 1)
    }
}
