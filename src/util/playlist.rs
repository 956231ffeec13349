use std::collections::BTreeMap;

use crate::util::{
    error::{MusicError, MusicResult},
    track::TrackDescriptor,
};

/// Named playlists of one guild, kept in memory only.
///
/// A playlist is a copy taken at save time; later queue changes never show
/// up in it.
#[derive(Debug, Default)]
pub struct PlaylistStore {
    playlists: BTreeMap<String, Vec<TrackDescriptor>>,
}

impl PlaylistStore {
    /// Store `[now_playing?] + queue` under `name`, overwriting any previous
    /// playlist of that name. Returns the number of saved tracks.
    pub fn save(
        &mut self,
        name: &str,
        queue: Vec<TrackDescriptor>,
        now_playing: Option<TrackDescriptor>,
    ) -> usize {
        let tracks: Vec<_> = now_playing.into_iter().chain(queue).collect();
        let n = tracks.len();
        self.playlists.insert(name.to_string(), tracks);
        n
    }

    pub fn load(&self, name: &str) -> MusicResult<Vec<TrackDescriptor>> {
        self.playlists
            .get(name)
            .cloned()
            .ok_or_else(|| MusicError::PlaylistNotFound(name.to_string()))
    }

    pub fn delete(&mut self, name: &str) -> MusicResult<()> {
        self.playlists
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| MusicError::PlaylistNotFound(name.to_string()))
    }

    /// Playlist names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.playlists.keys().cloned().collect()
    }
}
