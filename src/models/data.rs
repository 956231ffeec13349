use std::sync::Arc;

use crate::util::{
    config::MusicSettings, player::SessionRegistry, track::TrackResolver, types::PlaylistMap,
};

/// Framework user data, shared by every command.
pub struct Data {
    pub sessions: SessionRegistry,
    pub playlists: PlaylistMap,
    pub resolver: Arc<dyn TrackResolver>,
    pub settings: MusicSettings,
}

impl Data {
    pub fn new(resolver: Arc<dyn TrackResolver>, settings: MusicSettings) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            playlists: PlaylistMap::default(),
            resolver,
            settings,
        }
    }
}
