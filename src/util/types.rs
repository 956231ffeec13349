use std::sync::Arc;

use dashmap::DashMap;
use poise::serenity_prelude::GuildId;

use crate::util::playlist::PlaylistStore;

/// Saved playlists per guild. Outlives voice sessions.
pub type PlaylistMap = Arc<DashMap<GuildId, PlaylistStore>>;
