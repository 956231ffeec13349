use thiserror::Error;

/// Failures a music command can run into.
///
/// Every variant is recovered at the command boundary and shown to the user;
/// none of them tears down the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MusicError {
    #[error("You are not in a voice channel")]
    NotInVoiceChannel,

    #[error("No results found for `{0}`")]
    TrackNotFound(String),

    #[error("Could not start playback: {0}")]
    PlaybackStartFailed(String),

    #[error("Nothing is playing right now")]
    NothingPlaying,

    #[error("Playback is already paused")]
    AlreadyPaused,

    #[error("Playback is not paused")]
    NotPaused,

    #[error("Volume must be between 0 and 100 (got {0})")]
    InvalidVolume(i64),

    #[error("Position {index} is out of range (the queue has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Playlist `{0}` not found")]
    PlaylistNotFound(String),

    #[error("Not connected to a voice channel")]
    NotConnected,
}

pub type MusicResult<T> = Result<T, MusicError>;
