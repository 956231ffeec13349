use crate::{
    commands::music::join::current_session,
    util::{
        alias::{Context, Error},
        error::MusicError,
        music_ui::{ACCENT, message_embed, reply_embed},
    },
};

/// Pause playback
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn pause(ctx: Context<'_>) -> Result<(), Error> {
    let handle = current_session(&ctx).ok_or(MusicError::NothingPlaying)?;
    handle.pause().await?;
    reply_embed(&ctx, message_embed("⏸️ Paused.", ACCENT)).await
}
