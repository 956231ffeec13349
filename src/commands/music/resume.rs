use crate::{
    commands::music::join::current_session,
    util::{
        alias::{Context, Error},
        error::MusicError,
        music_ui::{SUCCESS, message_embed, reply_embed},
    },
};

/// Resume playback
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    let handle = current_session(&ctx).ok_or(MusicError::NothingPlaying)?;
    handle.resume().await?;
    reply_embed(&ctx, message_embed("▶️ Resumed.", SUCCESS)).await
}
