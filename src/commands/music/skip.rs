use crate::{
    commands::music::join::current_session,
    util::{
        alias::{Context, Error},
        error::MusicError,
        music_ui::{ACCENT, message_embed, reply_embed},
    },
};

/// Skip to the next song in the queue
#[poise::command(prefix_command, slash_command, guild_only, aliases("s"))]
pub async fn skip(ctx: Context<'_>) -> Result<(), Error> {
    let handle = current_session(&ctx).ok_or(MusicError::NothingPlaying)?;
    // Starting the next track can take a while.
    ctx.defer().await?;
    let skipped = handle.skip().await?;
    reply_embed(
        &ctx,
        message_embed(format!("⏭️ Skipped {}", skipped.title), ACCENT),
    )
    .await
}
