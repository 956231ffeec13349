use crate::{
    commands::music::join::require_session,
    util::{
        alias::{Context, Error},
        music_ui::{ACCENT, message_embed, reply_embed},
    },
};

/// Leave the voice channel
#[poise::command(prefix_command, slash_command, guild_only, aliases("l"))]
pub async fn leave(ctx: Context<'_>) -> Result<(), Error> {
    require_session(&ctx)?.leave().await?;
    reply_embed(&ctx, message_embed("Disconnected from the voice channel.", ACCENT)).await
}
