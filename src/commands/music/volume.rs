use crate::{
    commands::music::join::require_session,
    util::{
        alias::{Context, Error},
        music_ui::{ACCENT, message_embed, reply_embed},
    },
};

/// Set the playback volume
#[poise::command(prefix_command, slash_command, guild_only, aliases("v"))]
pub async fn volume(
    ctx: Context<'_>,
    #[description = "Volume between 0 and 100"] volume: i64,
) -> Result<(), Error> {
    let level = require_session(&ctx)?.set_volume(volume).await?;
    reply_embed(&ctx, message_embed(format!("🔊 Volume set to {level}%"), ACCENT)).await
}
