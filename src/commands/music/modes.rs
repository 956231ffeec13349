use crate::{
    commands::music::join::require_session,
    util::{
        alias::{Context, Error},
        music_ui::{ACCENT, message_embed, reply_embed},
    },
};

fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

/// Toggle repeating the current song
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    rename = "loop",
    aliases("lp")
)]
pub async fn repeat(ctx: Context<'_>) -> Result<(), Error> {
    let looping = require_session(&ctx)?.toggle_loop().await?;
    reply_embed(&ctx, message_embed(format!("🔁 Loop {}.", on_off(looping)), ACCENT)).await
}

/// Toggle playing the queue in random order
#[poise::command(prefix_command, slash_command, guild_only, aliases("sh"))]
pub async fn shuffle(ctx: Context<'_>) -> Result<(), Error> {
    let shuffle = require_session(&ctx)?.toggle_shuffle().await?;
    reply_embed(&ctx, message_embed(format!("🔀 Shuffle {}.", on_off(shuffle)), ACCENT)).await
}

/// Toggle adding a recommended song when the queue runs out
#[poise::command(prefix_command, slash_command, guild_only, aliases("ap"))]
pub async fn autoplay(ctx: Context<'_>) -> Result<(), Error> {
    let autoplay = require_session(&ctx)?.toggle_autoplay().await?;
    reply_embed(&ctx, message_embed(format!("🔄 Autoplay {}.", on_off(autoplay)), ACCENT)).await
}
