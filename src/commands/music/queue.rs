use crate::{
    commands::music::join::current_session,
    util::{
        alias::{Context, Error},
        error::MusicError,
        music_ui::{
            ACCENT, SUCCESS, WARNING, control_components, message_embed, queue_embed,
            reply_embed, track_embed,
        },
    },
};
use poise::CreateReply;

/// Show the queue
#[poise::command(prefix_command, slash_command, guild_only, aliases("q"))]
pub async fn queue(ctx: Context<'_>) -> Result<(), Error> {
    let status = match current_session(&ctx) {
        Some(handle) => Some(handle.status().await?),
        None => None,
    };
    match status {
        Some(status) if !status.queue.is_empty() => {
            let max = ctx.data().settings.max_queue_display;
            reply_embed(&ctx, queue_embed(&status, max)).await
        }
        _ => reply_embed(&ctx, message_embed("⚠️ The queue is empty.", WARNING)).await,
    }
}

/// Show the song that is playing
#[poise::command(prefix_command, slash_command, guild_only, aliases("np"))]
pub async fn nowplaying(ctx: Context<'_>) -> Result<(), Error> {
    let handle = current_session(&ctx).ok_or(MusicError::NothingPlaying)?;
    let status = handle.status().await?;
    let track = status.now_playing.as_ref().ok_or(MusicError::NothingPlaying)?;
    let note = format!("{} queued • volume {}%", status.queue.len(), status.volume);
    let colour = if status.state.is_active() { SUCCESS } else { ACCENT };
    ctx.send(
        CreateReply::default()
            .embed(track_embed("🎵 Now playing", Some(track), Some(note), colour))
            .components(control_components(status.state, status.looping)),
    )
    .await?;
    Ok(())
}

/// Remove a song from the queue
#[poise::command(prefix_command, slash_command, guild_only, aliases("rm"))]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Queue position (starting at 1)"] index: usize,
) -> Result<(), Error> {
    let handle = current_session(&ctx).ok_or(MusicError::IndexOutOfRange { index, len: 0 })?;
    let removed = handle.remove(index).await?;
    reply_embed(
        &ctx,
        message_embed(format!("❌ Removed from the queue: {}", removed.title), ACCENT),
    )
    .await
}

/// Clear the whole queue
#[poise::command(prefix_command, slash_command, guild_only, aliases("clr"))]
pub async fn clear(ctx: Context<'_>) -> Result<(), Error> {
    let removed = match current_session(&ctx) {
        Some(handle) => handle.clear().await?,
        None => 0,
    };
    tracing::debug!(removed, "queue cleared");
    reply_embed(&ctx, message_embed("🧹 The queue has been cleared.", ACCENT)).await
}
