use poise::{CreateReply, serenity_prelude::ReactionType};

use crate::{
    commands::music::join::{_join, current_session},
    util::{
        alias::{Context, Error},
        error::MusicError,
        music_ui::{ACCENT, WARNING, message_embed, reply_embed},
    },
};

const TRASH: &str = "🗑️";

/// Save the current song and the queue as a playlist
#[poise::command(prefix_command, slash_command, guild_only, aliases("sp"))]
pub async fn save_playlist(
    ctx: Context<'_>,
    #[rest]
    #[description = "Playlist name"]
    name: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Guild ID not found")?;
    let (now_playing, queue) = match current_session(&ctx) {
        Some(handle) => handle.playlist_snapshot().await?,
        None => (None, Vec::new()),
    };
    let saved = ctx
        .data()
        .playlists
        .entry(guild_id)
        .or_default()
        .save(&name, queue, now_playing);
    tracing::info!(guild = %guild_id, playlist = %name, tracks = saved, "playlist saved");
    reply_embed(&ctx, message_embed(format!("💾 Playlist '{name}' saved."), ACCENT)).await
}

/// Replace the queue with a saved playlist
#[poise::command(prefix_command, slash_command, guild_only, aliases("lpl"))]
pub async fn load_playlist(
    ctx: Context<'_>,
    #[rest]
    #[description = "Playlist name"]
    name: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Guild ID not found")?;
    let tracks = ctx
        .data()
        .playlists
        .get(&guild_id)
        .ok_or_else(|| MusicError::PlaylistNotFound(name.clone()))?
        .load(&name)?;

    ctx.defer().await?;
    let (handle, _) = _join(&ctx).await?;
    let count = tracks.len();
    handle.load_queue(tracks).await?;
    tracing::info!(guild = %guild_id, playlist = %name, tracks = count, "playlist loaded");
    reply_embed(&ctx, message_embed(format!("📂 Playlist '{name}' loaded."), ACCENT)).await
}

/// Delete a saved playlist
#[poise::command(prefix_command, slash_command, guild_only, aliases("dp"))]
pub async fn delete_playlist(
    ctx: Context<'_>,
    #[rest]
    #[description = "Playlist name"]
    name: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Guild ID not found")?;
    ctx.data()
        .playlists
        .get_mut(&guild_id)
        .ok_or_else(|| MusicError::PlaylistNotFound(name.clone()))?
        .delete(&name)?;
    reply_embed(&ctx, message_embed(format!("🗑️ Playlist '{name}' deleted."), ACCENT)).await
}

/// List saved playlists
#[poise::command(prefix_command, slash_command, guild_only, aliases("vp"))]
pub async fn view_playlists(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Guild ID not found")?;
    let names = ctx
        .data()
        .playlists
        .get(&guild_id)
        .map(|store| store.names())
        .unwrap_or_default();
    if names.is_empty() {
        return reply_embed(&ctx, message_embed("⚠️ No saved playlists.", WARNING)).await;
    }

    let embed = message_embed(names.join("\n"), ACCENT).title("📋 Saved playlists");
    let reply = ctx.send(CreateReply::default().embed(embed)).await?;
    let msg = reply.message().await?.into_owned();
    let serenity_ctx = ctx.serenity_context();
    msg.react(serenity_ctx, ReactionType::Unicode(TRASH.to_string()))
        .await?;

    let reaction = msg
        .await_reaction(serenity_ctx)
        .author_id(ctx.author().id)
        .filter(|r| r.emoji.unicode_eq(TRASH))
        .timeout(ctx.data().settings.confirm_timeout())
        .await;
    if reaction.is_some() {
        let prefix = &ctx.data().settings.prefix;
        reply_embed(
            &ctx,
            message_embed(
                format!("To delete a playlist, use `{prefix}delete_playlist <name>`"),
                WARNING,
            ),
        )
        .await?;
    }
    Ok(())
}
