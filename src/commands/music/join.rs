use std::sync::Arc;

use poise::serenity_prelude::{ChannelId, Mentionable};
use songbird::{CoreEvent, Event};

use crate::{
    handlers::voice_disconnect::VoiceDisconnectHandler,
    util::{
        alias::{Context, Error},
        error::MusicError,
        music_ui::{SUCCESS, message_embed, reply_embed},
        notice::DiscordNotifier,
        play::SongbirdSink,
        player::{SessionHandle, spawn_session},
    },
};

/// Voice channel the command author is sitting in.
pub fn author_voice_channel(ctx: &Context<'_>) -> Result<ChannelId, MusicError> {
    let guild = ctx.guild().ok_or(MusicError::NotInVoiceChannel)?;
    guild
        .voice_states
        .get(&ctx.author().id)
        .and_then(|state| state.channel_id)
        .ok_or(MusicError::NotInVoiceChannel)
}

/// The guild's running session, if any.
pub fn current_session(ctx: &Context<'_>) -> Option<SessionHandle> {
    ctx.guild_id().and_then(|gid| ctx.data().sessions.get(gid))
}

/// Like [`current_session`], but a missing session is an error.
pub fn require_session(ctx: &Context<'_>) -> Result<SessionHandle, MusicError> {
    current_session(ctx).ok_or(MusicError::NotConnected)
}

/// Returns the running session, or joins the author's voice channel and
/// opens one. The second value is the channel joined, if a join happened.
pub async fn _join(ctx: &Context<'_>) -> Result<(SessionHandle, Option<ChannelId>), Error> {
    if let Some(handle) = current_session(ctx) {
        return Ok((handle, None));
    }
    let guild_id = ctx.guild_id().ok_or("Guild ID not found")?;
    let channel_id = author_voice_channel(ctx)?;

    let manager = songbird::get(ctx.serenity_context())
        .await
        .ok_or("Songbird not initialised")?
        .clone();
    let call = manager.join(guild_id, channel_id).await?;
    // Drop a hook left behind by a session whose connection was lost.
    call.lock().await.remove_all_global_events();
    tracing::info!(guild = %guild_id, channel = %channel_id, "joined voice channel");

    let serenity_ctx = ctx.serenity_context();
    let sink = SongbirdSink::new(
        manager,
        call.clone(),
        serenity_ctx.cache.clone(),
        guild_id,
        channel_id,
    );
    let notifier = DiscordNotifier::new(serenity_ctx.http.clone(), ctx.channel_id());
    let data = ctx.data();
    let handle = data.sessions.insert(spawn_session(
        guild_id,
        data.resolver.clone(),
        Arc::new(sink),
        Arc::new(notifier),
        data.settings.clone(),
    ));
    call.lock().await.add_global_event(
        Event::Core(CoreEvent::DriverDisconnect),
        VoiceDisconnectHandler::new(handle.clone()),
    );
    Ok((handle, Some(channel_id)))
}

/// Join your voice channel
#[poise::command(prefix_command, slash_command, guild_only, aliases("j"))]
pub async fn join(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    let (_, joined) = _join(&ctx).await?;
    let text = match joined {
        Some(channel) => format!("Connected to {}", channel.mention()),
        None => "Already connected to a voice channel".to_string(),
    };
    reply_embed(&ctx, message_embed(text, SUCCESS)).await
}
