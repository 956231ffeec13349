use poise::{CreateReply, serenity_prelude::CreateEmbedFooter};

use crate::{
    commands::music::join::{_join, author_voice_channel, current_session},
    util::{
        alias::{Context, Error},
        music_ui::{
            ACCENT, WARNING, control_components, message_embed, now_playing_embed, reply_embed,
            track_link,
        },
        player::PlayOutcome,
        session::PlayerState,
    },
};

/// Play a song or add it to the queue
#[poise::command(prefix_command, slash_command, guild_only, aliases("p"))]
pub async fn play(
    ctx: Context<'_>,
    #[rest]
    #[description = "Song name or URL"]
    query: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    tracing::info!(guild = ?ctx.guild_id(), user = %ctx.author().id, %query, "play requested");

    let (handle, outcome) = match current_session(&ctx) {
        Some(handle) => {
            let outcome = handle.play(&query).await?;
            (handle, outcome)
        }
        None => {
            // Check before the lookup so nobody waits on yt-dlp for nothing.
            author_voice_channel(&ctx)?;
            let track = ctx.data().resolver.search(&query).await?;
            let (handle, _) = _join(&ctx).await?;
            let outcome = handle.play_track(track).await?;
            (handle, outcome)
        }
    };

    match outcome {
        PlayOutcome::Started(track) => {
            let status = handle.status().await?;
            let looping = status.looping;
            let embed = now_playing_embed(&track, status.queue.len())
                .footer(CreateEmbedFooter::new(format!("Requested by {}", ctx.author().name)));
            ctx.send(
                CreateReply::default()
                    .embed(embed)
                    .components(control_components(PlayerState::Playing, looping)),
            )
            .await?;
            Ok(())
        }
        PlayOutcome::Queued { track, position } => {
            reply_embed(
                &ctx,
                message_embed(
                    format!("Added to the queue (#{position}): {}", track_link(&track)),
                    ACCENT,
                ),
            )
            .await
        }
        PlayOutcome::Deferred(track) => {
            reply_embed(
                &ctx,
                message_embed(
                    format!("⚠️ Could not play {}. Trying again…", track.title),
                    WARNING,
                ),
            )
            .await
        }
    }
}
