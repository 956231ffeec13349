use poise::{
    CreateReply,
    serenity_prelude::{ReactionType, UserId},
};

use crate::{
    commands::music::join::current_session,
    util::{
        alias::{Context, Error},
        error::MusicError,
        music_ui::{ACCENT, message_embed, reply_embed},
        player::SessionHandle,
    },
};

const UP: &str = "⬆️";
const DOWN: &str = "⬇️";

/// The follow-up move offered by the arrow reactions: the track now at `to`
/// goes one slot up or down, as long as it stays inside the queue.
pub(crate) fn correction_target(up: bool, to: usize, len: usize) -> Option<(usize, usize)> {
    if up {
        (to > 1).then(|| (to, to - 1))
    } else {
        (to < len).then(|| (to, to + 1))
    }
}

/// Move a song to another position in the queue
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    rename = "move",
    aliases("mv")
)]
pub async fn move_track(
    ctx: Context<'_>,
    #[description = "Current position"] from: usize,
    #[description = "New position"] to: usize,
) -> Result<(), Error> {
    let handle = current_session(&ctx).ok_or(MusicError::IndexOutOfRange {
        index: from,
        len: 0,
    })?;
    let track = handle.move_track(from, to).await?;

    let reply = ctx
        .send(CreateReply::default().embed(message_embed(
            format!("🔀 Moved {} from position {from} to {to}.", track.title),
            ACCENT,
        )))
        .await?;
    let msg = reply.message().await?.into_owned();
    let serenity_ctx = ctx.serenity_context();
    for arrow in [UP, DOWN] {
        msg.react(serenity_ctx, ReactionType::Unicode(arrow.to_string()))
            .await?;
    }

    let Some(reaction) = msg
        .await_reaction(serenity_ctx)
        .author_id(ctx.author().id)
        .filter(|r| r.emoji.unicode_eq(UP) || r.emoji.unicode_eq(DOWN))
        .timeout(ctx.data().settings.confirm_timeout())
        .await
    else {
        return Ok(());
    };
    nudge(&ctx, &handle, reaction.emoji.unicode_eq(UP), to, reaction.user_id).await
}

async fn nudge(
    ctx: &Context<'_>,
    handle: &SessionHandle,
    up: bool,
    to: usize,
    user: Option<UserId>,
) -> Result<(), Error> {
    let len = handle.status().await?.queue.len();
    let Some((from, to)) = correction_target(up, to, len) else {
        return Ok(());
    };
    tracing::debug!(?user, from, to, "move corrected by reaction");
    let track = handle.move_track(from, to).await?;
    reply_embed(
        ctx,
        message_embed(
            format!("🔀 Moved {} from position {from} to {to}.", track.title),
            ACCENT,
        ),
    )
    .await
}
