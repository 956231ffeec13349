use poise::{
    FrameworkError,
    serenity_prelude::{Colour, CreateMessage},
};

use crate::{
    models::data::Data,
    util::{
        alias::Error,
        error::MusicError,
        music_ui::{DANGER, WARNING, message_embed, reply_embed},
    },
};

fn colour_for(error: &MusicError) -> Colour {
    match error {
        MusicError::NothingPlaying | MusicError::AlreadyPaused | MusicError::NotPaused => WARNING,
        _ => DANGER,
    }
}

/// Framework-wide error hook. Music errors become a short embed; the
/// session they came from keeps running.
pub async fn on_error(error: FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::Command { error, ctx, .. } => {
            let command = ctx.command().qualified_name.clone();
            let embed = match error.downcast_ref::<MusicError>() {
                Some(music) => {
                    tracing::info!(%command, error = %music, "command refused");
                    message_embed(format!("⚠️ {music}"), colour_for(music))
                }
                None => {
                    tracing::error!(%command, error = %error, "command failed");
                    message_embed("⚠️ Something went wrong while running the command.", DANGER)
                }
            };
            if let Err(e) = reply_embed(&ctx, embed).await {
                tracing::warn!(%command, error = %e, "could not report command error");
            }
        }
        FrameworkError::ArgumentParse { error, input, ctx, .. } => {
            tracing::debug!(command = %ctx.command().qualified_name, ?input, %error, "bad arguments");
            let embed = message_embed(
                "⚠️ Missing or invalid argument. Check how the command is used.",
                DANGER,
            );
            if let Err(e) = reply_embed(&ctx, embed).await {
                tracing::warn!(error = %e, "could not report argument error");
            }
        }
        FrameworkError::UnknownCommand {
            ctx, msg, prefix, ..
        } => {
            let embed = message_embed(
                format!("⚠️ Unknown command. Use `{prefix}comandos` to see the list of commands."),
                DANGER,
            );
            if let Err(e) = msg
                .channel_id
                .send_message(ctx, CreateMessage::new().embed(embed))
                .await
            {
                tracing::warn!(error = %e, "could not send unknown command hint");
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!(error = %e, "error while handling error");
            }
        }
    }
}
