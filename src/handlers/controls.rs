use poise::serenity_prelude::{
    self as serenity, ComponentInteraction, EditInteractionResponse, FullEvent,
};

use crate::{
    models::data::Data,
    util::{
        alias::Error,
        error::MusicError,
        music_ui::{BUTTON_LOOP, BUTTON_PAUSE, BUTTON_SKIP},
        player::SessionHandle,
    },
};

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            tracing::info!(user = %data_about_bot.user.name, guilds = data_about_bot.guilds.len(), "bot is ready");
        }
        FullEvent::InteractionCreate { interaction } => {
            if let Some(component) = interaction.as_message_component() {
                handle_control(ctx, component, data).await;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Buttons under now-playing messages. Acknowledged right away with an
/// ephemeral deferral, then filled in once the session has answered, so the
/// card itself stays untouched.
async fn handle_control(ctx: &serenity::Context, interaction: &ComponentInteraction, data: &Data) {
    let custom_id = interaction.data.custom_id.as_str();
    if ![BUTTON_PAUSE, BUTTON_SKIP, BUTTON_LOOP].contains(&custom_id) {
        return;
    }
    let Some(guild_id) = interaction.guild_id else {
        return;
    };
    tracing::debug!(guild = %guild_id, user = %interaction.user.id, %custom_id, "control interaction");
    if let Err(e) = interaction.defer_ephemeral(&ctx.http).await {
        tracing::warn!(error = %e, "could not acknowledge control interaction");
        return;
    }

    let content = match data.sessions.get(guild_id) {
        Some(handle) => control_reply(&handle, custom_id).await,
        None => format!("⚠️ {}", MusicError::NotConnected),
    };
    respond_ephemeral(ctx, interaction, &content).await;
}

async fn control_reply(handle: &SessionHandle, custom_id: &str) -> String {
    let result = match custom_id {
        BUTTON_PAUSE => match handle.pause().await {
            Ok(()) => Ok("⏸️ Music paused.".to_string()),
            Err(MusicError::AlreadyPaused) => handle
                .resume()
                .await
                .map(|()| "▶️ Music resumed.".to_string()),
            Err(e) => Err(e),
        },
        BUTTON_SKIP => handle
            .skip()
            .await
            .map(|track| format!("⏭️ Skipping {}…", track.title)),
        _ => handle.toggle_loop().await.map(|looping| {
            format!("🔁 Loop {}.", if looping { "enabled" } else { "disabled" })
        }),
    };
    result.unwrap_or_else(|e| format!("⚠️ {e}"))
}

async fn respond_ephemeral(ctx: &serenity::Context, interaction: &ComponentInteraction, content: &str) {
    let builder = EditInteractionResponse::new().content(content);
    if let Err(e) = interaction.edit_response(&ctx.http, builder).await {
        tracing::warn!(error = %e, "could not answer control interaction");
    }
}
