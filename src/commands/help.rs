use crate::util::{
    alias::{Context, Error},
    music_ui::{ACCENT, help_text, message_embed, reply_embed},
};

/// Show the list of commands
#[poise::command(prefix_command, slash_command, aliases("cmds"))]
pub async fn comandos(ctx: Context<'_>) -> Result<(), Error> {
    let text = help_text(&ctx.data().settings.prefix);
    reply_embed(&ctx, message_embed(text, ACCENT)).await
}
