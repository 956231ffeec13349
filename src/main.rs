mod commands;
mod handlers;
mod models;
mod util;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use once_cell::sync::Lazy;
use poise::serenity_prelude::{Client, GatewayIntents};
use songbird::SerenityInit;
use tracing_subscriber::EnvFilter;

use crate::{
    commands::create_commands::create_commands,
    handlers::{controls::event_handler, on_error::on_error},
    models::data::Data,
    util::{alias::Error, config::BotConfig, track::TrackResolver, ytdlp::YtDlpResolver},
};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the config file
    #[arg(long, short, default_value = "Setting.toml")]
    config: PathBuf,
}

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Shared HTTP client for yt-dlp lookups and audio streams.
pub fn get_http_client() -> reqwest::Client {
    HTTP_CLIENT.clone()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,serenity=warn,songbird=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = BotConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::info!(
        config = %cli.config.display(),
        prefix = %config.music.prefix,
        idle_timeout_secs = config.music.idle_timeout_secs,
        "configuration loaded"
    );

    let resolver: Arc<dyn TrackResolver> = Arc::new(YtDlpResolver::new(&config.yt_dlp));
    let settings = config.music.clone();

    let framework = poise::Framework::<Data, Error>::builder()
        .options(poise::FrameworkOptions {
            commands: create_commands(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(settings.prefix.clone()),
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("slash commands registered");
                Ok(Data::new(resolver, settings))
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_VOICE_STATES;

    let mut client = Client::builder(&config.token.token, intents)
        .framework(framework)
        .register_songbird()
        .await
        .context("creating Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received Ctrl-C, shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.context("Discord client stopped")?;
    Ok(())
}
