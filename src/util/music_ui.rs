use chrono::Utc;
use poise::{
    CreateReply,
    serenity_prelude::{ButtonStyle, Colour, CreateActionRow, CreateButton, CreateEmbed},
};
use url::Url;

use crate::util::{
    alias::{Context, Error},
    notice::Notice,
    player::SessionStatus,
    session::PlayerState,
    track::TrackDescriptor,
};

pub const ACCENT: Colour = Colour::new(0x5865F2);
pub const SUCCESS: Colour = Colour::new(0x2ECC71);
pub const WARNING: Colour = Colour::new(0xF1C40F);
pub const DANGER: Colour = Colour::new(0xE74C3C);

pub const BUTTON_PAUSE: &str = "music_toggle_pause";
pub const BUTTON_SKIP: &str = "music_skip";
pub const BUTTON_LOOP: &str = "music_loop";

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars - 1).collect::<String>();
    out.push('…');
    out
}

fn truncate_embed_title(s: &str) -> String {
    truncate_chars(s, 256)
}

fn truncate_embed_description(s: &str) -> String {
    truncate_chars(s, 4096)
}

fn truncate_embed_field_value(s: &str) -> String {
    truncate_chars(s, 1024)
}

/// Thumbnail for YouTube links that came without one.
fn youtube_thumbnail(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str().unwrap_or_default();
    if host.contains("youtube.com") {
        if let Some(id) = parsed
            .query_pairs()
            .find_map(|(k, v)| (k == "v").then_some(v))
        {
            return Some(format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"));
        }
    }
    if host == "youtu.be" {
        if let Some(id) = parsed.path_segments().and_then(|mut s| s.next()) {
            if !id.is_empty() {
                return Some(format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"));
            }
        }
    }
    None
}

/// `[title](url)`
pub fn track_link(track: &TrackDescriptor) -> String {
    format!("[{}]({})", track.title.replace(']', "\\]"), track.url)
}

/// A plain message embed.
pub fn message_embed(text: impl AsRef<str>, colour: Colour) -> CreateEmbed {
    CreateEmbed::default()
        .description(truncate_embed_description(text.as_ref()))
        .colour(colour)
}

/// Reply to the invoking message (or slash interaction) with one embed.
pub async fn reply_embed(ctx: &Context<'_>, embed: CreateEmbed) -> Result<(), Error> {
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Embed describing one track: link, length and artwork.
pub fn track_embed(
    heading: &str,
    track: Option<&TrackDescriptor>,
    note: Option<String>,
    colour: Colour,
) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(truncate_embed_title(heading))
        .colour(colour)
        .timestamp(Utc::now());

    let mut description = String::new();
    if let Some(track) = track {
        description.push_str(&track_link(track));
    }
    if let Some(note) = note {
        if !description.is_empty() {
            description.push('\n');
        }
        description.push_str(&note);
    }
    if !description.is_empty() {
        embed = embed.description(truncate_embed_description(&description));
    }

    if let Some(track) = track {
        embed = embed.field(
            "Length",
            truncate_embed_field_value(&track.duration_label()),
            true,
        );
        let thumb = track
            .thumbnail
            .clone()
            .or_else(|| youtube_thumbnail(&track.url));
        if let Some(thumbnail) = thumb.as_deref() {
            embed = embed.thumbnail(thumbnail);
        }
    }
    embed
}

/// "Now playing" card with the queue length, as sent after a track starts.
pub fn now_playing_embed(track: &TrackDescriptor, queued: usize) -> CreateEmbed {
    track_embed("Now playing 🎶", Some(track), None, SUCCESS).field(
        "In queue",
        format!("{queued} {}", if queued == 1 { "track" } else { "tracks" }),
        true,
    )
}

/// Pause/resume, skip and loop buttons matching the session state.
pub fn control_components(state: PlayerState, looping: bool) -> Vec<CreateActionRow> {
    let active = state.is_active();
    let pause_label = if state == PlayerState::Paused {
        "▶ Resume"
    } else {
        "⏸ Pause"
    };
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(BUTTON_PAUSE)
            .label(pause_label)
            .style(ButtonStyle::Secondary)
            .disabled(!active),
        CreateButton::new(BUTTON_SKIP)
            .label("⏭ Skip")
            .style(ButtonStyle::Primary)
            .disabled(!active),
        CreateButton::new(BUTTON_LOOP)
            .label("🔁 Loop")
            .style(if looping {
                ButtonStyle::Success
            } else {
                ButtonStyle::Secondary
            }),
    ])]
}

/// Rendering of notices a session posts on its own.
pub fn notice_message(notice: &Notice) -> (CreateEmbed, Vec<CreateActionRow>) {
    match notice {
        Notice::NowPlaying { track, queued } => (
            now_playing_embed(track, *queued),
            control_components(PlayerState::Playing, false),
        ),
        Notice::AutoplayQueued(track) => (
            message_embed(format!("🔄 Autoplay queued {}", track_link(track)), ACCENT),
            Vec::new(),
        ),
        Notice::StartFailed(track) => (
            message_embed(
                format!("⚠️ Could not play {}, trying once more…", track.title),
                WARNING,
            ),
            Vec::new(),
        ),
        Notice::Dropped { track, reason } => (
            message_embed(
                format!("⚠️ Skipped {} after a second failure: {reason}", track.title),
                DANGER,
            ),
            Vec::new(),
        ),
        Notice::QueueFinished => (
            CreateEmbed::default()
                .title("Queue finished 🛑")
                .description(
                    "No more songs to play.\nTurn on autoplay to keep the music going.",
                )
                .colour(DANGER),
            Vec::new(),
        ),
        Notice::IdleDisconnect => (
            message_embed("Disconnected after inactivity.", WARNING),
            Vec::new(),
        ),
        Notice::VoiceLost => (
            message_embed(
                "Lost the voice connection. The queue was cleared.",
                DANGER,
            ),
            Vec::new(),
        ),
    }
}

/// Numbered queue lines, at most `max` of them, and how many were left out.
pub fn queue_lines(queue: &[TrackDescriptor], max: usize) -> (String, usize) {
    let lines = queue
        .iter()
        .take(max)
        .enumerate()
        .map(|(i, t)| format!("{}. {} • {}", i + 1, track_link(t), t.duration_label()))
        .collect::<Vec<_>>()
        .join("\n");
    (lines, queue.len().saturating_sub(max))
}

pub fn queue_embed(status: &SessionStatus, max: usize) -> CreateEmbed {
    let (lines, hidden) = queue_lines(&status.queue, max);
    let mut description = lines;
    if hidden > 0 {
        description.push_str(&format!("\n…and {hidden} more"));
    }

    let mut embed = CreateEmbed::default()
        .title("📃 Queue")
        .colour(ACCENT)
        .timestamp(Utc::now())
        .description(truncate_embed_description(&description));
    if let Some(current) = &status.now_playing {
        embed = embed.field(
            "▶️ Now playing",
            truncate_embed_field_value(&format!(
                "{} • {}",
                track_link(current),
                current.duration_label()
            )),
            false,
        );
    }
    embed.field("Mode", mode_summary(status), false)
}

fn mode_summary(status: &SessionStatus) -> String {
    let flag = |on: bool| if on { "on" } else { "off" };
    format!(
        "Loop {} • Shuffle {} • Autoplay {} • Volume {}%",
        flag(status.looping),
        flag(status.shuffle),
        flag(status.autoplay),
        status.volume
    )
}

pub fn help_text(prefix: &str) -> String {
    const COMMANDS: &[(&str, &str, &str)] = &[
        ("join (j)", "", "Join your voice channel."),
        ("leave (l)", "", "Leave the voice channel."),
        ("play (p)", " <song>", "Play a song or add it to the queue."),
        ("pause", "", "Pause playback."),
        ("resume", "", "Resume playback."),
        ("skip (s)", "", "Skip to the next song in the queue."),
        ("nowplaying (np)", "", "Show the song that is playing."),
        ("queue (q)", "", "Show the queue."),
        ("volume (v)", " <0-100>", "Set the playback volume."),
        ("remove (rm)", " <position>", "Remove a song from the queue."),
        ("clear (clr)", "", "Clear the whole queue."),
        ("move (mv)", " <from> <to>", "Move a song to another position."),
        ("loop (lp)", "", "Toggle repeating the current song."),
        ("shuffle (sh)", "", "Toggle random order."),
        ("autoplay (ap)", "", "Toggle autoplay when the queue runs out."),
        ("save_playlist (sp)", " <name>", "Save the current song and queue."),
        ("load_playlist (lpl)", " <name>", "Replace the queue with a playlist."),
        ("delete_playlist (dp)", " <name>", "Delete a playlist."),
        ("view_playlists (vp)", "", "List saved playlists."),
        ("comandos (cmds)", "", "Show this list."),
    ];
    let mut text = String::from("**Available commands:**\n");
    for (name, args, about) in COMMANDS {
        text.push_str(&format!("`{prefix}{name}{args}`: {about}\n"));
    }
    text
}
