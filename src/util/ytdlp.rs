use std::{env, path::PathBuf, process::Stdio};

use async_trait::async_trait;
use songbird::input::{AudioStreamError, AuxMetadata, Compose, YoutubeDl};
use tokio::{
    process::Command,
    time::{Duration, timeout},
};
use url::Url;

use crate::{
    get_http_client,
    util::{
        config::YtDlpSettings,
        error::{MusicError, MusicResult},
        track::{TrackDescriptor, TrackResolver},
    },
};

const YTDLP_TIMEOUT: Duration = Duration::from_secs(20);
const AUDIO_FORMAT: &str = "bestaudio[protocol^=http]/bestaudio";

/// Resolves queries and stream URLs by shelling out to yt-dlp.
pub struct YtDlpResolver {
    program: &'static str,
    args: Vec<String>,
}

impl YtDlpResolver {
    pub fn new(settings: &YtDlpSettings) -> Self {
        // songbird wants a 'static program name; the resolver lives for the
        // whole process.
        let program: &'static str = Box::leak(settings.path.clone().into_boxed_str());
        let args = user_args(settings, default_cookies_file());
        tracing::info!(program, extra_args = args.len(), "yt-dlp resolver ready");
        Self { program, args }
    }

    async fn metadata(&self, query: &str, args: Vec<String>) -> Result<AuxMetadata, AudioStreamError> {
        let client = get_http_client();
        if is_url(query) {
            YoutubeDl::new_ytdl_like(self.program, client, query.to_string())
                .user_args(args)
                .aux_metadata()
                .await
        } else {
            YoutubeDl::new_search_ytdl_like(self.program, client, query.to_string())
                .user_args(args)
                .aux_metadata()
                .await
        }
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn search(&self, query: &str) -> MusicResult<TrackDescriptor> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::TrackNotFound(String::new()));
        }

        let mut args = lookup_args();
        args.extend(self.args.iter().cloned());
        let meta = match timeout(YTDLP_TIMEOUT, self.metadata(query, args)).await {
            Ok(Ok(meta)) => meta,
            Ok(Err(e)) => {
                // Retry with yt-dlp defaults; some format filters break on
                // region-locked or age-gated results.
                tracing::warn!(%query, error = %e, "yt-dlp lookup failed, retrying with plain arguments");
                match timeout(YTDLP_TIMEOUT, self.metadata(query, self.args.clone())).await {
                    Ok(Ok(meta)) => meta,
                    Ok(Err(e)) => {
                        tracing::warn!(%query, error = %e, "yt-dlp lookup failed");
                        return Err(MusicError::TrackNotFound(query.to_string()));
                    }
                    Err(_) => {
                        tracing::warn!(%query, "yt-dlp lookup timed out");
                        return Err(MusicError::TrackNotFound(query.to_string()));
                    }
                }
            }
            Err(_) => {
                tracing::warn!(%query, "yt-dlp lookup timed out");
                return Err(MusicError::TrackNotFound(query.to_string()));
            }
        };

        let track = TrackDescriptor::from_metadata(query, meta)
            .ok_or_else(|| MusicError::TrackNotFound(query.to_string()))?;
        tracing::debug!(%query, title = %track.title, url = %track.url, "resolved");
        Ok(track)
    }

    async fn stream_url(&self, track: &TrackDescriptor) -> MusicResult<String> {
        let mut cmd = Command::new(self.program);
        cmd.args(lookup_args())
            .args(["-f", AUDIO_FORMAT, "-g"])
            .args(&self.args)
            .arg(&track.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(YTDLP_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(MusicError::PlaybackStartFailed(format!(
                    "could not run {}: {e}",
                    self.program
                )));
            }
            Err(_) => {
                return Err(MusicError::PlaybackStartFailed(
                    "yt-dlp timed out".to_string(),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(url = %track.url, status = %output.status, stderr = %stderr.trim(), "yt-dlp -g failed");
            return Err(MusicError::PlaybackStartFailed(
                last_line(&stderr).unwrap_or("yt-dlp failed").to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        first_line(&stdout)
            .map(str::to_string)
            .ok_or_else(|| MusicError::PlaybackStartFailed("yt-dlp returned no stream".to_string()))
    }
}

fn is_url(query: &str) -> bool {
    Url::parse(query).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

fn lookup_args() -> Vec<String> {
    ["-4", "--ignore-config", "--no-warnings", "--no-playlist", "--geo-bypass"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Cookies, proxy and extra arguments from `[yt_dlp]`. When no cookies are
/// configured, `fallback_cookies` is used if given.
pub fn user_args(settings: &YtDlpSettings, fallback_cookies: Option<PathBuf>) -> Vec<String> {
    let set = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let mut args = Vec::new();

    let browser = set(&settings.cookies_from_browser);
    let file = set(&settings.cookies_file);
    if let Some(browser) = &browser {
        args.extend(["--cookies-from-browser".to_string(), browser.clone()]);
    }
    if let Some(file) = &file {
        args.extend(["--cookies".to_string(), file.clone()]);
    }
    if browser.is_none() && file.is_none() {
        if let Some(path) = fallback_cookies {
            args.extend(["--cookies".to_string(), path.to_string_lossy().into_owned()]);
        }
    }
    if let Some(proxy) = set(&settings.proxy) {
        args.extend(["--proxy".to_string(), proxy]);
    }
    args.extend(
        settings
            .extra_args
            .iter()
            .filter(|a| !a.trim().is_empty())
            .cloned(),
    );
    args
}

/// `cookies.txt` next to the executable, then in the working directory.
fn default_cookies_file() -> Option<PathBuf> {
    let beside_exe = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("cookies.txt")));
    beside_exe
        .into_iter()
        .chain([PathBuf::from("cookies.txt")])
        .find(|p| p.is_file())
}

fn first_line(s: &str) -> Option<&str> {
    s.lines().map(str::trim).find(|l| !l.is_empty())
}

fn last_line(s: &str) -> Option<&str> {
    s.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}
