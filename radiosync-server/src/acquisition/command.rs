//! yt-dlp acquisition backend
//!
//! Runs `yt-dlp` to fetch the best audio stream of a track into the media
//! directory as m4a. Progress is parsed from stderr line by line; metadata
//! comes from the JSON document yt-dlp prints on stdout. `ffprobe` fills in
//! the duration when yt-dlp does not report one.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use radiosync_common::events::AcquisitionProgress;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{AcquiredMedia, AcquisitionRequest, AcquisitionStream, AcquisitionUpdate, Acquirer};

/// Where tracks are fetched from
const WATCH_URL: &str = "https://music.youtube.com/watch?v=";

/// Settings for the yt-dlp backend
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSettings {
    pub yt_dlp_path: String,
    pub ffprobe_path: String,
    pub media_dir: PathBuf,
    pub max_duration_secs: f64,
    pub timeout: Duration,
}

/// Acquirer backed by the yt-dlp and ffprobe executables
#[derive(Debug, Clone)]
pub struct CommandAcquirer {
    settings: Arc<CommandSettings>,
}

impl CommandAcquirer {
    pub fn new(settings: CommandSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &CommandSettings {
        &self.settings
    }
}

impl Acquirer for CommandAcquirer {
    fn acquire(&self, request: AcquisitionRequest) -> AcquisitionStream {
        let settings = Arc::clone(&self.settings);

        Box::pin(stream! {
            info!("Starting download: {} (job {})", request.track_id, request.job_id);

            let mut child = match spawn_yt_dlp(&settings, &request) {
                Ok(child) => child,
                Err(e) => {
                    warn!("yt-dlp spawn error for {}: {}", request.track_id, e);
                    yield AcquisitionUpdate::Failed(format!("Failed to spawn yt-dlp: {}", e));
                    return;
                }
            };

            // Drain stdout concurrently so a full pipe cannot stall the child
            let stdout = child.stdout.take();
            let stdout_task = tokio::spawn(async move {
                let mut text = String::new();
                if let Some(mut stdout) = stdout {
                    if let Err(e) = stdout.read_to_string(&mut text).await {
                        warn!("Failed to read yt-dlp stdout: {}", e);
                    }
                }
                text
            });

            let deadline = tokio::time::sleep(settings.timeout);
            tokio::pin!(deadline);

            let mut stderr_text = String::new();
            let mut timed_out = false;
            if let Some(stderr) = child.stderr.take() {
                let mut lines = BufReader::new(stderr).lines();
                loop {
                    let next = tokio::select! {
                        line = lines.next_line() => Some(line),
                        _ = &mut deadline => None,
                    };
                    match next {
                        Some(Ok(Some(line))) => {
                            if let Some(progress) = parse_progress_line(&line) {
                                yield AcquisitionUpdate::Progress(progress);
                            }
                            stderr_text.push_str(&line);
                            stderr_text.push('\n');
                        }
                        Some(Ok(None)) | Some(Err(_)) => break,
                        None => {
                            timed_out = true;
                            break;
                        }
                    }
                }
            }

            let status = if timed_out {
                None
            } else {
                tokio::select! {
                    status = child.wait() => Some(status),
                    _ = &mut deadline => None,
                }
            };

            let status = match status {
                Some(Ok(status)) => status,
                Some(Err(e)) => {
                    yield AcquisitionUpdate::Failed(format!("Failed to wait for yt-dlp: {}", e));
                    return;
                }
                None => {
                    warn!("Download timeout exceeded for {}", request.track_id);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill yt-dlp: {}", e);
                    }
                    yield AcquisitionUpdate::Failed("Download timeout exceeded".to_string());
                    return;
                }
            };

            let stdout_text = stdout_task.await.unwrap_or_default();

            if !status.success() {
                let code = status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                warn!("yt-dlp failed for {} with code {}", request.track_id, code);
                yield AcquisitionUpdate::Failed(format!(
                    "yt-dlp failed with code {}: {}",
                    code,
                    stderr_text.trim()
                ));
                return;
            }

            match finish(&settings, &request, &stdout_text).await {
                Ok(media) => {
                    info!(
                        "Download completed: {} -> {} ({:.1}s)",
                        request.track_id,
                        media.path.display(),
                        media.duration_secs
                    );
                    yield AcquisitionUpdate::Completed(media);
                }
                Err(reason) => {
                    warn!("Download of {} rejected: {}", request.track_id, reason);
                    yield AcquisitionUpdate::Failed(reason);
                }
            }
        })
    }
}

fn spawn_yt_dlp(settings: &CommandSettings, request: &AcquisitionRequest) -> std::io::Result<Child> {
    let template = settings
        .media_dir
        .join(format!("{}-%(title)s.%(ext)s", request.job_id));

    Command::new(&settings.yt_dlp_path)
        .arg("-f")
        .arg("bestaudio")
        .arg("--extract-audio")
        .arg("--audio-format")
        .arg("m4a")
        .arg("--no-playlist")
        .arg("--print-json")
        .arg("--progress")
        .arg("--newline")
        .arg("-o")
        .arg(template)
        .arg(format!("{}{}", WATCH_URL, request.track_id))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Turn a successful yt-dlp run into acquired media
async fn finish(
    settings: &CommandSettings,
    request: &AcquisitionRequest,
    stdout: &str,
) -> Result<AcquiredMedia, String> {
    let metadata = parse_metadata(stdout)
        .ok_or_else(|| "No JSON metadata found in yt-dlp output".to_string())?;

    let path = find_output_file(&settings.media_dir, &request.job_id.to_string())
        .await
        .ok_or_else(|| "Downloaded file not found".to_string())?;

    let duration_secs = match metadata.duration.filter(|d| *d > 0.0) {
        Some(duration) => duration,
        None => probe_duration(&settings.ffprobe_path, &path).await?,
    };

    if duration_secs > settings.max_duration_secs {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove over-long download {}: {}", path.display(), e);
        }
        return Err(format!(
            "Duration {}s exceeds maximum {}s",
            duration_secs, settings.max_duration_secs
        ));
    }

    let title = metadata
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("video-{}", request.track_id));

    Ok(AcquiredMedia {
        title,
        path,
        duration_secs,
    })
}

/// Fields read from yt-dlp's `--print-json` document
#[derive(Debug, Default, Deserialize, PartialEq)]
struct YtDlpMetadata {
    title: Option<String>,
    duration: Option<f64>,
}

/// First line of `stdout` that parses as a JSON object
fn parse_metadata(stdout: &str) -> Option<YtDlpMetadata> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str(line).ok())
}

/// Progress update carried by one stderr line, if any
fn parse_progress_line(line: &str) -> Option<AcquisitionProgress> {
    if line.contains("[ExtractAudio]") {
        return Some(AcquisitionProgress::processing("Converting audio format"));
    }

    let rest = &line[line.find("[download]")? + "[download]".len()..];
    let (number, _) = rest.trim_start().split_once('%')?;
    let percentage: f64 = number.parse().ok()?;
    Some(AcquisitionProgress::download(percentage))
}

async fn find_output_file(media_dir: &Path, job_id: &str) -> Option<PathBuf> {
    let prefix = format!("{}-", job_id);
    let mut dir = tokio::fs::read_dir(media_dir).await.ok()?;
    while let Ok(Some(entry)) = dir.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            return Some(entry.path());
        }
    }
    None
}

/// Ask ffprobe for the container duration in seconds
async fn probe_duration(ffprobe_path: &str, path: &Path) -> Result<f64, String> {
    debug!("Probing duration of {}", path.display());
    let output = Command::new(ffprobe_path)
        .arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("json")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("Failed to spawn ffprobe: {}", e))?;

    if !output.status.success() {
        return Err(format!(
            "ffprobe failed with code {}",
            output.status.code().unwrap_or(-1)
        ));
    }

    parse_ffprobe_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_ffprobe_duration(text: &str) -> Result<f64, String> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| format!("Failed to parse ffprobe output: {}", e))?;
    let duration = &value["format"]["duration"];
    duration
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| duration.as_f64())
        .ok_or_else(|| "Failed to parse ffprobe output: no duration".to_string())
}
