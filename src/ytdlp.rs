//! Video provider backed by the `yt-dlp` executable.
//!
//! Metadata and the list of stream variants come from a single `-J` dump; the
//! chosen variant is then downloaded by format id into the caller's path.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::sync::Mutex as AsyncMutex;

use crate::config::AppConfig;

const STDERR_TAIL_LINES: usize = 50;

#[derive(Debug, Error)]
pub enum YtDlpError {
    #[error("Failed to start yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed waiting for yt-dlp: {0}")]
    Wait(#[source] std::io::Error),

    #[error("yt-dlp exited with error (status={status}): {stderr_tail}")]
    Exit { status: ExitStatus, stderr_tail: String },

    #[error("Failed to parse yt-dlp JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Download succeeded but output file missing: {0}")]
    MissingOutput(#[source] std::io::Error),

    #[error("Download succeeded but output file is empty")]
    EmptyOutput,
}

/// One stream variant as listed in yt-dlp's `formats` array.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFormat {
    pub format_id: String,
    pub ext: String,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub tbr: Option<f64>,
}

fn has_codec(codec: &Option<String>) -> bool {
    matches!(codec.as_deref(), Some(c) if !c.is_empty() && c != "none")
}

impl StreamFormat {
    /// Carries both audio and video.
    pub fn is_muxed(&self) -> bool {
        has_codec(&self.vcodec) && has_codec(&self.acodec)
    }

    fn quality_key(&self) -> (u32, f64, f64) {
        (
            self.height.unwrap_or(0),
            self.fps.unwrap_or(0.0),
            self.tbr.unwrap_or(0.0),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
}

impl VideoMetadata {
    /// Muxed variant with the highest video quality: height, then frame rate,
    /// then total bitrate.
    pub fn best_muxed(&self) -> Option<&StreamFormat> {
        self.formats.iter().filter(|f| f.is_muxed()).max_by(|a, b| {
            a.quality_key()
                .partial_cmp(&b.quality_key())
                .unwrap_or(Ordering::Equal)
        })
    }
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Title plus every stream variant the platform offers for `video_id`.
    async fn metadata(&self, video_id: &str) -> Result<VideoMetadata, YtDlpError>;

    /// Writes `format` of `video_id` to `dest`, replacing any existing file.
    async fn download(
        &self,
        video_id: &str,
        format: &StreamFormat,
        dest: &Path,
    ) -> Result<(), YtDlpError>;
}

pub struct YtDlp {
    bin: PathBuf,
    path_env: String,
    proxy: Option<String>,
    inherit_proxy_env: bool,
    cookies_file: Option<PathBuf>,
    cookies_browser: Option<String>,
    watch_url_prefix: String,
}

impl YtDlp {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            bin: cfg.ytdlp_bin.clone(),
            path_env: cfg.ytdlp_path.clone(),
            proxy: cfg.ytdlp_proxy.clone(),
            inherit_proxy_env: cfg.inherit_proxy_env,
            cookies_file: cfg.cookies_file.clone(),
            cookies_browser: cfg.cookies_browser.clone(),
            watch_url_prefix: cfg.watch_url_prefix.clone(),
        }
    }

    fn watch_url(&self, video_id: &str) -> String {
        format!("{}{}", self.watch_url_prefix, video_id)
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.env("PATH", &self.path_env);

        if !self.inherit_proxy_env {
            // A dead local proxy in the shell environment would break every request.
            cmd.env_remove("http_proxy")
                .env_remove("https_proxy")
                .env_remove("HTTP_PROXY")
                .env_remove("HTTPS_PROXY")
                .env_remove("no_proxy")
                .env_remove("NO_PROXY");
        }

        if let Some(p) = &self.proxy {
            cmd.arg("--proxy").arg(p);
        }
        if let Some(file) = &self.cookies_file {
            cmd.arg("--cookies").arg(file);
        } else if let Some(browser) = &self.cookies_browser {
            cmd.arg("--cookies-from-browser").arg(browser);
        }

        cmd.arg("--no-playlist").arg("--no-warnings").arg("--no-cache-dir");
        cmd
    }
}

/// `-o` is an output template; a literal `%` has to be doubled.
fn escape_output_template(path: &Path) -> String {
    path.to_string_lossy().replace('%', "%%")
}

/// Forwards yt-dlp's stderr to the log, remembering the last lines for error reports.
async fn collect_stderr(stderr: ChildStderr, buf: Arc<AsyncMutex<VecDeque<String>>>) {
    let mut r = BufReader::new(stderr);
    let mut line = String::new();
    loop {
        line.clear();
        match r.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let l = line.trim_end().to_string();
                if !l.is_empty() {
                    log::info!("[YTDLP] {}", l);
                    let mut g = buf.lock().await;
                    if g.len() >= STDERR_TAIL_LINES {
                        g.pop_front();
                    }
                    g.push_back(l);
                }
            }
            Err(_) => break,
        }
    }
}

/// The remembered stderr lines, or a placeholder when yt-dlp printed nothing.
async fn render_tail(buf: &AsyncMutex<VecDeque<String>>) -> String {
    let g = buf.lock().await;
    if g.is_empty() {
        return "no stderr output captured".to_string();
    }
    g.iter().cloned().collect::<Vec<_>>().join("\n")
}

#[async_trait]
impl VideoProvider for YtDlp {
    async fn metadata(&self, video_id: &str) -> Result<VideoMetadata, YtDlpError> {
        let mut cmd = self.base_command();
        cmd.arg("-J")
            .arg(self.watch_url(video_id))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let out = cmd.output().await.map_err(YtDlpError::Spawn)?;
        if !out.status.success() {
            return Err(YtDlpError::Exit {
                status: out.status,
                stderr_tail: String::from_utf8_lossy(&out.stderr).trim_end().to_string(),
            });
        }

        Ok(serde_json::from_slice(&out.stdout)?)
    }

    async fn download(
        &self,
        video_id: &str,
        format: &StreamFormat,
        dest: &Path,
    ) -> Result<(), YtDlpError> {
        let mut cmd = self.base_command();
        cmd.arg("--no-part")
            .arg("--force-overwrites")
            .arg("-f")
            .arg(&format.format_id)
            .arg("-o")
            .arg(escape_output_template(dest))
            .arg(self.watch_url(video_id))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(YtDlpError::Spawn)?;
        if let Some(pid) = child.id() {
            log::info!("[YTDLP] started (pid={})", pid);
        }

        let tail_buf = Arc::new(AsyncMutex::new(VecDeque::new()));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_stderr(stderr, tail_buf.clone())));

        let status = child.wait().await.map_err(YtDlpError::Wait)?;
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        if !status.success() {
            return Err(YtDlpError::Exit {
                status,
                stderr_tail: render_tail(&tail_buf).await,
            });
        }

        let meta = tokio::fs::metadata(dest)
            .await
            .map_err(YtDlpError::MissingOutput)?;
        if meta.len() == 0 {
            return Err(YtDlpError::EmptyOutput);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"{
        "id": "ABC123",
        "title": "Song: Title?",
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none"},
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "tbr": 129.5},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "fps": 30},
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "fps": 30, "tbr": 500.1},
            {"format_id": "43", "ext": "webm", "vcodec": "vp8.0", "acodec": "vorbis", "height": 360, "fps": 30, "tbr": 300.0},
            {"format_id": "22", "ext": "mp4", "vcodec": "avc1.64001F", "acodec": "mp4a.40.2", "height": 720, "fps": null}
        ]
    }"#;

    #[test]
    fn parses_dump_and_picks_highest_muxed() {
        let meta: VideoMetadata = serde_json::from_str(DUMP).unwrap();
        assert_eq!(meta.title, "Song: Title?");
        assert_eq!(meta.formats.len(), 6);

        let best = meta.best_muxed().unwrap();
        assert_eq!(best.format_id, "22");
        assert_eq!(best.ext, "mp4");
    }

    #[test]
    fn bitrate_breaks_height_ties() {
        let mut meta: VideoMetadata = serde_json::from_str(DUMP).unwrap();
        meta.formats.retain(|f| f.format_id != "22");
        assert_eq!(meta.best_muxed().unwrap().format_id, "18");
    }

    #[test]
    fn adaptive_only_streams_have_no_muxed_choice() {
        let meta: VideoMetadata = serde_json::from_str(
            r#"{"title": "t", "formats": [
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2"},
                {"format_id": "137", "ext": "mp4", "vcodec": "avc1", "acodec": null}
            ]}"#,
        )
        .unwrap();
        assert!(meta.best_muxed().is_none());
    }

    #[test]
    fn missing_formats_list_is_empty() {
        let meta: VideoMetadata = serde_json::from_str(r#"{"title": "t"}"#).unwrap();
        assert!(meta.formats.is_empty());
        assert!(meta.best_muxed().is_none());
    }

    #[test]
    fn percent_signs_are_escaped_in_output_template() {
        assert_eq!(
            escape_output_template(Path::new("soundpadFiles/100%_real.mp4")),
            "soundpadFiles/100%%_real.mp4"
        );
    }

    #[test]
    fn watch_url_uses_configured_prefix() {
        let cfg = AppConfig::default();
        let ytdlp = YtDlp::from_config(&cfg);
        assert_eq!(
            ytdlp.watch_url("ABC123"),
            "https://www.youtube.com/watch?v=ABC123"
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let mut cfg = AppConfig::default();
        cfg.ytdlp_bin = PathBuf::from("/nonexistent/yt-dlp");
        let ytdlp = YtDlp::from_config(&cfg);

        let err = ytdlp.metadata("ABC123").await.unwrap_err();
        assert!(matches!(err, YtDlpError::Spawn(_)));
    }
}
