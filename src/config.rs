use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: String,
    pub output_dir: PathBuf,
    pub soundpad_pipe: String,

    pub ytdlp_bin: PathBuf,
    pub ytdlp_path: String,
    // Explicit yt-dlp proxy (e.g. socks5://127.0.0.1:7890).
    pub ytdlp_proxy: Option<String>,
    // Whether yt-dlp may inherit http_proxy/https_proxy from the service environment.
    pub inherit_proxy_env: bool,
    pub cookies_file: Option<PathBuf>,
    pub cookies_browser: Option<String>,
    pub watch_url_prefix: String,
}

#[derive(Debug, Default, Deserialize)]
struct AppConfigFile {
    listen_addr: Option<String>,
    output_dir: Option<String>,
    soundpad_pipe: Option<String>,

    ytdlp_bin: Option<String>,
    ytdlp_path: Option<String>,
    ytdlp_proxy: Option<String>,
    inherit_proxy_env: Option<bool>,
    cookies_file: Option<String>,
    cookies_browser: Option<String>,
    watch_url_prefix: Option<String>,
}

fn default_ytdlp_path() -> String {
    std::env::var("PATH").unwrap_or_else(|_| "/usr/local/bin:/usr/bin:/bin".to_string())
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.and_then(|s| {
        let s = s.trim().to_string();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    })
}

impl Default for AppConfig {
    fn default() -> Self {
        // Every key is optional, so an empty file yields the defaults.
        Self::from_file(AppConfigFile::default())
    }
}

impl AppConfig {
    /// Loads the config named on the command line. The default path is allowed
    /// to be missing; an explicitly named one is not.
    pub fn load_from_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        match args.into_iter().skip_while(|a| a != "--config").nth(1) {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let file: AppConfigFile = toml::from_str(raw).context("Failed to parse config.toml")?;
        let cfg = Self::from_file(file);

        if cfg.cookies_file.is_some() && cfg.cookies_browser.is_some() {
            return Err(anyhow!(
                "cookies_file and cookies_browser are mutually exclusive"
            ));
        }
        if cfg.listen_addr.is_empty() {
            return Err(anyhow!("listen_addr must not be empty"));
        }

        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        Self {
            listen_addr: non_empty(file.listen_addr).unwrap_or_else(|| "localhost:4999".to_string()),
            output_dir: PathBuf::from(
                non_empty(file.output_dir).unwrap_or_else(|| "soundpadFiles".to_string()),
            ),
            soundpad_pipe: non_empty(file.soundpad_pipe)
                .unwrap_or_else(|| r"\\.\pipe\sp_remote_control".to_string()),

            ytdlp_bin: PathBuf::from(non_empty(file.ytdlp_bin).unwrap_or_else(|| "yt-dlp".to_string())),
            ytdlp_path: non_empty(file.ytdlp_path).unwrap_or_else(default_ytdlp_path),
            ytdlp_proxy: non_empty(file.ytdlp_proxy),
            inherit_proxy_env: file.inherit_proxy_env.unwrap_or(false),
            cookies_file: non_empty(file.cookies_file).map(PathBuf::from),
            cookies_browser: non_empty(file.cookies_browser),
            watch_url_prefix: non_empty(file.watch_url_prefix)
                .unwrap_or_else(|| "https://www.youtube.com/watch?v=".to_string()),
        }
    }
}
