//! Client for Soundpad's remote-control pipe.
//!
//! Every exchange is one UTF-8 command followed by one UTF-8 reply such as
//! `R-200`. On Windows the pipe is `\\.\pipe\sp_remote_control`; elsewhere the
//! configured path is opened as a Unix socket so the protocol can be bridged.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;

const REPLY_BUF_LEN: usize = 4096;

#[derive(Debug, Error)]
pub enum SoundpadError {
    #[error("Failed to connect to Soundpad pipe {pipe}: {source}")]
    Connect {
        pipe: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Soundpad pipe I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Soundpad closed the pipe")]
    Closed,

    #[error("Soundpad rejected the request (code {code}): {reply}")]
    Rejected { code: u16, reply: String },

    #[error("Unexpected reply from Soundpad: {0}")]
    Unexpected(String),
}

/// Where downloaded clips end up.
#[async_trait]
pub trait Soundboard: Send + Sync {
    async fn add_sound(&self, path: &Path) -> Result<(), SoundpadError>;
}

pub struct Soundpad<S> {
    pipe: AsyncMutex<S>,
}

fn parse_reply(reply: &str) -> Result<(), SoundpadError> {
    let code = reply
        .strip_prefix("R-")
        .and_then(|rest| rest.get(..3))
        .and_then(|digits| digits.parse::<u16>().ok());

    match code {
        Some(200) => Ok(()),
        Some(code) => Err(SoundpadError::Rejected {
            code,
            reply: reply.to_string(),
        }),
        None => Err(SoundpadError::Unexpected(reply.to_string())),
    }
}

fn clean_reply(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

/// True while `reply` is still a strict prefix of `R-` plus three digits.
fn is_partial_reply(reply: &str) -> bool {
    reply.len() < 5
        && reply.chars().enumerate().all(|(i, c)| match i {
            0 => c == 'R',
            1 => c == '-',
            _ => c.is_ascii_digit(),
        })
}

impl<S> Soundpad<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            pipe: AsyncMutex::new(stream),
        }
    }

    async fn request(&self, command: &str) -> Result<String, SoundpadError> {
        let mut pipe = self.pipe.lock().await;
        pipe.write_all(command.as_bytes()).await?;
        pipe.flush().await?;

        // Byte-mode transports may split a reply across reads.
        let mut buf = vec![0u8; REPLY_BUF_LEN];
        let mut len = 0;
        loop {
            let n = pipe.read(&mut buf[len..]).await?;
            if n == 0 {
                if len == 0 {
                    return Err(SoundpadError::Closed);
                }
                break;
            }
            len += n;
            if len == buf.len() || !is_partial_reply(&clean_reply(&buf[..len])) {
                break;
            }
        }
        Ok(clean_reply(&buf[..len]))
    }
}

#[async_trait]
impl<S> Soundboard for Soundpad<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn add_sound(&self, path: &Path) -> Result<(), SoundpadError> {
        let command = format!("DoAddSound(\"{}\")", path.display());
        let reply = self.request(&command).await?;
        log::debug!("[SOUNDPAD] {} -> {}", command, reply);
        parse_reply(&reply)
    }
}

#[cfg(windows)]
pub type PipeStream = tokio::net::windows::named_pipe::NamedPipeClient;

#[cfg(unix)]
pub type PipeStream = tokio::net::UnixStream;

#[cfg(windows)]
pub async fn connect(pipe: &str) -> Result<Soundpad<PipeStream>, SoundpadError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let stream = ClientOptions::new()
        .open(pipe)
        .map_err(|source| SoundpadError::Connect {
            pipe: pipe.to_string(),
            source,
        })?;
    Ok(Soundpad::new(stream))
}

#[cfg(unix)]
pub async fn connect(pipe: &str) -> Result<Soundpad<PipeStream>, SoundpadError> {
    let stream = tokio::net::UnixStream::connect(pipe)
        .await
        .map_err(|source| SoundpadError::Connect {
            pipe: pipe.to_string(),
            source,
        })?;
    Ok(Soundpad::new(stream))
}
