use super::{
    provider::{ByteStream, ExtractionProvider, ProviderError},
    types::RawVideoInfo,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::process::Stdio;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, ChildStdout, Command},
    task::JoinHandle,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

const STREAM_READ_CAPACITY: usize = 64 * 1024;
const STDERR_TAIL_BYTES: usize = 8 * 1024;

pub struct YtDlpProvider {
    binary: String,
    args: Vec<String>,
}

impl YtDlpProvider {
    pub fn new(binary: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    fn spawn_error(&self, source: std::io::Error) -> ProviderError {
        ProviderError::Spawn {
            program: self.binary.clone(),
            source,
        }
    }
}

/// Picks the most useful line out of yt-dlp's stderr.
fn stderr_message(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| "no error output".to_string())
}

/// Reads `reader` to the end, keeping only its last `limit` bytes.
async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> Vec<u8> {
    let mut tail = Vec::with_capacity(limit);
    let mut buffer = [0u8; 4096];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buffer[..n]);
                if tail.len() > limit {
                    tail.drain(..tail.len() - limit);
                }
            }
        }
    }
    tail
}

struct ChildStream {
    child: Child,
    reader: ReaderStream<ChildStdout>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    finished: bool,
}

async fn next_chunk(mut state: ChildStream) -> Option<(Result<Bytes, ProviderError>, ChildStream)> {
    if state.finished {
        return None;
    }

    match state.reader.next().await {
        Some(Ok(chunk)) => Some((Ok(chunk), state)),
        Some(Err(e)) => {
            state.finished = true;
            Some((Err(ProviderError::Io(e)), state))
        }
        None => {
            state.finished = true;
            let status = match state.child.wait().await {
                Ok(status) => status,
                Err(e) => return Some((Err(ProviderError::Io(e)), state)),
            };

            if status.success() {
                debug!("yt-dlp stream finished");
                return None;
            }

            let stderr = match state.stderr.take() {
                Some(task) => task.await.unwrap_or_default(),
                None => Vec::new(),
            };
            let error = ProviderError::Failed {
                status: status.to_string(),
                message: stderr_message(&stderr),
            };
            Some((Err(error), state))
        }
    }
}

#[async_trait]
impl ExtractionProvider for YtDlpProvider {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn resolve(&self, url: &str) -> Result<RawVideoInfo, ProviderError> {
        debug!("Extracting metadata with yt-dlp for: {}", url);

        let output = self
            .command()
            .arg("-J")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--")
            .arg(url)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(ProviderError::Failed {
                status: output.status.to_string(),
                message: stderr_message(&output.stderr),
            });
        }

        debug!("yt-dlp returned {} bytes of metadata", output.stdout.len());
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    async fn open_stream(&self, url: &str, format_id: &str) -> Result<ByteStream, ProviderError> {
        info!("Streaming format {} with yt-dlp: {}", format_id, url);

        let mut child = self
            .command()
            .arg("--format")
            .arg(format_id)
            .arg("--output")
            .arg("-")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--no-part")
            .arg("--quiet")
            .arg("--")
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::Io(std::io::Error::other("yt-dlp stdout not captured")))?;

        // Drained concurrently so a chatty stderr can never block the child.
        let stderr = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(read_tail(pipe, STDERR_TAIL_BYTES)));

        let state = ChildStream {
            child,
            reader: ReaderStream::with_capacity(stdout, STREAM_READ_CAPACITY),
            stderr,
            finished: false,
        };

        Ok(futures::stream::unfold(state, next_chunk).boxed())
    }

    async fn test_availability(&self) -> bool {
        match self.command().arg("--version").output().await {
            Ok(output) => {
                if output.status.success() {
                    let version = String::from_utf8_lossy(&output.stdout);
                    info!("✅ yt-dlp is available, version: {}", version.trim());
                    true
                } else {
                    warn!("❌ yt-dlp command failed");
                    false
                }
            }
            Err(e) => {
                warn!("❌ yt-dlp not found: {}", e);
                false
            }
        }
    }
}
