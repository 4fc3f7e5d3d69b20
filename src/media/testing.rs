//! In-memory extraction provider for tests.

use super::{
    provider::{ByteStream, ExtractionProvider, ProviderError},
    types::{RawFormat, RawVideoInfo},
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

pub const SAMPLE_URL: &str = "https://example.com/watch?v=VALIDID11";

pub enum StreamScript {
    Chunks(Vec<&'static str>),
    FailAfter(Vec<&'static str>, &'static str),
    Endless,
}

/// Sets the shared flag when the stream holding it is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct FakeProvider {
    info: Option<RawVideoInfo>,
    script: StreamScript,
    delay: Option<Duration>,
    pub resolve_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub opened: Mutex<Vec<String>>,
    pub stream_dropped: Arc<AtomicBool>,
}

impl FakeProvider {
    pub fn new(info: RawVideoInfo) -> Self {
        Self {
            info: Some(info),
            script: StreamScript::Chunks(vec!["fake ", "video ", "bytes"]),
            delay: None,
            resolve_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A provider whose metadata lookup always fails.
    pub fn failing() -> Self {
        let mut provider = Self::new(RawVideoInfo::default());
        provider.info = None;
        provider
    }

    pub fn with_stream(mut self, script: StreamScript) -> Self {
        self.script = script;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn resolve_count(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn stream_count(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

fn raw_format(id: &str, ext: &str, vcodec: &str, acodec: &str, height: Option<u32>) -> RawFormat {
    RawFormat {
        format_id: id.to_string(),
        ext: Some(ext.to_string()),
        vcodec: Some(vcodec.to_string()),
        acodec: Some(acodec.to_string()),
        height,
        ..Default::default()
    }
}

pub fn sample_info() -> RawVideoInfo {
    let mut progressive = raw_format("18", "mp4", "avc1.42001E", "mp4a.40.2", Some(360));
    progressive.filesize = Some(10_485_760.0);
    progressive.fps = Some(30.0);
    progressive.format_note = Some("360p".to_string());

    let mut audio = raw_format("251", "webm", "none", "opus", None);
    audio.filesize_approx = Some(3_500_000.4);

    RawVideoInfo {
        title: Some("Never Gonna: Give/You Up?".to_string()),
        channel: Some("Rick Astley".to_string()),
        uploader: Some("RickAstleyVEVO".to_string()),
        duration: Some(212.6),
        thumbnail: Some("https://i.ytimg.com/vi/VALIDID11/hqdefault.jpg".to_string()),
        formats: vec![
            raw_format("sb0", "mhtml", "none", "none", None),
            progressive,
            raw_format("137", "mp4", "avc1.640028", "none", Some(1080)),
            audio,
        ],
    }
}

#[async_trait]
impl ExtractionProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn resolve(&self, _url: &str) -> Result<RawVideoInfo, ProviderError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.info.clone().ok_or_else(|| ProviderError::Failed {
            status: "exit status: 1".to_string(),
            message: "ERROR: [fake] VALIDID11: Video unavailable".to_string(),
        })
    }

    async fn open_stream(&self, _url: &str, format_id: &str) -> Result<ByteStream, ProviderError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(format_id.to_string());
        }

        let flag = DropFlag(self.stream_dropped.clone());
        let stream: ByteStream = match &self.script {
            StreamScript::Chunks(chunks) => {
                let items: Vec<Result<Bytes, ProviderError>> =
                    chunks.iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))).collect();
                futures::stream::iter(items).boxed()
            }
            StreamScript::FailAfter(chunks, message) => {
                let mut items: Vec<Result<Bytes, ProviderError>> =
                    chunks.iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))).collect();
                items.push(Err(ProviderError::Failed {
                    status: "exit status: 1".to_string(),
                    message: message.to_string(),
                }));
                futures::stream::iter(items).boxed()
            }
            StreamScript::Endless => {
                futures::stream::repeat_with(|| Ok(Bytes::from_static(b"chunk"))).boxed()
            }
        };

        Ok(stream
            .map(move |item| {
                let _held = &flag;
                item
            })
            .boxed())
    }
}
