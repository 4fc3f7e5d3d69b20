use serde::{Deserialize, Serialize};

/// Codec value the provider uses for an absent stream.
pub const NO_CODEC: &str = "none";

/// Video metadata as returned by `yt-dlp -J`. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVideoInfo {
    pub title: Option<String>,
    pub channel: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: String,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub format_note: Option<String>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatDescriptor {
    pub format_id: String,
    pub ext: String,
    pub vcodec: String,
    pub acodec: String,
    pub height: Option<u32>,
    pub quality: Option<String>,
    pub filesize: Option<u64>,
    pub fps: Option<f64>,
}

impl FormatDescriptor {
    pub fn has_video(&self) -> bool {
        self.vcodec != NO_CODEC
    }

    pub fn has_audio(&self) -> bool {
        self.acodec != NO_CODEC
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoDescriptor {
    pub title: String,
    pub channel: Option<String>,
    pub duration: u64,
    pub thumbnail: Option<String>,
    pub formats: Vec<FormatDescriptor>,
}

impl VideoDescriptor {
    pub fn find_format(&self, format_id: &str) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|f| f.format_id == format_id)
    }
}
