use super::types::FormatDescriptor;

const MAX_FILENAME_CHARS: usize = 150;
const FALLBACK_FILENAME: &str = "video";

/// ASCII-only file stem for the quoted `filename=` parameter.
pub fn sanitize_filename(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    finish_stem(&replaced)
}

/// Unicode-preserving stem for `filename*=`; only path separators, quotes and
/// control characters are replaced.
fn sanitize_filename_unicode(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    finish_stem(&replaced)
}

fn finish_stem(raw: &str) -> String {
    let mut stem = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for c in raw.chars() {
        if c == '_' {
            if last_underscore {
                continue;
            }
            last_underscore = true;
        } else {
            last_underscore = false;
        }
        stem.push(c);
    }

    let stem: String = stem
        .trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '_')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();
    let stem = stem.trim_end().to_string();

    if stem.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        stem
    }
}

pub fn download_filename(title: &str, ext: &str) -> String {
    format!("{}.{}", sanitize_filename(title), ext)
}

pub fn content_disposition(title: &str, ext: &str) -> String {
    let unicode = format!("{}.{}", sanitize_filename_unicode(title), ext);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        download_filename(title, ext),
        urlencoding::encode(&unicode)
    )
}

pub fn content_type(format: &FormatDescriptor) -> String {
    if !format.has_video() {
        match format.ext.as_str() {
            "webm" => return "audio/webm".to_string(),
            "mp4" | "m4a" => return "audio/mp4".to_string(),
            _ => {}
        }
    }

    mime_guess::from_ext(&format.ext)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
