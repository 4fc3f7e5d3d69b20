use crate::error::AppError;
use url::Url;

const MAX_FORMAT_ID_LEN: usize = 64;

/// Checks that `raw` is an absolute http(s) URL on one of `allowed_hosts`.
///
/// A host matches when it equals an allowed entry or is a subdomain of one, so
/// `youtube.com` admits `www.youtube.com` and `m.youtube.com`. An empty list
/// admits any host.
pub fn validate_source_url(raw: Option<&str>, allowed_hosts: &[String]) -> Result<Url, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::invalid_input("URL is required"))?;

    let url = Url::parse(raw).map_err(|e| AppError::invalid_input(format!("Invalid URL: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::invalid_input(format!(
            "Unsupported URL scheme: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::invalid_input("URL has no host"))?;

    if !allowed_hosts.is_empty() && !is_allowed_host(&host, allowed_hosts) {
        return Err(AppError::invalid_input(format!("Unsupported video site: {host}")));
    }

    Ok(url)
}

fn is_allowed_host(host: &str, allowed_hosts: &[String]) -> bool {
    allowed_hosts.iter().any(|allowed| {
        let allowed = allowed.trim().trim_end_matches('.').to_ascii_lowercase();
        host == allowed || host.ends_with(&format!(".{allowed}"))
    })
}

pub fn validate_format_id(raw: Option<&str>) -> Result<String, AppError> {
    let id = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::invalid_input("format_id is required"))?;

    let well_formed = id.len() <= MAX_FORMAT_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !well_formed {
        return Err(AppError::invalid_input(format!("Invalid format_id: {id}")));
    }

    Ok(id.to_string())
}
