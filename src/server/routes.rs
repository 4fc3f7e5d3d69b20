use super::{error::ApiError, AppState};
use crate::media::{RelayOutcome, VideoDescriptor};
use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue, Uri,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/formats", get(formats_query).post(formats_json))
        .route("/api/download", get(download_query).post(download_json))
        .fallback(fallback)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Default, Deserialize)]
struct FormatsRequest {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DownloadRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    format_id: Option<String>,
}

/// Format ids are strings, but numeric ids are commonly sent as JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(de::Error::custom("format_id must be a string or a number")),
    }
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "OK",
        "message": "Server is running",
    }))
}

async fn fallback(uri: Uri) -> ApiError {
    if uri.path().starts_with("/api/") {
        ApiError::not_found("API endpoint not found")
    } else {
        ApiError::not_found("Not found")
    }
}

async fn formats_query(
    State(state): State<AppState>,
    query: Result<Query<FormatsRequest>, QueryRejection>,
) -> Result<Json<VideoDescriptor>, ApiError> {
    let Query(request) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    formats(&state, request).await
}

async fn formats_json(
    State(state): State<AppState>,
    body: Result<Json<FormatsRequest>, JsonRejection>,
) -> Result<Json<VideoDescriptor>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    formats(&state, request).await
}

async fn formats(state: &AppState, request: FormatsRequest) -> Result<Json<VideoDescriptor>, ApiError> {
    let video = state
        .resolver
        .resolve(request.url.as_deref())
        .await
        .map_err(|e| state.api_error(e))?;
    Ok(Json(video))
}

async fn download_query(
    State(state): State<AppState>,
    query: Result<Query<DownloadRequest>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(request) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    download(&state, request).await
}

async fn download_json(
    State(state): State<AppState>,
    body: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    download(&state, request).await
}

/// Once this returns `Ok` the status and headers are committed. Later upstream
/// failures abort the connection instead of producing an error body.
async fn download(state: &AppState, request: DownloadRequest) -> Result<Response, ApiError> {
    let prepared = state
        .proxy
        .open(request.url.as_deref(), request.format_id.as_deref())
        .await
        .map_err(|e| state.api_error(e))?;

    let content_type = HeaderValue::from_str(&prepared.content_type)
        .map_err(|_| ApiError::internal("Invalid content type"))?;
    let disposition = HeaderValue::from_str(&prepared.content_disposition)
        .map_err(|_| ApiError::internal("Invalid file name"))?;

    info!("Sending {} as {}", prepared.filename, prepared.content_type);
    let label = format!("{} [{}]", prepared.filename, prepared.format.format_id);
    let relay = state.proxy.relay(prepared);
    tokio::spawn(report_outcome(label, relay.outcome));

    Ok((
        [
            (CONTENT_TYPE, content_type),
            (CONTENT_DISPOSITION, disposition),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        Body::from_stream(relay.body),
    )
        .into_response())
}

/// Failures past this point are final: the client got a truncated file and
/// nothing is retried.
async fn report_outcome(label: String, outcome: JoinHandle<RelayOutcome>) {
    match outcome.await {
        Ok(RelayOutcome::Completed { bytes }) => {
            info!("Download {} completed, {} bytes relayed", label, bytes)
        }
        Ok(RelayOutcome::Canceled { bytes }) => {
            warn!("Download {} canceled by client after {} bytes", label, bytes)
        }
        Ok(RelayOutcome::Failed { bytes, reason }) => error!(
            "Download {} failed after {} bytes, connection closed: {}",
            label, bytes, reason
        ),
        Err(e) => error!("Relay task for {} panicked: {}", label, e),
    }
}
