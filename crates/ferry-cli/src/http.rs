//! HTTP adapter
//!
//! ```text
//! PUT /upload/{file_name}     - stream the body into the store, answer with the link
//! GET /download/{public_id}   - stream the file back (404 unknown, 410 expired)
//! GET /healthz                - store counters
//! ```

use std::io;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use chrono::{DateTime, Utc};
use ferry_core::app::LinkBuilder;
use ferry_core::{EphemeralStore, StoreError, StoreStats};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::{ReaderStream, StreamReader};
use tower_http::trace::TraceLayer;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EphemeralStore>,
    pub links: LinkBuilder,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload/:file_name", put(upload))
        .route("/download/:public_id", get(download))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub public_id: String,
    pub url: String,
    pub file_name: String,
    pub size: u64,
    pub expires_at: DateTime<Utc>,
}

async fn upload(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    body: Body,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let stream = body.into_data_stream().map_err(io::Error::other);
    let receipt = state.store.put(StreamReader::new(stream), &file_name).await?;

    let url = state.links.download_url(&receipt.public_id);
    tracing::info!(public_id = %receipt.public_id, %url, "link issued");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            public_id: receipt.public_id.to_string(),
            url,
            file_name: receipt.original_name,
            size: receipt.stored_size,
            expires_at: receipt.expires_at,
        }),
    ))
}

async fn download(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> Result<Response, ApiError> {
    let download = state.store.open_public(&public_id).await?;

    let content_type = HeaderValue::from_str(download.content_type())
        .map_err(|_| ApiError::Header("content-type"))?;
    let disposition = HeaderValue::from_str(&content_disposition(download.file_name()))
        .map_err(|_| ApiError::Header("content-disposition"))?;
    let length = HeaderValue::from(download.len());

    let headers = [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_DISPOSITION, disposition),
        (header::CONTENT_LENGTH, length),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(download))).into_response())
}

async fn healthz(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.stats())
}

/// `attachment; filename="..."`, plus an RFC 5987 `filename*` when the name
/// is not plain printable ASCII.
pub fn content_disposition(file_name: &str) -> String {
    let mut fallback = String::with_capacity(file_name.len());
    for c in file_name.chars() {
        match c {
            '"' | '\\' => {
                fallback.push('\\');
                fallback.push(c);
            }
            ' '..='~' => fallback.push(c),
            _ => fallback.push('_'),
        }
    }

    let plain = file_name.chars().all(|c| matches!(c, ' '..='~'));
    if plain {
        return format!("attachment; filename=\"{fallback}\"");
    }

    let mut encoded = String::with_capacity(file_name.len() * 3);
    for byte in file_name.bytes() {
        let attr_char = byte.is_ascii_alphanumeric()
            || matches!(
                byte,
                b'!' | b'#' | b'$' | b'&' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
            );
        if attr_char {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    Header(&'static str),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Store(StoreError::InvalidFormat { suffix, .. }) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("only {suffix} files are accepted"),
            ),
            ApiError::Store(StoreError::PayloadTooLarge { limit }) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("file is larger than {limit} bytes"),
            ),
            ApiError::Store(StoreError::NotFound) => (
                StatusCode::NOT_FOUND,
                "link is invalid or has expired".to_string(),
            ),
            ApiError::Store(StoreError::Expired) => {
                (StatusCode::GONE, "link has expired".to_string())
            }
            ApiError::Store(err) => {
                tracing::error!(error = %err, "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage failure".to_string(),
                )
            }
            ApiError::Header(name) => {
                tracing::error!(header = name, "could not build response header");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage failure".to_string(),
                )
            }
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request};
    use chrono::TimeZone;
    use ferry_core::StoreConfig;
    use ferry_core::impls::InMemoryBlobStore;
    use ferry_core::ports::FixedClock;
    use rstest::rstest;
    use tower::ServiceExt;

    struct Harness {
        state: AppState,
        blobs: Arc<InMemoryBlobStore>,
        clock: FixedClock,
    }

    fn harness() -> Harness {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let store = EphemeralStore::new(StoreConfig::default(), blobs.clone()).with_clock(clock.clone());
        let state = AppState {
            store: Arc::new(store),
            links: LinkBuilder::new("https://files.example.com").unwrap(),
        };
        Harness {
            state,
            blobs,
            clock,
        }
    }

    async fn send(state: &AppState, method: Method, uri: &str, body: &'static [u8]) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap();
        router(state.clone()).oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn upload_then_download_round_trip() {
        let h = harness();

        let response = send(
            &h.state,
            Method::PUT,
            "/upload/My%20Report%20(Final).pdf",
            b"%PDF-1.7",
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let uploaded: UploadResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(uploaded.public_id, "my-report-final.pdf");
        assert_eq!(
            uploaded.url,
            "https://files.example.com/download/my-report-final.pdf"
        );
        assert_eq!(uploaded.file_name, "My Report (Final).pdf");
        assert_eq!(uploaded.size, 8);

        let response = send(&h.state, Method::GET, "/download/my-report-final.pdf", b"").await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"My Report (Final).pdf\""
        );
        assert_eq!(headers[header::CONTENT_LENGTH], "8");
        assert_eq!(body_bytes(response).await, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn wrong_suffix_is_unsupported() {
        let h = harness();
        let response = send(&h.state, Method::PUT, "/upload/report.txt", b"hello").await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(h.blobs.is_empty());
        assert!(h.state.store.is_empty());
    }

    #[tokio::test]
    async fn unknown_link_is_not_found() {
        let h = harness();
        let response = send(&h.state, Method::GET, "/download/nothing.pdf", b"").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn expired_link_is_gone_then_not_found() {
        let h = harness();
        let response = send(&h.state, Method::PUT, "/upload/a.pdf", b"bytes").await;
        assert_eq!(response.status(), StatusCode::CREATED);

        h.clock.advance(chrono::Duration::minutes(10));

        let response = send(&h.state, Method::GET, "/download/a.pdf", b"").await;
        assert_eq!(response.status(), StatusCode::GONE);
        assert!(h.blobs.is_empty());

        let response = send(&h.state, Method::GET, "/download/a.pdf", b"").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn newest_upload_is_served_for_shared_link() {
        let h = harness();
        send(&h.state, Method::PUT, "/upload/a.pdf", b"older").await;
        send(&h.state, Method::PUT, "/upload/A.PDF", b"newer").await;

        let response = send(&h.state, Method::GET, "/download/a.pdf", b"").await;
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"A.PDF\""
        );
        assert_eq!(body_bytes(response).await, b"newer");
    }

    #[tokio::test]
    async fn oversize_upload_is_rejected() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let config = StoreConfig {
            max_payload_bytes: 2,
            ..StoreConfig::default()
        };
        let state = AppState {
            store: Arc::new(EphemeralStore::new(config, blobs.clone())),
            links: LinkBuilder::new("https://files.example.com").unwrap(),
        };

        let response = send(&state, Method::PUT, "/upload/a.pdf", b"too big").await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn healthz_reports_counts() {
        let h = harness();
        send(&h.state, Method::PUT, "/upload/a.pdf", b"x").await;

        let response = send(&h.state, Method::GET, "/healthz", b"").await;
        assert_eq!(response.status(), StatusCode::OK);
        let stats: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(stats["live"], 1);
        assert_eq!(stats["expired"], 0);
    }

    #[rstest]
    #[case::plain("report.pdf", "attachment; filename=\"report.pdf\"")]
    #[case::quotes("say \"hi\".pdf", "attachment; filename=\"say \\\"hi\\\".pdf\"")]
    #[case::unicode(
        "résumé.pdf",
        "attachment; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
    )]
    fn builds_content_disposition(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(content_disposition(name), expected);
    }
}
