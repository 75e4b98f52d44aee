//! Facebook Graph API client
//!
//! Publishing goes through three endpoint families:
//! - `/{page}/feed` for text posts
//! - `/{page}/photos` for single photos (multipart upload)
//! - `/{page}/videos` and `/{page}/video_reels` for the resumable
//!   start/transfer/finish video upload
//!
//! Page tokens travel as the `access_token` query parameter except during
//! the video transfer phase, which uses an `Authorization: OAuth` header.
//! Transport errors are stripped of their URL before they are turned into
//! error messages, so a token never ends up in a log line.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GraphConfig;
use crate::error::{MediaError, PlatformError, Result};
use crate::platforms::{FeedPage, MediaSource, Platform, PublishRequest};
use crate::types::{ContentKind, Credential, MediaKind, Target};

/// Graph error codes signalling an invalid or expired token
const AUTH_ERROR_CODES: &[i64] = &[190];
/// Graph error codes signalling application, user or page throttling
const RATE_LIMIT_ERROR_CODES: &[i64] = &[4, 17, 32, 613];

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    post_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadStartResponse {
    upload_session_id: String,
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadFinishResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    data: Vec<FeedItem>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: Option<bool>,
}

/// Graph API implementation of [`Platform`]
pub struct GraphClient {
    client: Client,
    api_base: String,
    video_base: String,
    api_version: String,
}

impl GraphClient {
    /// Build a client from the `[graph]` configuration section
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Network` if the HTTP client can't be created.
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("pagecast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                PlatformError::Network(format!("Failed to create HTTP client: {}", e.without_url()))
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            video_base: config.video_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.trim_matches('/').to_string(),
        })
    }

    fn graph_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.api_base, self.api_version, path)
    }

    async fn publish_text(&self, target: &Target, message: &str) -> Result<String> {
        let response = self
            .client
            .post(self.graph_url(&format!("{}/feed", target.id)))
            .query(&[
                ("message", message),
                ("access_token", target.credential.expose()),
            ])
            .send()
            .await
            .map_err(|e| transport_error("text post", e))?;

        let body: IdResponse = read_json(response, "text post").await?;
        body.id
            .ok_or_else(|| missing_field("text post", "id").into())
    }

    async fn publish_photo(
        &self,
        target: &Target,
        caption: &str,
        media: &MediaSource,
    ) -> Result<String> {
        let form = Form::new().part("source", file_part(media).await?);

        let response = self
            .client
            .post(self.graph_url(&format!("{}/photos", target.id)))
            .query(&[
                ("caption", caption),
                ("access_token", target.credential.expose()),
            ])
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("photo upload", e))?;

        let body: IdResponse = read_json(response, "photo upload").await?;
        body.post_id
            .or(body.id)
            .ok_or_else(|| missing_field("photo upload", "post_id").into())
    }

    async fn publish_video(
        &self,
        target: &Target,
        kind: MediaKind,
        description: &str,
        media: &MediaSource,
    ) -> Result<String> {
        let endpoint = if kind == MediaKind::Reel {
            "video_reels"
        } else {
            "videos"
        };
        let action = format!("{} upload", kind);
        let upload_endpoint = self.graph_url(&format!("{}/{}", target.id, endpoint));

        let file_size = tokio::fs::metadata(&media.path)
            .await
            .map_err(MediaError::Io)?
            .len();
        let file_size_param = file_size.to_string();

        // Phase 1: open an upload session
        let response = self
            .client
            .post(&upload_endpoint)
            .query(&[
                ("access_token", target.credential.expose()),
                ("upload_phase", "start"),
                ("file_size", file_size_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(&action, e))?;
        let session: UploadStartResponse = read_json(response, &action).await?;
        debug!(
            "Opened {} session {} for page {} ({} bytes)",
            kind, session.upload_session_id, target.id, file_size
        );

        // Phase 2: transfer the bytes
        let transfer_url = match (&session.upload_url, &session.video_id) {
            (Some(url), _) => url.clone(),
            (None, Some(video_id)) => format!("{}/{}", self.video_base, video_id),
            (None, None) => {
                return Err(missing_field(&action, "upload_url or video_id").into());
            }
        };

        let form = Form::new().part("video_file", file_part(media).await?);
        let response = self
            .client
            .post(&transfer_url)
            .header(
                AUTHORIZATION,
                format!("OAuth {}", target.credential.expose()),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&action, e))?;
        ensure_success(response, &action).await?;

        // Phase 3: close the session and publish
        let response = self
            .client
            .post(&upload_endpoint)
            .query(&[
                ("access_token", target.credential.expose()),
                ("upload_phase", "finish"),
                ("upload_session_id", session.upload_session_id.as_str()),
                ("description", description),
            ])
            .send()
            .await
            .map_err(|e| transport_error(&action, e))?;
        let finish: UploadFinishResponse = read_json(response, &action).await?;

        if finish.success == Some(false) {
            return Err(PlatformError::Posting(format!(
                "{} was not accepted when finishing session {}",
                action, session.upload_session_id
            ))
            .into());
        }

        session
            .video_id
            .or(finish.id)
            .or_else(|| (finish.success == Some(true)).then(|| session.upload_session_id.clone()))
            .ok_or_else(|| missing_field(&action, "video id").into())
    }
}

#[async_trait]
impl Platform for GraphClient {
    fn name(&self) -> &str {
        "facebook"
    }

    async fn publish(&self, request: &PublishRequest<'_>) -> Result<String> {
        let message = request.message.unwrap_or_default();

        match (request.kind, request.media) {
            (ContentKind::Text, _) => {
                if message.trim().is_empty() {
                    return Err(PlatformError::Validation(
                        "Text posts need a non-empty message".to_string(),
                    )
                    .into());
                }
                self.publish_text(request.target, message).await
            }
            (ContentKind::Media(MediaKind::Photo), Some(media)) => {
                self.publish_photo(request.target, message, media).await
            }
            (ContentKind::Media(kind), Some(media)) => {
                self.publish_video(request.target, kind, message, media).await
            }
            (ContentKind::Media(kind), None) => Err(PlatformError::Validation(format!(
                "A {} publish needs a media file",
                kind
            ))
            .into()),
        }
    }

    async fn feed_page(&self, target: &Target, cursor: Option<&str>, limit: u32) -> Result<FeedPage> {
        let limit = limit.to_string();
        let request = match cursor {
            // The paging URL already carries fields, limit and token
            Some(next) => self.client.get(next),
            None => self
                .client
                .get(self.graph_url(&format!("{}/feed", target.id)))
                .query(&[
                    ("fields", "id"),
                    ("limit", limit.as_str()),
                    ("access_token", target.credential.expose()),
                ]),
        };

        let response = request
            .send()
            .await
            .map_err(|e| transport_error("feed listing", e))?;
        let body: FeedResponse = read_json(response, "feed listing").await?;

        Ok(FeedPage {
            items: body.data.into_iter().filter_map(|item| item.id).collect(),
            next: body.paging.and_then(|p| p.next),
        })
    }

    async fn delete_content(&self, content_id: &str, credential: &Credential) -> Result<()> {
        let response = self
            .client
            .delete(self.graph_url(content_id))
            .query(&[("access_token", credential.expose())])
            .send()
            .await
            .map_err(|e| transport_error("delete", e))?;

        let body: SuccessResponse = read_json(response, "delete").await?;
        if body.success == Some(false) {
            return Err(PlatformError::Posting(format!(
                "Deletion of {} was not accepted",
                content_id
            ))
            .into());
        }
        Ok(())
    }
}

/// Streaming multipart part for a file on disk
async fn file_part(media: &MediaSource) -> Result<Part> {
    let file = tokio::fs::File::open(&media.path)
        .await
        .map_err(MediaError::Io)?;
    let len = file.metadata().await.map_err(MediaError::Io)?.len();

    Part::stream_with_length(Body::from(file), len)
        .file_name(media.file_name.clone())
        .mime_str(&media.content_type)
        .map_err(|e| {
            PlatformError::Validation(format!(
                "Invalid content type '{}' for {}: {}",
                media.content_type,
                media.file_name,
                e.without_url()
            ))
            .into()
        })
}

/// Fail on a non-2xx response, otherwise decode the JSON body
async fn read_json<T: DeserializeOwned>(response: Response, action: &str) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(action, e))?;

    if !status.is_success() {
        return Err(map_graph_error(status, &body, action).into());
    }

    serde_json::from_str(&body).map_err(|e| {
        PlatformError::Posting(format!("{}: malformed response: {}", action, e)).into()
    })
}

async fn ensure_success(response: Response, action: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(map_graph_error(status, &body, action).into())
}

/// Classify a failed Graph response
pub fn map_graph_error(status: StatusCode, body: &str, action: &str) -> PlatformError {
    let parsed = serde_json::from_str::<GraphErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);

    let code = parsed.as_ref().and_then(|e| e.code);
    let detail = match &parsed {
        Some(GraphErrorBody {
            message: Some(message),
            kind,
            ..
        }) => match (kind, code) {
            (Some(kind), Some(code)) => format!("{} ({}, code {})", message, kind, code),
            (None, Some(code)) => format!("{} (code {})", message, code),
            _ => message.clone(),
        },
        _ => format!("HTTP {}", status),
    };
    let message = format!("{} failed: {}", action, detail);

    let has_code = |codes: &[i64]| code.map(|c| codes.contains(&c)).unwrap_or(false);

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || has_code(AUTH_ERROR_CODES)
    {
        PlatformError::Authentication(message)
    } else if status == StatusCode::TOO_MANY_REQUESTS || has_code(RATE_LIMIT_ERROR_CODES) {
        PlatformError::RateLimit(message)
    } else if status.is_server_error() {
        PlatformError::Network(message)
    } else {
        PlatformError::Posting(message)
    }
}

fn transport_error(action: &str, error: reqwest::Error) -> PlatformError {
    let error = error.without_url();
    if error.is_timeout() {
        warn!("{} timed out", action);
        PlatformError::Network(format!("{} timed out: {}", action, error))
    } else {
        PlatformError::Network(format!("{} failed: {}", action, error))
    }
}

fn missing_field(action: &str, field: &str) -> PlatformError {
    PlatformError::Posting(format!("{}: response has no {}", action, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_auth_errors() {
        let body = r#"{"error":{"message":"Error validating access token","type":"OAuthException","code":190}}"#;
        let err = map_graph_error(StatusCode::BAD_REQUEST, body, "text post");
        assert!(matches!(err, PlatformError::Authentication(_)));
        assert!(err.to_string().contains("Error validating access token"));

        let err = map_graph_error(StatusCode::FORBIDDEN, "", "delete");
        assert!(matches!(err, PlatformError::Authentication(_)));
    }

    #[test]
    fn test_map_rate_limit_errors() {
        for code in RATE_LIMIT_ERROR_CODES {
            let body = format!(r#"{{"error":{{"message":"slow down","code":{}}}}}"#, code);
            let err = map_graph_error(StatusCode::BAD_REQUEST, &body, "photo upload");
            assert!(matches!(err, PlatformError::RateLimit(_)), "code {}", code);
        }

        let err = map_graph_error(StatusCode::TOO_MANY_REQUESTS, "", "feed listing");
        assert!(matches!(err, PlatformError::RateLimit(_)));
    }

    #[test]
    fn test_map_server_and_client_errors() {
        let err = map_graph_error(StatusCode::BAD_GATEWAY, "<html>", "video upload");
        assert!(matches!(err, PlatformError::Network(_)));
        assert!(err.to_string().contains("HTTP 502"));

        let body = r#"{"error":{"message":"Invalid parameter","code":100}}"#;
        let err = map_graph_error(StatusCode::BAD_REQUEST, body, "photo upload");
        assert!(matches!(err, PlatformError::Posting(_)));
        assert!(err.to_string().contains("Invalid parameter (code 100)"));
    }

    #[test]
    fn test_graph_url() {
        let config = GraphConfig {
            api_base: "http://localhost:9000/".to_string(),
            api_version: "v20.0".to_string(),
            ..GraphConfig::default()
        };
        let client = GraphClient::new(&config).unwrap();
        assert_eq!(client.graph_url("1001/feed"), "http://localhost:9000/v20.0/1001/feed");
        assert_eq!(client.name(), "facebook");
    }
}
