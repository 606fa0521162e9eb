//! Media upload endpoint.

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
};
use fun_common::{AppError, AppResult};
use fun_core::{MAX_UPLOAD_BYTES, MediaReference, UploadRequest};
use serde::Serialize;

use crate::{extractors::AuthSession, middleware::AppState, response::ApiResponse};

/// Most files accepted in one request.
const MAX_FILES_PER_REQUEST: usize = 10;

/// Outcome for one uploaded file.
#[derive(Serialize)]
pub struct UploadResult {
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Upload every `file` field of a multipart body.
///
/// Files succeed or fail independently; the response lists each outcome in
/// request order.
async fn upload(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<Vec<UploadResult>>> {
    let user_id = session.require_user()?.to_string();
    let mut requests = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if requests.len() == MAX_FILES_PER_REQUEST {
            return Err(AppError::BadRequest(format!(
                "At most {MAX_FILES_PER_REQUEST} files per request"
            )));
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        requests.push(UploadRequest {
            file_name,
            content_type,
            data,
        });
    }

    if requests.is_empty() {
        return Err(AppError::BadRequest("No file field in request".to_string()));
    }

    let names: Vec<String> = requests.iter().map(|r| r.file_name.clone()).collect();
    let results = state.uploader.upload_all(&user_id, requests).await;

    Ok(ApiResponse::ok(
        names
            .into_iter()
            .zip(results)
            .map(|(file_name, result)| match result {
                Ok(media) => UploadResult {
                    file_name,
                    media: Some(media),
                    error: None,
                },
                Err(e) => UploadResult {
                    file_name,
                    media: None,
                    error: Some(e.user_message()),
                },
            })
            .collect(),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES * MAX_FILES_PER_REQUEST))
}
