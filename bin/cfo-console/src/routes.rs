// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::state::AppState;
use axum::{
    extract::{Multipart, Path as UrlPath, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

const SESSION_COOKIE: &str = "sid";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/chat", post(chat))
        .route("/static/{*path}", get(static_file))
        .with_state(state)
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn session_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE {
            Uuid::parse_str(value).ok()
        } else {
            None
        }
    })
}

fn sanitize_filename(name: &str) -> String {
    std::path::Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Invalid upload: {err}"))
            }
        };
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(sanitize_filename).unwrap_or_default();
        if file_name.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "No selected file".to_string());
        }
        if !file_name.to_lowercase().ends_with(".csv") {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Only CSV uploads are supported.".to_string(),
            );
        }
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(err) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Invalid upload: {err}"))
            }
        };
        let path = state.config.upload_dir.join(&file_name);
        if let Err(err) = tokio::fs::write(&path, &data).await {
            error!(path = %path.display(), error = %err, "failed to store upload");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store upload.".to_string(),
            );
        }

        let session = session_from_headers(&headers).unwrap_or_else(Uuid::new_v4);
        state.sessions.bind(session, path).await;

        let mut response =
            Json(serde_json::json!({ "uploaded": true, "filename": file_name })).into_response();
        let cookie = format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly");
        if let Ok(value) = header::HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        return response;
    }
    error_response(StatusCode::BAD_REQUEST, "No file part".to_string())
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    prompt: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secondary_image_url: Option<String>,
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let prompt = request.prompt.unwrap_or_default().trim().to_string();
    if prompt.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No prompt provided.".to_string());
    }
    let dataset = match session_from_headers(&headers) {
        Some(session) => state.sessions.get_dataset_path(session).await,
        None => None,
    };
    let Some(dataset) = dataset.filter(|path| path.exists()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "CSV file not found. Please upload a file first.".to_string(),
        );
    };

    // Unexpected failures stop here as a generic error payload; the process
    // itself never dies on a request.
    match state.dispatcher.handle(&prompt, &dataset).await {
        Ok(payload) => {
            let mut urls = payload.image_urls.into_iter();
            Json(ChatResponse {
                response: payload.text,
                image_url: urls.next(),
                secondary_image_url: urls.next(),
            })
            .into_response()
        }
        Err(err) => {
            error!(error = %err, "chat request failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An error occurred: {err}"),
            )
        }
    }
}

async fn static_file(State(state): State<AppState>, UrlPath(path): UrlPath<String>) -> Response {
    if path.contains("..") {
        return error_response(StatusCode::NOT_FOUND, "Not found".to_string());
    }
    let full_path = state.config.static_dir.join(&path);
    match tokio::fs::read(&full_path).await {
        Ok(bytes) => {
            let content_type = match full_path.extension().and_then(|e| e.to_str()) {
                Some("json") => "application/json",
                Some("png") => "image/png",
                _ => "application/octet-stream",
            };
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(_) => error_response(StatusCode::NOT_FOUND, "Not found".to_string()),
    }
}
