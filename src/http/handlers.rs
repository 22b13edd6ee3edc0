use crate::error::{ErrorKind, Result as ServiceResult};
use crate::http::error::{ApiError, URL_REQUIRED};
use crate::http::AppState;
use crate::qr;
use axum::Json;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use exn::ResultExt;
use pressroom_transform::UploadedFile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressResponse {
    pub download_url: String,
    pub file_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct QrRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    pub qr_code: String,
}

/// `POST /compress-pdf`
pub async fn compress_pdf(State(state): State<AppState>, multipart: Multipart) -> Result<Json<CompressResponse>, ApiError> {
    let files = intake(&state, multipart).await?;
    if files.is_empty() {
        return Err(exn::Exn::from(ErrorKind::NoFiles).into());
    }
    // Runs to completion even if the client disconnects; an unclaimed
    // artifact expires.
    let pipeline = state.pipeline.clone();
    let processed = tokio::spawn(async move { pipeline.process(files).await })
        .await
        .or_raise(|| ErrorKind::Batch)??;
    Ok(Json(CompressResponse {
        download_url: format!("/download/{}", processed.id),
        file_count: processed.file_count,
    }))
}

/// Store every file part of the upload field. Nothing stays behind if this
/// fails or is cancelled.
async fn intake(state: &AppState, mut multipart: Multipart) -> ServiceResult<Vec<UploadedFile>> {
    let mut uploads = state.pipeline.uploads();
    while let Some(field) = multipart.next_field().await.map_err(|e| ErrorKind::Intake(e.body_text()))? {
        if field.name() != Some(state.upload_field.as_str()) {
            tracing::debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }
        let Some(name) = field.file_name().map(str::to_string) else {
            tracing::debug!("Ignoring upload field part without a file name");
            continue;
        };
        let data = field.bytes().await.map_err(|e| ErrorKind::Intake(e.body_text()))?;
        uploads.store(&name, &data).await?;
    }
    Ok(uploads.into_files())
}

/// `GET /download/:id`
pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let download = state.pipeline.download(&id).await?;
    let headers = download_headers(&download.filename, download.content_type, download.size);
    Ok((headers, Body::from_stream(download.body)))
}

/// `HEAD /download/:id`, answered without claiming the artifact.
pub async fn download_head(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let preview = state.pipeline.preview(&id)?;
    Ok(download_headers(&preview.filename, preview.content_type, preview.size))
}

fn download_headers(filename: &str, content_type: &str, size: u64) -> [(header::HeaderName, String); 3] {
    [
        (header::CONTENT_TYPE, content_type.to_string()),
        (header::CONTENT_DISPOSITION, content_disposition(filename)),
        (header::CONTENT_LENGTH, size.to_string()),
    ]
}

/// `POST /generate-qr`
pub async fn generate_qr(payload: Result<Json<QrRequest>, JsonRejection>) -> Result<Json<QrResponse>, ApiError> {
    let url = payload.ok().and_then(|Json(request)| request.url).filter(|url| !url.is_empty());
    let Some(url) = url else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, URL_REQUIRED));
    };
    Ok(Json(QrResponse { qr_code: qr::encode(&url)? }))
}

/// `attachment` disposition with an ASCII fallback name and, when needed,
/// the exact name percent-encoded as `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    if fallback == filename {
        return format!("attachment; filename=\"{filename}\"");
    }
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' | b'~' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect();
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("compressed_pdfs.zip", "attachment; filename=\"compressed_pdfs.zip\"")]
    #[case("compressed_my report.pdf", "attachment; filename=\"compressed_my report.pdf\"")]
    #[case(
        "compressed_\"q\".pdf",
        "attachment; filename=\"compressed__q_.pdf\"; filename*=UTF-8''compressed_%22q%22.pdf"
    )]
    #[case("résumé.pdf", "attachment; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf")]
    fn test_content_disposition(#[case] filename: &str, #[case] expected: &str) {
        assert_eq!(content_disposition(filename), expected);
    }
}
