//! Prediction endpoint
//!
//! `POST /predict` takes a multipart form with 1 to 5 `images` parts plus
//! optional `cropHint` and `mode` text fields. The whole batch is validated
//! before any inference runs; one bad part rejects the request.

use axum::{
    body::Bytes,
    extract::{multipart::Field, Multipart, State},
    Json,
};
use leafscan::{PredictionResult, MAX_IMAGES_PER_REQUEST};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::SharedState;

/// One `images` part, read fully into memory
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Parsed multipart form
#[derive(Debug, Default)]
pub struct PredictForm {
    pub uploads: Vec<Upload>,
    pub crop_hint: Option<String>,
    pub mode: Option<String>,
}

/// POST /predict
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<Vec<PredictionResult>>, ApiError> {
    let form = read_form(multipart).await?;
    validate_uploads(&form.uploads)?;

    info!(
        "Predicting {} image(s) (cropHint={}, mode={})",
        form.uploads.len(),
        form.crop_hint.as_deref().unwrap_or("auto"),
        form.mode.as_deref().unwrap_or("-")
    );

    let PredictForm { uploads, crop_hint, .. } = form;
    let results = tokio::task::spawn_blocking(move || {
        let files = uploads
            .iter()
            .map(|upload| (upload.file_name.as_str(), upload.bytes.as_ref()));
        state.service.predict_many(files, crop_hint.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Inference task failed: {}", e)))??;

    Ok(Json(results))
}

async fn read_form(mut multipart: Multipart) -> Result<PredictForm, ApiError> {
    let mut form = PredictForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("image_{}", form.uploads.len() + 1));
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(malformed)?;
                form.uploads.push(Upload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "cropHint" => form.crop_hint = Some(read_text(field).await?),
            "mode" => form.mode = Some(read_text(field).await?),
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    Ok(form)
}

async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(malformed)
}

fn malformed(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Malformed multipart body: {}", err))
}

/// Reject the batch unless every part is a non-empty image
pub fn validate_uploads(uploads: &[Upload]) -> Result<(), ApiError> {
    if uploads.is_empty() {
        return Err(ApiError::BadRequest("At least one image is required.".to_string()));
    }
    if uploads.len() > MAX_IMAGES_PER_REQUEST {
        return Err(ApiError::BadRequest(format!(
            "A maximum of {} images is allowed per request.",
            MAX_IMAGES_PER_REQUEST
        )));
    }

    for upload in uploads {
        let is_image = upload
            .content_type
            .as_deref()
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(ApiError::BadRequest(format!(
                "File must be an image: {}",
                upload.file_name
            )));
        }
        if upload.bytes.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Uploaded file is empty: {}",
                upload.file_name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, content_type: Option<&str>, bytes: &'static [u8]) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: content_type.map(str::to_string),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[test]
    fn test_validate_counts() {
        assert!(validate_uploads(&[]).is_err());

        let five: Vec<Upload> = (0..5).map(|_| upload("a.jpg", Some("image/jpeg"), b"x")).collect();
        assert!(validate_uploads(&five).is_ok());

        let six: Vec<Upload> = (0..6).map(|_| upload("a.jpg", Some("image/jpeg"), b"x")).collect();
        assert!(matches!(validate_uploads(&six), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_validate_content_type_and_size() {
        let text = [upload("notes.txt", Some("text/plain"), b"hello")];
        assert!(validate_uploads(&text).is_err());

        let missing = [upload("leaf", None, b"x")];
        assert!(validate_uploads(&missing).is_err());

        let empty = [upload("empty.jpg", Some("image/jpeg"), b"")];
        assert!(validate_uploads(&empty).is_err());

        let upper = [upload("leaf.PNG", Some("IMAGE/PNG"), b"x")];
        assert!(validate_uploads(&upper).is_ok());
    }
}
