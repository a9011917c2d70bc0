//! Request parsing shared by the upload endpoints.

use crate::errors::{Error, Result};
use axum::extract::Multipart;
use bytes::Bytes;

/// One uploaded video plus its persistence flag, owned by a single in-flight
/// request.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
    pub save_to_bucket: bool,
}

/// Read the backend's upload shape out of a multipart request: a `file` part
/// and an optional `save_to_bucket` flag. Validation happens here, before
/// any network call; a missing file is a local 400.
pub async fn read_upload(multipart: &mut Multipart) -> Result<UploadPayload> {
    let mut file: Option<(Bytes, String, String)> = None;
    let mut save_to_bucket = false;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        Error::bad_request(format!("Failed to parse multipart data: {err}"))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .unwrap_or("upload.mp4")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    Error::bad_request(format!("Failed to read file upload: {err}"))
                })?;

                tracing::debug!(
                    filename = %filename,
                    content_type = %content_type,
                    size = bytes.len(),
                    "received upload"
                );
                file = Some((bytes, filename, content_type));
            }
            "save_to_bucket" => {
                let value = field.text().await.map_err(|err| {
                    Error::bad_request(format!("Failed to read save_to_bucket: {err}"))
                })?;
                save_to_bucket = matches!(value.trim(), "true" | "1" | "yes");
            }
            _ => {
                // Ignore unknown fields (forward compatibility)
            }
        }
    }

    let (bytes, filename, content_type) =
        file.ok_or_else(|| Error::bad_request("Missing required field: 'file'"))?;

    Ok(UploadPayload {
        bytes,
        filename,
        content_type,
        save_to_bucket,
    })
}
