//! Multipart file upload.
//!
//! Uploads share token handling, endpoint templating, error decoding and
//! stats with [`Client::call`](crate::Client::call), but send a
//! `multipart/form-data` body and are never retried.

use crate::client::{decode_success, log_deprecation_notices, read_response};
use crate::{Client, Error, Result};
use http::header::CONTENT_TYPE;
use http::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Instant;

/// Action every upload is sent to.
pub const UPLOAD_ACTION: &str = "upload_file";

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

impl Client {
    /// Uploads `file` under `filename` and returns the URL it is served from.
    ///
    /// The URL is valid for a limited time, after which the file must be
    /// referenced by an event to be kept.
    ///
    /// ```no_run
    /// # async fn example(client: livechat_webapi::Client) -> Result<(), livechat_webapi::Error> {
    /// let url = client.upload_file("report.pdf", std::fs::read("report.pdf").unwrap_or_default()).await?;
    /// println!("uploaded to {}", url);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn upload_file(&self, filename: &str, file: impl Into<Vec<u8>>) -> Result<String> {
        let start_time = Instant::now();
        let result = self.send_upload(filename, file.into(), start_time).await;
        self.report(UPLOAD_ACTION, start_time, result.is_ok());
        result
    }

    async fn send_upload(&self, filename: &str, file: Vec<u8>, start_time: Instant) -> Result<String> {
        let token = self.token()?;
        let url = self.endpoint_url(&token, UPLOAD_ACTION)?;
        let mut headers = self.request_headers(&token, None)?;
        // The multipart boundary header is set by the form.
        headers.remove(CONTENT_TYPE);

        let size = file.len();
        let part = file_part(filename, file, "application/octet-stream")?;
        let form = Form::new().part("file", part);

        tracing::debug!(
            action = UPLOAD_ACTION,
            url = %url,
            filename = %filename,
            size = size,
            "Uploading file"
        );

        let mut request = self
            .http_client()
            .post(url)
            .headers(headers)
            .multipart(form);
        if let Some(timeout) = self.request_timeout() {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let (status, response_headers, raw_body) = read_response(response).await?;

        if status != StatusCode::OK {
            let error = Error::from_error_response(status, raw_body);
            tracing::warn!(error = %error, action = UPLOAD_ACTION, "File upload failed");
            return Err(error);
        }

        log_deprecation_notices(UPLOAD_ACTION, &response_headers);
        let response = decode_success::<UploadResponse>(
            UPLOAD_ACTION,
            raw_body,
            status,
            response_headers,
            start_time.elapsed(),
            1,
        )?;
        Ok(response.data.url)
    }
}

fn file_part(filename: &str, file: Vec<u8>, mime: &str) -> Result<Part> {
    Part::bytes(file)
        .file_name(filename.to_string())
        .mime_str(mime)
        .map_err(|e| Error::Configuration(format!("Invalid upload part: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_part_accepts_octet_stream() {
        assert!(file_part("a.txt", b"hi".to_vec(), "application/octet-stream").is_ok());
    }

    #[test]
    fn test_invalid_part_is_configuration_error() {
        let err = file_part("a.txt", Vec::new(), "not a mime type").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.is_configuration());
    }
}
