//! File ingest through the Ci upload service.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::client::Client;
use crate::error::{Error, ErrorKind};

impl Client {
    /// Upload a local file to the ingest service in a single request and
    /// return the receipt Ci answers with.
    pub async fn upload(
        &mut self,
        path: impl AsRef<Path>,
        content_type: &str,
    ) -> Result<Value, Error> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| {
            Error::with_source(
                ErrorKind::Other,
                format!("cannot read upload file {}", path.display()),
                source,
            )
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| "upload".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|source| {
                Error::with_source(
                    ErrorKind::Other,
                    format!("invalid content type {content_type}"),
                    source,
                )
            })?;
        let form = Form::new().part("filename", part);

        self.upload_multipart("/upload", form).await
    }
}
