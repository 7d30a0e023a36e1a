//! Asset endpoints: records, downloads, and temporary stream URLs.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Client;
use crate::error::{Error, ErrorKind};

/// Stream flavors Ci can publish for an asset.
pub const STREAM_KINDS: &[&str] = &["hls", "video-3g", "video-sd"];

#[derive(Debug, Serialize)]
struct StreamRequest {
    streams: Vec<StreamSpec>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamSpec {
    name: String,
    expiration_date: String,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    complete: Vec<CompletedStream>,
}

#[derive(Debug, Deserialize)]
struct CompletedStream {
    #[serde(default)]
    streams: Vec<StreamInfo>,
}

#[derive(Debug, Deserialize)]
struct StreamInfo {
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

impl Client {
    /// Fetch an asset record.
    pub async fn asset(&mut self, asset_id: &str) -> Result<Value, Error> {
        self.get(&format!("/assets/{asset_id}"), &()).await
    }

    /// Fetch the download description for an asset.
    pub async fn asset_download(&mut self, asset_id: &str) -> Result<Value, Error> {
        self.get(&format!("/assets/{asset_id}/download"), &()).await
    }

    /// Publish a temporary stream for an asset and return its URL.
    ///
    /// `kind` must be one of [`STREAM_KINDS`]. The stream is named after
    /// the asset and expires a day after creation. Returns `Ok(None)`
    /// when Ci accepted the request but reported no completed stream of
    /// that kind.
    pub async fn asset_stream_url(
        &mut self,
        asset_id: &str,
        kind: &str,
    ) -> Result<Option<String>, Error> {
        if !STREAM_KINDS.contains(&kind) {
            return Err(Error::new(
                ErrorKind::Other,
                format!(
                    "invalid stream kind '{kind}', expected one of hls, video-3g, or video-sd"
                ),
            ));
        }

        let request = StreamRequest {
            streams: vec![StreamSpec {
                name: format!("{asset_id}-stream"),
                expiration_date: (Utc::now() + Duration::days(1)).to_rfc3339(),
            }],
        };

        let body = self
            .post(&format!("/assets/{asset_id}/streams"), &request)
            .await?;
        let response: StreamResponse = serde_json::from_value(body).map_err(|source| {
            Error::with_source(
                ErrorKind::Other,
                "unexpected shape for the stream response",
                source,
            )
        })?;

        let url = response.complete.into_iter().next().and_then(|entry| {
            entry
                .streams
                .into_iter()
                .find(|stream| stream.kind == kind)
                .map(|stream| stream.url)
        });
        Ok(url)
    }
}
