//! Messages assembled from inbound frames.

use serde::de::DeserializeOwned;

use crate::stream::ContentStream;

/// Inbound request handed to a [`RequestHandler`](crate::protocol::RequestHandler).
#[derive(Clone, Debug)]
pub struct ReceiveRequest {
    pub verb: String,
    pub path: String,
    pub streams: Vec<ContentStream>,
}

impl ReceiveRequest {
    /// Read the first attachment as UTF-8. A request without attachments
    /// has an empty body.
    ///
    /// # Errors
    ///
    /// Returns the UTF-8 error when the body is not valid text.
    pub async fn read_body_as_string(&self) -> Result<String, std::string::FromUtf8Error> {
        match self.streams.first() {
            Some(stream) => stream.read_as_string().await,
            None => Ok(String::new()),
        }
    }

    /// Decode the first attachment as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when decoding fails or the request has
    /// no attachment.
    pub async fn read_body_as_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        read_first_as_json(&self.streams).await
    }
}

/// Inbound response matched to a pending outbound request.
#[derive(Clone, Debug)]
pub struct ReceiveResponse {
    pub status_code: u16,
    pub streams: Vec<ContentStream>,
}

impl ReceiveResponse {
    /// Read the first attachment as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns the UTF-8 error when the body is not valid text.
    pub async fn read_body_as_string(&self) -> Result<String, std::string::FromUtf8Error> {
        match self.streams.first() {
            Some(stream) => stream.read_as_string().await,
            None => Ok(String::new()),
        }
    }

    /// Decode the first attachment as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when decoding fails or the response has
    /// no attachment.
    pub async fn read_body_as_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        read_first_as_json(&self.streams).await
    }
}

async fn read_first_as_json<T: DeserializeOwned>(streams: &[ContentStream]) -> Result<T, serde_json::Error> {
    match streams.first() {
        Some(stream) => stream.read_as_json().await,
        // Empty input yields serde_json's EOF error.
        None => serde_json::from_slice(&[]),
    }
}
