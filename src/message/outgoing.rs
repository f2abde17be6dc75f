//! Requests and responses built by the local application.

use serde::Serialize;

use super::HttpContent;

/// Request to be sent to the peer.
///
/// # Examples
///
/// ```
/// use streamframe::message::StreamingRequest;
///
/// let mut request = StreamingRequest::create("POST", "/api/messages");
/// request.set_body("hello");
/// assert_eq!(request.streams().len(), 1);
/// ```
#[derive(Debug)]
pub struct StreamingRequest {
    verb: String,
    path: String,
    streams: Vec<HttpContent>,
}

impl StreamingRequest {
    /// Request with no attachments.
    pub fn create(verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            path: path.into(),
            streams: Vec::new(),
        }
    }

    #[must_use]
    pub fn verb(&self) -> &str { &self.verb }

    #[must_use]
    pub fn path(&self) -> &str { &self.path }

    #[must_use]
    pub fn streams(&self) -> &[HttpContent] { &self.streams }

    /// Append a text body as an attachment.
    pub fn set_body(&mut self, body: impl Into<String>) { self.add_stream(HttpContent::text(body)); }

    /// Append a JSON body as an attachment.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when `value` cannot be serialized.
    pub fn set_json_body<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        self.add_stream(HttpContent::json(value)?);
        Ok(())
    }

    pub fn add_stream(&mut self, content: HttpContent) { self.streams.push(content); }

    pub(crate) fn into_parts(self) -> (String, String, Vec<HttpContent>) {
        (self.verb, self.path, self.streams)
    }
}

/// Response produced by a request handler.
#[derive(Debug)]
pub struct StreamingResponse {
    status_code: u16,
    streams: Vec<HttpContent>,
}

impl StreamingResponse {
    /// Response with `status_code` and an optional text body.
    pub fn create(status_code: u16, body: Option<String>) -> Self {
        let mut response = Self {
            status_code,
            streams: Vec::new(),
        };
        if let Some(body) = body {
            response.set_body(body);
        }
        response
    }

    /// `200 OK` without a body.
    #[must_use]
    pub fn ok() -> Self { Self::create(200, None) }

    /// `404 Not Found` without a body.
    #[must_use]
    pub fn not_found() -> Self { Self::create(404, None) }

    /// `500 Internal Server Error` without a body.
    #[must_use]
    pub fn internal_server_error() -> Self { Self::create(500, None) }

    #[must_use]
    pub fn status_code(&self) -> u16 { self.status_code }

    #[must_use]
    pub fn streams(&self) -> &[HttpContent] { &self.streams }

    pub fn set_body(&mut self, body: impl Into<String>) { self.add_stream(HttpContent::text(body)); }

    /// Append a JSON body as an attachment.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when `value` cannot be serialized.
    pub fn set_json_body<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        self.add_stream(HttpContent::json(value)?);
        Ok(())
    }

    pub fn add_stream(&mut self, content: HttpContent) { self.streams.push(content); }

    pub(crate) fn into_parts(self) -> (u16, Vec<HttpContent>) { (self.status_code, self.streams) }
}
