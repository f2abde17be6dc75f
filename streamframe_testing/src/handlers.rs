//! Canned [`RequestHandler`]s.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use streamframe::{
    message::{ReceiveRequest, StreamingResponse},
    protocol::{RequestHandler, handler_fn},
};

/// Answers every request with `status` and no body.
pub fn status_handler(status: u16) -> Arc<dyn RequestHandler> {
    Arc::new(handler_fn(move |_| async move { Some(StreamingResponse::create(status, None)) }))
}

/// Answers with 200 and the request body as a text attachment.
pub fn echo_handler() -> Arc<dyn RequestHandler> {
    Arc::new(handler_fn(|request: ReceiveRequest| async move {
        let body = request.read_body_as_string().await.ok()?;
        Some(StreamingResponse::create(200, (!body.is_empty()).then_some(body)))
    }))
}

/// Records the verb, path and full body of each request and answers 200.
#[derive(Clone, Default)]
pub struct RecordingRequestHandler {
    seen: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
}

impl RecordingRequestHandler {
    pub fn new() -> Self { Self::default() }

    /// Requests handled so far as `(verb, path, body)`.
    pub fn seen(&self) -> Vec<(String, String, Vec<u8>)> {
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RequestHandler for RecordingRequestHandler {
    async fn process_request(&self, request: ReceiveRequest) -> Option<StreamingResponse> {
        let body = match request.streams.first() {
            Some(stream) => stream.read_to_end().await.to_vec(),
            None => Vec::new(),
        };
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((request.verb, request.path, body));
        Some(StreamingResponse::ok())
    }
}
