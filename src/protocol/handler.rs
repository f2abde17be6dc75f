//! Application callback for inbound requests.

use std::future::Future;

use async_trait::async_trait;

use crate::message::{ReceiveRequest, StreamingResponse};

/// Handles requests sent by the peer.
///
/// Returning `None` sends no response; the peer's pending request stays
/// unanswered until it cancels or disconnects.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn process_request(&self, request: ReceiveRequest) -> Option<StreamingResponse>;
}

/// [`RequestHandler`] backed by an async closure.
pub struct FnHandler<F>(F);

/// Wrap an async closure as a [`RequestHandler`].
///
/// # Examples
///
/// ```
/// use streamframe::{message::StreamingResponse, protocol::handler_fn};
///
/// let handler = handler_fn(|request| async move {
///     let status = if request.path == "/health" { 200 } else { 404 };
///     Some(StreamingResponse::create(status, None))
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(ReceiveRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<StreamingResponse>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(ReceiveRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<StreamingResponse>> + Send + 'static,
{
    async fn process_request(&self, request: ReceiveRequest) -> Option<StreamingResponse> {
        (self.0)(request).await
    }
}
