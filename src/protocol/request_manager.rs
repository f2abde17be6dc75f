//! Correlates outbound requests with inbound responses.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{RequestError, RequestManagerError};
use crate::message::ReceiveResponse;

type Waiter = oneshot::Sender<Result<ReceiveResponse, RequestError>>;
type PendingTable = DashMap<Uuid, Waiter>;

/// Table of requests awaiting a response, keyed by correlation id.
///
/// Clones share the same table.
#[derive(Clone, Default)]
pub struct RequestManager {
    pending: Arc<PendingTable>,
}

impl RequestManager {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register interest in the response to request `id`.
    ///
    /// Dropping the returned [`PendingResponse`] removes the entry.
    ///
    /// # Errors
    ///
    /// Returns [`RequestManagerError::DuplicateRequest`] if `id` is already
    /// pending.
    pub fn get_response(&self, id: Uuid) -> Result<PendingResponse, RequestManagerError> {
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(id) {
            Entry::Occupied(_) => return Err(RequestManagerError::DuplicateRequest(id)),
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }
        Ok(PendingResponse {
            id,
            rx,
            table: Arc::downgrade(&self.pending),
        })
    }

    /// Complete the pending request `id`. Returns `false` when nothing was
    /// waiting for it.
    pub fn signal_response(&self, id: Uuid, response: ReceiveResponse) -> bool {
        self.pending
            .remove(&id)
            .is_some_and(|(_, waiter)| waiter.send(Ok(response)).is_ok())
    }

    /// Fail every pending request with `error`. Returns how many were
    /// waiting.
    pub fn reject_all(&self, error: &RequestError) -> usize {
        let ids: Vec<Uuid> = self.pending.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter_map(|id| self.pending.remove(&id))
            .map(|(_, waiter)| waiter.send(Err(error.clone())))
            .count()
    }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize { self.pending.len() }
}

impl std::fmt::Debug for RequestManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestManager")
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Future resolving to the response for one request.
#[derive(Debug)]
pub struct PendingResponse {
    id: Uuid,
    rx: oneshot::Receiver<Result<ReceiveResponse, RequestError>>,
    table: Weak<PendingTable>,
}

impl PendingResponse {
    #[must_use]
    pub fn id(&self) -> Uuid { self.id }
}

impl Future for PendingResponse {
    type Output = Result<ReceiveResponse, RequestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(RequestError::Abandoned)))
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(table) = self.table.upgrade() {
            table.remove_if(&self.id, |_, waiter| waiter.is_closed());
        }
    }
}
