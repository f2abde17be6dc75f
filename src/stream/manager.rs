//! Id-keyed table of inbound streams still being received.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use log::debug;
use uuid::Uuid;

use super::ContentStream;
use crate::{
    assembler::{AssemblerInit, PayloadAssembler},
    header::Header,
    message::StreamDescription,
};

/// Callback invoked with the id of every stream closed before completion.
pub type CancelHook = Arc<dyn Fn(Uuid) + Send + Sync>;

/// How many closed stream ids are remembered so late frames can be dropped.
const CLOSED_HISTORY: usize = 256;

#[derive(Default)]
struct StreamEntry {
    assembler: Option<PayloadAssembler>,
    claimed: bool,
}

#[derive(Default)]
struct StreamTable {
    entries: HashMap<Uuid, StreamEntry>,
    closed: VecDeque<Uuid>,
}

impl StreamTable {
    fn remember_closed(&mut self, id: Uuid) {
        if self.closed.len() == CLOSED_HISTORY {
            self.closed.pop_front();
        }
        self.closed.push_back(id);
    }
}

pub(crate) struct ManagerShared {
    table: Mutex<StreamTable>,
    on_cancel: CancelHook,
}

impl std::fmt::Debug for ManagerShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerShared").finish_non_exhaustive()
    }
}

/// Tracks stream-type payload assemblers by stream id.
///
/// Frames and envelope descriptors may reference a stream in either order:
/// whichever arrives first creates the assembler and the other finds it.
/// An entry is dropped once its stream has ended and an envelope has claimed
/// it, or when it is closed.
#[derive(Clone)]
pub struct StreamManager {
    shared: Arc<ManagerShared>,
}

impl StreamManager {
    /// Create a manager that reports incomplete closes through `on_cancel`.
    pub fn new<F>(on_cancel: F) -> Self
    where
        F: Fn(Uuid) + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(ManagerShared {
                table: Mutex::new(StreamTable::default()),
                on_cancel: Arc::new(on_cancel),
            }),
        }
    }

    pub(super) fn from_shared(shared: Arc<ManagerShared>) -> Self { Self { shared } }

    fn lock(&self) -> MutexGuard<'_, StreamTable> {
        self.shared
            .table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn new_assembler(&self, init: AssemblerInit) -> PayloadAssembler {
        let stream = ContentStream::with_manager(init.id(), Some(Arc::downgrade(&self.shared)));
        PayloadAssembler::new(init, stream)
    }

    /// Find or create the assembler for `init` and return its stream.
    #[must_use]
    pub fn get_payload_assembler(&self, init: AssemblerInit) -> ContentStream {
        let mut table = self.lock();
        let entry = table.entries.entry(init.id()).or_default();
        entry
            .assembler
            .get_or_insert_with(|| self.new_assembler(init))
            .stream()
            .clone()
    }

    /// Stream that frames carrying `header` should be appended to.
    ///
    /// Returns `None` for streams closed recently, whose late frames are
    /// read and discarded.
    #[must_use]
    pub fn get_payload_stream(&self, header: &Header) -> Option<ContentStream> {
        if self.lock().closed.contains(&header.id()) {
            return None;
        }
        Some(self.get_payload_assembler(AssemblerInit::ByHeader(*header)))
    }

    /// Bind an envelope descriptor to its stream, creating the stream if no
    /// frame has arrived yet.
    #[must_use]
    pub fn claim_stream(&self, description: &StreamDescription) -> ContentStream {
        let mut table = self.lock();
        let entry = table.entries.entry(description.id).or_default();
        let assembler = entry
            .assembler
            .get_or_insert_with(|| self.new_assembler(AssemblerInit::ById(description.id)));
        assembler.declare_length(description.length);
        let stream = assembler.stream().clone();
        stream.describe(description.content_type.clone(), description.length);
        entry.claimed = true;
        if assembler.is_ended() {
            table.entries.remove(&description.id);
            table.remember_closed(description.id);
        }
        stream
    }

    /// Record receipt of a stream frame. `received` is the number of bytes of
    /// this frame read so far. Frames for unknown ids are ignored.
    pub fn on_receive(&self, header: &Header, received: usize) {
        let mut table = self.lock();
        let Some(entry) = table.entries.get_mut(&header.id()) else {
            debug!("frame for unknown stream ignored: id={}", header.id());
            return;
        };
        let Some(assembler) = entry.assembler.as_mut() else {
            return;
        };
        if assembler.on_receive(header, received) && entry.claimed {
            table.entries.remove(&header.id());
            table.remember_closed(header.id());
        }
    }

    /// Close the stream with `id`.
    ///
    /// If the stream was still missing its end frame, or received fewer bytes
    /// than it declared, the cancel hook fires and the stream is aborted.
    /// Closing an unknown or already closed id does nothing.
    pub fn close_stream(&self, id: Uuid) {
        let removed = {
            let mut table = self.lock();
            let removed = table.entries.remove(&id);
            if removed.is_some() {
                table.remember_closed(id);
            }
            removed
        };
        let Some(assembler) = removed.and_then(|entry| entry.assembler) else {
            return;
        };
        if assembler.is_incomplete() {
            assembler.stream().abort();
            crate::metrics::inc_cancelled_streams();
            (self.shared.on_cancel)(id);
        }
    }

    /// Abort every tracked stream without notifying the peer. Returns how
    /// many streams were dropped.
    pub fn abort_all(&self) -> usize {
        let drained: Vec<_> = self.lock().entries.drain().collect();
        let count = drained.len();
        for (_, entry) in drained {
            if let Some(assembler) = entry.assembler {
                assembler.stream().abort();
            }
        }
        count
    }

    /// Number of streams still tracked.
    #[must_use]
    pub fn len(&self) -> usize { self.lock().entries.len() }

    /// Whether no streams are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.lock().entries.is_empty() }
}

impl std::fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("streams", &self.len())
            .finish()
    }
}
