use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rstest::{fixture, rstest};
use uuid::Uuid;

use super::*;
use crate::{
    header::{Header, PayloadType},
    message::StreamDescription,
};

#[derive(Clone, Default)]
struct CancelLog(Arc<Mutex<Vec<Uuid>>>);

impl CancelLog {
    fn ids(&self) -> Vec<Uuid> { self.0.lock().expect("cancel log").clone() }
}

#[fixture]
fn cancels() -> CancelLog { CancelLog::default() }

fn manager(cancels: &CancelLog) -> StreamManager {
    let log = cancels.clone();
    StreamManager::new(move |id| log.0.lock().expect("cancel log").push(id))
}

fn stream_header(id: Uuid, length: usize, end: bool) -> Header {
    Header::new(PayloadType::Stream, length, id, end).expect("valid header")
}

fn description(id: Uuid, length: Option<usize>) -> StreamDescription {
    StreamDescription {
        id,
        content_type: Some("text/plain".into()),
        length,
    }
}

/// Feed one frame the way the payload receiver does.
fn deliver(manager: &StreamManager, header: &Header, payload: &[u8]) {
    if let Some(stream) = manager.get_payload_stream(header) {
        stream.append(payload);
    }
    manager.on_receive(header, payload.len());
}

#[tokio::test]
async fn subscribers_observe_increasing_totals_then_end() {
    let stream = ContentStream::new(Uuid::new_v4());
    let mut events = stream.subscribe();

    stream.append(b"abc");
    stream.append(b"");
    stream.append(b"de");
    stream.finish();

    let mut observed = Vec::new();
    while let Some(event) = events.recv().await {
        observed.push(event);
    }
    assert_eq!(
        observed,
        vec![
            StreamEvent::Data { chunk: Bytes::from_static(b"abc"), total: 3 },
            StreamEvent::Data { chunk: Bytes::from_static(b"de"), total: 5 },
            StreamEvent::End { total: 5 },
        ]
    );
}

#[tokio::test]
async fn late_subscriber_gets_buffered_bytes_first() {
    let stream = ContentStream::new(Uuid::new_v4());
    stream.append(b"early");

    let mut events = stream.subscribe();
    stream.append(b"!");

    assert_eq!(
        events.recv().await,
        Some(StreamEvent::Data { chunk: Bytes::from_static(b"early"), total: 5 })
    );
    assert_eq!(
        events.recv().await,
        Some(StreamEvent::Data { chunk: Bytes::from_static(b"!"), total: 6 })
    );
}

#[tokio::test]
async fn read_to_end_waits_for_the_producer() {
    let stream = ContentStream::new(Uuid::new_v4());
    let producer = stream.clone();
    let task = tokio::spawn(async move {
        for part in [b"{\"n\":".as_slice(), b"42}".as_slice()] {
            tokio::task::yield_now().await;
            producer.append(part);
        }
        producer.finish();
    });

    let value: serde_json::Value = stream.read_as_json().await.expect("json body");
    task.await.expect("producer task");

    assert_eq!(value, serde_json::json!({ "n": 42 }));
}

#[test]
fn appends_after_end_are_ignored() {
    let stream = ContentStream::new(Uuid::new_v4());
    stream.append(b"ab");
    stream.finish();
    stream.append(b"cd");
    assert_eq!(stream.snapshot(), Bytes::from_static(b"ab"));
    assert_eq!(stream.status(), StreamStatus::Ended);
}

#[rstest]
#[case(None, true)]
#[case(Some(2), true)]
#[case(Some(3), false)]
fn completeness_honours_declared_length(#[case] declared: Option<usize>, #[case] complete: bool) {
    let stream = ContentStream::new(Uuid::new_v4());
    stream.describe(None, declared);
    stream.append(b"ab");
    stream.finish();
    assert_eq!(stream.is_complete(), complete);
}

#[rstest]
#[tokio::test]
async fn frames_before_descriptor_are_kept_for_the_claim(cancels: CancelLog) {
    let manager = manager(&cancels);
    let id = Uuid::new_v4();

    deliver(&manager, &stream_header(id, 5, true), b"hello");
    assert_eq!(manager.len(), 1);

    let stream = manager.claim_stream(&description(id, Some(5)));

    assert_eq!(stream.read_as_string().await.expect("utf-8"), "hello");
    assert_eq!(stream.content_type().as_deref(), Some("text/plain"));
    assert!(manager.is_empty());
    assert!(cancels.ids().is_empty());
}

#[rstest]
#[tokio::test]
async fn descriptor_before_frames_receives_them_progressively(cancels: CancelLog) {
    let manager = manager(&cancels);
    let id = Uuid::new_v4();
    let stream = manager.claim_stream(&description(id, None));
    let mut events = stream.subscribe();

    deliver(&manager, &stream_header(id, 3, false), b"abc");
    assert_eq!(
        events.recv().await,
        Some(StreamEvent::Data { chunk: Bytes::from_static(b"abc"), total: 3 })
    );
    deliver(&manager, &stream_header(id, 2, true), b"de");

    assert_eq!(stream.read_to_end().await, Bytes::from_static(b"abcde"));
    assert!(manager.is_empty());
}

#[rstest]
fn closing_an_incomplete_stream_cancels_exactly_once(cancels: CancelLog) {
    let manager = manager(&cancels);
    let id = Uuid::new_v4();
    let stream = manager.claim_stream(&description(id, Some(10)));
    deliver(&manager, &stream_header(id, 4, false), b"abcd");

    manager.close_stream(id);
    manager.close_stream(id);

    assert_eq!(cancels.ids(), vec![id]);
    assert_eq!(stream.status(), StreamStatus::Cancelled);
    assert_eq!(stream.len(), 4);
}

#[rstest]
fn closing_a_complete_stream_does_not_cancel(cancels: CancelLog) {
    let manager = manager(&cancels);
    let id = Uuid::new_v4();
    deliver(&manager, &stream_header(id, 3, true), b"abc");

    manager.close_stream(id);

    assert!(cancels.ids().is_empty());
    assert!(manager.is_empty());
}

#[rstest]
fn consumer_cancel_notifies_manager(cancels: CancelLog) {
    let manager = manager(&cancels);
    let id = Uuid::new_v4();
    let stream = manager.claim_stream(&description(id, None));

    stream.cancel();

    assert_eq!(cancels.ids(), vec![id]);
    assert!(manager.is_empty());
}

#[rstest]
fn late_frames_for_closed_streams_are_discarded(cancels: CancelLog) {
    let manager = manager(&cancels);
    let id = Uuid::new_v4();
    let _stream = manager.claim_stream(&description(id, None));
    manager.close_stream(id);

    let late = stream_header(id, 3, true);
    assert!(manager.get_payload_stream(&late).is_none());
    manager.on_receive(&late, 3);

    assert!(manager.is_empty());
}

#[rstest]
#[case::claimed_before_end(false)]
#[case::claimed_after_end(true)]
fn repeated_frames_for_finished_streams_are_discarded(cancels: CancelLog, #[case] frames_first: bool) {
    let manager = manager(&cancels);
    let id = Uuid::new_v4();
    let header = stream_header(id, 2, true);
    let stream = if frames_first {
        deliver(&manager, &header, b"ok");
        manager.claim_stream(&description(id, Some(2)))
    } else {
        let stream = manager.claim_stream(&description(id, Some(2)));
        deliver(&manager, &header, b"ok");
        stream
    };
    assert!(manager.is_empty());

    deliver(&manager, &header, b"ok");

    assert!(manager.is_empty());
    assert_eq!(stream.snapshot(), Bytes::from_static(b"ok"));
    assert!(cancels.ids().is_empty());
}

#[rstest]
fn frames_for_unknown_ids_are_ignored(cancels: CancelLog) {
    let manager = manager(&cancels);
    manager.on_receive(&stream_header(Uuid::new_v4(), 1, true), 1);
    assert!(manager.is_empty());
}

#[rstest]
fn abort_all_cancels_locally_without_notifying_peer(cancels: CancelLog) {
    let manager = manager(&cancels);
    let first = manager.claim_stream(&description(Uuid::new_v4(), None));
    let second = manager.claim_stream(&description(Uuid::new_v4(), None));

    assert_eq!(manager.abort_all(), 2);

    assert_eq!(first.status(), StreamStatus::Cancelled);
    assert_eq!(second.status(), StreamStatus::Cancelled);
    assert!(cancels.ids().is_empty());
}
