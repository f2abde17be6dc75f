use bytes::Bytes;
use rstest::rstest;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::*;
use crate::{
    header::{Header, PayloadType},
    payload::FrameHandler,
    stream::{ContentStream, StreamManager},
};

fn manager() -> (AssemblerManager, mpsc::UnboundedReceiver<InboundEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AssemblerManager::new(StreamManager::new(|_| {}), tx), rx)
}

/// Feed one frame the way the payload receiver does.
fn deliver(manager: &AssemblerManager, payload_type: PayloadType, id: Uuid, payload: &[u8], end: bool) {
    let header = Header::new(payload_type, payload.len(), id, end).expect("valid header");
    if let Some(stream) = manager.get_payload_stream(&header) {
        stream.append(payload);
    }
    manager.on_frame_received(&header, payload.len());
}

fn envelope(value: &serde_json::Value) -> Vec<u8> { serde_json::to_vec(value).expect("encode envelope") }

#[tokio::test]
async fn request_envelope_split_across_frames_is_emitted_once() {
    let (manager, mut events) = manager();
    let id = Uuid::new_v4();
    let body = envelope(&json!({ "verb": "POST", "path": "/api/messages", "streams": [] }));
    let (head, tail) = body.split_at(10);

    deliver(&manager, PayloadType::Request, id, head, false);
    assert!(events.try_recv().is_err());
    deliver(&manager, PayloadType::Request, id, tail, true);

    let Some(InboundEvent::Request { id: got, request }) = events.recv().await else {
        panic!("expected request event");
    };
    assert_eq!(got, id);
    assert_eq!(request.verb, "POST");
    assert_eq!(request.path, "/api/messages");
    assert!(request.streams.is_empty());
    assert_eq!(manager.pending_envelopes(), 0);
}

#[tokio::test]
async fn bom_prefixed_response_is_parsed() {
    let (manager, mut events) = manager();
    let id = Uuid::new_v4();
    let mut body = b"\xEF\xBB\xBF".to_vec();
    body.extend(envelope(&json!({ "statusCode": 204 })));

    deliver(&manager, PayloadType::Response, id, &body, true);

    let Some(InboundEvent::Response { response, .. }) = events.recv().await else {
        panic!("expected response event");
    };
    assert_eq!(response.status_code, 204);
}

#[rstest]
#[case(PayloadType::Request, b"not json".as_slice())]
#[case(PayloadType::Response, br#"{"verb":"GET"}"#.as_slice())]
fn malformed_envelopes_are_dropped(#[case] payload_type: PayloadType, #[case] body: &[u8]) {
    let (manager, mut events) = manager();

    deliver(&manager, payload_type, Uuid::new_v4(), body, true);

    assert!(events.try_recv().is_err());
    assert_eq!(manager.pending_envelopes(), 0);
}

#[test]
fn frames_reusing_a_completed_id_are_ignored() {
    let (manager, mut events) = manager();
    let id = Uuid::new_v4();
    let body = envelope(&json!({ "statusCode": 200 }));

    deliver(&manager, PayloadType::Response, id, &body, true);
    deliver(&manager, PayloadType::Response, id, &body, true);

    assert!(matches!(events.try_recv(), Ok(InboundEvent::Response { .. })));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn reset_discards_partial_envelopes() {
    let (manager, mut events) = manager();
    let id = Uuid::new_v4();
    let body = envelope(&json!({ "verb": "GET", "path": "/fresh" }));

    deliver(&manager, PayloadType::Request, id, b"{\"verb\":\"STALE", false);
    assert_eq!(manager.pending_envelopes(), 1);

    assert_eq!(manager.reset(), 1);
    assert_eq!(manager.pending_envelopes(), 0);

    deliver(&manager, PayloadType::Request, id, &body, true);
    let Some(InboundEvent::Request { request, .. }) = events.recv().await else {
        panic!("expected request event");
    };
    assert_eq!(request.verb, "GET");
    assert_eq!(request.path, "/fresh");
}

#[tokio::test]
async fn descriptors_bind_streams_regardless_of_arrival_order() {
    let (manager, mut events) = manager();
    let request_id = Uuid::new_v4();
    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

    // Two attachments arrive before the envelope, the third after it.
    deliver(&manager, PayloadType::Stream, ids[0], b"first", true);
    deliver(&manager, PayloadType::Stream, ids[1], b"sec", false);
    let descriptors: Vec<_> = ids
        .iter()
        .map(|id| json!({ "id": id, "type": "text/plain" }))
        .collect();
    let body = envelope(&json!({ "verb": "PUT", "path": "/x", "streams": descriptors }));
    deliver(&manager, PayloadType::Request, request_id, &body, true);
    deliver(&manager, PayloadType::Stream, ids[1], b"ond", true);
    deliver(&manager, PayloadType::Stream, ids[2], b"third", true);

    let Some(InboundEvent::Request { request, .. }) = events.recv().await else {
        panic!("expected request event");
    };
    let mut bodies = Vec::new();
    for stream in &request.streams {
        bodies.push(stream.read_to_end().await);
    }
    assert_eq!(
        bodies,
        vec![
            Bytes::from_static(b"first"),
            Bytes::from_static(b"second"),
            Bytes::from_static(b"third"),
        ]
    );
    let stream_ids: Vec<_> = request.streams.iter().map(ContentStream::id).collect();
    assert_eq!(stream_ids, ids);
}

#[test]
fn cancel_frames_become_events() {
    let (manager, mut events) = manager();
    let id = Uuid::new_v4();

    deliver(&manager, PayloadType::CancelStream, id, &[], true);
    deliver(&manager, PayloadType::CancelAll, Uuid::nil(), &[], true);

    assert!(matches!(events.try_recv(), Ok(InboundEvent::CancelStream(got)) if got == id));
    assert!(matches!(events.try_recv(), Ok(InboundEvent::CancelAll)));
}

#[test]
fn cancel_all_aborts_inbound_streams() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let streams = StreamManager::new(|_| {});
    let manager = AssemblerManager::new(streams.clone(), tx);
    deliver(&manager, PayloadType::Stream, Uuid::new_v4(), b"partial", false);
    assert_eq!(streams.len(), 1);

    deliver(&manager, PayloadType::CancelAll, Uuid::nil(), &[], true);

    assert!(streams.is_empty());
}

#[rstest]
#[case(false, None, 3, true)]
#[case(true, None, 3, false)]
#[case(true, Some(5), 3, true)]
#[case(true, Some(3), 3, false)]
fn payload_assembler_incompleteness(
    #[case] ended: bool,
    #[case] declared: Option<usize>,
    #[case] received: usize,
    #[case] incomplete: bool,
) {
    let id = Uuid::new_v4();
    let stream = ContentStream::new(id);
    let mut assembler = PayloadAssembler::new(AssemblerInit::ById(id), stream.clone());
    assembler.declare_length(declared);
    stream.append(&vec![0u8; received]);
    let header = Header::new(PayloadType::Stream, received, id, ended).expect("valid header");

    assembler.on_receive(&header, received);

    assert_eq!(assembler.is_ended(), ended);
    assert_eq!(assembler.is_incomplete(), incomplete);
}

#[test]
fn single_frame_header_declares_its_length() {
    let id = Uuid::new_v4();
    let header = Header::new(PayloadType::Stream, 12, id, true).expect("valid header");
    let assembler = PayloadAssembler::new(AssemblerInit::ByHeader(header), ContentStream::new(id));
    assert_eq!(assembler.content_length(), Some(12));
    assert_eq!(assembler.payload_type(), PayloadType::Stream);
}

#[test]
fn partially_read_final_frame_is_not_complete() {
    let id = Uuid::new_v4();
    let header = Header::new(PayloadType::Stream, 10, id, true).expect("valid header");
    let mut assembler = PayloadAssembler::new(AssemblerInit::ByHeader(header), ContentStream::new(id));

    assert!(!assembler.on_receive(&header, 4));
    assert!(assembler.on_receive(&header, 10));
}

#[test]
#[tracing_test::traced_test]
fn assembled_envelopes_are_traced_with_their_id() {
    let (manager, _events) = manager();
    let id = Uuid::new_v4();

    deliver(&manager, PayloadType::Response, id, &envelope(&json!({ "statusCode": 200 })), true);

    assert!(logs_contain("envelope assembled"));
    assert!(logs_contain(&id.to_string()));
}
