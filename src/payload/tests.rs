use std::{
    num::NonZeroUsize,
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};

use bytes::Bytes;
use rstest::{fixture, rstest};
use tokio::{io::AsyncReadExt, time::timeout};
use uuid::Uuid;

use super::*;
use crate::{
    header::{Header, MAX_HEADER_LENGTH, PayloadType},
    message::ContentBody,
    test_helpers::{ChunkedReceiver, FailingSender, RecordingHandler, RecordingSender, encode_frame},
    transport::StreamReceiver,
};

fn non_zero(value: usize) -> NonZeroUsize { NonZeroUsize::new(value).expect("non-zero") }

#[fixture]
fn recording() -> RecordingSender { RecordingSender::default() }

async fn connected_sender(transport: &RecordingSender, chunk_length: usize) -> PayloadSender {
    let sender = PayloadSender::new(non_zero(chunk_length));
    sender
        .connect(Box::new(transport.clone()))
        .await
        .expect("connect sender");
    sender
}

#[rstest]
#[tokio::test]
async fn sender_writes_header_then_payload_in_chunks(recording: RecordingSender) {
    let sender = connected_sender(&recording, 4).await;
    let header = Header::new(PayloadType::Stream, 10, Uuid::new_v4(), true).expect("header");

    sender
        .send_payload(&header, b"0123456789")
        .await
        .expect("send frame");

    let lengths: Vec<_> = recording.writes().iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![MAX_HEADER_LENGTH, 4, 4, 2]);
    assert_eq!(recording.bytes(), encode_frame(&header, b"0123456789"));
}

#[rstest]
#[tokio::test]
async fn sender_rejects_payload_length_mismatch(recording: RecordingSender) {
    let sender = connected_sender(&recording, 4096).await;
    let header = Header::new(PayloadType::Request, 5, Uuid::new_v4(), true).expect("header");

    let error = sender
        .send_payload(&header, b"abc")
        .await
        .expect_err("length mismatch");

    assert!(matches!(error, PayloadError::LengthMismatch { declared: 5, actual: 3 }));
    assert!(recording.writes().is_empty());
}

#[rstest]
#[tokio::test]
async fn sender_connects_once(recording: RecordingSender) {
    let sender = connected_sender(&recording, 4096).await;
    let error = sender
        .connect(Box::new(recording.clone()))
        .await
        .expect_err("second connect");
    assert!(matches!(error, PayloadError::AlreadyConnected));
}

#[tokio::test]
async fn sender_without_transport_reports_not_connected() {
    let sender = PayloadSender::new(non_zero(4096));
    let header = Header::new(PayloadType::CancelAll, 0, Uuid::nil(), true).expect("header");
    let error = sender.send_payload(&header, &[]).await.expect_err("no transport");
    assert!(matches!(error, PayloadError::NotConnected));
}

#[tokio::test]
async fn failed_write_disconnects_exactly_once() {
    let sender = PayloadSender::new(non_zero(4096));
    let mut events = sender.subscribe_disconnected();
    sender
        .connect(Box::new(FailingSender))
        .await
        .expect("connect sender");
    let header = Header::new(PayloadType::Stream, 1, Uuid::new_v4(), true).expect("header");

    assert!(matches!(
        sender.send_payload(&header, b"x").await,
        Err(PayloadError::Io(_))
    ));
    sender.disconnect("closing").await;

    let event = events.recv().await.expect("disconnect event");
    assert_eq!(event.origin, DisconnectOrigin::Sender);
    assert!(event.reason.starts_with("send failed"));
    assert!(events.try_recv().is_err());
    assert!(!sender.is_connected());
}

#[rstest]
#[tokio::test]
async fn sender_can_reconnect_after_disconnect(recording: RecordingSender) {
    let sender = connected_sender(&recording, 4096).await;
    sender.disconnect("restart").await;
    assert!(!sender.is_connected());

    sender
        .connect(Box::new(recording.clone()))
        .await
        .expect("reconnect");
    assert!(sender.is_connected());
}

async fn run_receiver(wire: Vec<u8>, max_read: usize) -> (Arc<RecordingHandler>, DisconnectedEvent) {
    let handler = Arc::new(RecordingHandler::default());
    let receiver = PayloadReceiver::new(non_zero(4096));
    receiver.subscribe(handler.clone());
    let mut events = receiver.subscribe_disconnected();
    receiver
        .connect(Box::new(ChunkedReceiver::new(wire, max_read)))
        .expect("connect receiver");
    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("receiver stopped")
        .expect("disconnect event");
    (handler, event)
}

#[tokio::test]
async fn receiver_reassembles_frames_from_partial_reads() {
    let id = Uuid::new_v4();
    let first = Header::new(PayloadType::Request, 6, id, false).expect("header");
    let last = Header::new(PayloadType::Request, 5, id, true).expect("header");
    let mut wire = encode_frame(&first, b"hello ");
    wire.extend(encode_frame(&last, b"world"));

    let (handler, event) = run_receiver(wire, 7).await;

    let stream = handler.stream(id).expect("stream created");
    assert_eq!(stream.snapshot(), Bytes::from_static(b"hello world"));
    // Envelope frames are reported once each, after the full payload.
    assert_eq!(handler.reports(), vec![(first, 6), (last, 5)]);
    assert_eq!(event.origin, DisconnectOrigin::Receiver);
}

#[tokio::test]
async fn stream_frames_are_reported_after_every_chunk() {
    let id = Uuid::new_v4();
    let header = Header::new(PayloadType::Stream, 10_000, id, true).expect("header");
    let body = vec![7u8; 10_000];

    let (handler, _) = run_receiver(encode_frame(&header, &body), usize::MAX).await;

    let progress: Vec<_> = handler.reports().iter().map(|(_, received)| *received).collect();
    assert_eq!(progress, vec![4096, 8192, 10_000]);
    assert_eq!(handler.stream(id).expect("stream").len(), 10_000);
}

#[tokio::test]
async fn zero_length_frames_are_still_reported() {
    let header = Header::new(PayloadType::CancelStream, 0, Uuid::new_v4(), true).expect("header");

    let (handler, _) = run_receiver(encode_frame(&header, &[]), usize::MAX).await;

    assert_eq!(handler.reports(), vec![(header, 0)]);
}

#[tokio::test]
async fn malformed_header_disconnects_receiver() {
    let (handler, event) = run_receiver(vec![b'?'; MAX_HEADER_LENGTH], usize::MAX).await;
    assert!(handler.reports().is_empty());
    assert!(event.reason.contains("invalid frame header"));
}

#[tokio::test]
async fn receiver_disconnect_closes_transport() {
    let (client, mut server) = tokio::io::duplex(64);
    let receiver = PayloadReceiver::new(non_zero(4096));
    receiver
        .connect(Box::new(StreamReceiver::new(client)))
        .expect("connect receiver");
    assert!(receiver.is_connected());

    receiver.disconnect("done");

    let mut buf = [0u8; 1];
    let read = timeout(Duration::from_secs(5), server.read(&mut buf))
        .await
        .expect("transport closed")
        .expect("read after close");
    assert_eq!(read, 0);
    assert!(!receiver.is_connected());
}

#[rstest]
#[case(10, 4, vec![(4, false), (4, false), (2, true)])]
#[case(8, 4, vec![(4, false), (4, true)])]
#[case(0, 4, vec![(0, true)])]
fn disassembler_marks_only_the_last_frame_as_end(
    #[case] total: usize,
    #[case] max: usize,
    #[case] expected: Vec<(usize, bool)>,
) {
    let disassembler = Disassembler::new(non_zero(max));
    let payload = Bytes::from(vec![1u8; total]);

    let frames = disassembler
        .frames(PayloadType::Stream, Uuid::new_v4(), &payload)
        .expect("split payload");

    let shape: Vec<_> = frames
        .iter()
        .map(|frame| (frame.header().payload_length(), frame.header().end()))
        .collect();
    assert_eq!(shape, expected);
}

#[test]
fn disassembler_clamps_frame_length() {
    let disassembler = Disassembler::new(non_zero(usize::MAX));
    assert_eq!(disassembler.max_frame_length().get(), crate::header::MAX_LENGTH);
}

fn decode_frames(bytes: &[u8]) -> Vec<(Header, Vec<u8>)> {
    let mut frames = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let header = crate::header::deserialize(&rest[..MAX_HEADER_LENGTH]).expect("header");
        let end = MAX_HEADER_LENGTH + header.payload_length();
        frames.push((header, rest[MAX_HEADER_LENGTH..end].to_vec()));
        rest = &rest[end..];
    }
    frames
}

#[rstest]
#[tokio::test]
async fn reader_content_of_unknown_length_ends_on_last_frame(recording: RecordingSender) {
    let sender = connected_sender(&recording, 4096).await;
    let disassembler = Disassembler::new(non_zero(4));
    let reader = std::io::Cursor::new(b"abcdefgh".to_vec());
    let body = ContentBody::Reader {
        reader: Box::new(reader),
        length: None,
    };

    let outcome = disassembler
        .send_stream(&sender, Uuid::new_v4(), body, &AtomicBool::new(false))
        .await
        .expect("send stream");

    assert_eq!(outcome, SendOutcome::Completed);
    let frames = decode_frames(&recording.bytes());
    let shape: Vec<_> = frames
        .iter()
        .map(|(header, payload)| (payload.clone(), header.end()))
        .collect();
    assert_eq!(shape, vec![(b"abcd".to_vec(), false), (b"efgh".to_vec(), true)]);
}

#[rstest]
#[tokio::test]
async fn cancelled_stream_sends_nothing_further(recording: RecordingSender) {
    let sender = connected_sender(&recording, 4096).await;
    let disassembler = Disassembler::new(non_zero(4));

    let outcome = disassembler
        .send_stream(
            &sender,
            Uuid::new_v4(),
            ContentBody::Bytes(Bytes::from_static(b"abcdefgh")),
            &AtomicBool::new(true),
        )
        .await
        .expect("send stream");

    assert_eq!(outcome, SendOutcome::Cancelled);
    assert!(recording.writes().is_empty());
}

#[rstest]
#[tokio::test]
async fn cancel_frames_are_empty_and_final(recording: RecordingSender) {
    let sender = connected_sender(&recording, 4096).await;
    let disassembler = Disassembler::new(non_zero(4096));
    let id = Uuid::new_v4();

    disassembler
        .send_cancel_stream(&sender, id)
        .await
        .expect("cancel stream");
    disassembler.send_cancel_all(&sender).await.expect("cancel all");

    let frames = decode_frames(&recording.bytes());
    let kinds: Vec<_> = frames
        .iter()
        .map(|(header, payload)| (header.payload_type(), header.end(), payload.len()))
        .collect();
    assert_eq!(
        kinds,
        vec![(PayloadType::CancelStream, true, 0), (PayloadType::CancelAll, true, 0)]
    );
    assert_eq!(frames[0].0.id(), id);
}
