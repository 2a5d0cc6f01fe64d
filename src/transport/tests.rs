use axum::extract::ws::Message as WsMessage;
use bytes::Bytes;

use super::sse::event_data;
use super::status::Status;
use super::websocket::frame;
use crate::broker::{CounterSnapshot, Message};

#[test]
fn test_status_uses_wire_field_names() {
    let snapshot = CounterSnapshot {
        sse_total: 3,
        sse_live: 1,
        sse_closed: 2,
        ws_total: 5,
        ws_live: 4,
        ws_closed: 1,
        messages: 9,
        dropped: 0,
    };
    let json = serde_json::to_value(Status::new("node-1", &snapshot)).unwrap();

    assert_eq!(json["Server-Id"], "node-1");
    assert_eq!(json["SSE-Total"], 3);
    assert_eq!(json["SSE-Live"], 1);
    assert_eq!(json["SSE-Closed"], 2);
    assert_eq!(json["WS-Total"], 5);
    assert_eq!(json["WS-Live"], 4);
    assert_eq!(json["WS-Closed"], 1);
    assert_eq!(json["Messages"], 9);
    assert_eq!(json.as_object().unwrap().len(), 8);
}

#[test]
fn test_event_data_strips_carriage_returns() {
    assert_eq!(event_data("plain"), "plain");
    assert_eq!(event_data("a\r\nb\rc\nd"), "a\nb\nc\nd");
}

#[test]
fn test_frame_writes_payload_verbatim() {
    let text = frame(&Message::new("room:a", "{\"n\":1}"));
    assert_eq!(text, WsMessage::Text("{\"n\":1}".into()));

    let raw = Bytes::from_static(&[0xff, 0x00, 0x10]);
    let binary = frame(&Message::new("room:a", raw.clone()));
    assert_eq!(binary, WsMessage::Binary(raw));
}
