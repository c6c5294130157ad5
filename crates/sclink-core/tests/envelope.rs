#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde_json::{json, Value};

use sclink_core::protocol::{
    decode_inbound, decode_request, encode_request, EventFrame, EventTriple, Inbound, RequestType,
    Response, ScAddr,
};
use sclink_core::ErrorKind;

#[test]
fn request_uses_wire_field_names() {
    let text = encode_request(5, RequestType::CheckElements, &json!([1, 2])).unwrap();
    let v: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(v, json!({"id": 5, "type": "check_elements", "payload": [1, 2]}));

    let req = decode_request(&text).unwrap();
    assert_eq!(req.id, 5);
    assert_eq!(req.request_type, RequestType::CheckElements);
    assert_eq!(req.payload, json!([1, 2]));
}

#[test]
fn every_request_type_has_a_snake_case_wire_name() {
    let all = [
        RequestType::CheckElements,
        RequestType::CreateElements,
        RequestType::CreateElementsByScs,
        RequestType::DeleteElements,
        RequestType::Content,
        RequestType::Keynodes,
        RequestType::SearchTemplate,
        RequestType::GenerateTemplate,
        RequestType::Events,
    ];
    for t in all {
        let encoded = serde_json::to_value(t).unwrap();
        assert_eq!(encoded, Value::String(t.as_str().to_string()));
    }
}

#[test]
fn event_and_response_with_same_id_stay_apart() {
    let resp = Response::ok(19, json!([1]));
    let ev = EventFrame {
        subscription_id: 19,
        triple: EventTriple(ScAddr(1), ScAddr(2), ScAddr(3)),
    };

    assert!(matches!(decode_inbound(&resp.to_frame()).unwrap(), Inbound::Response(r) if r == resp));
    assert!(matches!(decode_inbound(&ev.to_frame()).unwrap(), Inbound::Event(e) if e == ev));
}

#[test]
fn server_errors_point_at_payload_elements() {
    let request_payload = json!([{"idtf": "a"}, {"idtf": "b"}]);
    let resp = Response {
        id: 1,
        status: false,
        payload: Value::Null,
        errors: Some(json!([{"message": "unknown idtf", "ref": 1}, {"message": "no ref"}])),
    };

    let err = resp.clone().into_result(&request_payload).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerReported);

    let server = resp.server_error(&request_payload).unwrap();
    assert_eq!(server.entries.len(), 2);
    assert_eq!(server.entries[0].reference, Some(1));
    assert_eq!(server.entries[0].payload, Some(json!({"idtf": "b"})));
    assert_eq!(server.entries[1].reference, None);
    assert!(server.to_string().contains("Payload: {\"idtf\":\"b\"}"));
}

#[test]
fn plain_string_error_is_reported() {
    let resp = Response {
        id: 1,
        status: false,
        payload: Value::Null,
        errors: Some(json!("Invalid template")),
    };
    let server = resp.server_error(&Value::Null).unwrap();
    assert_eq!(server.messages().collect::<Vec<_>>(), vec!["Invalid template"]);
}

#[test]
fn empty_errors_are_not_errors() {
    for errors in [json!(""), json!([]), json!({})] {
        let resp = Response {
            id: 1,
            status: true,
            payload: json!(1),
            errors: Some(errors),
        };
        assert!(resp.into_result(&Value::Null).is_ok());
    }
}
