//! Inbound frame vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use sclink_core::protocol::{decode_inbound, Inbound};

use vector_loader::load;

#[test]
fn inbound_vectors() {
    let files = [
        "response_ok.json",
        "response_int_flags.json",
        "response_no_event_field.json",
        "response_errors.json",
        "event_triple.json",
        "event_int_flag.json",
        "event_short_payload.json",
        "event_no_payload.json",
        "missing_id.json",
        "not_json.json",
    ];

    for f in files {
        let v = load(f);
        let res = decode_inbound(&v.frame);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.kind().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let inbound = res.expect("expected ok frame");
        let ex = v.expect.expect("missing expect block");

        match (ex["kind"].as_str().unwrap(), inbound) {
            ("response", Inbound::Response(resp)) => {
                assert_eq!(resp.id, ex["id"].as_u64().unwrap(), "vector={}", v.description);
                assert_eq!(resp.status, ex["status"].as_bool().unwrap(), "vector={}", v.description);
                assert_eq!(resp.payload, ex["payload"], "vector={}", v.description);
                match resp.errors {
                    Some(errors) => assert_eq!(errors, ex["errors"], "vector={}", v.description),
                    None => assert!(ex["errors"].is_null(), "vector={}", v.description),
                }
            }
            ("event", Inbound::Event(ev)) => {
                assert_eq!(ev.subscription_id, ex["id"].as_u64().unwrap(), "vector={}", v.description);
                let want: Vec<u64> = ex["triple"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|x| x.as_u64().unwrap())
                    .collect();
                let got: Vec<u64> = ev.triple.as_array().iter().map(|a| a.value()).collect();
                assert_eq!(got, want, "vector={}", v.description);
            }
            (kind, other) => panic!("vector={} expected {kind}, got {other:?}", v.description),
        }
    }
}
