use super::{ANONYMOUS_SENDER, Envelope, Latency, TOPIC, format_date, format_time, now_millis};
use crate::utils::RelayError;
use serde_json::json;

fn sample() -> Envelope {
    Envelope {
        body: "hello".to_string(),
        sender: "You".to_string(),
        client_sent_at: 1_000,
        server_received_at: 1_004,
        topic: TOPIC.to_string(),
    }
}

#[test]
fn test_envelope_uses_camel_case_keys() {
    let payload = sample().to_payload().unwrap();
    let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(
        value,
        json!({
            "body": "hello",
            "sender": "You",
            "clientSentAt": 1000,
            "serverReceivedAt": 1004,
            "topic": "updates"
        })
    );
}

#[test]
fn test_envelope_defaults_sender_and_topic() {
    let env = Envelope::from_payload(r#"{"body":"hi","clientSentAt":1,"serverReceivedAt":2}"#)
        .unwrap();
    assert_eq!(env.sender, ANONYMOUS_SENDER);
    assert_eq!(env.topic, TOPIC);
}

#[test]
fn test_envelope_rejects_non_json() {
    let err = Envelope::from_payload("not json at all").unwrap_err();
    assert!(matches!(err, RelayError::Deserialization(_)));
}

#[test]
fn test_envelope_rejects_wrong_shape() {
    // Missing body and numeric timestamps
    let err = Envelope::from_payload(r#"{"message":"hi","timestamp":"2024-01-01T00:00:00Z"}"#)
        .unwrap_err();
    assert!(matches!(err, RelayError::Deserialization(_)));
}

#[test]
fn test_latency_sub_second() {
    let latency = Latency::between(1_000, 1_005);
    assert_eq!(latency.millis(), 5);
    assert_eq!(latency.to_string(), "5ms");
}

#[test]
fn test_latency_in_the_future_displays_below_one_ms() {
    let latency = Latency::between(2_000, 1_990);
    assert_eq!(latency.millis(), -10);
    assert_eq!(latency.to_string(), "<1ms");
    assert_eq!(Latency(0).to_string(), "<1ms");
}

#[test]
fn test_latency_saturates_on_extreme_send_times() {
    let latency = Latency::between(i64::MIN, 1_000);
    assert_eq!(latency.millis(), i64::MAX);

    let latency = Latency::between(i64::MAX, -1_000);
    assert_eq!(latency.millis(), i64::MIN);
    assert_eq!(latency.to_string(), "<1ms");
}

#[test]
fn test_latency_seconds() {
    assert_eq!(Latency(1_000).to_string(), "1.00s");
    assert_eq!(Latency(2_500).to_string(), "2.50s");
    assert_eq!(Latency(999).to_string(), "999ms");
}

#[test]
fn test_time_formatting_shapes() {
    let now = now_millis();
    let time = format_time(now);
    assert!(time.ends_with("AM") || time.ends_with("PM"), "got {time}");
    assert_eq!(time.split('.').nth(1).map(|s| s.len()), Some(6)); // "123 PM"
    assert!(!format_date(now).is_empty());
}
