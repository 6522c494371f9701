//! Batch reply handling: how raw ECN replies become a discovery outcome.

use onkyo_discovery::{collect_replies, Device, DiscoveryOutcome};
use rstest::rstest;

const NR686: &str = "!1ECNTX-NR686/60128/DX/0009B0E4A2F1\x1A\r\n";
const RZ50: &str = "!1ECNTX-RZ50/60128/XX/0009B0112233\x1A\r\n";

#[rstest]
#[case(vec![], 0, "No replies")]
#[case(vec![("192.168.1.50", NR686)], 1, "Single receiver")]
#[case(vec![("192.168.1.50", NR686), ("192.168.1.60", RZ50)], 2, "Two receivers")]
#[case(vec![("192.168.1.50", NR686), ("192.168.1.50", NR686)], 1, "Duplicate reply")]
#[case(vec![("192.168.1.50", NR686), ("192.168.1.70", "garbage")], 1, "One bad reply")]
fn test_collect_reply_counts(
    #[case] replies: Vec<(&str, &str)>,
    #[case] expected: usize,
    #[case] description: &str,
) {
    let outcome = collect_replies(replies);
    assert_eq!(outcome.devices().len(), expected, "{}", description);
}

#[test]
fn test_collect_keeps_reply_order() {
    let outcome = collect_replies(vec![("192.168.1.60", RZ50), ("192.168.1.50", NR686)]);
    let models: Vec<&str> = outcome.devices().iter().map(|d| d.model.as_str()).collect();
    assert_eq!(models, vec!["TX-RZ50", "TX-NR686"]);
}

#[test]
fn test_no_replies_is_empty() {
    let replies: Vec<(String, String)> = Vec::new();
    assert_eq!(collect_replies(replies), DiscoveryOutcome::Empty);
}

#[test]
fn test_only_garbage_is_malformed() {
    let outcome = collect_replies(vec![("192.168.1.70", "!1ECN/xx"), ("192.168.1.71", "hello")]);
    assert!(matches!(outcome, DiscoveryOutcome::Malformed(_)));
    assert!(outcome.first().is_none());
}

#[test]
fn test_device_json_shape() {
    let json = r#"{"host":"10.0.0.8","port":60128,"model":"TX-SR333","mac":""}"#;
    let device: Device = serde_json::from_str(json).unwrap();
    assert_eq!(device.model, "TX-SR333");
    assert_eq!(DiscoveryOutcome::from_devices(vec![device]).devices().len(), 1);
}
