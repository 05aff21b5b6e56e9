//! Heuristic classification of request headers and callback payloads.

use affiliate_core::types::{AffiliateNetwork, DeviceType};
use serde_json::{Map, Value};

const MOBILE_MARKERS: [&str; 4] = ["Mobile", "Android", "iPhone", "iPad"];

/// Classify a device from its user-agent. Mobile markers are checked before
/// `Tablet`, so an Android tablet or an iPad reports as mobile.
pub fn detect_device(user_agent: Option<&str>) -> DeviceType {
    let ua = match user_agent {
        Some(ua) if !ua.is_empty() => ua,
        _ => return DeviceType::Unknown,
    };

    if MOBILE_MARKERS.iter().any(|m| ua.contains(m)) {
        DeviceType::Mobile
    } else if ua.contains("Tablet") {
        DeviceType::Tablet
    } else {
        DeviceType::Desktop
    }
}

/// Guess which network sent a sale callback. First match wins.
pub fn detect_network(user_agent: &str, payload: &Map<String, Value>) -> AffiliateNetwork {
    let field_is = |name: &str, expected: &str| {
        payload.get(name).and_then(Value::as_str) == Some(expected)
    };
    let field_present = |name: &str| payload.get(name).is_some_and(is_truthy);

    if user_agent.contains("Admitad") || field_is("partner", "admitad") {
        AffiliateNetwork::Admitad
    } else if user_agent.contains("Cuelinks") || field_is("source", "cuelinks") {
        AffiliateNetwork::Cuelinks
    } else if user_agent.contains("vCommission") || field_is("network", "vcommission") {
        AffiliateNetwork::Vcommission
    } else if user_agent.contains("Impact") || field_present("campaign_name") {
        AffiliateNetwork::Impact
    } else if user_agent.contains("Awin") || field_present("advertiser_id") {
        AffiliateNetwork::Awin
    } else {
        AffiliateNetwork::Unknown
    }
}

/// Loose truthiness used by callback field lookups: null, false, zero and the
/// empty string count as absent.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
