//! Cache keys and frequency TTLs

use sha2::{Digest, Sha256};
use statroute_core::{Frequency, Provider};
use std::fmt::Write as _;
use std::time::Duration;

/// Hash bytes kept in a key (32 hex characters)
const KEY_HASH_BYTES: usize = 16;

/// Serialize `value` as JSON with object keys sorted at every depth
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(*key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// `"<PROVIDER>:" + hex(sha256(canonical_json(params))[..16])`
pub fn compute_key(provider: Provider, params: &serde_json::Value) -> String {
    let digest = Sha256::digest(canonical_json(params).as_bytes());
    let mut key = String::with_capacity(provider.as_str().len() + 1 + KEY_HASH_BYTES * 2);
    key.push_str(provider.as_str());
    key.push(':');
    for byte in &digest[..KEY_HASH_BYTES] {
        let _ = write!(key, "{:02x}", byte);
    }
    key
}

/// Time-to-live for a series of the given frequency
pub fn ttl_for(frequency: Option<Frequency>) -> Duration {
    const HOUR: u64 = 3600;
    let hours = match frequency {
        Some(Frequency::Daily) => 1,
        Some(Frequency::Weekly) => 6,
        Some(Frequency::Monthly) => 12,
        Some(Frequency::Quarterly) => 24,
        Some(Frequency::Annual) => 7 * 24,
        None => 24,
    };
    Duration::from_secs(hours * HOUR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"d": [3, {"z": true, "y": null}], "c": "x"}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":"x","d":[3,{"y":null,"z":true}]},"b":1}"#
        );
    }

    #[test]
    fn test_key_shape_and_order_independence() {
        let a = compute_key(Provider::Fred, &json!({"series": "GDP", "start": 2000}));
        let b = compute_key(Provider::Fred, &json!({"start": 2000, "series": "GDP"}));
        assert_eq!(a, b);
        assert!(a.starts_with("FRED:"));
        assert_eq!(a.len(), "FRED:".len() + 32);
        assert!(a["FRED:".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_depends_on_provider_and_params() {
        let params = json!({"series": "GDP"});
        let fred = compute_key(Provider::Fred, &params);
        let imf = compute_key(Provider::Imf, &params);
        // Same params hash the same; only the prefix differs
        assert_eq!(&fred[5..], &imf[4..]);
        assert_ne!(fred, imf);

        let other = compute_key(Provider::Fred, &json!({"series": "CPI"}));
        assert_ne!(fred, other);
    }

    #[test]
    fn test_ttl_table() {
        assert_eq!(ttl_for(Some(Frequency::Daily)), Duration::from_secs(3600));
        assert_eq!(ttl_for(Some(Frequency::Weekly)), Duration::from_secs(6 * 3600));
        assert_eq!(ttl_for(Some(Frequency::Monthly)), Duration::from_secs(12 * 3600));
        assert_eq!(ttl_for(Some(Frequency::Quarterly)), Duration::from_secs(24 * 3600));
        assert_eq!(ttl_for(Some(Frequency::Annual)), Duration::from_secs(7 * 24 * 3600));
        assert_eq!(ttl_for(None), Duration::from_secs(24 * 3600));
    }
}
