//! Key encoding for document and secondary-index storage, adapted from the
//! record/index layout used elsewhere in this workspace but keyed on
//! `serde_json::Value` instead of BSON.
//!
//! Data layout:  `d:{id}` → revision envelope + document bytes
//! Index layout: `i:{field}\x00{value_bytes}\x00{id}` → [] (empty value)

const DATA_PREFIX: &[u8] = b"d:";
const INDEX_PREFIX: &[u8] = b"i:";
const SEP: u8 = 0x00;

pub fn record_key(id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(DATA_PREFIX.len() + id.len());
    key.extend_from_slice(DATA_PREFIX);
    key.extend_from_slice(id.as_bytes());
    key
}

pub fn parse_record_key(key: &[u8]) -> Option<&str> {
    if !key.starts_with(DATA_PREFIX) {
        return None;
    }
    std::str::from_utf8(&key[DATA_PREFIX.len()..]).ok()
}

pub fn data_scan_prefix() -> Vec<u8> {
    DATA_PREFIX.to_vec()
}

/// Encode a JSON scalar into bytes that sort correctly under lexicographic
/// byte comparison. Arrays, objects and null are not indexable and encode
/// to an empty slice.
pub fn encode_value(value: &serde_json::Value) -> Vec<u8> {
    use serde_json::Value;
    match value {
        Value::String(s) => s.as_bytes().to_vec(),
        Value::Bool(b) => vec![*b as u8],
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                let unsigned = (i as u64) ^ (1u64 << 63);
                unsigned.to_be_bytes().to_vec()
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                let bits = f.to_bits();
                let sortable = if bits & (1u64 << 63) != 0 { !bits } else { bits ^ (1u64 << 63) };
                sortable.to_be_bytes().to_vec()
            }
        }
        Value::Array(_) | Value::Object(_) | Value::Null => vec![],
    }
}

pub fn index_key(field: &str, value: &serde_json::Value, id: &str) -> Vec<u8> {
    let value_bytes = encode_value(value);
    let mut key = Vec::with_capacity(INDEX_PREFIX.len() + field.len() + 1 + value_bytes.len() + 1 + id.len());
    key.extend_from_slice(INDEX_PREFIX);
    key.extend_from_slice(field.as_bytes());
    key.push(SEP);
    key.extend_from_slice(&value_bytes);
    key.push(SEP);
    key.extend_from_slice(id.as_bytes());
    key
}

pub fn index_scan_prefix(field: &str, value: &serde_json::Value) -> Vec<u8> {
    let value_bytes = encode_value(value);
    let mut key = Vec::with_capacity(INDEX_PREFIX.len() + field.len() + 1 + value_bytes.len() + 1);
    key.extend_from_slice(INDEX_PREFIX);
    key.extend_from_slice(field.as_bytes());
    key.push(SEP);
    key.extend_from_slice(&value_bytes);
    key.push(SEP);
    key
}

pub fn index_scan_field_prefix(field: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(INDEX_PREFIX.len() + field.len() + 1);
    key.extend_from_slice(INDEX_PREFIX);
    key.extend_from_slice(field.as_bytes());
    key.push(SEP);
    key
}

/// Parse an index key back into (field, id). The value bytes in between are
/// never decoded — the caller already knows which value it scanned for.
pub fn parse_index_key(key: &[u8]) -> Option<(&str, &str)> {
    if !key.starts_with(INDEX_PREFIX) {
        return None;
    }
    let rest = &key[INDEX_PREFIX.len()..];
    let first_sep = rest.iter().position(|&b| b == SEP)?;
    let field = std::str::from_utf8(&rest[..first_sep]).ok()?;
    let after_first = &rest[first_sep + 1..];
    let second_sep = after_first.iter().rposition(|&b| b == SEP)?;
    let id = std::str::from_utf8(&after_first[second_sep + 1..]).ok()?;
    Some((field, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_key_roundtrip() {
        let key = record_key("hero-1");
        assert_eq!(parse_record_key(&key), Some("hero-1"));
    }

    #[test]
    fn index_key_roundtrip() {
        let key = index_key("status", &json!("active"), "hero-1");
        assert_eq!(parse_index_key(&key), Some(("status", "hero-1")));
    }

    #[test]
    fn index_scan_prefix_matches_only_same_field_and_value() {
        let prefix = index_scan_prefix("status", &json!("active"));
        let k1 = index_key("status", &json!("active"), "hero-1");
        let k2 = index_key("status", &json!("active"), "hero-2");
        let k3 = index_key("status", &json!("retired"), "hero-1");
        let k4 = index_key("name", &json!("active"), "hero-1");
        assert!(k1.starts_with(&prefix));
        assert!(k2.starts_with(&prefix));
        assert!(!k3.starts_with(&prefix));
        assert!(!k4.starts_with(&prefix));
    }

    #[test]
    fn numeric_sort_order_is_preserved() {
        let k_neg = index_key("score", &json!(-5), "a");
        let k_low = index_key("score", &json!(10), "a");
        let k_high = index_key("score", &json!(20), "a");
        assert!(k_neg < k_low);
        assert!(k_low < k_high);
    }

    #[test]
    fn data_scan_prefix_matches_record_keys_only() {
        let prefix = data_scan_prefix();
        assert!(record_key("anything").starts_with(&prefix));
        assert!(!index_key("f", &json!(1), "a").starts_with(&prefix));
    }
}
