use serde_json::Value;

/// The canonical document type: a tagged JSON value. Callers that want a
/// typed view deserialize into their own `serde::Deserialize` shape via
/// `serde_json::from_value`; the engine never requires one.
pub type Document = serde_json::Map<String, Value>;

/// Resolve a dotted field path (`"address.city"`) against a document,
/// returning the leaf value if every segment along the way resolves to an
/// object.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut current: &Value = doc.get(path.split('.').next()?)?;
    let mut segments = path.split('.');
    segments.next();
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_flat_field() {
        let doc = json!({"name": "Superman"}).as_object().unwrap().clone();
        assert_eq!(get_path(&doc, "name"), Some(&json!("Superman")));
    }

    #[test]
    fn resolves_nested_field() {
        let doc = json!({"address": {"city": "Metropolis"}}).as_object().unwrap().clone();
        assert_eq!(get_path(&doc, "address.city"), Some(&json!("Metropolis")));
    }

    #[test]
    fn missing_field_is_none() {
        let doc = json!({"name": "Superman"}).as_object().unwrap().clone();
        assert_eq!(get_path(&doc, "address.city"), None);
    }
}
