//! Hashing System - SHA-256 fingerprints for documents and renders
//!
//! Content hashes are computed over canonical JSON so key order in stored
//! attribute maps never changes the result.

use sha2::{Sha256, Digest};
use serde::Serialize;
use serde_json::{Value, to_string};

use crate::node::Document;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Canonical JSON: sorted keys, no whitespace. Going through `Value` sorts
/// keys because `serde_json::Map` is a `BTreeMap` here.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&v)
}

/// Content hash of a document, used by the store to skip unchanged saves
pub fn compute_document_hash(doc: &Document) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(doc)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Fingerprint of one compiled page
/// fingerprint = sha256(html + "\n/*css*/\n" + css)
pub fn compute_page_fingerprint(html: &str, css: &str) -> String {
    let combined = format!("{}\n/*css*/\n{}", html, css);
    sha256_hex(combined.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": 3});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_document_hash_ignores_key_order() {
        let a: Document = serde_json::from_value(json!({
            "version": "1.0.0",
            "content": [{"type": "section", "id": "s", "attrs": {"b": 1, "a": 2}}]
        }))
        .unwrap();
        let b: Document = serde_json::from_value(json!({
            "content": [{"attrs": {"a": 2, "b": 1}, "id": "s", "type": "section"}],
            "version": "1.0.0"
        }))
        .unwrap();
        assert_eq!(compute_document_hash(&a).unwrap(), compute_document_hash(&b).unwrap());
    }

    #[test]
    fn test_document_hash_changes_with_content() {
        let a = Document::new("1.0.0", vec![Node::section("s1")]);
        let b = Document::new("1.0.0", vec![Node::section("s2")]);
        assert_ne!(compute_document_hash(&a).unwrap(), compute_document_hash(&b).unwrap());
    }

    #[test]
    fn test_page_fingerprint_stable() {
        let h1 = compute_page_fingerprint("<div></div>", "#a { color: red; }\n");
        let h2 = compute_page_fingerprint("<div></div>", "#a { color: red; }\n");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, compute_page_fingerprint("<div></div>", ""));
    }
}
