//! BLAKE3 hashing of descriptors and rendered templates.

use crate::core::types::Node;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Compute a composite hash from multiple components.
pub fn composite_hash(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in components {
        hasher.update(c.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

/// Hash a graph node: kind, origin, references and canonical properties.
pub fn hash_node(node: &Node) -> Result<String, String> {
    let kind = node.descriptor.kind().to_string();
    let origin = node.origin.to_string();
    let refs = node.depends_on.join(",");
    let props = node.descriptor.properties()?.to_string();
    Ok(composite_hash(&[&kind, &origin, &refs, &props]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Descriptor, LogSink, Origin};

    fn sink(retention: Option<u32>) -> Node {
        Node {
            origin: Origin::Declared,
            descriptor: Descriptor::LogSink(LogSink {
                name: "logs".to_string(),
                retention_days: retention,
            }),
            depends_on: vec![],
        }
    }

    #[test]
    fn test_hash_string() {
        let h1 = hash_string("hello");
        let h2 = hash_string("hello");
        let h3 = hash_string("world");
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert!(h1.starts_with("blake3:"));
        assert_eq!(h1.len(), 7 + 64);
    }

    #[test]
    fn test_composite_hash_order_sensitive() {
        let h = composite_hash(&["blake3:aaa", "blake3:bbb"]);
        let h2 = composite_hash(&["blake3:bbb", "blake3:aaa"]);
        assert!(h.starts_with("blake3:"));
        assert_ne!(h, h2);
    }

    #[test]
    fn test_composite_hash_separator() {
        // "ab" + "c" must not collide with "a" + "bc"
        assert_ne!(composite_hash(&["ab", "c"]), composite_hash(&["a", "bc"]));
    }

    #[test]
    fn test_hash_node() {
        let a = hash_node(&sink(Some(30))).unwrap();
        let b = hash_node(&sink(Some(30))).unwrap();
        let c = hash_node(&sink(None)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_node_origin_matters() {
        let declared = sink(None);
        let mut looked_up = sink(None);
        looked_up.origin = Origin::Lookup;
        assert_ne!(hash_node(&declared).unwrap(), hash_node(&looked_up).unwrap());
    }
}
