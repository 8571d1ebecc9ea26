//! `N-hash` revision tags: `N` is a monotonically increasing integer per
//! document, `hash` a digest of the stored body.

use sha2::{Digest, Sha256};

/// Compute the next revision tag for a document body.
pub fn next_revision_tag(current_generation: u64, body: &[u8]) -> String {
    let generation = current_generation + 1;
    let digest = Sha256::digest(body);
    format!("{generation}-{}", hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{byte:02x}").expect("writing to a String never fails");
    }
    out
}

/// Parse the generation number out of a `"N-hash"` revision tag.
pub fn parse_generation(tag: &str) -> Option<u64> {
    let (gen_str, _) = tag.split_once('-')?;
    gen_str.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_revision_is_generation_one() {
        let tag = next_revision_tag(0, b"{}");
        assert_eq!(parse_generation(&tag), Some(1));
    }

    #[test]
    fn revisions_strictly_increase() {
        let first = next_revision_tag(0, b"{\"a\":1}");
        let second = next_revision_tag(parse_generation(&first).unwrap(), b"{\"a\":2}");
        assert!(parse_generation(&second).unwrap() > parse_generation(&first).unwrap());
    }

    #[test]
    fn same_body_different_generation_differs() {
        let first = next_revision_tag(0, b"{}");
        let second = next_revision_tag(1, b"{}");
        assert_ne!(first, second);
    }
}
