//! Composite keys
//!
//! Layout: `\0NAMESPACE\0part1\0part2\0`. Because every component is
//! terminated by `\0`, the key for `(ns, a)` is a strict prefix of every key
//! for `(ns, a, ..)`, and never a prefix of `(ns, ab, ..)`.

use crate::error::{StoreError, StoreResult};

const SEP: char = '\u{0}';

fn check(part: &str) -> StoreResult<()> {
    if part.is_empty() || part.contains(SEP) {
        return Err(StoreError::InvalidKey(part.to_string()));
    }
    Ok(())
}

/// Full composite key
pub fn composite_key(namespace: &str, parts: &[&str]) -> StoreResult<String> {
    composite_prefix(namespace, parts)
}

/// Prefix covering every key whose leading components are `parts`
pub fn composite_prefix(namespace: &str, parts: &[&str]) -> StoreResult<String> {
    check(namespace)?;
    let mut key = String::with_capacity(namespace.len() + 2 + parts.iter().map(|p| p.len() + 1).sum::<usize>());
    key.push(SEP);
    key.push_str(namespace);
    key.push(SEP);
    for part in parts {
        check(part)?;
        key.push_str(part);
        key.push(SEP);
    }
    Ok(key)
}

/// Split a composite key into namespace and components
pub fn split_composite_key(key: &str) -> Option<(&str, Vec<&str>)> {
    let body = key.strip_prefix(SEP)?.strip_suffix(SEP)?;
    let mut parts = body.split(SEP);
    let namespace = parts.next()?;
    Some((namespace, parts.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_split() {
        let key = composite_key("HISTORY", &["CUST-1", "0001"]).unwrap();
        let (ns, parts) = split_composite_key(&key).unwrap();
        assert_eq!(ns, "HISTORY");
        assert_eq!(parts, vec!["CUST-1", "0001"]);
    }

    #[test]
    fn test_prefix_does_not_bleed_into_longer_ids() {
        let prefix = composite_prefix("HISTORY", &["CUST-1"]).unwrap();
        let own = composite_key("HISTORY", &["CUST-1", "a"]).unwrap();
        let other = composite_key("HISTORY", &["CUST-10", "a"]).unwrap();
        assert!(own.starts_with(&prefix));
        assert!(!other.starts_with(&prefix));
    }

    #[test]
    fn test_rejects_separator_and_empty() {
        assert!(composite_key("HISTORY", &["a\u{0}b"]).is_err());
        assert!(composite_key("HISTORY", &[""]).is_err());
        assert!(composite_prefix("", &[]).is_err());
    }

    #[test]
    fn test_plain_key_is_not_composite() {
        assert!(split_composite_key("CUSTOMER_C-1").is_none());
    }
}
