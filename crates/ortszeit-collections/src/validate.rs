//! Declarative input validation.
//!
//! Every argument group is validated before the first store round-trip.
//! Checking stops at the first violation; the error names the offending
//! group and key so callers can surface it directly.

use serde_json::Value;

use ortszeit_core::types::{Label, PropMap, LABEL_KEY};
use ortszeit_core::DomainError;

/// Every key must be present and non-null in the group's map.
pub(crate) fn require_keys(
    group: &str,
    map: &PropMap,
    keys: &[&str],
) -> Result<(), DomainError> {
    for key in keys {
        let present = map.get(*key).is_some_and(|v| !v.is_null());
        if !present {
            return Err(DomainError::missing_key(group, key));
        }
    }
    Ok(())
}

/// An entity reference must carry the expected `_label` tag and a slug.
/// Returns the slug.
pub(crate) fn require_ref(
    group: &str,
    reference: &PropMap,
    expected: Label,
) -> Result<String, DomainError> {
    let tag = reference.get(LABEL_KEY).and_then(Value::as_str);
    if tag != Some(expected.as_str()) {
        return Err(DomainError::label_mismatch(group, expected));
    }
    match reference.get("slug").and_then(Value::as_str) {
        Some(slug) if !slug.is_empty() => Ok(slug.to_string()),
        _ => Err(DomainError::missing_key(group, "slug")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> PropMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn present_keys_pass() {
        let props = map(&[("name", json!("Kater Holzig"))]);
        assert!(require_keys("props", &props, &["name"]).is_ok());
    }

    #[test]
    fn missing_key_names_group_and_key() {
        let address = map(&[("lat", json!(51.1)), ("lon", json!(13.1))]);
        let err = require_keys("address", &address, &["lat", "lon", "string"]).unwrap_err();
        assert_eq!(err, DomainError::missing_key("address", "string"));
    }

    #[test]
    fn null_counts_as_missing() {
        let props = map(&[("name", Value::Null)]);
        let err = require_keys("props", &props, &["name"]).unwrap_err();
        assert_eq!(err, DomainError::missing_key("props", "name"));
    }

    #[test]
    fn matching_ref_yields_slug() {
        let reference = map(&[("_label", json!("Artist")), ("slug", json!("dj1"))]);
        assert_eq!(require_ref("artist", &reference, Label::Artist).unwrap(), "dj1");
    }

    #[test]
    fn wrong_label_names_expected() {
        let reference = map(&[("_label", json!("Artist")), ("slug", json!("dj1"))]);
        let err = require_ref("location", &reference, Label::Location).unwrap_err();
        assert_eq!(err, DomainError::label_mismatch("location", Label::Location));
        assert!(err.to_string().contains("Location"));
    }

    #[test]
    fn untagged_ref_is_rejected() {
        let reference = map(&[("slug", json!("dj1"))]);
        let err = require_ref("artist", &reference, Label::Artist).unwrap_err();
        assert_eq!(err, DomainError::label_mismatch("artist", Label::Artist));
    }

    #[test]
    fn ref_without_slug_is_rejected() {
        let reference = map(&[("_label", json!("Artist"))]);
        let err = require_ref("artist", &reference, Label::Artist).unwrap_err();
        assert_eq!(err, DomainError::missing_key("artist", "slug"));
    }
}
