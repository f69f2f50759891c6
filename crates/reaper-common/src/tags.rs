//! AWS resource tag constants for aws-reaper
//!
//! ## Tag Schema
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `aws-reaper:first-seen` | RFC 3339 time the resource was first observed |
//! | `aws-reaper-excluded` | `true` protects the resource from deletion |

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Tag key recording when a resource without a native creation time was first seen
pub const TAG_FIRST_SEEN: &str = "aws-reaper:first-seen";

/// Tag key that opts a resource out of deletion
pub const TAG_EXCLUDE: &str = "aws-reaper-excluded";

/// Tag value that activates [`TAG_EXCLUDE`] (compared case-insensitively)
pub const TAG_EXCLUDE_VALUE: &str = "true";

/// Helper to format a first-seen timestamp for tags
pub fn format_first_seen(time: DateTime<Utc>) -> String {
    time.to_rfc3339()
}

/// Helper to parse a first-seen timestamp from tags
pub fn parse_first_seen(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Read the first-seen timestamp from a tag map, if present and valid
pub fn first_seen(tags: &HashMap<String, String>) -> Option<DateTime<Utc>> {
    tags.get(TAG_FIRST_SEEN).and_then(|s| parse_first_seen(s))
}

/// Check whether a tag map carries the exclusion tag
pub fn is_excluded(tags: &HashMap<String, String>) -> bool {
    tags.get(TAG_EXCLUDE)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(TAG_EXCLUDE_VALUE))
}

/// Extract tags from any AWS tag type into a HashMap.
///
/// Different AWS SDKs use different tag types (ec2::Tag, iam::Tag, ...) but
/// they all have key/value string fields.
pub fn extract_tags<T>(
    tags: &[T],
    key: impl Fn(&T) -> Option<&str>,
    value: impl Fn(&T) -> Option<&str>,
) -> HashMap<String, String> {
    tags.iter()
        .filter_map(|t| match (key(t), value(t)) {
            (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse_roundtrip() {
        let now = Utc::now();
        let parsed = parse_first_seen(&format_first_seen(now)).unwrap();

        // Timestamps should be within 1 second (sub-second precision may vary)
        let diff = (now - parsed).num_seconds().abs();
        assert!(diff <= 1, "Roundtrip diff {} > 1 second", diff);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_first_seen("not a timestamp").is_none());
        assert!(parse_first_seen("").is_none());
    }

    #[test]
    fn test_first_seen_ignores_garbage() {
        let mut tags = HashMap::new();
        tags.insert(TAG_FIRST_SEEN.to_string(), "yesterday".to_string());
        assert!(first_seen(&tags).is_none());
    }

    #[test]
    fn test_exclusion_tag_is_case_insensitive() {
        let mut tags = HashMap::new();
        assert!(!is_excluded(&tags));

        tags.insert(TAG_EXCLUDE.to_string(), "TRUE".to_string());
        assert!(is_excluded(&tags));

        tags.insert(TAG_EXCLUDE.to_string(), "false".to_string());
        assert!(!is_excluded(&tags));
    }

    #[test]
    fn test_extract_tags_skips_incomplete_pairs() {
        let raw = vec![(Some("Name"), Some("web")), (Some("orphan"), None)];
        let tags = extract_tags(&raw, |t| t.0, |t| t.1);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("Name").map(String::as_str), Some("web"));
    }
}
