//! YAML front matter at the top of a document.
//!
//! ```text
//! ---
//! title: Deploying
//! date: 2024-03-01
//! tags: [ops, k8s]
//! ---
//! # Deploying
//! ...
//! ```
//!
//! The block is optional. Only `title`, `date` and `tags` are read; other
//! keys are ignored. The segmenter drops the block itself, so callers pass
//! the full raw text to both.

use chrono::{NaiveDate, NaiveDateTime};
use serde_yaml::Value;

use crate::error::{LoreError, LoreResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    /// Unix seconds.
    pub date: Option<i64>,
    pub tags: Vec<String>,
}

/// Parse the front matter of `content`, if any.
///
/// Returns [`FrontMatter::default`] when the document has no front matter.
/// An opening `---` with no closing delimiter is a thematic break, not front
/// matter, and a block that is not a YAML mapping is not metadata either.
/// Scalars of any YAML type are read as strings, so `title: 2024` is the
/// title `"2024"`. Only YAML that does not parse at all is a
/// [`LoreError::Segmentation`].
pub fn parse_front_matter(content: &str) -> LoreResult<FrontMatter> {
    let Some(yaml) = extract_front_matter(content) else {
        return Ok(FrontMatter::default());
    };

    let value: Value = serde_yaml::from_str(yaml)
        .map_err(|e| LoreError::Segmentation(format!("invalid front matter: {e}")))?;
    if !value.is_mapping() {
        return Ok(FrontMatter::default());
    }

    let mut tags: Vec<String> = match value.get("tags") {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar_string).collect(),
        Some(Value::String(csv)) => csv.split(',').map(str::to_string).collect(),
        Some(other) => scalar_string(other).into_iter().collect(),
        None => Vec::new(),
    };
    tags = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();

    Ok(FrontMatter {
        title: value
            .get("title")
            .and_then(scalar_string)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        date: value
            .get("date")
            .and_then(scalar_string)
            .as_deref()
            .and_then(parse_date),
        tags,
    })
}

/// String form of a YAML scalar; `None` for null, sequences and mappings.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        _ => None,
    }
}

/// Slice out the YAML between the leading `---` delimiters. `None` when the
/// document does not open with a closed block.
fn extract_front_matter(content: &str) -> Option<&str> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let after_first = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    if after_first.starts_with("---") {
        return Some("");
    }

    let end = after_first
        .find("\n---")
        .or_else(|| after_first.find("\n..."))?;
    Some(&after_first[..end])
}

fn parse_date(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_front_matter() {
        let fm = parse_front_matter("# Title\n\nBody").unwrap();
        assert_eq!(fm, FrontMatter::default());
    }

    #[test]
    fn test_list_tags_sorted_and_deduped() {
        let fm = parse_front_matter("---\ntitle: Deploying\ntags: [ops, k8s, ops]\n---\n# Body\n")
            .unwrap();
        assert_eq!(fm.title.as_deref(), Some("Deploying"));
        assert_eq!(fm.tags, vec!["k8s".to_string(), "ops".to_string()]);
    }

    #[test]
    fn test_comma_separated_tags() {
        let fm = parse_front_matter("---\ntags: rust, async , \n---\n").unwrap();
        assert_eq!(fm.tags, vec!["async".to_string(), "rust".to_string()]);
    }

    #[test]
    fn test_date_formats() {
        let fm = parse_front_matter("---\ndate: 2024-03-01\n---\n").unwrap();
        assert_eq!(fm.date, Some(1_709_251_200));

        let fm = parse_front_matter("---\ndate: \"2024-03-01T00:00:00Z\"\n---\n").unwrap();
        assert_eq!(fm.date, Some(1_709_251_200));

        let fm = parse_front_matter("---\ndate: someday\n---\n").unwrap();
        assert_eq!(fm.date, None);
    }

    #[test]
    fn test_unclosed_rule_is_not_front_matter() {
        let fm = parse_front_matter("---\n\nIntro after a rule.\n\n# Part\n\nBody.\n").unwrap();
        assert_eq!(fm, FrontMatter::default());

        let fm = parse_front_matter("---\ntitle: x\n# no closing\n").unwrap();
        assert_eq!(fm, FrontMatter::default());
    }

    #[test]
    fn test_rule_pair_around_prose_is_not_front_matter() {
        let fm = parse_front_matter("---\n\nJust prose.\n\n---\n\nMore.\n").unwrap();
        assert_eq!(fm, FrontMatter::default());
    }

    #[test]
    fn test_non_string_scalars() {
        let fm = parse_front_matter("---\ntitle: 2024\ntags: [rust, 2024, true]\n---\n# Review\n")
            .unwrap();
        assert_eq!(fm.title.as_deref(), Some("2024"));
        assert_eq!(
            fm.tags,
            vec!["2024".to_string(), "rust".to_string(), "true".to_string()]
        );

        let fm = parse_front_matter("---\ntags: 7\ndate: 2024\n---\n").unwrap();
        assert_eq!(fm.tags, vec!["7".to_string()]);
        assert_eq!(fm.date, None);
    }

    #[test]
    fn test_malformed_yaml_is_segmentation_error() {
        let err = parse_front_matter("---\n[invalid yaml\n---\nbody").unwrap_err();
        assert!(matches!(err, LoreError::Segmentation(_)));
    }

    #[test]
    fn test_empty_block() {
        let fm = parse_front_matter("---\n---\nbody").unwrap();
        assert_eq!(fm, FrontMatter::default());
    }
}
