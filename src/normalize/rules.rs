use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::record::{FlatRecord, RawRecord, RawValue};

/// Synthetic key holding the comma-joined `categories` list.
pub const CATEGORIES_KEY: &str = "processed::categories";

/// Synthetic key written by [`PostProcessRule::StripRedditMarkers`].
pub const STRIPPED_DESCRIPTION_KEY: &str = "processed::description::stripped";

const REDDIT_MARKERS: [&str; 2] = ["[link]", "[comments]"];

/// Optional transformations a caller may request per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostProcessRule {
    /// Removes reddit's `[link]` and `[comments]` markers from `description`.
    StripRedditMarkers,
    /// Any tag this build does not know. Applying it does nothing.
    #[serde(other)]
    Unrecognized,
}

type RuleFn = fn(&mut FlatRecord);

impl PostProcessRule {
    fn transform(self) -> RuleFn {
        match self {
            PostProcessRule::StripRedditMarkers => strip_reddit_markers,
            PostProcessRule::Unrecognized => |_: &mut FlatRecord| {},
        }
    }
}

impl FromStr for PostProcessRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strip-reddit-markers" => Ok(PostProcessRule::StripRedditMarkers),
            other => Err(format!("unknown parser rule: {other}")),
        }
    }
}

/// Fixed pre-processing over the raw record. Seeds the output record.
pub fn preprocess(raw: &RawRecord) -> FlatRecord {
    let mut record = FlatRecord::new();

    if let Some(RawValue::List(items)) = raw.get("categories") {
        let terms: Option<Vec<&str>> = items.iter().map(RawValue::as_str).collect();
        if let Some(terms) = terms {
            // Trimmed like any other string leaf.
            let joined = terms.join(",");
            let joined = joined.trim();
            if !joined.is_empty() {
                record.insert(CATEGORIES_KEY.to_string(), joined.to_string());
            }
        }
    }

    record
}

/// Applies the requested rules, in order, to a fully assembled record.
pub fn postprocess(mut record: FlatRecord, rules: &[PostProcessRule]) -> FlatRecord {
    if rules.is_empty() {
        return record;
    }

    for rule in rules {
        (rule.transform())(&mut record);
    }

    record
}

fn strip_reddit_markers(record: &mut FlatRecord) {
    let Some(description) = record.get("description") else {
        return;
    };

    let stripped = REDDIT_MARKERS
        .iter()
        .fold(description.clone(), |text, marker| text.replace(marker, ""));
    record.insert(STRIPPED_DESCRIPTION_KEY.to_string(), stripped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_categories_joined() {
        let raw = RawValue::from(json!({"categories": ["a", "b"]}));
        let record = preprocess(&raw);
        assert_eq!(record.get(CATEGORIES_KEY).map(String::as_str), Some("a,b"));
    }

    #[test]
    fn test_mixed_categories_ignored() {
        let raw = RawValue::from(json!({"categories": ["a", 2]}));
        assert!(preprocess(&raw).is_empty());
    }

    #[test]
    fn test_non_list_categories_ignored() {
        let raw = RawValue::from(json!({"categories": "a,b"}));
        assert!(preprocess(&raw).is_empty());

        let raw = RawValue::from(json!({"categories": []}));
        assert!(preprocess(&raw).is_empty());
    }

    #[test]
    fn test_blank_categories_ignored() {
        for categories in [json!([""]), json!(["", ""]), json!(["  "])] {
            let raw = RawValue::from(json!({ "categories": categories }));
            assert!(preprocess(&raw).is_empty(), "{categories} should add no key");
        }
    }

    #[test]
    fn test_joined_categories_trimmed() {
        let raw = RawValue::from(json!({"categories": [" a", "b "]}));
        let record = preprocess(&raw);
        assert_eq!(record.get(CATEGORIES_KEY).map(String::as_str), Some("a,b"));
    }

    #[test]
    fn test_strip_reddit_markers() {
        let mut record = FlatRecord::new();
        record.insert(
            "description".into(),
            "hello [link] world [comments]".into(),
        );

        let out = postprocess(record, &[PostProcessRule::StripRedditMarkers]);
        assert_eq!(
            out.get(STRIPPED_DESCRIPTION_KEY).map(String::as_str),
            Some("hello  world ")
        );
        assert_eq!(
            out.get("description").map(String::as_str),
            Some("hello [link] world [comments]")
        );
    }

    #[test]
    fn test_no_rules_leaves_record_unchanged() {
        let mut record = FlatRecord::new();
        record.insert("description".into(), "hello [link]".into());

        let out = postprocess(record.clone(), &[]);
        assert_eq!(out, record);

        let out = postprocess(record.clone(), &[PostProcessRule::Unrecognized]);
        assert_eq!(out, record);
    }

    #[test]
    fn test_rule_without_description_is_noop() {
        let mut record = FlatRecord::new();
        record.insert("title".into(), "t".into());
        let out = postprocess(record.clone(), &[PostProcessRule::StripRedditMarkers]);
        assert_eq!(out, record);
    }

    #[test]
    fn test_rule_tags_deserialize() {
        let rules: Vec<PostProcessRule> =
            serde_json::from_str(r#"["strip-reddit-markers", "something-new"]"#).unwrap();
        assert_eq!(
            rules,
            vec![
                PostProcessRule::StripRedditMarkers,
                PostProcessRule::Unrecognized
            ]
        );
    }

    #[test]
    fn test_rule_from_str() {
        assert_eq!(
            "strip-reddit-markers".parse::<PostProcessRule>(),
            Ok(PostProcessRule::StripRedditMarkers)
        );
        assert!("nope".parse::<PostProcessRule>().is_err());
    }
}
