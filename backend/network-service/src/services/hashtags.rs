//! Hashtag extraction
//!
//! Tags are `#` followed by ASCII word characters, lower-cased. A post's tag
//! set is recomputed from scratch whenever its content changes.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static HASHTAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_]+)").expect("Invalid hashtag regex"));

/// Extract the tag set from content text, in first-occurrence order
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    HASHTAG_REGEX
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_hashtag() {
        assert_eq!(extract_hashtags("hello #campus"), vec!["campus"]);
    }

    #[test]
    fn test_extract_lowercases_and_dedupes() {
        let tags = extract_hashtags("#Hackathon tonight! #hackathon #AI_club");
        assert_eq!(tags, vec!["hackathon", "ai_club"]);
    }

    #[test]
    fn test_extract_no_hashtags() {
        assert!(extract_hashtags("no tags here, just a # sign").is_empty());
    }

    #[test]
    fn test_extract_stops_at_punctuation() {
        assert_eq!(extract_hashtags("#week1-recap"), vec!["week1"]);
    }

    #[test]
    fn test_extract_ignores_non_ascii_word_chars() {
        assert_eq!(extract_hashtags("#café opening"), vec!["caf"]);
    }
}
