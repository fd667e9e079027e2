use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

const MAX_SLUG_CHARS: usize = 120;

static NON_WORD: OnceLock<Regex> = OnceLock::new();

/// Hex-encoded SHA-256 of `text`. Used for post content hashes and image prompt keys.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lowercased, dash-separated slug capped at 120 characters.
///
/// Non-ASCII letters are kept as-is so CJK titles still produce a usable slug.
pub fn make_slug(text: &str) -> String {
    let re = NON_WORD.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("slug pattern is valid"));
    let lowered = text.to_lowercase();
    let dashed = re.replace_all(&lowered, "-");
    let trimmed = dashed.trim_matches('-');

    let slug: String = trimmed.chars().take(MAX_SLUG_CHARS).collect();
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_distinct() {
        let prompt = "Cover illustration for: Best ramen in Taipei";
        assert_eq!(hash_text(prompt), hash_text(prompt));
        assert_ne!(hash_text(prompt), hash_text("something else"));
        assert_eq!(hash_text(prompt).len(), 64);
    }

    #[test]
    fn hash_matches_known_digest() {
        assert_eq!(
            hash_text("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn slug_collapses_punctuation() {
        assert_eq!(make_slug("  Hello, World! Rust 2024  "), "hello-world-rust-2024");
        assert_eq!(make_slug("台北 美食 -- 推薦"), "台北-美食-推薦");
        assert_eq!(make_slug("!!!"), "");
    }

    #[test]
    fn slug_is_truncated() {
        let long = "word ".repeat(60);
        let slug = make_slug(&long);
        assert!(slug.chars().count() <= MAX_SLUG_CHARS);
        assert!(!slug.ends_with('-'));
    }
}
