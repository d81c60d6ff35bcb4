// src/dedup.rs
//! Duplicate suppression: URL normalization, content hashing, similarity.
//!
//! The in-memory URL/hash sets are a per-process fast path only; the store's
//! unique URL constraint is the globally authoritative duplicate guard.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use url::Url;

/// Similarity at or above this ratio flags two contents as duplicates.
pub const SIMILARITY_THRESHOLD: f64 = 0.85;

/// How many recent contents are retained for near-duplicate comparison.
const RECENT_CONTENT_CAP: usize = 200;

/// Query parameters that never change the identity of a page.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "ref", "source", "campaign", "mc_cid", "mc_eid", "igshid",
    "_hsenc", "_hsmi", "mkt_tok", "yclid",
];

/// Common English words excluded from content hashes so cosmetic edits
/// (articles, conjunctions) do not defeat exact duplicate detection.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "had", "has", "have",
    "he", "her", "his", "i", "if", "in", "into", "is", "it", "its", "my", "no", "not", "of", "on",
    "or", "our", "she", "so", "than", "that", "the", "their", "then", "there", "these", "they",
    "this", "to", "was", "we", "were", "what", "when", "which", "who", "will", "with", "you",
    "your",
];

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}

/// Canonical form of a URL: no fragment, no tracking parameters, remaining
/// query parameters sorted, no trailing slash. Idempotent.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        // Not a URL we can parse; the best we can do is trim the slash.
        return trimmed.trim_end_matches('/').to_string();
    };

    parsed.set_fragment(None);

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        parsed.set_query(None);
    } else {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        parsed.set_query(Some(&query));
    }

    let mut out = parsed.to_string();
    while out.ends_with('/') {
        out.pop();
    }
    out
}

/// Lowercased alphanumeric tokens of `content` with stopwords removed.
fn filtered_tokens(content: &str) -> Vec<String> {
    content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Short anonymized hash (12 hex chars) for sentence fingerprints and log ids.
fn short_hash(input: &str) -> String {
    sha256_hex(input)[..12].to_string()
}

/// SHA-256 over the stopword-filtered token sequence. Pure function of the
/// filtered tokens, so punctuation and casing differences do not matter.
pub fn content_hash(content: &str) -> String {
    sha256_hex(&filtered_tokens(content).join(" "))
}

/// Normalized sequence-similarity ratio in [0,1].
pub fn content_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

pub fn is_similar_content(a: &str, b: &str) -> bool {
    content_similarity(a, b) >= SIMILARITY_THRESHOLD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthBucket {
    Short,
    Medium,
    Long,
    VeryLong,
}

impl LengthBucket {
    fn for_chars(chars: usize) -> Self {
        if chars < 500 {
            LengthBucket::Short
        } else if chars < 2_000 {
            LengthBucket::Medium
        } else if chars < 5_000 {
            LengthBucket::Long
        } else {
            LengthBucket::VeryLong
        }
    }
}

/// Cheap pre-filter summary used before a full similarity comparison.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ContentFingerprint {
    pub word_count: usize,
    pub char_count: usize,
    pub content_hash: String,
    /// Top-5 most frequent word 3-grams, ties broken lexicographically.
    pub top_trigrams: Vec<String>,
    pub first_sentence_hash: String,
    pub last_sentence_hash: String,
    pub length_bucket: LengthBucket,
}

impl ContentFingerprint {
    /// Fast "could these possibly be duplicates" check. A shared sentence
    /// hash or trigram overlap within the same length bucket warrants a full
    /// similarity comparison.
    pub fn may_match(&self, other: &ContentFingerprint) -> bool {
        if self.content_hash == other.content_hash {
            return true;
        }
        if self.length_bucket != other.length_bucket {
            return false;
        }
        if self.first_sentence_hash == other.first_sentence_hash
            || self.last_sentence_hash == other.last_sentence_hash
        {
            return true;
        }
        self.top_trigrams
            .iter()
            .any(|t| other.top_trigrams.contains(t))
    }
}

pub fn content_fingerprint(content: &str) -> ContentFingerprint {
    let tokens = filtered_tokens(content);

    let mut trigram_counts: HashMap<String, usize> = HashMap::new();
    for win in tokens.windows(3) {
        *trigram_counts.entry(win.join(" ")).or_insert(0) += 1;
    }
    let mut trigrams: Vec<(String, usize)> = trigram_counts.into_iter().collect();
    trigrams.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let top_trigrams = trigrams.into_iter().take(5).map(|(t, _)| t).collect();

    let sentences: Vec<&str> = content
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let first = sentences.first().copied().unwrap_or_default();
    let last = sentences.last().copied().unwrap_or_default();

    ContentFingerprint {
        word_count: content.split_whitespace().count(),
        char_count: content.chars().count(),
        content_hash: content_hash(content),
        top_trigrams,
        first_sentence_hash: short_hash(first),
        last_sentence_hash: short_hash(last),
        length_bucket: LengthBucket::for_chars(content.chars().count()),
    }
}

/// Process-local duplicate tracker for one pipeline run (or one worker).
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen_urls: HashSet<String>,
    seen_hashes: HashSet<String>,
    recent: Vec<(ContentFingerprint, String)>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_duplicate_url(&self, url: &str) -> bool {
        self.seen_urls.contains(&normalize_url(url))
    }

    pub fn add_url(&mut self, url: &str) {
        self.seen_urls.insert(normalize_url(url));
    }

    /// Returns true if the URL was already seen; records it either way.
    pub fn check_and_add_url(&mut self, url: &str) -> bool {
        !self.seen_urls.insert(normalize_url(url))
    }

    /// Exact (hash) or near (fingerprint pre-filter + similarity ratio)
    /// duplicate detection against content seen earlier in this run.
    pub fn is_duplicate_content(&self, content: &str) -> bool {
        let hash = content_hash(content);
        if self.seen_hashes.contains(&hash) {
            return true;
        }
        let fp = content_fingerprint(content);
        self.recent
            .iter()
            .filter(|(seen_fp, _)| fp.may_match(seen_fp))
            .any(|(_, seen)| is_similar_content(content, seen))
    }

    pub fn add_content(&mut self, content: &str) {
        self.seen_hashes.insert(content_hash(content));
        if self.recent.len() >= RECENT_CONTENT_CAP {
            self.recent.remove(0);
        }
        self.recent
            .push((content_fingerprint(content), content.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_tracking_and_fragment() {
        let a = normalize_url(
            "https://Example.com/post/42?utm_source=feed&utm_medium=rss&fbclid=xyz#section",
        );
        assert_eq!(a, "https://example.com/post/42");
    }

    #[test]
    fn normalize_sorts_surviving_params() {
        let a = normalize_url("https://example.com/a?b=2&a=1");
        let b = normalize_url("https://example.com/a?a=1&b=2");
        assert_eq!(a, b);
        assert!(a.contains("a=1&b=2"));
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "https://example.com/x/?utm_campaign=z&q=1#frag",
            "https://example.com",
            "not a url at all/",
        ] {
            let once = normalize_url(raw);
            assert_eq!(normalize_url(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn trailing_slash_variants_collide() {
        assert_eq!(
            normalize_url("https://example.com/post/"),
            normalize_url("https://example.com/post")
        );
    }

    #[test]
    fn content_hash_ignores_stopwords_and_case() {
        let a = content_hash("The quick brown fox jumps over the lazy dog");
        let b = content_hash("Quick brown FOX jumps over lazy dog!");
        assert_eq!(a, b);
        assert_ne!(a, content_hash("An entirely different sentence"));
    }

    #[test]
    fn content_hash_is_deterministic() {
        let text = "Rust makes systems programming approachable.";
        assert_eq!(content_hash(text), content_hash(text));
    }

    #[test]
    fn similarity_flags_near_duplicates() {
        let a = "LinkedIn engagement is driven by consistency and timing of posts.";
        let b = "LinkedIn engagement is driven by consistency and timing of post.";
        assert!(is_similar_content(a, b));
        assert!(!is_similar_content(a, "Completely unrelated content here."));
    }

    #[test]
    fn fingerprint_buckets_and_trigrams() {
        let short = content_fingerprint("Tiny note.");
        assert_eq!(short.length_bucket, LengthBucket::Short);

        let body = "rust async runtimes power servers. rust async runtimes power pipelines. \
                    rust async runtimes power tools."
            .to_string();
        let fp = content_fingerprint(&body);
        assert!(fp.top_trigrams.len() <= 5);
        assert!(fp
            .top_trigrams
            .iter()
            .any(|t| t.contains("rust async runtimes")));
        assert_eq!(fp.word_count, body.split_whitespace().count());
    }

    #[test]
    fn dedup_tracks_urls_across_tracking_params() {
        let mut d = Deduplicator::new();
        assert!(!d.check_and_add_url("https://example.com/a?utm_source=x"));
        assert!(d.is_duplicate_url("https://example.com/a?utm_medium=y"));
        assert!(d.check_and_add_url("https://example.com/a"));
    }

    #[test]
    fn dedup_catches_exact_and_near_content() {
        let mut d = Deduplicator::new();
        let a = "Shipping a side project teaches more than a dozen tutorials ever will.";
        d.add_content(a);
        assert!(d.is_duplicate_content(a));
        // One-word edit stays above the 0.85 ratio.
        let b = "Shipping a side project teaches more than a dozen tutorials ever would.";
        assert!(d.is_duplicate_content(b));
        assert!(!d.is_duplicate_content("Fresh take on a different topic entirely."));
    }
}
