// src/ingest/mod.rs
pub mod filter;
pub mod providers;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("triage_articles_fetched_total", "Articles fetched from sources.");
        describe_counter!(
            "triage_articles_deduped_total",
            "Articles dropped as URL/content duplicates."
        );
        describe_counter!(
            "triage_articles_rejected_total",
            "Articles rejected by the keyword filter."
        );
        describe_counter!(
            "triage_articles_scored_total",
            "Articles that passed the relevance gate."
        );
        describe_counter!(
            "triage_articles_persisted_total",
            "Content items saved to the store."
        );
        describe_counter!("triage_fetch_errors_total", "Source fetch/parse errors.");
        describe_counter!("triage_oracle_errors_total", "Relevance oracle call failures.");
        describe_histogram!("triage_fetch_parse_ms", "Provider parse time in milliseconds.");
        describe_gauge!(
            "triage_pipeline_last_run_ts",
            "Unix ts when the triage pipeline last ran."
        );
    });
}

/// Normalize fetched article text: decode entities, strip tags, normalize
/// quotes, collapse whitespace. Articles keep their full length; truncation
/// for the oracle happens at the relevance stage.
pub fn normalize_article_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_decodes_and_strips_tags() {
        let s = "<p>Hello&nbsp;&amp; welcome to <b>Rust</b></p>";
        assert_eq!(normalize_article_text(s), "Hello & welcome to Rust");
    }

    #[test]
    fn normalize_collapses_whitespace_and_quotes() {
        let s = "  “Quoted”   text\n\twith   gaps ";
        assert_eq!(normalize_article_text(s), "\"Quoted\" text with gaps");
    }
}
