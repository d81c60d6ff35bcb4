// src/ingest/providers/rss.rs
//! RSS feed adapter for the fetch collaborator.
//!
//! Two modes: `Http` fetches `source.url` with reqwest; `Fixture` parses a
//! canned XML document (tests and the demo binary).

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::ingest::normalize_article_text;
use crate::ingest::types::FetchService;
use crate::model::{Article, ContentSource};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub struct RssFetcher {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl RssFetcher {
    /// Parse items from a canned XML document instead of the network.
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn http() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("linkpilot/0.1")
            .connect_timeout(std::time::Duration::from_secs(4))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            mode: Mode::Http { client },
        }
    }

    fn parse_items_from_str(xml: &str, source: &ContentSource) -> anyhow::Result<Vec<Article>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = normalize_article_text(it.title.as_deref().unwrap_or_default());
            let content = normalize_article_text(it.description.as_deref().unwrap_or_default());
            let Some(url) = it.link.filter(|l| !l.trim().is_empty()) else {
                continue;
            };
            if title.is_empty() && content.is_empty() {
                continue;
            }

            out.push(Article {
                title,
                url: url.trim().to_string(),
                content,
                author: it.author.map(|a| normalize_article_text(&a)),
                published_at: it
                    .pub_date
                    .as_deref()
                    .and_then(parse_rfc2822)
                    .unwrap_or_else(Utc::now),
                source_id: source.id,
                source_name: source.name.clone(),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("triage_fetch_parse_ms").record(ms);
        Ok(out)
    }
}

#[async_trait]
impl FetchService for RssFetcher {
    async fn fetch(&self, source: &ContentSource) -> Result<Vec<Article>> {
        let xml = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { client } => {
                let resp = client.get(&source.url).send().await.map_err(|e| {
                    counter!("triage_fetch_errors_total").increment(1);
                    PipelineError::fetch(&source.name, e)
                })?;
                if !resp.status().is_success() {
                    counter!("triage_fetch_errors_total").increment(1);
                    return Err(PipelineError::fetch(
                        &source.name,
                        format!("http status {}", resp.status()),
                    ));
                }
                resp.text()
                    .await
                    .map_err(|e| PipelineError::fetch(&source.name, e))?
            }
        };

        Self::parse_items_from_str(&xml, source).map_err(|e| {
            counter!("triage_fetch_errors_total").increment(1);
            PipelineError::fetch(&source.name, e)
        })
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;

    fn source() -> ContentSource {
        ContentSource {
            id: 7,
            user_id: 1,
            name: "Tech Feed".into(),
            url: "https://example.com/rss".into(),
            kind: SourceKind::RssFeed,
            check_interval_hours: 6,
            is_active: true,
            filters: None,
            items_found: 0,
            items_processed: 0,
            consecutive_failures: 0,
            last_checked_at: None,
        }
    }

    const XML: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Tech Feed</title>
  <item>
    <title>Rust 2.0 &ndash; what&rsquo;s next</title>
    <link>https://example.com/rust-2</link>
    <pubDate>Mon, 02 Jun 2025 08:00:00 GMT</pubDate>
    <description>&lt;p&gt;The roadmap ahead.&lt;/p&gt;</description>
  </item>
  <item>
    <title>No link, skipped</title>
    <pubDate>Mon, 02 Jun 2025 09:00:00 GMT</pubDate>
    <description>orphan</description>
  </item>
</channel></rss>"#;

    #[tokio::test]
    async fn fixture_parse_maps_fields() {
        let fetcher = RssFetcher::from_fixture_str(XML);
        let src = source();
        let articles = fetcher.fetch(&src).await.unwrap();
        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.url, "https://example.com/rust-2");
        assert_eq!(a.content, "The roadmap ahead.");
        assert_eq!(a.source_id, 7);
        assert_eq!(a.source_name, "Tech Feed");
        assert_eq!(
            a.published_at,
            DateTime::parse_from_rfc2822("Mon, 02 Jun 2025 08:00:00 GMT")
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[tokio::test]
    async fn malformed_xml_is_a_fetch_error() {
        let fetcher = RssFetcher::from_fixture_str("<rss><channel><item></rss>");
        let err = fetcher.fetch(&source()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
    }
}
