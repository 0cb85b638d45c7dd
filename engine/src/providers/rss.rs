//! RSS 2.0 news feed fetcher.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rss::Channel;
use serde_json::json;
use sha1::{Digest, Sha1};
use std::fmt::Write;
use std::time::Duration;

use super::types::{
    html_strip, sanitize_text, ContentItem, MAX_AUTHOR_LEN, MAX_EXCERPT_LEN, MAX_TITLE_LEN,
};
use super::NewsSource;

pub struct RssProvider {
    client: reqwest::Client,
}

impl RssProvider {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .context("build rss http client")?;
        Ok(RssProvider { client })
    }
}

#[async_trait]
impl NewsSource for RssProvider {
    async fn fetch_feed(&self, feed_url: &str, max_items: usize) -> Result<Vec<ContentItem>> {
        let feed_url = feed_url.trim();
        if feed_url.is_empty() {
            return Err(anyhow!("feed url is required"));
        }
        let max_items = if max_items == 0 { 40 } else { max_items };

        let response = self
            .client
            .get(feed_url)
            .header("Accept", "application/rss+xml, application/xml, text/xml")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("rss fetch error {}: {}", status, body));
        }

        let body = response.bytes().await?;
        let channel = Channel::read_from(&body[..]).context("decode rss payload")?;
        Ok(channel_items(&channel, feed_url, max_items))
    }
}

fn channel_items(channel: &Channel, feed_url: &str, max_items: usize) -> Vec<ContentItem> {
    let channel_title = sanitize_text(channel.title(), MAX_AUTHOR_LEN);
    let mut items = Vec::with_capacity(max_items.min(channel.items().len()));

    for item in channel.items().iter().take(max_items) {
        let title = sanitize_text(item.title().unwrap_or_default(), MAX_TITLE_LEN);
        if title.is_empty() {
            continue;
        }
        let published_at = item
            .pub_date()
            .map(parse_feed_date)
            .unwrap_or_else(Utc::now);

        let mut author = sanitize_text(item.author().unwrap_or_default(), MAX_AUTHOR_LEN);
        if author.is_empty() {
            if let Some(dc) = item.dublin_core_ext() {
                author = sanitize_text(
                    dc.creators().first().map(String::as_str).unwrap_or_default(),
                    MAX_AUTHOR_LEN,
                );
            }
        }

        let link = sanitize_text(item.link().unwrap_or_default(), 500);
        let mut source_item_id = sanitize_text(
            item.guid().map(|g| g.value()).unwrap_or_default(),
            250,
        );
        if source_item_id.is_empty() {
            source_item_id = sanitize_text(&link, 250);
        }
        if source_item_id.is_empty() {
            source_item_id = synthetic_item_id(&title, published_at);
        }

        items.push(ContentItem {
            source: "news".to_string(),
            source_item_id,
            title,
            url: link,
            excerpt: sanitize_text(
                &html_strip(item.description().unwrap_or_default()),
                MAX_EXCERPT_LEN,
            ),
            author,
            published_at,
            metadata: json!({
                "feed_url": feed_url,
                "channel": channel_title,
            }),
        });
    }
    items
}

/// Items with neither guid nor link get a stable id from hashing the title
/// and publish time.
fn synthetic_item_id(title: &str, published_at: DateTime<Utc>) -> String {
    let digest = Sha1::digest(
        format!(
            "{}|{}",
            title,
            published_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )
        .as_bytes(),
    );
    digest.iter().fold(String::with_capacity(40), |mut out, byte| {
        let _ = write!(out, "{:02x}", byte);
        out
    })
}

fn parse_feed_date(raw: &str) -> DateTime<Utc> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Crypto Wire</title>
    <item>
      <title>Bitcoin   breaks out
      above resistance</title>
      <link>https://example.com/btc</link>
      <guid>wire-1</guid>
      <description>&lt;p&gt;A &lt;b&gt;big&lt;/b&gt; move&lt;/p&gt;</description>
      <pubDate>Sat, 01 Aug 2026 10:30:00 +0000</pubDate>
      <author>desk@example.com</author>
    </item>
    <item>
      <title></title>
      <link>https://example.com/skip</link>
    </item>
    <item>
      <title>ETH update</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_channel_items_normalization() {
        let channel = Channel::read_from(FEED.as_bytes()).unwrap();
        let items = channel_items(&channel, "https://example.com/rss", 40);
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.source, "news");
        assert_eq!(first.source_item_id, "wire-1");
        assert_eq!(first.title, "Bitcoin breaks out above resistance");
        assert_eq!(first.excerpt, "A big move");
        assert_eq!(first.author, "desk@example.com");
        assert_eq!(first.published_at.to_rfc3339(), "2026-08-01T10:30:00+00:00");
        assert_eq!(first.metadata["channel"], "Crypto Wire");

        // No guid or link: a synthetic id is derived by hashing title + date.
        let second = &items[1];
        assert_eq!(
            second.source_item_id,
            synthetic_item_id("ETH update", second.published_at)
        );
        assert_eq!(second.source_item_id.len(), 40);
        assert!(second
            .source_item_id
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_channel_items_respects_max() {
        let channel = Channel::read_from(FEED.as_bytes()).unwrap();
        let items = channel_items(&channel, "https://example.com/rss", 1);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_parse_feed_date_formats() {
        let rfc2822 = parse_feed_date("Sat, 01 Aug 2026 10:30:00 +0000");
        assert_eq!(rfc2822.to_rfc3339(), "2026-08-01T10:30:00+00:00");
        let rfc3339 = parse_feed_date("2026-08-01T10:30:00Z");
        assert_eq!(rfc3339, rfc2822);
    }
}
