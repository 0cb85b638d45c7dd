//! Reddit hot-post fetcher. Reddit rejects requests without a UA header.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::types::{sanitize_text, ContentItem, MAX_AUTHOR_LEN, MAX_EXCERPT_LEN, MAX_TITLE_LEN};
use super::RedditSource;

const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
const DEFAULT_USER_AGENT: &str = "coinsage/0.3 (market-intel fetcher)";
const DEFAULT_LIMIT: usize = 40;

pub struct RedditProvider {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Deserialize)]
struct Child {
    data: Post,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Post {
    id: String,
    subreddit: String,
    title: String,
    selftext: String,
    author: String,
    created_utc: f64,
    permalink: String,
    url: String,
    score: f64,
    num_comments: f64,
}

impl RedditProvider {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .context("build reddit http client")?;
        Ok(RedditProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }
}

#[async_trait]
impl RedditSource for RedditProvider {
    async fn fetch_hot(&self, subreddit: &str, limit: usize) -> Result<Vec<ContentItem>> {
        let subreddit = subreddit.trim();
        if subreddit.is_empty() {
            return Err(anyhow!("subreddit is required"));
        }
        let limit = match limit {
            0 => DEFAULT_LIMIT,
            n => n.min(100),
        };

        let url = format!("{}/r/{}/hot.json?limit={}", self.base_url, subreddit, limit);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("reddit API error {}: {}", status, body));
        }

        let listing: Listing = response.json().await.context("decode reddit response")?;
        let mut items = Vec::with_capacity(listing.data.children.len());
        for child in listing.data.children {
            let post = child.data;
            if post.id.trim().is_empty() || post.title.trim().is_empty() {
                continue;
            }
            let published_at = DateTime::from_timestamp(post.created_utc as i64, 0)
                .unwrap_or(DateTime::UNIX_EPOCH);
            let permalink = post.permalink.trim();
            let item_url = if permalink.is_empty() {
                post.url.trim().to_string()
            } else {
                format!("{}{}", self.base_url, permalink)
            };

            items.push(ContentItem {
                source: "reddit".to_string(),
                source_item_id: post.id.clone(),
                title: sanitize_text(&post.title, MAX_TITLE_LEN),
                url: item_url,
                excerpt: sanitize_text(&post.selftext, MAX_EXCERPT_LEN),
                author: sanitize_text(&post.author, MAX_AUTHOR_LEN),
                published_at,
                metadata: json!({
                    "subreddit": post.subreddit.trim(),
                    "score": post.score,
                    "num_comments": post.num_comments,
                }),
            });
        }
        Ok(items)
    }
}
