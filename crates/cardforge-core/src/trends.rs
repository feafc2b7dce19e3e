//! Trending-topic discovery.
//!
//! Pulls the Google Trends daily RSS feed for the configured geo and
//! extracts the item titles. Any failure — network, non-2xx, no items —
//! falls back to a static curated list so the topic picker always has
//! something to show.

use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::warn;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Fallback shown when the feed is unreachable.
const FALLBACK_TOPICS: &[&str] = &[
    "Bitcoin all-time high",
    "Housing market outlook",
    "AI automation trends",
    "Morning routine habits",
    "Investing for beginners",
    "Nasdaq index today",
    "Healthy meal planning",
    "Spring travel destinations",
    "Trending cafe tours",
    "New streaming releases",
    "Latest smartphone tech",
    "EV market forecast",
];

/// Where a trend list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendOrigin {
    Rss,
    Fallback,
}

impl TrendOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendOrigin::Rss => "google_trends_rss",
            TrendOrigin::Fallback => "popular_topics_fallback",
        }
    }
}

pub struct TrendSource {
    client: Client,
    geo: String,
    max_items: usize,
}

impl TrendSource {
    pub fn new(client: Client, geo: &str, max_items: usize) -> Self {
        Self {
            client,
            geo: geo.to_string(),
            max_items,
        }
    }

    /// Ranked topic strings plus their origin. Never fails.
    pub async fn fetch(&self) -> (Vec<String>, TrendOrigin) {
        match self.fetch_rss().await {
            Ok(trends) if !trends.is_empty() => (trends, TrendOrigin::Rss),
            Ok(_) => {
                warn!("Trends feed returned no items, using fallback list");
                (self.fallback(), TrendOrigin::Fallback)
            }
            Err(e) => {
                warn!(error = %e, "Trends feed failed, using fallback list");
                (self.fallback(), TrendOrigin::Fallback)
            }
        }
    }

    async fn fetch_rss(&self) -> anyhow::Result<Vec<String>> {
        let url = format!(
            "https://trends.google.com/trends/trendingsearches/daily/rss?geo={}",
            self.geo
        );
        let response = self.client.get(&url).timeout(TIMEOUT).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("trends feed returned HTTP {}", response.status());
        }
        let body = response.text().await?;
        Ok(parse_item_titles(&body, self.max_items))
    }

    fn fallback(&self) -> Vec<String> {
        FALLBACK_TOPICS
            .iter()
            .take(self.max_items)
            .map(|t| t.to_string())
            .collect()
    }
}

/// Extract `<item><title>` texts from an RSS document. The lenient HTML
/// parser is good enough here: RSS tags nest cleanly and we only need
/// the title text, not feed semantics.
fn parse_item_titles(feed: &str, max_items: usize) -> Vec<String> {
    let document = Html::parse_document(feed);
    let Ok(selector) = Selector::parse("item > title") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|el| {
            el.text()
                .collect::<Vec<_>>()
                .join("")
                .trim()
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .take(max_items)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0"><channel>
            <title>Daily Search Trends</title>
            <item><title>solar eclipse</title><approx_traffic>500,000+</approx_traffic></item>
            <item><title>market rally</title></item>
            <item><title>  padded topic  </title></item>
        </channel></rss>"#;

    #[test]
    fn parses_item_titles_and_skips_channel_title() {
        let titles = parse_item_titles(SAMPLE_FEED, 15);
        assert_eq!(
            titles,
            vec!["solar eclipse", "market rally", "padded topic"]
        );
    }

    #[test]
    fn respects_max_items() {
        let titles = parse_item_titles(SAMPLE_FEED, 2);
        assert_eq!(titles.len(), 2);
    }

    #[test]
    fn garbage_feed_yields_nothing() {
        assert!(parse_item_titles("definitely not xml", 15).is_empty());
    }

    #[test]
    fn fallback_list_is_bounded() {
        let source = TrendSource::new(Client::new(), "US", 5);
        let fallback = source.fallback();
        assert_eq!(fallback.len(), 5);
        assert_eq!(fallback[0], "Bitcoin all-time high");
    }
}
