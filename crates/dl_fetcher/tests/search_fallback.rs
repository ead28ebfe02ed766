use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dl_core::{Pacing, RateLimiter};
use dl_fetcher::{ContentFetcher, PerplexitySource, RssSource};
use dl_inference::OpenAiChatModel;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Fallback Feed</title>
    <link>http://example.com/</link>
    <description>d</description>
    <item>
      <title>From the feed</title>
      <link>http://example.com/feed-item</link>
      <description>Feed body</description>
    </item>
  </channel>
</rss>"#;

fn search_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

#[tokio::test]
async fn search_errors_and_empty_answers_fall_back_to_feeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("about rust"))
        .respond_with(search_reply(
            "**Title:** Async in depth\n**URL:** https://example.com/async\n**Summary:** Futures explained.\n**Source:** Rust Blog",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("about databases"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("about compilers"))
        .respond_with(search_reply("Nothing recent, sorry."))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&server)
        .await;

    let model = OpenAiChatModel::new(
        "perplexity",
        "pplx-test",
        "sonar",
        &server.uri(),
        Duration::from_secs(5),
    )
    .unwrap();
    let primary = PerplexitySource::new(Arc::new(model), 60).with_rate_limiter(RateLimiter::unlimited());

    let feed_url = format!("{}/feed", server.uri());
    let feeds = HashMap::from([
        ("databases".to_string(), vec![feed_url.clone()]),
        ("compilers".to_string(), vec![feed_url]),
    ]);
    let fallback = RssSource::with_feeds(feeds).unwrap();

    let fetcher = ContentFetcher::new(Some(Box::new(primary)), Box::new(fallback)).with_pacing(Pacing::none());
    let topics = vec!["rust".to_string(), "databases".to_string(), "compilers".to_string()];
    let articles = fetcher.fetch_content(&topics, 3).await;

    let summary: Vec<_> = articles
        .iter()
        .map(|a| (a.topic.as_str(), a.source.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("rust", "Rust Blog"),
            ("databases", "Fallback Feed"),
            ("compilers", "Fallback Feed"),
        ]
    );
    assert_eq!(articles[0].title, "Async in depth");
    assert_eq!(articles[1].published_at, None);
}
