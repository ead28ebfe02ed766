use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dl_core::{Article, Result};
use scraper::Html;

pub mod perplexity;
pub mod rss;

#[async_trait]
pub trait ArticleSource: Send + Sync + fmt::Debug {
    /// Returns the name of the source, used in logs
    fn name(&self) -> &str;

    /// Returns up to `max_articles` candidate articles for the topic
    async fn fetch(&self, topic: &str, max_articles: usize) -> Result<Vec<Article>>;
}

/// Common utilities for sources
pub(crate) mod utils {
    use super::*;

    /// Visible text of an HTML fragment with whitespace collapsed.
    pub fn html_to_text(html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// RFC 3339, RFC 2822, `YYYY-MM-DD` or `Month D, YYYY`.
    pub fn parse_published(value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y"]
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::utils;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_html_to_text() {
        let text = utils::html_to_text("<p>Hello <b>rusty</b>\n   world</p><img src=\"x.png\">");
        assert_eq!(text, "Hello rusty world");
        assert_eq!(utils::html_to_text("plain text"), "plain text");
    }

    #[test]
    fn test_parse_published_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 10, 21, 0, 0, 0).unwrap();
        assert_eq!(utils::parse_published("2024-10-21"), Some(expected));
        assert_eq!(utils::parse_published("October 21, 2024"), Some(expected));
        assert_eq!(utils::parse_published("2024-10-21T00:00:00Z"), Some(expected));
        assert_eq!(
            utils::parse_published("Mon, 21 Oct 2024 07:28:00 GMT"),
            Some(Utc.with_ymd_and_hms(2024, 10, 21, 7, 28, 0).unwrap())
        );
        assert_eq!(utils::parse_published("recently"), None);
    }
}
