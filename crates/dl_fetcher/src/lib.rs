pub mod fetcher;
pub mod sources;

pub use fetcher::{filter_recent, filter_recent_at, ContentFetcher};
pub use sources::perplexity::{parse_search_response, PerplexitySource};
pub use sources::rss::RssSource;
pub use sources::ArticleSource;

pub mod prelude {
    pub use super::fetcher::{filter_recent, ContentFetcher};
    pub use super::sources::ArticleSource;
    pub use dl_core::{Article, Error, Result};
}
