use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use dl_core::storage::{DatabaseApi, DatabaseInfo, Page, PageQuery, QueryPage};
use dl_core::{Config, Error, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::mapping::definition_type;

pub const NOTION_VERSION: &str = "2022-06-28";
pub const NOTION_TIMEOUT: Duration = Duration::from_secs(60);
const QUERY_PAGE_SIZE: u32 = 100;

#[derive(Deserialize)]
struct TitleSegment {
    #[serde(default)]
    plain_text: Option<String>,
    #[serde(default)]
    text: Option<TextContent>,
}

#[derive(Deserialize)]
struct TextContent {
    content: String,
}

#[derive(Deserialize)]
struct DatabaseResponse {
    #[serde(default)]
    title: Vec<TitleSegment>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Deserialize)]
struct CreatedPage {
    id: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Page>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Notion REST backend bound to one database.
pub struct NotionDatabase {
    client: Client,
    token: String,
    database_id: String,
    base_url: String,
}

impl NotionDatabase {
    pub fn new(token: &str, database_id: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(NOTION_TIMEOUT).build()?;
        Ok(Self {
            client,
            token: token.to_string(),
            database_id: database_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.notion_token, &config.notion_database_id, &config.notion_base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send<R: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<R> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                provider: "notion",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json::<R>().await?)
    }
}

impl fmt::Debug for NotionDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionDatabase")
            .field("client", &"<reqwest::Client>")
            .field("token", &"<redacted>")
            .field("database_id", &self.database_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl DatabaseApi for NotionDatabase {
    fn name(&self) -> &str {
        "notion"
    }

    async fn retrieve_database(&self) -> Result<DatabaseInfo> {
        let path = format!("/databases/{}", self.database_id);
        let response: DatabaseResponse = self.send(self.request(Method::GET, &path)).await?;

        let title: String = response
            .title
            .into_iter()
            .filter_map(|segment| segment.plain_text.or(segment.text.map(|text| text.content)))
            .collect();
        let schema = response
            .properties
            .iter()
            .filter_map(|(name, definition)| Some((name.clone(), definition_type(definition)?)))
            .collect();

        Ok(DatabaseInfo {
            title: if title.is_empty() { "Untitled".to_string() } else { title },
            schema,
        })
    }

    async fn update_properties(&self, properties: &Map<String, Value>) -> Result<()> {
        let path = format!("/databases/{}", self.database_id);
        let body = json!({ "properties": properties });
        let _: Value = self.send(self.request(Method::PATCH, &path).json(&body)).await?;
        Ok(())
    }

    async fn create_page(&self, properties: &Map<String, Value>) -> Result<String> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": properties,
        });
        let page: CreatedPage = self.send(self.request(Method::POST, "/pages").json(&body)).await?;
        debug!(page_id = %page.id, "created page");
        Ok(page.id)
    }

    async fn query(&self, query: &PageQuery) -> Result<QueryPage> {
        let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
        if let Some(filter) = &query.date_after {
            body["filter"] = json!({
                "property": filter.property,
                "date": { "after": filter.after.to_rfc3339() },
            });
        }
        if let Some(property) = &query.sort_descending_by {
            body["sorts"] = json!([{ "property": property, "direction": "descending" }]);
        }
        if let Some(cursor) = &query.start_cursor {
            body["start_cursor"] = json!(cursor);
        }

        let path = format!("/databases/{}/query", self.database_id);
        let response: QueryResponse = self.send(self.request(Method::POST, &path).json(&body)).await?;
        Ok(QueryPage {
            results: response.results,
            next_cursor: response.next_cursor.filter(|_| response.has_more),
        })
    }

    async fn update_page(&self, page_id: &str, properties: &Map<String, Value>) -> Result<()> {
        let path = format!("/pages/{}", page_id);
        let body = json!({ "properties": properties });
        let _: Value = self.send(self.request(Method::PATCH, &path).json(&body)).await?;
        Ok(())
    }
}
