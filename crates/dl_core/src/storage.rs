use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Declared type of a database property, as reported by the schema endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Title,
    RichText,
    Url,
    Date,
    Select,
    MultiSelect,
    Status,
    Other(String),
}

impl PropertyType {
    pub fn from_api(name: &str) -> Self {
        match name {
            "title" => Self::Title,
            "rich_text" => Self::RichText,
            "url" => Self::Url,
            "date" => Self::Date,
            "select" => Self::Select,
            "multi_select" => Self::MultiSelect,
            "status" => Self::Status,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Title => "title",
            Self::RichText => "rich_text",
            Self::Url => "url",
            Self::Date => "date",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Status => "status",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Property name to declared type.
pub type Schema = BTreeMap<String, PropertyType>;

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseInfo {
    pub title: String,
    pub schema: Schema,
}

/// A stored row. Property values keep the database's own JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateFilter {
    pub property: String,
    pub after: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageQuery {
    pub date_after: Option<DateFilter>,
    pub sort_descending_by: Option<String>,
    pub start_cursor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub results: Vec<Page>,
    pub next_cursor: Option<String>,
}

/// Raw operations against one structured database.
#[async_trait]
pub trait DatabaseApi: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn retrieve_database(&self) -> Result<DatabaseInfo>;

    /// Add or update property definitions on the database.
    async fn update_properties(&self, properties: &Map<String, Value>) -> Result<()>;

    /// Create a row and return its id.
    async fn create_page(&self, properties: &Map<String, Value>) -> Result<String>;

    async fn query(&self, query: &PageQuery) -> Result<QueryPage>;

    async fn update_page(&self, page_id: &str, properties: &Map<String, Value>) -> Result<()>;
}
