use async_trait::async_trait;
use dl_core::storage::{DatabaseApi, DatabaseInfo, Page, PageQuery, PropertyType, QueryPage, Schema};
use dl_core::{Error, Result};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::mapping::{date_start, definition_type};

const DEFAULT_PAGE_SIZE: usize = 100;

pub struct MemoryStore {
    title: String,
    schema: Schema,
    pages: Vec<Page>,
}

impl MemoryStore {
    pub fn new(title: String, schema: Schema) -> Self {
        Self {
            title,
            schema,
            pages: Vec::new(),
        }
    }

    /// Rejects properties the schema does not declare, or values whose
    /// shape does not match the declared type.
    fn check_properties(&self, properties: &Map<String, Value>) -> Result<()> {
        for (name, value) in properties {
            let declared = self
                .schema
                .get(name)
                .ok_or_else(|| Error::Database(format!("{} is not a property that exists", name)))?;
            if value.get(declared.as_str()).is_none() {
                return Err(Error::Database(format!(
                    "{} is expected to be {}",
                    name, declared
                )));
            }
        }
        Ok(())
    }

    fn create_page(&mut self, properties: &Map<String, Value>) -> Result<String> {
        self.check_properties(properties)?;
        let id = Uuid::new_v4().to_string();
        self.pages.push(Page {
            id: id.clone(),
            properties: properties.clone(),
        });
        Ok(id)
    }

    fn update_page(&mut self, page_id: &str, properties: &Map<String, Value>) -> Result<()> {
        self.check_properties(properties)?;
        let page = self
            .pages
            .iter_mut()
            .find(|page| page.id == page_id)
            .ok_or_else(|| Error::Database(format!("page {} not found", page_id)))?;
        for (name, value) in properties {
            page.properties.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    fn query(&self, query: &PageQuery, page_size: usize) -> Result<QueryPage> {
        let mut matching: Vec<&Page> = self
            .pages
            .iter()
            .filter(|page| match &query.date_after {
                Some(filter) => page
                    .properties
                    .get(&filter.property)
                    .and_then(date_start)
                    .is_some_and(|at| at > filter.after),
                None => true,
            })
            .collect();

        if let Some(property) = &query.sort_descending_by {
            matching.sort_by_key(|page| std::cmp::Reverse(page.properties.get(property).and_then(date_start)));
        }

        let start = match &query.start_cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| Error::Database(format!("invalid start_cursor {}", cursor)))?,
            None => 0,
        };
        let end = (start + page_size).min(matching.len());
        let results = matching
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|page| (*page).clone())
            .collect();

        Ok(QueryPage {
            results,
            next_cursor: (end < matching.len()).then(|| end.to_string()),
        })
    }
}

/// In-process database with the same validation and paging behaviour as
/// the hosted one. Used for dry runs and tests.
pub struct MemoryDatabase {
    store: RwLock<MemoryStore>,
    page_size: usize,
}

impl MemoryDatabase {
    pub fn new(title: impl Into<String>, schema: Schema) -> Self {
        Self {
            store: RwLock::new(MemoryStore::new(title.into(), schema)),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Database declaring the given `(name, type)` properties.
    pub fn with_properties(title: impl Into<String>, properties: &[(&str, &str)]) -> Self {
        let schema = properties
            .iter()
            .map(|(name, ty)| (name.to_string(), PropertyType::from_api(ty)))
            .collect();
        Self::new(title, schema)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn pages(&self) -> Vec<Page> {
        self.store.read().await.pages.clone()
    }
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DatabaseApi for MemoryDatabase {
    fn name(&self) -> &str {
        "memory"
    }

    async fn retrieve_database(&self) -> Result<DatabaseInfo> {
        let store = self.store.read().await;
        Ok(DatabaseInfo {
            title: store.title.clone(),
            schema: store.schema.clone(),
        })
    }

    async fn update_properties(&self, properties: &Map<String, Value>) -> Result<()> {
        let mut store = self.store.write().await;
        for (name, definition) in properties {
            let ty = definition_type(definition)
                .ok_or_else(|| Error::Database(format!("property {} has no type", name)))?;
            store.schema.insert(name.clone(), ty);
        }
        Ok(())
    }

    async fn create_page(&self, properties: &Map<String, Value>) -> Result<String> {
        self.store.write().await.create_page(properties)
    }

    async fn query(&self, query: &PageQuery) -> Result<QueryPage> {
        self.store.read().await.query(query, self.page_size)
    }

    async fn update_page(&self, page_id: &str, properties: &Map<String, Value>) -> Result<()> {
        self.store.write().await.update_page(page_id, properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use dl_core::storage::DateFilter;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_rejects_unknown_or_mistyped_properties() {
        let db = MemoryDatabase::with_properties("Learning", &[("Title", "title")]);

        let unknown = props(json!({"Topic": {"select": {"name": "AI"}}}));
        assert!(db.create_page(&unknown).await.is_err());

        let mistyped = props(json!({"Title": {"rich_text": []}}));
        assert!(db.create_page(&mistyped).await.is_err());

        let ok = props(json!({"Title": {"title": []}}));
        assert!(db.create_page(&ok).await.is_ok());
        assert_eq!(db.pages().await.len(), 1);
    }

    #[tokio::test]
    async fn test_date_filter_sort_and_paging() {
        let db = MemoryDatabase::with_properties("Learning", &[("Date Added", "date")]).with_page_size(2);
        let now = Utc::now();
        for days in [10, 1, 3, 2] {
            let at = (now - Duration::days(days)).to_rfc3339();
            db.create_page(&props(json!({"Date Added": {"date": {"start": at}}})))
                .await
                .unwrap();
        }

        let mut query = PageQuery {
            date_after: Some(DateFilter {
                property: "Date Added".to_string(),
                after: now - Duration::days(7),
            }),
            sort_descending_by: Some("Date Added".to_string()),
            start_cursor: None,
        };
        let first = db.query(&query).await.unwrap();
        assert_eq!(first.results.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        query.start_cursor = first.next_cursor.clone();
        let second = db.query(&query).await.unwrap();
        assert_eq!(second.results.len(), 1);
        assert!(second.next_cursor.is_none());

        let newest = date_start(&first.results[0].properties["Date Added"]).unwrap();
        let oldest = date_start(&second.results[0].properties["Date Added"]).unwrap();
        assert!(newest > oldest);
    }

    #[tokio::test]
    async fn test_update_properties_extends_schema() {
        let db = MemoryDatabase::with_properties("Learning", &[]);
        db.update_properties(&crate::mapping::full_schema()).await.unwrap();
        let info = db.retrieve_database().await.unwrap();
        assert_eq!(info.schema.len(), 12);
        assert_eq!(info.schema["Status"], PropertyType::Select);
    }
}
