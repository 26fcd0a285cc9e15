// SPDX-License-Identifier: AGPL-3.0-or-later
//! Source and destination client traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::Result;

/// A page listed by the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePage {
    pub title: String,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl SourcePage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            created: None,
            updated: None,
        }
    }
}

/// Read access to the source wiki
#[async_trait]
pub trait Source: Send + Sync {
    /// Project the pages belong to
    fn project(&self) -> &str;

    /// Canonical URL of a page
    fn page_url(&self, title: &str) -> String;

    /// Every page in the project, in listing order
    async fn list_pages(&self) -> Result<Vec<SourcePage>>;

    /// Raw notation text of one page
    async fn page_text(&self, title: &str) -> Result<String>;

    /// Download a file referenced by a page
    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>>;
}

/// An existing destination page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
}

/// A page to create in the destination database
#[derive(Debug, Clone, PartialEq)]
pub struct NewPage {
    pub title: String,
    pub source_url: String,
    pub created: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

impl NewPage {
    /// Database properties: `Title`, `Scrapbox URL`, `Created Date`, `Tags`
    pub fn properties(&self) -> Value {
        let mut properties = json!({
            "Title": { "title": [{ "text": { "content": self.title } }] },
            "Scrapbox URL": { "url": self.source_url },
        });
        if let Some(created) = self.created {
            properties["Created Date"] = json!({ "date": { "start": created.to_rfc3339() } });
        }
        if !self.tags.is_empty() {
            let options: Vec<Value> = self.tags.iter().map(|t| json!({ "name": t })).collect();
            properties["Tags"] = json!({ "multi_select": options });
        }
        properties
    }
}

/// Write access to the destination workspace
#[async_trait]
pub trait Destination: Send + Sync {
    /// Every page in the target database
    async fn list_pages(&self) -> Result<Vec<PageSummary>>;

    /// Create a page and return its id
    async fn create_page(&self, page: &NewPage) -> Result<String>;

    /// Move a page to the trash
    async fn archive_page(&self, page_id: &str) -> Result<()>;

    /// Append block objects under a page or block; returns the new block ids in order
    async fn append_children(&self, parent_id: &str, children: Vec<Value>) -> Result<Vec<String>>;

    /// Direct children of a page or block as raw block objects
    async fn list_children(&self, block_id: &str) -> Result<Vec<Value>>;

    /// Replace the body of a block
    async fn update_block(&self, block_id: &str, body: &Value) -> Result<()>;
}
