// SPDX-License-Identifier: AGPL-3.0-or-later
//! Notion REST API client
//!
//! Every request goes through one throttle (about three requests per second)
//! and is retried on rate-limit and server errors, honouring `Retry-After`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::traits::{Destination, NewPage, PageSummary};

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(334);
const DEFAULT_MAX_RETRIES: u32 = 3;
const PAGE_SIZE: u32 = 100;

/// Notion client bound to one database
pub struct NotionClient {
    http: reqwest::Client,
    api_key: String,
    database_id: String,
    base_url: String,
    min_interval: Duration,
    max_retries: u32,
    last_request: Mutex<Option<Instant>>,
}

impl NotionClient {
    pub fn new(api_key: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            database_id: database_id.into(),
            base_url: NOTION_API_BASE.to_string(),
            min_interval: DEFAULT_MIN_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            last_request: Mutex::new(None),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Minimum spacing between two requests
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            self.throttle().await;
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.api_key)
                .header("Notion-Version", NOTION_VERSION);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response.json().await?);
            }

            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error = match status {
                StatusCode::TOO_MANY_REQUESTS => BridgeError::RateLimited { retry_after },
                StatusCode::NOT_FOUND => BridgeError::NotFound(path.to_string()),
                _ => BridgeError::Api {
                    status: status.as_u16(),
                    message: error_message(response).await,
                },
            };

            if !error.is_retryable() || attempt >= self.max_retries {
                return Err(error);
            }

            let delay = retry_after
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_millis(500 * 2u64.pow(attempt)));
            warn!(%status, attempt, ?delay, path, "retrying Notion request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Follow `next_cursor` until `has_more` is false
    async fn paginate(&self, method: Method, path: &str, body: Option<Value>) -> Result<Vec<Value>> {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let response = match &body {
                Some(body) => {
                    let mut body = body.clone();
                    body["page_size"] = json!(PAGE_SIZE);
                    if let Some(cursor) = &cursor {
                        body["start_cursor"] = json!(cursor);
                    }
                    self.request(method.clone(), path, Some(&body)).await?
                }
                None => {
                    let mut query = format!("{path}?page_size={PAGE_SIZE}");
                    if let Some(cursor) = &cursor {
                        query.push_str("&start_cursor=");
                        query.push_str(&urlencoding::encode(cursor));
                    }
                    self.request(method.clone(), &query, None).await?
                }
            };

            if let Some(page) = response.get("results").and_then(Value::as_array) {
                results.extend(page.iter().cloned());
            }
            let has_more = response
                .get("has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            cursor = response
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if !has_more || cursor.is_none() {
                return Ok(results);
            }
        }
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    response
        .json::<Value>()
        .await
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.to_string())
}

fn id_of(value: &Value, what: &str) -> Result<String> {
    value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BridgeError::MissingId(what.to_string()))
}

/// Plain text of the page's title property, whatever it is named
fn page_title(page: &Value) -> Option<String> {
    let properties = page.get("properties")?.as_object()?;
    let title = properties
        .values()
        .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))
        .or_else(|| properties.get("Title"))?;
    let text: String = title
        .get("title")?
        .as_array()?
        .iter()
        .filter_map(|run| {
            run.get("plain_text")
                .or_else(|| run.get("text").and_then(|t| t.get("content")))
                .and_then(Value::as_str)
        })
        .collect();
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl Destination for NotionClient {
    async fn list_pages(&self) -> Result<Vec<PageSummary>> {
        let path = format!("/databases/{}/query", self.database_id);
        let pages = self.paginate(Method::POST, &path, Some(json!({}))).await?;
        let summaries: Vec<PageSummary> = pages
            .iter()
            .filter_map(|page| {
                Some(PageSummary {
                    id: id_of(page, "listed page").ok()?,
                    title: page_title(page)?,
                })
            })
            .collect();
        debug!(count = summaries.len(), "listed destination pages");
        Ok(summaries)
    }

    async fn create_page(&self, page: &NewPage) -> Result<String> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": page.properties(),
        });
        let response = self.request(Method::POST, "/pages", Some(&body)).await?;
        let id = id_of(&response, &page.title)?;
        debug!(title = %page.title, %id, "created page");
        Ok(id)
    }

    async fn archive_page(&self, page_id: &str) -> Result<()> {
        let path = format!("/pages/{page_id}");
        self.request(Method::PATCH, &path, Some(&json!({ "archived": true })))
            .await?;
        debug!(%page_id, "archived page");
        Ok(())
    }

    async fn append_children(&self, parent_id: &str, children: Vec<Value>) -> Result<Vec<String>> {
        let path = format!("/blocks/{parent_id}/children");
        let body = json!({ "children": children });
        let response = self.request(Method::PATCH, &path, Some(&body)).await?;
        let ids = response
            .get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().filter_map(|r| id_of(r, "block").ok()).collect())
            .unwrap_or_default();
        Ok(ids)
    }

    async fn list_children(&self, block_id: &str) -> Result<Vec<Value>> {
        let path = format!("/blocks/{block_id}/children");
        self.paginate(Method::GET, &path, None).await
    }

    async fn update_block(&self, block_id: &str, body: &Value) -> Result<()> {
        let path = format!("/blocks/{block_id}");
        self.request(Method::PATCH, &path, Some(body)).await?;
        Ok(())
    }
}
