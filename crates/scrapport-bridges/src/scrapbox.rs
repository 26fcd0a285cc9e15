// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scrapbox REST API client

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::COOKIE;
use reqwest::StatusCode;
use scrapport_core::traits::{page_url, DEFAULT_HOST};
use serde::Deserialize;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::traits::{Source, SourcePage};

const LIST_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
struct PageList {
    count: usize,
    pages: Vec<ListedPage>,
}

#[derive(Debug, Deserialize)]
struct ListedPage {
    title: String,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    updated: Option<i64>,
}

impl From<ListedPage> for SourcePage {
    fn from(page: ListedPage) -> Self {
        Self {
            title: page.title,
            created: page.created.and_then(timestamp),
            updated: page.updated.and_then(timestamp),
        }
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Client for one Scrapbox project
pub struct ScrapboxClient {
    http: reqwest::Client,
    project: String,
    session: Option<String>,
    base_url: String,
}

impl ScrapboxClient {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            project: project.into(),
            session: None,
            base_url: DEFAULT_HOST.to_string(),
        }
    }

    /// Authenticate with a `connect.sid` session cookie (private projects)
    pub fn with_session(mut self, connect_sid: impl Into<String>) -> Self {
        let sid = connect_sid.into();
        self.session = (!sid.is_empty()).then_some(sid);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: &str, send_cookie: bool) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match (&self.session, send_cookie) {
            (Some(sid), true) => request.header(COOKIE, format!("connect.sid={sid}")),
            _ => request,
        }
    }

    async fn checked(&self, response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(BridgeError::NotFound(what.to_string()));
        }
        let message = response.text().await.unwrap_or_default();
        Err(BridgeError::Api {
            status: status.as_u16(),
            message: if message.is_empty() {
                status.to_string()
            } else {
                message
            },
        })
    }

    fn same_host(&self, url: &str) -> bool {
        url.starts_with(&format!("{}/", self.base_url))
    }
}

#[async_trait]
impl Source for ScrapboxClient {
    fn project(&self) -> &str {
        &self.project
    }

    fn page_url(&self, title: &str) -> String {
        page_url(&self.base_url, &self.project, title)
    }

    async fn list_pages(&self) -> Result<Vec<SourcePage>> {
        let url = format!(
            "{}/api/pages/{}",
            self.base_url,
            urlencoding::encode(&self.project)
        );
        let mut pages: Vec<SourcePage> = Vec::new();

        loop {
            let response = self
                .get(&url, true)
                .query(&[("limit", LIST_LIMIT), ("skip", pages.len())])
                .send()
                .await?;
            let list: PageList = self
                .checked(response, &self.project)
                .await?
                .json()
                .await?;

            let received = list.pages.len();
            pages.extend(list.pages.into_iter().map(SourcePage::from));
            debug!(received, total = list.count, "listed source pages");
            if received == 0 || pages.len() >= list.count {
                return Ok(pages);
            }
        }
    }

    async fn page_text(&self, title: &str) -> Result<String> {
        let url = format!(
            "{}/api/pages/{}/{}/text",
            self.base_url,
            urlencoding::encode(&self.project),
            urlencoding::encode(title)
        );
        let response = self.get(&url, true).send().await?;
        Ok(self.checked(response, title).await?.text().await?)
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        // The session cookie never leaves the Scrapbox host
        let response = self.get(url, self.same_host(url)).send().await?;
        let bytes = self.checked(response, url).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
