// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory source and destination used by the bridge tests

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{BridgeError, Result};
use crate::traits::{Destination, NewPage, PageSummary, Source, SourcePage};

#[derive(Default)]
pub struct FakeSource {
    pub pages: Vec<(SourcePage, String)>,
    pub files: HashMap<String, Vec<u8>>,
    pub broken: HashSet<String>,
}

impl FakeSource {
    pub fn with_page(mut self, title: &str, text: &str) -> Self {
        self.pages.push((SourcePage::new(title), text.to_string()));
        self
    }

    pub fn with_file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Make fetching the text of `title` fail
    pub fn with_broken(mut self, title: &str) -> Self {
        self.broken.insert(title.to_string());
        self
    }
}

#[async_trait]
impl Source for FakeSource {
    fn project(&self) -> &str {
        "proj"
    }

    fn page_url(&self, title: &str) -> String {
        scrapport_core::traits::page_url("https://scrapbox.io", "proj", title)
    }

    async fn list_pages(&self) -> Result<Vec<SourcePage>> {
        Ok(self.pages.iter().map(|(page, _)| page.clone()).collect())
    }

    async fn page_text(&self, title: &str) -> Result<String> {
        if self.broken.contains(title) {
            return Err(BridgeError::Api {
                status: 500,
                message: format!("cannot read {title}"),
            });
        }
        self.pages
            .iter()
            .find(|(page, _)| page.title == title)
            .map(|(_, text)| text.clone())
            .ok_or_else(|| BridgeError::NotFound(title.to_string()))
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(url.to_string()))
    }
}

#[derive(Default)]
struct State {
    next_id: usize,
    pages: Vec<PageSummary>,
    created: Vec<NewPage>,
    appends: Vec<(String, Vec<Value>)>,
    children: HashMap<String, Vec<Value>>,
    updates: Vec<(String, Value)>,
    archived: Vec<String>,
    failing_children: HashSet<String>,
    /// 1-based number of the append call that fails
    failing_append: Option<usize>,
    append_calls: usize,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Store a block object and its nested children, returning the new id
    fn store(&mut self, parent: &str, mut block: Value) -> String {
        let id = self.next_id("block");
        let block_type = block["type"].as_str().unwrap_or_default().to_string();
        let nested = block
            .get_mut(&block_type)
            .and_then(Value::as_object_mut)
            .and_then(|body| body.remove("children"))
            .and_then(|c| c.as_array().cloned())
            .unwrap_or_default();
        block["id"] = json!(id);
        block["has_children"] = json!(!nested.is_empty());
        self.children.entry(parent.to_string()).or_default().push(block);
        for child in nested {
            self.store(&id, child);
        }
        id
    }
}

#[derive(Default)]
pub struct FakeDestination {
    state: Mutex<State>,
}

impl FakeDestination {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_page(self, id: &str, title: &str) -> Self {
        self.state().pages.push(PageSummary {
            id: id.to_string(),
            title: title.to_string(),
        });
        self
    }

    /// Seed the children of a page or block
    pub fn with_children(self, parent: &str, blocks: Vec<Value>) -> Self {
        self.state()
            .children
            .entry(parent.to_string())
            .or_default()
            .extend(blocks);
        self
    }

    /// Make listing the children of `block_id` fail
    pub fn with_failing_children(self, block_id: &str) -> Self {
        self.state().failing_children.insert(block_id.to_string());
        self
    }

    /// Make the `nth` append request (1-based) fail
    pub fn with_failing_append(self, nth: usize) -> Self {
        self.state().failing_append = Some(nth);
        self
    }

    pub fn created(&self) -> Vec<NewPage> {
        self.state().created.clone()
    }

    pub fn appends(&self) -> Vec<(String, Vec<Value>)> {
        self.state().appends.clone()
    }

    pub fn updates(&self) -> Vec<(String, Value)> {
        self.state().updates.clone()
    }

    pub fn archived(&self) -> Vec<String> {
        self.state().archived.clone()
    }

    pub fn children_of(&self, parent: &str) -> Vec<Value> {
        self.state().children.get(parent).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Destination for FakeDestination {
    async fn list_pages(&self) -> Result<Vec<PageSummary>> {
        Ok(self.state().pages.clone())
    }

    async fn create_page(&self, page: &NewPage) -> Result<String> {
        let mut state = self.state();
        let id = state.next_id("page");
        state.pages.push(PageSummary {
            id: id.clone(),
            title: page.title.clone(),
        });
        state.created.push(page.clone());
        Ok(id)
    }

    async fn archive_page(&self, page_id: &str) -> Result<()> {
        let mut state = self.state();
        state.pages.retain(|p| p.id != page_id);
        state.archived.push(page_id.to_string());
        Ok(())
    }

    async fn append_children(&self, parent_id: &str, children: Vec<Value>) -> Result<Vec<String>> {
        let mut state = self.state();
        state.append_calls += 1;
        if state.failing_append == Some(state.append_calls) {
            return Err(BridgeError::Api {
                status: 400,
                message: "body failed validation".to_string(),
            });
        }
        state.appends.push((parent_id.to_string(), children.clone()));
        Ok(children
            .into_iter()
            .map(|child| state.store(parent_id, child))
            .collect())
    }

    async fn list_children(&self, block_id: &str) -> Result<Vec<Value>> {
        let state = self.state();
        if state.failing_children.contains(block_id) {
            return Err(BridgeError::Api {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        Ok(state.children.get(block_id).cloned().unwrap_or_default())
    }

    async fn update_block(&self, block_id: &str, body: &Value) -> Result<()> {
        let mut state = self.state();
        state.updates.push((block_id.to_string(), body.clone()));
        for blocks in state.children.values_mut() {
            for block in blocks.iter_mut().filter(|b| b["id"] == block_id) {
                if let Some(object) = body.as_object() {
                    for (key, value) in object {
                        block[key] = value.clone();
                    }
                }
            }
        }
        Ok(())
    }
}
